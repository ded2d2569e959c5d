//! # trellis
//!
//! Component lifecycle runtime for a reactive UI framework.
//!
//! Built on [spark-signals](https://github.com/RLabs-Inc/spark-signals) for fine-grained reactivity.
//!
//! ## Architecture
//!
//! Every component instance (custom element, custom attribute or synthetic
//! view) is driven by a [`Controller`]. Controllers form a tree and move
//! through activation and deactivation waves:
//!
//! ```text
//! hydrate -> activate (binding, bound, attaching, attached)
//!         -> deactivate (detaching, unbinding) -> dispose
//! ```
//!
//! Hooks are synchronous unless they hand back a future, so a tree without
//! async hooks activates within a single call. Async hooks suspend only
//! their own branch; the wave's initiator joins everything through phase
//! counters and a lazily created completion.
//!
//! Template controllers ([`resources`]) own synthetic views and swap them
//! in response to value changes: `if`/`else`, `repeat`, `switch`/`case`,
//! `promise`, `with`, `portal` and `compose`.
//!
//! ## Modules
//!
//! - [`types`] - State and flag bit sets, phases, ids
//! - [`lifecycle`] - Settle/Completion, phase counters, hook contracts
//! - [`platform`] - Executor seam, task queue, work tracker
//! - [`binding`] - Scopes, reactive override contexts, bindings
//! - [`dom`] - In-memory node tree, node sequences, render locations
//! - [`controller`] - The controller state machine, hydration, view factories
//! - [`resources`] - Template controllers
//! - [`app`] - Root bootstrap and app tasks

pub mod app;
pub mod binding;
pub mod config;
pub mod context;
pub mod controller;
pub mod dom;
pub mod error;
pub mod lifecycle;
pub mod platform;
pub mod resources;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use app::{App, AppRoot, AppTask, AppTaskSlot};

pub use binding::{Binding, ChildrenObserver, OverrideContext, Scope, TextBinding, Value, WatchBinding};

pub use config::AppConfig;

pub use context::AppContext;

pub use controller::{
    ComponentDefinition, Controller, ControllerRegistry, DefaultRendering, RenderContext, Rendering,
    Template, ViewFactory,
};

pub use dom::{Node, NodeSequence, RenderLocation};

pub use error::LifecycleError;

pub use lifecycle::{
    Activation, Completion, Deferred, HookContext, HookResult, LifecycleHook, Next, Settle, ViewModel,
};

pub use platform::{Platform, TaskHandle, TaskQueue, TaskStatus, WorkTracker};

pub use resources::{
    BranchKind, Case, Compose, Composition, Else, If, IndexMap, Portal, PromiseBranch,
    PromiseController, Repeat, ScopeBehavior, Switch, SwapQueue, ValuePromise, With, promise,
};
