//! Lifecycle plumbing shared by controllers and template controllers.
//!
//! - [`settle`] - `Settle`, `Completion` and the `Deferred` bridging promise
//! - [`barrier`] - `PhaseCounter`, the per-phase join point
//! - [`hooks`] - `ViewModel` hook contract and cross-cutting `LifecycleHook`s
//!
//! # Sync When Possible
//!
//! Nothing here allocates a future unless a hook actually returns one. A
//! tree whose hooks are all synchronous activates in a single call and
//! `activate` returns `Ok(None)`.

pub mod barrier;
pub mod hooks;
pub mod settle;

pub use barrier::PhaseCounter;
pub use hooks::*;
pub use settle::*;
