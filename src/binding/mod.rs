//! Binding - The leaf objects a controller binds and unbinds.
//!
//! Rendering produces bindings; the controller only ever calls the uniform
//! [`Binding::bind`] / [`Binding::unbind`] pair on them, in registration
//! order.
//!
//! - [`scope`] - `Scope`, `OverrideContext` and the `Value` type
//! - [`text`] - `TextBinding`, a signal-driven text node writer
//! - [`watch`] - `WatchBinding`, a change callback on a scope name

pub mod scope;
pub mod text;
pub mod watch;

pub use scope::*;
pub use text::TextBinding;
pub use watch::{WatchBinding, WatchCallback};

use std::rc::Rc;

use crate::error::LifecycleError;
use crate::types::LifecycleFlags;

/// A leaf binding.
///
/// Binding an already bound binding to another scope rebinds it.
pub trait Binding {
    fn bind(&self, flags: LifecycleFlags, scope: &Rc<Scope>) -> Result<(), LifecycleError>;

    fn unbind(&self, flags: LifecycleFlags);

    fn is_bound(&self) -> bool;
}

/// A derived-collection observer (`@children` style). Started before a
/// controller's bindings bind and stopped when it starts deactivating.
pub trait ChildrenObserver {
    fn start(&self);

    fn stop(&self);
}
