use thiserror::Error;

use crate::types::State;

/// Every failure the lifecycle runtime reports.
///
/// `Clone` because a single failure fans out to every awaiter of a shared
/// completion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("trying to activate a disposed controller: {name}")]
    ActivateDisposed { name: String },

    #[error("unexpected state {state} while activating {name}")]
    UnexpectedActivationState { name: String, state: State },

    #[error("unexpected state {state} while deactivating {name}")]
    UnexpectedDeactivationState { name: String, state: State },

    #[error("synthetic view {name} requires a scope to activate")]
    MissingScope { name: String },

    #[error("cannot resolve '{name}' in strict binding mode")]
    UnresolvedName { name: String },

    #[error("index map describes {map} items but the collection has {items}")]
    MismatchedIndexMap { map: usize, items: usize },

    #[error("index map refers to old index {index} of a collection of {len}")]
    IndexOutOfRange { index: isize, len: usize },

    #[error("old index {index} must be kept or deleted exactly once")]
    UnbalancedIndexMap { index: usize },

    /// A view-model or cross-cutting hook failed.
    #[error("{0}")]
    Hook(String),

    #[error("activation of {name} was abandoned before it settled")]
    Abandoned { name: String },

    #[error("the app is already started")]
    AlreadyStarted,

    #[error("no root component configured")]
    NotConfigured,
}

impl LifecycleError {
    /// Shorthand for a hook failure with the given message.
    pub fn hook(message: impl Into<String>) -> Self {
        LifecycleError::Hook(message.into())
    }
}
