//! Template controllers - Custom attributes that own synthetic views.
//!
//! Each template controller receives a [`ViewFactory`](crate::controller::ViewFactory)
//! for its content and a [`RenderLocation`](crate::dom::RenderLocation)
//! marking where views go, and decides when views exist and are active:
//!
//! - [`If`] / [`Else`] - one of two views, by truthiness
//! - [`Repeat`] - one view per item, reconciled against an [`IndexMap`]
//! - [`Switch`] / [`Case`] - the matching case views, with fall-through
//! - [`PromiseController`] / [`PromiseBranch`] - pending, fulfilled, rejected
//! - [`With`] - a view bound to a different binding context
//! - [`Portal`] - a view mounted under another host
//! - [`Compose`] - a runtime-chosen element or view
//!
//! # Swaps
//!
//! A value change that replaces views is a swap. Swaps of one controller
//! never interleave: each waits for the previous one to settle through a
//! [`SwapQueue`], and async swaps are counted on the platform's
//! [`WorkTracker`](crate::platform::WorkTracker).

mod compose;
mod if_else;
mod portal;
mod promise;
mod repeat;
mod switch;
mod with;

pub use compose::*;
pub use if_else::*;
pub use portal::*;
pub use promise::*;
pub use repeat::*;
pub use switch::*;
pub use with::*;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::controller::Controller;
use crate::lifecycle::{Activation, Completion};
use crate::platform::Platform;

// =============================================================================
// SwapQueue
// =============================================================================

/// Serializes the swaps of one template controller.
///
/// A swap enqueued while another is in flight runs after it settles,
/// whatever its outcome. Each enqueue also bumps a swap id so a swap can
/// tell, once it finally runs, whether a newer request superseded it.
#[derive(Debug, Default)]
pub struct SwapQueue {
    pending: RefCell<Option<Completion>>,
    swap_id: Cell<u64>,
}

impl SwapQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a new swap id; every earlier id becomes stale.
    pub fn next_id(&self) -> u64 {
        let id = self.swap_id.get() + 1;
        self.swap_id.set(id);
        id
    }

    pub fn is_current(&self, id: u64) -> bool {
        self.swap_id.get() == id
    }

    /// The in-flight swap, if it has not been observed to settle.
    pub fn pending(&self) -> Option<Completion> {
        self.pending
            .borrow()
            .clone()
            .filter(|completion| completion.peek().is_none())
    }

    pub fn is_idle(&self) -> bool {
        self.pending().is_none()
    }

    pub fn clear(&self) {
        self.pending.borrow_mut().take();
    }

    /// Run `swap` now when idle, otherwise once the in-flight swap settled.
    /// The result becomes the new in-flight swap.
    pub fn enqueue(&self, platform: &Platform, swap: impl FnOnce() -> Activation + 'static) -> Activation {
        let outcome = match self.pending() {
            None => swap(),
            Some(previous) => Ok(Some(platform.spawn_shared(async move {
                // A failed swap must not wedge the ones behind it.
                let _ = previous.await;
                match swap()? {
                    Some(next) => next.await,
                    None => Ok(()),
                }
            }))),
        };
        if let Ok(Some(completion)) = &outcome {
            *self.pending.borrow_mut() = Some(completion.clone());
        }
        outcome
    }
}

/// Count an async swap on the platform's work tracker until it settles.
pub(crate) fn track(platform: &Rc<Platform>, outcome: &Activation) {
    let Ok(Some(completion)) = outcome else { return };
    platform.work_tracker().start();
    let completion = completion.clone();
    let tracked = platform.clone();
    platform.spawn(async move {
        if let Err(err) = completion.await {
            tracing::debug!(error = %err, "swap failed");
        }
        tracked.work_tracker().finish();
    });
}

/// The controller a template controller stored in its `created` hook.
pub(crate) fn upgrade(controller: &RefCell<Weak<Controller>>) -> Option<Rc<Controller>> {
    controller.borrow().upgrade()
}

/// Walk hydration parents from `controller` until one's view-model is a `T`.
pub(crate) fn find_owner<T: 'static>(controller: &Rc<Controller>) -> Option<Rc<T>> {
    let mut current = controller.hydration_parent();
    while let Some(candidate) = current {
        if let Some(owner) = candidate.view_model_as::<T>() {
            return Some(owner);
        }
        current = candidate.hydration_parent();
    }
    None
}
