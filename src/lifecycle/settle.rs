//! Settle - sync-when-possible results and bridging completions.
//!
//! A hook either finishes during the call ([`Settle::Done`]) or hands back a
//! future ([`Settle::Pending`]). Only the second case makes the controller
//! suspend, and only for the branch that owns the hook.
//!
//! A [`Deferred`] is the bridging promise: created lazily the first time a
//! wave goes async, resolved or rejected by the controller, and observed
//! through any number of [`Completion`] clones.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::future::{FutureExt, LocalBoxFuture, Shared, try_join_all};

use crate::error::LifecycleError;

/// Boxed future returned by an async hook.
pub type LifecycleFuture = LocalBoxFuture<'static, Result<(), LifecycleError>>;

/// What every hook returns.
pub type HookResult = Result<Settle, LifecycleError>;

/// What `activate`/`deactivate` and template-controller swaps return:
/// `Ok(None)` when everything finished synchronously.
pub type Activation = Result<Option<Completion>, LifecycleError>;

// =============================================================================
// Settle
// =============================================================================

/// Outcome of a hook that may or may not suspend.
pub enum Settle {
    Done,
    Pending(LifecycleFuture),
}

impl Settle {
    pub fn pending(fut: impl Future<Output = Result<(), LifecycleError>> + 'static) -> Self {
        Settle::Pending(fut.boxed_local())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Settle::Pending(_))
    }

    /// Run `f` once this settles successfully; immediately when already done.
    pub fn then(self, f: impl FnOnce() + 'static) -> Self {
        match self {
            Settle::Done => {
                f();
                Settle::Done
            }
            Settle::Pending(fut) => Settle::pending(async move {
                fut.await?;
                f();
                Ok(())
            }),
        }
    }

    /// Join several outcomes; done only when every one of them is done.
    pub fn all(items: impl IntoIterator<Item = Settle>) -> Self {
        let pending: Vec<LifecycleFuture> = items
            .into_iter()
            .filter_map(|item| match item {
                Settle::Done => None,
                Settle::Pending(fut) => Some(fut),
            })
            .collect();
        match pending.len() {
            0 => Settle::Done,
            1 => pending.into_iter().next().map_or(Settle::Done, Settle::Pending),
            _ => Settle::pending(async move { try_join_all(pending).await.map(|_| ()) }),
        }
    }
}

impl From<Option<Completion>> for Settle {
    fn from(completion: Option<Completion>) -> Self {
        match completion {
            None => Settle::Done,
            Some(completion) => Settle::pending(completion),
        }
    }
}

impl fmt::Debug for Settle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Settle::Done => f.write_str("Done"),
            Settle::Pending(_) => f.write_str("Pending"),
        }
    }
}

// =============================================================================
// Completion
// =============================================================================

/// Cloneable handle on the outcome of an activation, deactivation or swap.
#[derive(Clone)]
pub struct Completion(Shared<LifecycleFuture>);

impl Completion {
    pub fn from_future(fut: impl Future<Output = Result<(), LifecycleError>> + 'static) -> Self {
        Completion(fut.boxed_local().shared())
    }

    /// The outcome, if it has already been observed by some poll.
    pub fn peek(&self) -> Option<&Result<(), LifecycleError>> {
        self.0.peek()
    }
}

impl Future for Completion {
    type Output = Result<(), LifecycleError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.0.poll_unpin(cx)
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Completion").field(&self.peek()).finish()
    }
}

// =============================================================================
// Deferred
// =============================================================================

/// Resolver half of a bridging promise.
pub struct Deferred {
    sender: Option<oneshot::Sender<Result<(), LifecycleError>>>,
    completion: Completion,
}

impl Deferred {
    /// `name` only feeds the [`LifecycleError::Abandoned`] message produced when
    /// the resolver is dropped without settling.
    pub fn new(name: &str) -> Self {
        let (sender, receiver) = oneshot::channel();
        let name = name.to_string();
        let completion = Completion::from_future(receiver.map(move |outcome| {
            outcome.unwrap_or(Err(LifecycleError::Abandoned { name }))
        }));
        Self {
            sender: Some(sender),
            completion,
        }
    }

    pub fn completion(&self) -> Completion {
        self.completion.clone()
    }

    pub fn resolve(mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Ok(()));
        }
    }

    pub fn reject(mut self, err: LifecycleError) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Err(err));
        }
    }

    pub fn settle(self, outcome: Result<(), LifecycleError>) {
        match outcome {
            Ok(()) => self.resolve(),
            Err(err) => self.reject(err),
        }
    }
}
