//! Platform - The cooperative executor seam.
//!
//! Everything runs on one thread. Async continuations are spawned on a
//! [`LocalSpawner`] (a `futures::executor::LocalPool` in tests and in any
//! host that drives one), DOM writes can be batched on the [`TaskQueue`],
//! and the [`WorkTracker`] counts in-flight swaps.
//!
//! # Example
//!
//! ```ignore
//! let mut pool = LocalPool::new();
//! let platform = Platform::new(pool.spawner());
//!
//! // ... activate something that goes async ...
//! pool.run_until_stalled();
//! ```

mod task_queue;
mod work_tracker;

pub use task_queue::*;
pub use work_tracker::*;

use std::future::Future;
use std::rc::Rc;

use futures::executor::LocalSpawner;
use futures::future::{FutureExt, try_join_all};
use futures::task::LocalSpawnExt;

use crate::error::LifecycleError;
use crate::lifecycle::{Activation, Completion};

pub struct Platform {
    spawner: LocalSpawner,
    task_queue: Rc<TaskQueue>,
    work_tracker: WorkTracker,
}

impl Platform {
    pub fn new(spawner: LocalSpawner) -> Rc<Self> {
        Rc::new(Self {
            task_queue: TaskQueue::new(spawner.clone()),
            spawner,
            work_tracker: WorkTracker::new(),
        })
    }

    pub fn task_queue(&self) -> &Rc<TaskQueue> {
        &self.task_queue
    }

    pub fn work_tracker(&self) -> &WorkTracker {
        &self.work_tracker
    }

    /// Fire-and-forget a continuation.
    pub fn spawn(&self, fut: impl Future<Output = ()> + 'static) {
        if let Err(err) = self.spawner.spawn_local(fut) {
            tracing::warn!(error = %err, "lifecycle continuation dropped: executor is shut down");
        }
    }

    /// Spawn `fut` so it makes progress on its own, and hand back a handle on
    /// its outcome.
    pub fn spawn_shared(
        &self,
        fut: impl Future<Output = Result<(), LifecycleError>> + 'static,
    ) -> Completion {
        let completion = Completion::from_future(fut);
        let driver = completion.clone();
        self.spawn(driver.map(|outcome| {
            if let Err(err) = outcome {
                tracing::debug!(error = %err, "async lifecycle work failed");
            }
        }));
        completion
    }

    /// Run `then` after `first` settles successfully: synchronously when
    /// `first` already finished, otherwise as a spawned continuation.
    pub fn on_resolve(
        &self,
        first: Activation,
        then: impl FnOnce() -> Activation + 'static,
    ) -> Activation {
        match first? {
            None => then(),
            Some(pending) => Ok(Some(self.spawn_shared(async move {
                pending.await?;
                match then()? {
                    Some(next) => next.await,
                    None => Ok(()),
                }
            }))),
        }
    }

    /// Join several outcomes.
    pub fn on_resolve_all(&self, items: impl IntoIterator<Item = Option<Completion>>) -> Option<Completion> {
        let pending: Vec<Completion> = items.into_iter().flatten().collect();
        match pending.len() {
            0 => None,
            1 => pending.into_iter().next(),
            _ => Some(self.spawn_shared(async move {
                try_join_all(pending).await.map(|_| ())
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::LocalPool;
    use std::cell::Cell;

    #[test]
    fn test_on_resolve_is_sync_when_first_is_sync() {
        let pool = LocalPool::new();
        let platform = Platform::new(pool.spawner());
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();

        let result = platform.on_resolve(Ok(None), move || {
            flag.set(true);
            Ok(None)
        });
        assert!(matches!(result, Ok(None)));
        assert!(ran.get());
    }

    #[test]
    fn test_on_resolve_propagates_sync_error() {
        let pool = LocalPool::new();
        let platform = Platform::new(pool.spawner());
        let result = platform.on_resolve(Err(LifecycleError::hook("early")), || {
            panic!("must not run")
        });
        assert!(matches!(result, Err(LifecycleError::Hook(m)) if m == "early"));
    }

    #[test]
    fn test_on_resolve_runs_after_pending_without_being_awaited() {
        let mut pool = LocalPool::new();
        let platform = Platform::new(pool.spawner());
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        let (tx, rx) = futures::channel::oneshot::channel::<()>();

        let first = Completion::from_future(async move {
            let _ = rx.await;
            Ok(())
        });
        let result = platform.on_resolve(Ok(Some(first)), move || {
            flag.set(true);
            Ok(None)
        });
        assert!(matches!(result, Ok(Some(_))));

        pool.run_until_stalled();
        assert!(!ran.get());
        let _ = tx.send(());
        pool.run_until_stalled();
        assert!(ran.get());
    }

    #[test]
    fn test_on_resolve_all_joins() {
        let mut pool = LocalPool::new();
        let platform = Platform::new(pool.spawner());
        assert!(platform.on_resolve_all([None, None]).is_none());

        let joined = platform.on_resolve_all([
            Some(Completion::from_future(async { Ok(()) })),
            None,
            Some(Completion::from_future(async { Err(LifecycleError::hook("b")) })),
        ]);
        let joined = joined.expect("pending");
        assert_eq!(pool.run_until(joined), Err(LifecycleError::hook("b")));
    }
}
