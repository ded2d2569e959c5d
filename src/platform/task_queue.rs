//! Task Queue - Cooperative, cancellable queue for batched DOM writes.
//!
//! Tasks are drained in FIFO order on the executor, never inside the call
//! that queued them. A queued task can be cancelled until it starts; a
//! running task whose callback went async stays `Running` until its work
//! settles, so callers can decide between "wait for it" and "cancel it".

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use futures::executor::LocalSpawner;
use futures::task::LocalSpawnExt;

use crate::error::LifecycleError;
use crate::lifecycle::{Activation, Completion, Deferred};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Canceled,
}

type TaskCallback = Box<dyn FnOnce() -> Activation>;

struct TaskInner {
    id: u64,
    status: Cell<TaskStatus>,
    callback: RefCell<Option<TaskCallback>>,
    deferred: RefCell<Option<Deferred>>,
    result: Completion,
}

/// Handle on a queued task.
#[derive(Clone)]
pub struct TaskHandle(Rc<TaskInner>);

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn status(&self) -> TaskStatus {
        self.0.status.get()
    }

    /// Settles when the task's work (including async work) has settled.
    /// A cancelled task settles with [`LifecycleError::Abandoned`].
    pub fn result(&self) -> Completion {
        self.0.result.clone()
    }

    /// Cancel a task that has not started. Returns whether it was cancelled.
    pub fn cancel(&self) -> bool {
        if self.status() != TaskStatus::Pending {
            return false;
        }
        self.0.status.set(TaskStatus::Canceled);
        self.0.callback.borrow_mut().take();
        if let Some(deferred) = self.0.deferred.borrow_mut().take() {
            deferred.reject(LifecycleError::Abandoned {
                name: format!("task {}", self.0.id),
            });
        }
        true
    }

    fn finish(&self, outcome: Result<(), LifecycleError>) {
        self.0.status.set(TaskStatus::Completed);
        if let Some(deferred) = self.0.deferred.borrow_mut().take() {
            deferred.settle(outcome);
        }
    }
}

pub struct TaskQueue {
    this: Weak<TaskQueue>,
    spawner: LocalSpawner,
    tasks: RefCell<VecDeque<TaskHandle>>,
    drain_scheduled: Cell<bool>,
    next_id: Cell<u64>,
}

impl TaskQueue {
    pub fn new(spawner: LocalSpawner) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            spawner,
            tasks: RefCell::new(VecDeque::new()),
            drain_scheduled: Cell::new(false),
            next_id: Cell::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    pub fn queue_task(&self, callback: impl FnOnce() -> Activation + 'static) -> TaskHandle {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let deferred = Deferred::new(&format!("task {id}"));
        let result = deferred.completion();
        let handle = TaskHandle(Rc::new(TaskInner {
            id,
            status: Cell::new(TaskStatus::Pending),
            callback: RefCell::new(Some(Box::new(callback))),
            deferred: RefCell::new(Some(deferred)),
            result,
        }));
        self.tasks.borrow_mut().push_back(handle.clone());
        self.schedule_drain();
        handle
    }

    fn schedule_drain(&self) {
        if self.drain_scheduled.replace(true) {
            return;
        }
        let queue = self.this.clone();
        let spawned = self.spawner.spawn_local(async move {
            if let Some(queue) = queue.upgrade() {
                queue.flush();
            }
        });
        if let Err(err) = spawned {
            tracing::warn!(error = %err, "task queue drain could not be scheduled");
            self.drain_scheduled.set(false);
        }
    }

    /// Run every queued task now.
    pub fn flush(&self) {
        self.drain_scheduled.set(false);
        loop {
            let Some(task) = self.tasks.borrow_mut().pop_front() else {
                break;
            };
            if task.status() != TaskStatus::Pending {
                continue;
            }
            let Some(callback) = task.0.callback.borrow_mut().take() else {
                continue;
            };
            task.0.status.set(TaskStatus::Running);
            match callback() {
                Ok(None) => task.finish(Ok(())),
                Err(err) => task.finish(Err(err)),
                Ok(Some(work)) => {
                    let running = task.clone();
                    let spawned = self.spawner.spawn_local(async move {
                        let outcome = work.await;
                        running.finish(outcome);
                    });
                    if let Err(err) = spawned {
                        tracing::warn!(error = %err, "task continuation could not be scheduled");
                        task.finish(Err(LifecycleError::Abandoned {
                            name: format!("task {}", task.id()),
                        }));
                    }
                }
            }
        }
    }
}
