//! Work Tracker - Counter of in-flight async lifecycle work.
//!
//! Template controllers `start()` before an async swap and `finish()` when it
//! settles. [`WorkTracker::wait_for_idle`] resolves once the counter is back
//! at zero, which is how callers wait for "everything has quiesced".

use std::cell::{Cell, RefCell};

use futures::channel::oneshot;
use futures::future::{FutureExt, LocalBoxFuture};

#[derive(Debug, Default)]
pub struct WorkTracker {
    count: Cell<usize>,
    waiters: RefCell<Vec<oneshot::Sender<()>>>,
}

impl WorkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) {
        self.count.set(self.count.get() + 1);
    }

    pub fn finish(&self) {
        let count = self.count.get().saturating_sub(1);
        self.count.set(count);
        if count == 0 {
            let waiters = std::mem::take(&mut *self.waiters.borrow_mut());
            for waiter in waiters {
                let _ = waiter.send(());
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.count.get()
    }

    pub fn is_idle(&self) -> bool {
        self.count.get() == 0
    }

    pub fn wait_for_idle(&self) -> LocalBoxFuture<'static, ()> {
        if self.is_idle() {
            return futures::future::ready(()).boxed_local();
        }
        let (sender, receiver) = oneshot::channel();
        self.waiters.borrow_mut().push(sender);
        receiver.map(|_| ()).boxed_local()
    }
}
