//! Watch binding - calls back when a scope value changes.

use std::cell::RefCell;
use std::rc::Rc;

use spark_signals::effect;

use super::{Binding, Scope, Value};
use crate::error::LifecycleError;
use crate::types::LifecycleFlags;

/// Callback receiving `(new, old)`.
pub type WatchCallback = Rc<dyn Fn(&Value, &Value)>;

/// Observes one name while bound. The callback only fires on changes, not
/// for the value seen at bind time.
pub struct WatchBinding {
    name: String,
    callback: WatchCallback,
    stop: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl WatchBinding {
    pub fn new(name: impl Into<String>, callback: WatchCallback) -> Self {
        Self {
            name: name.into(),
            callback,
            stop: RefCell::new(None),
        }
    }

    fn stop_effect(&self) {
        if let Some(stop) = self.stop.borrow_mut().take() {
            stop();
        }
    }
}

impl Binding for WatchBinding {
    fn bind(&self, flags: LifecycleFlags, scope: &Rc<Scope>) -> Result<(), LifecycleError> {
        self.stop_effect();

        let Some(source) = scope.resolve(&self.name) else {
            if flags.contains(LifecycleFlags::STRICT_BINDING) {
                return Err(LifecycleError::UnresolvedName {
                    name: self.name.clone(),
                });
            }
            return Ok(());
        };

        let callback = self.callback.clone();
        let mut last: Option<Value> = None;
        let stop = effect(move || {
            let value = source.get();
            if let Some(old) = last.replace(value.clone()) {
                if old != value {
                    callback(&value, &old);
                }
            }
        });
        *self.stop.borrow_mut() = Some(Box::new(stop));
        Ok(())
    }

    fn unbind(&self, _flags: LifecycleFlags) {
        self.stop_effect();
    }

    fn is_bound(&self) -> bool {
        self.stop.borrow().is_some()
    }
}
