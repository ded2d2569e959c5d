//! Text binding - writes a scope value into a text node.

use std::cell::RefCell;
use std::rc::Rc;

use spark_signals::effect;

use super::{Binding, Scope};
use crate::dom::Node;
use crate::error::LifecycleError;
use crate::types::LifecycleFlags;

/// Keeps a text node in sync with a name resolved in the scope.
///
/// The write happens inside an effect, so later changes to the resolved
/// signal update the node without the controller being involved.
pub struct TextBinding {
    name: String,
    target: Node,
    stop: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl TextBinding {
    pub fn new(name: impl Into<String>, target: Node) -> Self {
        Self {
            name: name.into(),
            target,
            stop: RefCell::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &Node {
        &self.target
    }

    fn stop_effect(&self) {
        if let Some(stop) = self.stop.borrow_mut().take() {
            stop();
        }
    }
}

impl Binding for TextBinding {
    fn bind(&self, flags: LifecycleFlags, scope: &Rc<Scope>) -> Result<(), LifecycleError> {
        self.stop_effect();

        let Some(source) = scope.resolve(&self.name) else {
            if flags.contains(LifecycleFlags::STRICT_BINDING) {
                return Err(LifecycleError::UnresolvedName {
                    name: self.name.clone(),
                });
            }
            self.target.set_text("");
            return Ok(());
        };

        let target = self.target.clone();
        let stop = effect(move || {
            target.set_text(&source.get().to_string());
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
