//! `portal` - Mount a view under another host.

use std::cell::RefCell;
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};

use super::{SwapQueue, track, upgrade};
use crate::controller::{Controller, ViewFactory};
use crate::dom::{Node, RenderLocation};
use crate::lifecycle::{Activation, HookContext, HookResult, Settle, ViewModel, Visitor};
use crate::types::{HookSet, LifecycleFlags};

/// Renders its view under `target` instead of where it was declared, while
/// keeping the declaring scope. Moving to another target deactivates the
/// view and activates it again under the new host.
pub struct Portal {
    this: Weak<Portal>,
    factory: Rc<ViewFactory>,
    controller: RefCell<Weak<Controller>>,
    view: RefCell<Option<Rc<Controller>>>,
    target: RefCell<Node>,
    queue: SwapQueue,
}

impl Portal {
    /// `_location` stays empty: the view never mounts where it was declared.
    pub fn new(factory: Rc<ViewFactory>, _location: RenderLocation, target: Node) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            factory,
            controller: RefCell::new(Weak::new()),
            view: RefCell::new(None),
            target: RefCell::new(target),
            queue: SwapQueue::new(),
        })
    }

    pub fn target(&self) -> Node {
        self.target.borrow().clone()
    }

    pub fn view(&self) -> Option<Rc<Controller>> {
        self.view.borrow().clone()
    }

    pub fn set_target(&self, target: Node) -> Activation {
        if self.target.borrow().ptr_eq(&target) {
            return Ok(None);
        }
        *self.target.borrow_mut() = target;
        let Some(controller) = upgrade(&self.controller).filter(|c| c.is_active()) else {
            return Ok(None);
        };
        let (Some(this), Some(view)) = (self.this.upgrade(), self.view()) else {
            return Ok(None);
        };
        let platform = controller.context().platform().clone();
        let outcome = self.queue.enqueue(&platform, move || {
            let deactivation = view.deactivate(&view, Some(&controller), LifecycleFlags::NONE)?;
            let platform = controller.context().platform().clone();
            platform.on_resolve(Ok(deactivation), move || {
                view.set_host(this.target());
                view.activate(&view, Some(&controller), controller.flags(), controller.scope())
            })
        });
        track(&platform, &outcome);
        outcome
    }
}

impl ViewModel for Portal {
    fn hooks(&self) -> HookSet {
        HookSet::CREATED | HookSet::ATTACHING | HookSet::DETACHING | HookSet::DISPOSE | HookSet::ACCEPT
    }

    fn created(&self, controller: &Rc<Controller>) {
        *self.controller.borrow_mut() = Rc::downgrade(controller);
        match self.factory.create(Some(controller)) {
            Ok(view) => *self.view.borrow_mut() = Some(view),
            Err(err) => tracing::warn!(error = %err, "portal view could not be created"),
        }
    }

    fn attaching(&self, cx: &HookContext<'_>) -> HookResult {
        let Some(view) = self.view() else {
            return Ok(Settle::Done);
        };
        view.set_host(self.target());
        let activation = view.activate(cx.initiator, Some(cx.controller), cx.flags, cx.controller.scope())?;
        Ok(Settle::from(activation))
    }

    fn detaching(&self, cx: &HookContext<'_>) -> HookResult {
        let Some(view) = self.view() else {
            return Ok(Settle::Done);
        };
        let deactivation = view.deactivate(cx.initiator, Some(cx.controller), cx.flags)?;
        Ok(Settle::from(deactivation))
    }

    fn dispose(&self) {
        if let Some(view) = self.view.borrow_mut().take() {
            view.dispose();
        }
    }

    fn accept(&self, visitor: &mut Visitor<'_>) -> ControlFlow<()> {
        match self.view() {
            Some(view) => view.accept(visitor),
            None => ControlFlow::Continue(()),
        }
    }
}
