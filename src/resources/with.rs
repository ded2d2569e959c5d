//! `with` - A view bound to a different binding context.

use std::any::Any;
use std::cell::RefCell;
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};

use super::upgrade;
use crate::binding::Scope;
use crate::controller::{Controller, ViewFactory};
use crate::dom::RenderLocation;
use crate::error::LifecycleError;
use crate::lifecycle::{HookContext, HookResult, Settle, ViewModel, Visitor};
use crate::types::HookSet;

/// Shows its view with a child scope whose binding context is the value.
/// Changing the value rebinds the view's bindings in place; the view is
/// neither deactivated nor re-created.
pub struct With {
    factory: Rc<ViewFactory>,
    location: RenderLocation,
    controller: RefCell<Weak<Controller>>,
    view: RefCell<Option<Rc<Controller>>>,
    value: RefCell<Rc<dyn Any>>,
}

impl With {
    pub fn new(factory: Rc<ViewFactory>, location: RenderLocation, value: Rc<dyn Any>) -> Rc<Self> {
        Rc::new(Self {
            factory,
            location,
            controller: RefCell::new(Weak::new()),
            view: RefCell::new(None),
            value: RefCell::new(value),
        })
    }

    pub fn value(&self) -> Rc<dyn Any> {
        self.value.borrow().clone()
    }

    pub fn view(&self) -> Option<Rc<Controller>> {
        self.view.borrow().clone()
    }

    fn scope_for(controller: &Controller, value: Rc<dyn Any>) -> Rc<Scope> {
        match controller.scope() {
            Some(parent) => Scope::from_parent(&parent, value),
            None => Scope::new(value),
        }
    }

    /// Replace the binding context. An active view is rebound to a fresh
    /// child scope.
    pub fn set_value(&self, value: Rc<dyn Any>) -> Result<(), LifecycleError> {
        *self.value.borrow_mut() = value.clone();
        let (Some(controller), Some(view)) = (upgrade(&self.controller), self.view()) else {
            return Ok(());
        };
        if !view.is_active() {
            return Ok(());
        }
        let scope = Self::scope_for(&controller, value);
        view.set_scope(Some(scope.clone()));
        let flags = view.flags();
        for binding in view.bindings() {
            binding.bind(flags, &scope)?;
        }
        Ok(())
    }
}

impl ViewModel for With {
    fn hooks(&self) -> HookSet {
        HookSet::CREATED | HookSet::ATTACHING | HookSet::DETACHING | HookSet::DISPOSE | HookSet::ACCEPT
    }

    fn created(&self, controller: &Rc<Controller>) {
        *self.controller.borrow_mut() = Rc::downgrade(controller);
        match self.factory.create(Some(controller)) {
            Ok(view) => {
                view.set_location(self.location.clone());
                *self.view.borrow_mut() = Some(view);
            }
            Err(err) => tracing::warn!(error = %err, "with view could not be created"),
        }
    }

    fn attaching(&self, cx: &HookContext<'_>) -> HookResult {
        let Some(view) = self.view() else {
            return Ok(Settle::Done);
        };
        let scope = Self::scope_for(cx.controller, self.value());
        let activation = view.activate(cx.initiator, Some(cx.controller), cx.flags, Some(scope))?;
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
