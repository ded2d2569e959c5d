//! `if` / `else` - Show one of two views by truthiness.

use std::cell::{Cell, RefCell};
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};

use super::{SwapQueue, track, upgrade};
use crate::controller::{Controller, ViewFactory};
use crate::dom::RenderLocation;
use crate::error::LifecycleError;
use crate::lifecycle::{Activation, HookContext, HookResult, Settle, ViewModel, Visitor};
use crate::types::{HookSet, LifecycleFlags, State};

// =============================================================================
// If
// =============================================================================

/// Shows its view while the value is truthy, the paired [`Else`] view
/// otherwise.
///
/// With `cache` on (the default) both views are created once and reused
/// across toggles; with it off a hidden view is released to its factory.
/// A value change while a swap is in flight is queued behind it and, when it
/// runs, reconciles the shown view with the value current at that time.
pub struct If {
    this: Weak<If>,
    factory: Rc<ViewFactory>,
    else_factory: RefCell<Option<Rc<ViewFactory>>>,
    location: RenderLocation,
    controller: RefCell<Weak<Controller>>,
    value: Cell<bool>,
    cache: Cell<bool>,
    view: RefCell<Option<Rc<Controller>>>,
    if_view: RefCell<Option<Rc<Controller>>>,
    else_view: RefCell<Option<Rc<Controller>>>,
    queue: SwapQueue,
    wants_deactivate: Cell<bool>,
}

impl If {
    pub fn new(factory: Rc<ViewFactory>, location: RenderLocation, value: bool) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            factory,
            else_factory: RefCell::new(None),
            location,
            controller: RefCell::new(Weak::new()),
            value: Cell::new(value),
            cache: Cell::new(true),
            view: RefCell::new(None),
            if_view: RefCell::new(None),
            else_view: RefCell::new(None),
            queue: SwapQueue::new(),
            wants_deactivate: Cell::new(false),
        })
    }

    pub fn value(&self) -> bool {
        self.value.get()
    }

    pub fn cache(&self) -> bool {
        self.cache.get()
    }

    pub fn set_cache(&self, cache: bool) {
        self.cache.set(cache);
    }

    /// The view currently shown (or being shown), if any.
    pub fn view(&self) -> Option<Rc<Controller>> {
        self.view.borrow().clone()
    }

    pub fn has_else(&self) -> bool {
        self.else_factory.borrow().is_some()
    }

    pub(crate) fn set_else_factory(&self, factory: Rc<ViewFactory>) {
        *self.else_factory.borrow_mut() = Some(factory);
    }

    /// Change the value. When the controller is active and the truthiness
    /// changed, a swap is queued; its completion is returned when it went
    /// async.
    pub fn set_value(&self, value: bool) -> Activation {
        let old = self.value.replace(value);
        let Some(controller) = upgrade(&self.controller) else {
            return Ok(None);
        };
        if old == value || !controller.is_active() {
            return Ok(None);
        }
        let Some(this) = self.this.upgrade() else {
            return Ok(None);
        };

        let id = self.queue.next_id();
        let platform = controller.context().platform().clone();
        let outcome = self
            .queue
            .enqueue(&platform, move || this.swap(id, &controller));
        track(&platform, &outcome);
        outcome
    }

    fn is_current(&self, id: u64) -> bool {
        !self.wants_deactivate.get() && self.queue.is_current(id)
    }

    fn is_shown(&self, view: &Rc<Controller>, value: bool) -> bool {
        let slot = if value { &self.if_view } else { &self.else_view };
        view.is_active() && slot.borrow().as_ref().is_some_and(|shown| Rc::ptr_eq(shown, view))
    }

    /// Deactivate the shown view if it does not match the value, then show
    /// the matching one.
    fn swap(self: &Rc<Self>, id: u64, controller: &Rc<Controller>) -> Activation {
        if !self.is_current(id) {
            tracing::debug!(swap = id, "stale if swap skipped");
            return Ok(None);
        }
        let value = self.value.get();
        let current = self.view();
        if current.as_ref().is_some_and(|view| self.is_shown(view, value)) {
            return Ok(None);
        }

        let deactivation = match current {
            Some(view) => {
                if !self.cache.get() {
                    view.release();
                    let slot = if value { &self.else_view } else { &self.if_view };
                    slot.borrow_mut().take();
                }
                view.deactivate(&view, Some(controller), LifecycleFlags::NONE)?
            }
            None => None,
        };

        let this = self.clone();
        let platform = controller.context().platform().clone();
        let controller = controller.clone();
        platform.on_resolve(Ok(deactivation), move || this.show(id, &controller, None))
    }

    /// Activate the view matching the current value as part of `initiator`'s
    /// wave, or as its own wave when `None`.
    fn show(
        &self,
        id: u64,
        controller: &Rc<Controller>,
        initiator: Option<&Rc<Controller>>,
    ) -> Activation {
        if !self.is_current(id) {
            return Ok(None);
        }
        let view = self.view_for(self.value.get(), controller)?;
        *self.view.borrow_mut() = view.clone();
        let Some(view) = view else {
            return Ok(None);
        };
        view.set_location(self.location.clone());
        view.activate(
            initiator.unwrap_or(&view),
            Some(controller),
            controller.flags(),
            controller.scope(),
        )
    }

    fn view_for(
        &self,
        value: bool,
        controller: &Rc<Controller>,
    ) -> Result<Option<Rc<Controller>>, LifecycleError> {
        let (slot, factory) = if value {
            (&self.if_view, Some(self.factory.clone()))
        } else {
            (&self.else_view, self.else_factory.borrow().clone())
        };
        let Some(factory) = factory else {
            return Ok(None);
        };
        if let Some(view) = slot.borrow().clone() {
            if !view.state().contains(State::DISPOSED) {
                return Ok(Some(view));
            }
        }
        let view = factory.create(Some(controller))?;
        *slot.borrow_mut() = Some(view.clone());
        Ok(Some(view))
    }
}

impl ViewModel for If {
    fn hooks(&self) -> HookSet {
        HookSet::CREATED | HookSet::ATTACHING | HookSet::DETACHING | HookSet::DISPOSE | HookSet::ACCEPT
    }

    fn created(&self, controller: &Rc<Controller>) {
        *self.controller.borrow_mut() = Rc::downgrade(controller);
    }

    fn attaching(&self, cx: &HookContext<'_>) -> HookResult {
        let Some(this) = self.this.upgrade() else {
            return Ok(Settle::Done);
        };
        let id = self.queue.next_id();
        let controller = cx.controller.clone();
        let initiator = cx.initiator.clone();
        let platform = controller.context().platform().clone();
        let outcome = self
            .queue
            .enqueue(&platform, move || this.show(id, &controller, Some(&initiator)))?;
        Ok(Settle::from(outcome))
    }

    fn detaching(&self, cx: &HookContext<'_>) -> HookResult {
        let Some(this) = self.this.upgrade() else {
            return Ok(Settle::Done);
        };
        self.wants_deactivate.set(true);
        let initiator = cx.initiator.clone();
        let controller = cx.controller.clone();
        let flags = cx.flags;
        let deactivate = move || -> Result<(), LifecycleError> {
            this.wants_deactivate.set(false);
            this.queue.clear();
            if let Some(view) = this.view() {
                view.deactivate(&initiator, Some(&controller), flags)?;
            }
            Ok(())
        };
        match self.queue.pending() {
            None => deactivate().map(|()| Settle::Done),
            Some(pending) => Ok(Settle::pending(async move {
                let _ = pending.await;
                deactivate()
            })),
        }
    }

    fn dispose(&self) {
        let views = [self.if_view.borrow_mut().take(), self.else_view.borrow_mut().take()];
        self.view.borrow_mut().take();
        for view in views.into_iter().flatten() {
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

// =============================================================================
// Else
// =============================================================================

/// Supplies the view an [`If`] shows while falsy.
///
/// Links itself to the `if` rendered immediately before it under the same
/// parent.
pub struct Else {
    factory: Rc<ViewFactory>,
}

impl Else {
    pub fn new(factory: Rc<ViewFactory>) -> Rc<Self> {
        Rc::new(Self { factory })
    }
}

impl ViewModel for Else {
    fn hooks(&self) -> HookSet {
        HookSet::CREATED
    }

    fn created(&self, controller: &Rc<Controller>) {
        let sibling = controller
            .hydration_parent()
            .and_then(|parent| parent.children().last().cloned())
            .and_then(|previous| previous.view_model_as::<If>());
        match sibling {
            Some(target) => target.set_else_factory(self.factory.clone()),
            None => tracing::warn!(controller = %controller.name(), "else without a preceding if"),
        }
    }
}
