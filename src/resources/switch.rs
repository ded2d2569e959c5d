//! `switch` / `case` - Show the case views matching a value.
//!
//! The switch owns one view holding its cases. Matching is by equality; a
//! matching case with fall-through also activates the cases after it, up to
//! and including the first one without fall-through. The default case is
//! shown when nothing matched.
//!
//! Every change (switch value, case value, activation, deactivation) runs
//! through one queue, so a change never observes a half-finished one.

use std::cell::{Cell, RefCell};
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};

use super::{SwapQueue, find_owner, track, upgrade};
use crate::binding::{Scope, Value};
use crate::controller::{Controller, ViewFactory};
use crate::dom::RenderLocation;
use crate::lifecycle::{Activation, HookContext, HookResult, Settle, ViewModel, Visitor};
use crate::types::{HookSet, LifecycleFlags};

// =============================================================================
// Switch
// =============================================================================

pub struct Switch {
    this: Weak<Switch>,
    factory: Rc<ViewFactory>,
    location: RenderLocation,
    controller: RefCell<Weak<Controller>>,
    view: RefCell<Option<Rc<Controller>>>,
    value: RefCell<Value>,
    cases: RefCell<Vec<Rc<Case>>>,
    default_case: RefCell<Option<Rc<Case>>>,
    active_cases: RefCell<Vec<Rc<Case>>>,
    queue: SwapQueue,
}

impl Switch {
    pub fn new(factory: Rc<ViewFactory>, location: RenderLocation, value: impl Into<Value>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            factory,
            location,
            controller: RefCell::new(Weak::new()),
            view: RefCell::new(None),
            value: RefCell::new(value.into()),
            cases: RefCell::new(Vec::new()),
            default_case: RefCell::new(None),
            active_cases: RefCell::new(Vec::new()),
            queue: SwapQueue::new(),
        })
    }

    pub fn value(&self) -> Value {
        self.value.borrow().clone()
    }

    /// The view holding the cases.
    pub fn view(&self) -> Option<Rc<Controller>> {
        self.view.borrow().clone()
    }

    /// Cases currently shown, in declaration order.
    pub fn active_cases(&self) -> Vec<Rc<Case>> {
        self.active_cases.borrow().clone()
    }

    pub fn set_value(&self, value: impl Into<Value>) -> Activation {
        let value = value.into();
        if *self.value.borrow() == value {
            return Ok(None);
        }
        *self.value.borrow_mut() = value;
        self.enqueue_swap()
    }

    fn enqueue_swap(&self) -> Activation {
        let Some(controller) = upgrade(&self.controller).filter(|c| c.is_active()) else {
            return Ok(None);
        };
        let Some(this) = self.this.upgrade() else {
            return Ok(None);
        };
        let platform = controller.context().platform().clone();
        let outcome = self.queue.enqueue(&platform, move || this.swap(None, &controller));
        track(&platform, &outcome);
        outcome
    }

    fn link_case(&self, case: Rc<Case>) {
        if case.is_default() {
            if self.default_case.borrow().is_some() {
                tracing::warn!("switch already has a default case; ignoring another");
                return;
            }
            *self.default_case.borrow_mut() = Some(case);
        } else {
            case.ordinal.set(self.cases.borrow().len());
            self.cases.borrow_mut().push(case);
        }
    }

    /// A case's own value changed.
    fn case_changed(&self, case: Rc<Case>) -> Activation {
        let Some(controller) = upgrade(&self.controller).filter(|c| c.is_active()) else {
            return Ok(None);
        };
        let Some(this) = self.this.upgrade() else {
            return Ok(None);
        };
        let platform = controller.context().platform().clone();
        let outcome = self
            .queue
            .enqueue(&platform, move || this.handle_case_change(&case, &controller));
        track(&platform, &outcome);
        outcome
    }

    /// Decide whether a case value change affects what is shown, and
    /// recompute when it does.
    fn handle_case_change(self: &Rc<Self>, case: &Rc<Case>, controller: &Rc<Controller>) -> Activation {
        let is_match = case.is_match(&self.value.borrow());
        let active = self.active_cases();
        let leading = active.first().filter(|first| !first.is_default());

        if !is_match {
            // Only a case that started the current match can un-match it.
            if leading.is_some_and(|first| Rc::ptr_eq(first, case)) {
                return self.swap(None, controller);
            }
            return Ok(None);
        }
        if leading.is_some_and(|first| first.ordinal.get() <= case.ordinal.get()) {
            // An earlier (or the same) case already wins.
            return Ok(None);
        }
        self.swap(None, controller)
    }

    /// Recompute which cases are shown.
    fn swap(self: &Rc<Self>, initiator: Option<&Rc<Controller>>, controller: &Rc<Controller>) -> Activation {
        let value = self.value();
        let mut matched = Vec::new();
        let mut falling = false;
        for case in self.cases.borrow().iter() {
            if falling || case.is_match(&value) {
                matched.push(case.clone());
                falling = case.fall_through();
                if !falling {
                    break;
                }
            }
        }
        if matched.is_empty() {
            if let Some(default) = self.default_case.borrow().clone() {
                matched.push(default);
            }
        }

        let deactivation = self.clear_active_cases(initiator, &matched)?;
        *self.active_cases.borrow_mut() = matched.clone();

        let platform = controller.context().platform().clone();
        let scope = controller.scope();
        let initiator = initiator.cloned();
        let activator = platform.clone();
        platform.on_resolve(Ok(deactivation), move || {
            let mut pending = Vec::with_capacity(matched.len());
            for case in &matched {
                pending.push(case.activate(initiator.as_ref(), scope.clone())?);
            }
            Ok(activator.on_resolve_all(pending))
        })
    }

    /// Deactivate shown cases that are not in `keep`.
    fn clear_active_cases(&self, initiator: Option<&Rc<Controller>>, keep: &[Rc<Case>]) -> Activation {
        let active = std::mem::take(&mut *self.active_cases.borrow_mut());
        let mut pending = Vec::new();
        for case in active {
            if keep.iter().any(|kept| Rc::ptr_eq(kept, &case)) {
                continue;
            }
            pending.push(case.deactivate(initiator)?);
        }
        Ok(upgrade(&self.controller).and_then(|controller| {
            controller.context().platform().on_resolve_all(pending)
        }))
    }
}

impl ViewModel for Switch {
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
            Err(err) => tracing::warn!(error = %err, "switch view could not be created"),
        }
    }

    fn attaching(&self, cx: &HookContext<'_>) -> HookResult {
        let (Some(this), Some(view)) = (self.this.upgrade(), self.view()) else {
            return Ok(Settle::Done);
        };
        let controller = cx.controller.clone();
        let initiator = cx.initiator.clone();
        let flags = cx.flags;
        let platform = controller.context().platform().clone();

        let shown = {
            let controller = controller.clone();
            let initiator = initiator.clone();
            move || view.activate(&initiator, Some(&controller), flags, controller.scope())
        };
        self.queue.enqueue(&platform, shown)?;
        let outcome = self
            .queue
            .enqueue(&platform, move || this.swap(Some(&initiator), &controller))?;
        Ok(Settle::from(outcome))
    }

    fn detaching(&self, cx: &HookContext<'_>) -> HookResult {
        let Some(view) = self.view() else {
            return Ok(Settle::Done);
        };
        let controller = cx.controller.clone();
        let initiator = cx.initiator.clone();
        let flags = cx.flags;
        let platform = controller.context().platform().clone();
        let outcome = self.queue.enqueue(&platform, move || {
            view.deactivate(&initiator, Some(&controller), flags)
        })?;
        Ok(Settle::from(outcome))
    }

    fn dispose(&self) {
        self.active_cases.borrow_mut().clear();
        self.cases.borrow_mut().clear();
        self.default_case.borrow_mut().take();
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

// =============================================================================
// Case
// =============================================================================

/// One branch of a [`Switch`]. Built with [`Case::new`] for a value or
/// [`Case::default_case`] for the fallback.
pub struct Case {
    this: Weak<Case>,
    factory: Rc<ViewFactory>,
    location: RenderLocation,
    controller: RefCell<Weak<Controller>>,
    value: RefCell<Value>,
    is_default: bool,
    fall_through: Cell<bool>,
    ordinal: Cell<usize>,
    view: RefCell<Option<Rc<Controller>>>,
    switch: RefCell<Weak<Switch>>,
}

impl Case {
    pub fn new(factory: Rc<ViewFactory>, location: RenderLocation, value: impl Into<Value>) -> Rc<Self> {
        Self::build(factory, location, value.into(), false)
    }

    pub fn default_case(factory: Rc<ViewFactory>, location: RenderLocation) -> Rc<Self> {
        Self::build(factory, location, Value::Null, true)
    }

    fn build(factory: Rc<ViewFactory>, location: RenderLocation, value: Value, is_default: bool) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            factory,
            location,
            controller: RefCell::new(Weak::new()),
            value: RefCell::new(value),
            is_default,
            fall_through: Cell::new(false),
            ordinal: Cell::new(0),
            view: RefCell::new(None),
            switch: RefCell::new(Weak::new()),
        })
    }

    pub fn with_fall_through(self: Rc<Self>, fall_through: bool) -> Rc<Self> {
        self.fall_through.set(fall_through);
        self
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }

    pub fn fall_through(&self) -> bool {
        self.fall_through.get()
    }

    pub fn set_fall_through(&self, fall_through: bool) {
        self.fall_through.set(fall_through);
    }

    pub fn value(&self) -> Value {
        self.value.borrow().clone()
    }

    pub fn view(&self) -> Option<Rc<Controller>> {
        self.view.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        self.view().is_some_and(|view| view.is_active())
    }

    pub fn is_match(&self, value: &Value) -> bool {
        !self.is_default && *self.value.borrow() == *value
    }

    /// Change the case's value; the owning switch re-evaluates.
    pub fn set_value(&self, value: impl Into<Value>) -> Activation {
        *self.value.borrow_mut() = value.into();
        let (Some(switch), Some(this)) = (self.switch.borrow().upgrade(), self.this.upgrade()) else {
            return Ok(None);
        };
        switch.case_changed(this)
    }

    fn activate(&self, initiator: Option<&Rc<Controller>>, scope: Option<Rc<Scope>>) -> Activation {
        let Some(controller) = upgrade(&self.controller) else {
            return Ok(None);
        };
        let view = match self.view() {
            Some(view) => view,
            None => {
                let view = self.factory.create(Some(&controller))?;
                view.set_location(self.location.clone());
                *self.view.borrow_mut() = Some(view.clone());
                view
            }
        };
        if view.is_active() {
            return Ok(None);
        }
        view.activate(initiator.unwrap_or(&view), Some(&controller), controller.flags(), scope)
    }

    fn deactivate(&self, initiator: Option<&Rc<Controller>>) -> Activation {
        let Some(view) = self.view().filter(|view| view.is_active()) else {
            return Ok(None);
        };
        let controller = upgrade(&self.controller);
        view.deactivate(initiator.unwrap_or(&view), controller.as_ref(), LifecycleFlags::NONE)
    }
}

impl ViewModel for Case {
    fn hooks(&self) -> HookSet {
        HookSet::CREATED | HookSet::DETACHING | HookSet::DISPOSE | HookSet::ACCEPT
    }

    fn created(&self, controller: &Rc<Controller>) {
        *self.controller.borrow_mut() = Rc::downgrade(controller);
        let (Some(switch), Some(this)) = (find_owner::<Switch>(controller), self.this.upgrade()) else {
            tracing::warn!(controller = %controller.name(), "case outside of a switch");
            return;
        };
        *self.switch.borrow_mut() = Rc::downgrade(&switch);
        switch.link_case(this);
    }

    fn detaching(&self, cx: &HookContext<'_>) -> HookResult {
        let deactivation = self.deactivate(Some(cx.initiator))?;
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
