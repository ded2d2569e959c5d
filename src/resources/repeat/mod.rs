//! `repeat` - One view per item.
//!
//! Two ways to change the collection:
//!
//! - [`Repeat::set_items`] replaces it wholesale: every view is released and
//!   deactivated, then a fresh set is created and activated.
//! - [`Repeat::apply`] takes the new items plus an [`IndexMap`] saying where
//!   each one came from. Views of deleted items are deactivated, views of
//!   inserted items created, and surviving views are moved only when they
//!   fall outside a longest increasing subsequence of old indices. Views
//!   that keep their relative order are never touched in the DOM.
//!
//! Every view gets a child scope exposing the item under the repeat's local
//! name and the contextual properties `$index`, `$first`, `$last`,
//! `$middle`, `$even`, `$odd` and `$length`.

mod index_map;
mod lis;

pub use index_map::*;
pub use lis::longest_increasing_subsequence;

use std::cell::RefCell;
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};

use super::{SwapQueue, track, upgrade};
use crate::binding::{OverrideContext, Scope, Value};
use crate::controller::{Controller, ViewFactory};
use crate::dom::RenderLocation;
use crate::error::LifecycleError;
use crate::lifecycle::{Activation, HookContext, HookResult, Settle, ViewModel, Visitor};
use crate::types::{HookSet, LifecycleFlags};

pub struct Repeat {
    this: Weak<Repeat>,
    factory: Rc<ViewFactory>,
    location: RenderLocation,
    local: String,
    controller: RefCell<Weak<Controller>>,
    items: RefCell<Vec<Value>>,
    views: RefCell<Vec<Rc<Controller>>>,
    queue: SwapQueue,
}

impl Repeat {
    pub fn new(
        factory: Rc<ViewFactory>,
        location: RenderLocation,
        local: &str,
        items: Vec<Value>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            factory,
            location,
            local: local.to_string(),
            controller: RefCell::new(Weak::new()),
            items: RefCell::new(items),
            views: RefCell::new(Vec::new()),
            queue: SwapQueue::new(),
        })
    }

    /// Name the item is exposed under in each view's scope.
    pub fn local(&self) -> &str {
        &self.local
    }

    pub fn items(&self) -> Vec<Value> {
        self.items.borrow().clone()
    }

    /// The views in item order.
    pub fn views(&self) -> Vec<Rc<Controller>> {
        self.views.borrow().clone()
    }

    fn active(&self) -> Option<(Rc<Self>, Rc<Controller>)> {
        let controller = upgrade(&self.controller)?;
        if !controller.is_active() {
            return None;
        }
        Some((self.this.upgrade()?, controller))
    }

    // =========================================================================
    // Collection changes
    // =========================================================================

    /// Replace the collection and rebuild every view.
    pub fn set_items(&self, items: Vec<Value>) -> Activation {
        *self.items.borrow_mut() = items.clone();
        let Some((this, controller)) = self.active() else {
            return Ok(None);
        };
        let platform = controller.context().platform().clone();
        let outcome = self.queue.enqueue(&platform, move || {
            let deactivation = this.deactivate_all(None, &controller, LifecycleFlags::NONE)?;
            let flags = controller.flags();
            let platform = controller.context().platform().clone();
            platform.on_resolve(Ok(deactivation), move || {
                this.activate_all(None, &controller, flags, items)
            })
        });
        track(&platform, &outcome);
        outcome
    }

    /// Move to `items`, reusing views as described by `map`.
    ///
    /// `map` must describe a change from the current items. A rejected map
    /// leaves the items and views untouched.
    pub fn apply(&self, items: Vec<Value>, map: IndexMap) -> Activation {
        if map.len() != items.len() {
            return Err(LifecycleError::MismatchedIndexMap {
                map: map.len(),
                items: items.len(),
            });
        }
        map.validate(self.items.borrow().len())?;
        *self.items.borrow_mut() = items.clone();
        let Some((this, controller)) = self.active() else {
            return Ok(None);
        };
        let platform = controller.context().platform().clone();
        let outcome = self
            .queue
            .enqueue(&platform, move || this.reconcile(&controller, items, map));
        track(&platform, &outcome);
        outcome
    }

    /// Remove `delete_count` items at `start` and insert `insert` there.
    pub fn splice(&self, start: usize, delete_count: usize, insert: Vec<Value>) -> Activation {
        let mut items = self.items();
        let mut map = IndexMap::identity(items.len());
        let start = start.min(items.len());
        let end = start.saturating_add(delete_count).min(items.len());
        map.splice(start, delete_count, insert.len());
        items.splice(start..end, insert);
        self.apply(items, map)
    }

    pub fn push(&self, item: impl Into<Value>) -> Activation {
        let len = self.items.borrow().len();
        self.splice(len, 0, vec![item.into()])
    }

    pub fn remove(&self, index: usize) -> Activation {
        self.splice(index, 1, Vec::new())
    }

    pub fn reverse(&self) -> Activation {
        let mut items = self.items();
        let mut map = IndexMap::identity(items.len());
        items.reverse();
        map.reverse();
        self.apply(items, map)
    }

    // =========================================================================
    // Views
    // =========================================================================

    fn item_scope(&self, parent: Option<&Rc<Scope>>, item: Value, index: usize, len: usize) -> Rc<Scope> {
        let binding_context = Rc::new(item.clone());
        let scope = match parent {
            Some(parent) => Scope::from_parent(parent, binding_context),
            None => Scope::new(binding_context),
        };
        scope.override_context().set(&self.local, item);
        set_contextual(scope.override_context(), index, len);
        scope
    }

    fn activate_all(
        &self,
        initiator: Option<&Rc<Controller>>,
        controller: &Rc<Controller>,
        flags: LifecycleFlags,
        items: Vec<Value>,
    ) -> Activation {
        let len = items.len();
        let parent = controller.scope();
        let mut pending = Vec::with_capacity(len);
        for (index, item) in items.into_iter().enumerate() {
            let view = self.factory.create(Some(controller))?;
            view.set_location(self.location.clone());
            if let Some(nodes) = view.nodes() {
                nodes.link(None);
            }
            self.views.borrow_mut().push(view.clone());
            let scope = self.item_scope(parent.as_ref(), item, index, len);
            pending.push(view.activate(initiator.unwrap_or(&view), Some(controller), flags, Some(scope))?);
        }
        Ok(controller.context().platform().on_resolve_all(pending))
    }

    fn deactivate_all(
        &self,
        initiator: Option<&Rc<Controller>>,
        controller: &Rc<Controller>,
        flags: LifecycleFlags,
    ) -> Activation {
        let views = std::mem::take(&mut *self.views.borrow_mut());
        let mut pending = Vec::with_capacity(views.len());
        for view in &views {
            view.release();
            pending.push(view.deactivate(initiator.unwrap_or(view), Some(controller), flags)?);
        }
        Ok(controller.context().platform().on_resolve_all(pending))
    }

    fn reconcile(
        self: &Rc<Self>,
        controller: &Rc<Controller>,
        items: Vec<Value>,
        map: IndexMap,
    ) -> Activation {
        // A failed earlier swap can leave fewer views than items.
        let old_len = self.views.borrow().len();
        map.validate(old_len)?;

        let old_views = self.views();
        let mut views = Vec::with_capacity(map.len());
        for &old in map.indices() {
            if old == INSERTED {
                views.push(self.factory.create(Some(controller))?);
            } else {
                views.push(old_views[old as usize].clone());
            }
        }
        *self.views.borrow_mut() = views.clone();

        let mut pending = Vec::with_capacity(map.deleted_indices().len());
        for &old in map.deleted_indices() {
            let view = &old_views[old];
            view.release();
            pending.push(view.deactivate(view, Some(controller), LifecycleFlags::NONE)?);
        }

        let platform = controller.context().platform().clone();
        let deactivation = platform.on_resolve_all(pending);
        let this = self.clone();
        let controller = controller.clone();
        platform.on_resolve(Ok(deactivation), move || {
            this.place(&controller, &views, &items, map.indices(), old_len)
        })
    }

    /// Link, move and activate views from the last position to the first,
    /// so each view's successor is already where it belongs.
    fn place(
        &self,
        controller: &Rc<Controller>,
        views: &[Rc<Controller>],
        items: &[Value],
        indices: &[isize],
        old_len: usize,
    ) -> Activation {
        let len = views.len();
        let stable = longest_increasing_subsequence(indices);
        let mut stable = stable.iter().rev().peekable();
        let parent = controller.scope();
        let flags = controller.flags();
        let mut pending = Vec::new();

        for position in (0..len).rev() {
            let view = &views[position];
            let next = views.get(position + 1).and_then(|next| next.nodes());
            if let Some(nodes) = view.nodes() {
                nodes.link(next.as_ref());
            }

            let old = indices[position];
            if old == INSERTED {
                let item = items.get(position).cloned().unwrap_or_default();
                let scope = self.item_scope(parent.as_ref(), item, position, len);
                view.set_location(self.location.clone());
                pending.push(view.activate(view, Some(controller), flags, Some(scope))?);
            } else if stable.peek().is_some_and(|&&kept| kept == position) {
                stable.next();
                if old as usize != position || old_len != len {
                    update_contextual(view, position, len);
                }
            } else {
                update_contextual(view, position, len);
                if let Some(nodes) = view.nodes().filter(|nodes| nodes.is_mounted()) {
                    let reference = nodes
                        .anchor()
                        .unwrap_or_else(|| self.location.end().clone());
                    nodes.insert_before(&reference);
                }
            }
        }

        Ok(controller.context().platform().on_resolve_all(pending))
    }
}

fn set_contextual(context: &OverrideContext, index: usize, len: usize) {
    let first = index == 0;
    let last = index + 1 == len;
    let even = index % 2 == 0;
    context.set("$index", index);
    context.set("$first", first);
    context.set("$last", last);
    context.set("$middle", !first && !last);
    context.set("$even", even);
    context.set("$odd", !even);
    context.set("$length", len);
}

fn update_contextual(view: &Rc<Controller>, index: usize, len: usize) {
    if let Some(scope) = view.scope() {
        set_contextual(scope.override_context(), index, len);
    }
}

impl ViewModel for Repeat {
    fn hooks(&self) -> HookSet {
        HookSet::CREATED | HookSet::ATTACHING | HookSet::DETACHING | HookSet::DISPOSE | HookSet::ACCEPT
    }

    fn created(&self, controller: &Rc<Controller>) {
        *self.controller.borrow_mut() = Rc::downgrade(controller);
    }

    fn attaching(&self, cx: &HookContext<'_>) -> HookResult {
        let activation = self.activate_all(Some(cx.initiator), cx.controller, cx.flags, self.items())?;
        Ok(Settle::from(activation))
    }

    fn detaching(&self, cx: &HookContext<'_>) -> HookResult {
        let Some(this) = self.this.upgrade() else {
            return Ok(Settle::Done);
        };
        let initiator = cx.initiator.clone();
        let controller = cx.controller.clone();
        let flags = cx.flags;
        let deactivate = move || -> Result<(), LifecycleError> {
            this.queue.clear();
            this.deactivate_all(Some(&initiator), &controller, flags)
                .map(|_| ())
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
        let views = std::mem::take(&mut *self.views.borrow_mut());
        for view in views {
            view.dispose();
        }
    }

    fn accept(&self, visitor: &mut Visitor<'_>) -> ControlFlow<()> {
        for view in self.views() {
            view.accept(visitor)?;
        }
        ControlFlow::Continue(())
    }
}
