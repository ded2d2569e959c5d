//! `promise` - Show pending, fulfilled or rejected content for a future.
//!
//! The controller owns one view holding its branches. When the watched
//! promise changes, a task shows the pending branch; once the promise
//! settles, a second task shows the fulfilled or rejected branch. Only the
//! latest promise may swap branches: settlements of superseded promises
//! are dropped.
//!
//! The fulfilled value is exposed to the branch as `data`, the rejection
//! as `error`.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};

use futures::future::{FutureExt, LocalBoxFuture, Shared};

use super::{find_owner, upgrade};
use crate::binding::{Scope, Value};
use crate::controller::{Controller, ViewFactory};
use crate::dom::RenderLocation;
use crate::lifecycle::{Activation, HookContext, HookResult, Settle, ViewModel, Visitor};
use crate::platform::{TaskHandle, TaskStatus};
use crate::types::{HookSet, LifecycleFlags};

/// A shareable future of a value or a failure value.
pub type ValuePromise = Shared<LocalBoxFuture<'static, Result<Value, Value>>>;

/// Wrap a future as a [`ValuePromise`].
pub fn promise(fut: impl Future<Output = Result<Value, Value>> + 'static) -> ValuePromise {
    fut.boxed_local().shared()
}

// =============================================================================
// PromiseController
// =============================================================================

pub struct PromiseController {
    this: Weak<PromiseController>,
    factory: Rc<ViewFactory>,
    location: RenderLocation,
    controller: RefCell<Weak<Controller>>,
    view: RefCell<Option<Rc<Controller>>>,
    view_scope: RefCell<Option<Rc<Scope>>>,
    value: RefCell<Option<ValuePromise>>,
    generation: Cell<u64>,
    pending: RefCell<Weak<PromiseBranch>>,
    fulfilled: RefCell<Weak<PromiseBranch>>,
    rejected: RefCell<Weak<PromiseBranch>>,
    pre_settle: RefCell<Option<TaskHandle>>,
    post_settle: RefCell<Option<TaskHandle>>,
}

impl PromiseController {
    pub fn new(factory: Rc<ViewFactory>, location: RenderLocation, value: Option<ValuePromise>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            factory,
            location,
            controller: RefCell::new(Weak::new()),
            view: RefCell::new(None),
            view_scope: RefCell::new(None),
            value: RefCell::new(value),
            generation: Cell::new(0),
            pending: RefCell::new(Weak::new()),
            fulfilled: RefCell::new(Weak::new()),
            rejected: RefCell::new(Weak::new()),
            pre_settle: RefCell::new(None),
            post_settle: RefCell::new(None),
        })
    }

    /// The view holding the branches.
    pub fn view(&self) -> Option<Rc<Controller>> {
        self.view.borrow().clone()
    }

    /// Watch a new promise. Earlier promises can no longer swap branches.
    pub fn set_value(&self, value: ValuePromise) {
        *self.value.borrow_mut() = Some(value);
        self.generation.set(self.generation.get() + 1);
        if upgrade(&self.controller).is_some_and(|controller| controller.is_active()) {
            self.swap();
        }
    }

    fn link_branch(&self, branch: &Rc<PromiseBranch>) {
        let slot = match branch.kind {
            BranchKind::Pending => &self.pending,
            BranchKind::Fulfilled => &self.fulfilled,
            BranchKind::Rejected => &self.rejected,
        };
        *slot.borrow_mut() = Rc::downgrade(branch);
    }

    fn branches(&self) -> [Option<Rc<PromiseBranch>>; 3] {
        [
            self.pending.borrow().upgrade(),
            self.fulfilled.borrow().upgrade(),
            self.rejected.borrow().upgrade(),
        ]
    }

    /// Queue the pending-branch task, then the settled-branch task once the
    /// promise settles. Branch views activate as their own waves since the
    /// tasks run after whatever wave triggered the swap.
    fn swap(&self) {
        let (Some(this), Some(promise), Some(controller)) = (
            self.this.upgrade(),
            self.value.borrow().clone(),
            upgrade(&self.controller),
        ) else {
            return;
        };
        let Some(scope) = self.view_scope.borrow().clone() else {
            return;
        };
        let platform = controller.context().platform().clone();
        let generation = self.generation.get();

        let running_post = self
            .post_settle
            .borrow()
            .clone()
            .filter(|task| task.status() == TaskStatus::Running);
        if let Some(task) = self.post_settle.borrow_mut().take() {
            task.cancel();
        }

        let spawner = platform.clone();
        let start = move || {
            let queue = spawner.task_queue().clone();
            let pre = {
                let this = this.clone();
                let scope = scope.clone();
                queue.queue_task(move || {
                    let [pending, fulfilled, rejected] = this.branches();
                    this.show(pending.map(|branch| (branch, None)), [fulfilled, rejected], &scope)
                })
            };
            if let Some(previous) = this.pre_settle.replace(Some(pre.clone())) {
                previous.cancel();
            }

            let settle = spawner.clone();
            spawner.spawn(async move {
                let outcome = promise.await;
                if this.generation.get() != generation {
                    tracing::debug!(generation, "superseded promise settled");
                    return;
                }
                if pre.status() == TaskStatus::Running {
                    let _ = pre.result().await;
                } else {
                    pre.cancel();
                }
                if this.generation.get() != generation {
                    return;
                }
                let view_model = this.clone();
                let post = settle.task_queue().queue_task(move || {
                    let [pending, fulfilled, rejected] = view_model.branches();
                    match outcome {
                        Ok(data) => view_model.show(
                            fulfilled.map(|branch| (branch, Some(data))),
                            [pending, rejected],
                            &scope,
                        ),
                        Err(error) => view_model.show(
                            rejected.map(|branch| (branch, Some(error))),
                            [pending, fulfilled],
                            &scope,
                        ),
                    }
                });
                *this.post_settle.borrow_mut() = Some(post.clone());
                if let Err(err) = post.result().await {
                    tracing::debug!(error = %err, "promise branch swap failed");
                }
            });
        };

        match running_post {
            Some(task) => platform.spawn(async move {
                let _ = task.result().await;
                start();
            }),
            None => start(),
        }
    }

    /// Deactivate `hide`, then activate `show` with its settled value.
    fn show(
        &self,
        show: Option<(Rc<PromiseBranch>, Option<Value>)>,
        hide: [Option<Rc<PromiseBranch>>; 2],
        scope: &Rc<Scope>,
    ) -> Activation {
        let Some(controller) = upgrade(&self.controller) else {
            return Ok(None);
        };
        let platform = controller.context().platform().clone();
        let mut pending = Vec::with_capacity(3);
        for branch in hide.into_iter().flatten() {
            pending.push(branch.deactivate(None)?);
        }
        if let Some((branch, value)) = show {
            pending.push(branch.activate(scope, value)?);
        }
        Ok(platform.on_resolve_all(pending))
    }

    fn cancel_tasks(&self) {
        for slot in [&self.pre_settle, &self.post_settle] {
            if let Some(task) = slot.borrow_mut().take() {
                task.cancel();
            }
        }
    }
}

impl ViewModel for PromiseController {
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
            Err(err) => tracing::warn!(error = %err, "promise view could not be created"),
        }
    }

    fn attaching(&self, cx: &HookContext<'_>) -> HookResult {
        let (Some(this), Some(view)) = (self.this.upgrade(), self.view()) else {
            return Ok(Settle::Done);
        };
        let scope = match cx.controller.scope() {
            Some(parent) => Scope::from_parent(&parent, Rc::new(())),
            None => Scope::empty(),
        };
        *self.view_scope.borrow_mut() = Some(scope.clone());

        let activation = view.activate(cx.initiator, Some(cx.controller), cx.flags, Some(scope))?;
        let outcome = cx
            .controller
            .context()
            .platform()
            .on_resolve(Ok(activation), move || {
                this.swap();
                Ok(None)
            })?;
        Ok(Settle::from(outcome))
    }

    fn detaching(&self, cx: &HookContext<'_>) -> HookResult {
        self.cancel_tasks();
        let Some(view) = self.view() else {
            return Ok(Settle::Done);
        };
        let deactivation = view.deactivate(cx.initiator, Some(cx.controller), cx.flags)?;
        Ok(Settle::from(deactivation))
    }

    fn dispose(&self) {
        self.cancel_tasks();
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
// Branches
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Pending,
    Fulfilled,
    Rejected,
}

impl BranchKind {
    /// Name the settled value is exposed under.
    pub fn local(self) -> Option<&'static str> {
        match self {
            BranchKind::Pending => None,
            BranchKind::Fulfilled => Some("data"),
            BranchKind::Rejected => Some("error"),
        }
    }
}

/// The pending, fulfilled or rejected content of a [`PromiseController`].
/// Finds its controller through the hydration parents when created.
pub struct PromiseBranch {
    this: Weak<PromiseBranch>,
    kind: BranchKind,
    factory: Rc<ViewFactory>,
    location: RenderLocation,
    controller: RefCell<Weak<Controller>>,
    view: RefCell<Option<Rc<Controller>>>,
    value: RefCell<Option<Value>>,
}

impl PromiseBranch {
    fn build(kind: BranchKind, factory: Rc<ViewFactory>, location: RenderLocation) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            kind,
            factory,
            location,
            controller: RefCell::new(Weak::new()),
            view: RefCell::new(None),
            value: RefCell::new(None),
        })
    }

    pub fn pending(factory: Rc<ViewFactory>, location: RenderLocation) -> Rc<Self> {
        Self::build(BranchKind::Pending, factory, location)
    }

    pub fn fulfilled(factory: Rc<ViewFactory>, location: RenderLocation) -> Rc<Self> {
        Self::build(BranchKind::Fulfilled, factory, location)
    }

    pub fn rejected(factory: Rc<ViewFactory>, location: RenderLocation) -> Rc<Self> {
        Self::build(BranchKind::Rejected, factory, location)
    }

    pub fn kind(&self) -> BranchKind {
        self.kind
    }

    /// The settled value last shown by this branch.
    pub fn value(&self) -> Option<Value> {
        self.value.borrow().clone()
    }

    pub fn view(&self) -> Option<Rc<Controller>> {
        self.view.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        self.view().is_some_and(|view| view.is_active())
    }

    fn activate(&self, scope: &Rc<Scope>, value: Option<Value>) -> Activation {
        let Some(controller) = upgrade(&self.controller) else {
            return Ok(None);
        };
        if let (Some(local), Some(value)) = (self.kind.local(), value) {
            scope.override_context().set(local, value.clone());
            *self.value.borrow_mut() = Some(value);
        }
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
        view.activate(
            &view,
            Some(&controller),
            LifecycleFlags::FROM_BIND,
            Some(scope.clone()),
        )
    }

    fn deactivate(&self, initiator: Option<&Rc<Controller>>) -> Activation {
        let Some(view) = self.view().filter(|view| view.is_active()) else {
            return Ok(None);
        };
        let controller = upgrade(&self.controller);
        view.deactivate(initiator.unwrap_or(&view), controller.as_ref(), LifecycleFlags::NONE)
    }
}

impl ViewModel for PromiseBranch {
    fn hooks(&self) -> HookSet {
        HookSet::CREATED | HookSet::DETACHING | HookSet::DISPOSE | HookSet::ACCEPT
    }

    fn created(&self, controller: &Rc<Controller>) {
        *self.controller.borrow_mut() = Rc::downgrade(controller);
        let (Some(owner), Some(this)) = (
            find_owner::<PromiseController>(controller),
            self.this.upgrade(),
        ) else {
            tracing::warn!(controller = %controller.name(), "promise branch outside of a promise");
            return;
        };
        owner.link_branch(&this);
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
