//! Controller - The lifecycle state machine of one component instance.
//!
//! One controller exists per custom element, custom attribute or synthetic
//! view. It owns the instance's bindings and child controllers, and drives
//! them through activation and deactivation waves.
//!
//! - [`activate`](Controller::activate) - binding, bind, attach, attached
//! - [`deactivate`](Controller::deactivate) - detaching, unbinding, unbind
//! - [`dispose`](Controller::dispose) - irreversible teardown
//!
//! # Waves
//!
//! A top-level `activate`/`deactivate` call is a wave, and the controller it
//! was called on is the wave's initiator. Every controller reached by the
//! wave records the initiator so async hooks deep in the tree can report
//! back to it:
//!
//! ```text
//! activate(root)                    deactivate(root)
//!   binding -> bound -> attaching     children first, then detaching
//!   children (fire and forget)        participants pushed onto root's wave
//!   attached, leaf to root            barrier: detaching -> unbinding -> unbind
//! ```
//!
//! Hooks are synchronous when possible. Only a hook that returns
//! [`Settle::Pending`] makes its branch suspend; siblings keep going.

mod activate;
mod deactivate;
mod definition;
mod hydrate;
mod registry;
mod view_factory;

pub use definition::*;
pub use hydrate::*;
pub use registry::ControllerRegistry;
pub use view_factory::ViewFactory;

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};

use crate::binding::{Binding, ChildrenObserver, Scope};
use crate::context::AppContext;
use crate::dom::{Node, NodeSequence, RenderLocation};
use crate::error::LifecycleError;
use crate::lifecycle::{
    Completion, Deferred, HookContext, HookResult, PhaseCounter, ResolvedHooks, Settle, ViewModel,
    Visitor,
};
use crate::types::{ControllerId, HookSet, LifecycleFlags, MountTarget, Phase, State, ViewModelKind};

// =============================================================================
// Controller
// =============================================================================

pub struct Controller {
    id: ControllerId,
    kind: ViewModelKind,
    name: String,
    context: Rc<AppContext>,

    view_model: RefCell<Option<Rc<dyn ViewModel>>>,
    instance: RefCell<Option<Rc<dyn Any>>>,
    registry_key: Option<usize>,
    /// Hooks declared by the view-model, read once at construction.
    hooks: HookSet,
    lifecycle_hooks: RefCell<ResolvedHooks>,
    definition: RefCell<Rc<ComponentDefinition>>,
    factory: RefCell<Weak<ViewFactory>>,

    state: Cell<State>,
    flags: Cell<LifecycleFlags>,
    parent: RefCell<Weak<Controller>>,
    initiator: RefCell<Weak<Controller>>,
    hydration_parent: RefCell<Weak<Controller>>,

    children: RefCell<Vec<Rc<Controller>>>,
    bindings: RefCell<Vec<Rc<dyn Binding>>>,
    children_observers: RefCell<Vec<Rc<dyn ChildrenObserver>>>,

    scope: RefCell<Option<Rc<Scope>>>,
    scope_locked: Cell<bool>,

    host: RefCell<Option<Node>>,
    shadow_root: RefCell<Option<Node>>,
    location: RefCell<Option<RenderLocation>>,
    mount_target: Cell<MountTarget>,
    nodes: RefCell<Option<Rc<NodeSequence>>>,

    activating: PhaseCounter,
    detaching: PhaseCounter,
    unbinding: PhaseCounter,
    deferred: RefCell<Option<Deferred>>,
    completion: RefCell<Option<Completion>>,
    /// Participants of the deactivation wave this controller initiated.
    wave: RefCell<Vec<Rc<Controller>>>,

    is_binding_done: Cell<bool>,
    is_bound: Cell<bool>,
}

/// The typed and untyped handles on one view-model allocation.
pub(crate) struct ViewModelHandle {
    pub(crate) hooks: Rc<dyn ViewModel>,
    pub(crate) instance: Rc<dyn Any>,
    pub(crate) key: usize,
}

impl ViewModelHandle {
    pub(crate) fn new<V: ViewModel>(view_model: Rc<V>) -> Self {
        Self {
            key: registry::key_of(&view_model),
            hooks: view_model.clone(),
            instance: view_model,
        }
    }
}

impl Controller {
    pub(crate) fn new(
        context: &Rc<AppContext>,
        kind: ViewModelKind,
        view_model: Option<ViewModelHandle>,
        definition: Rc<ComponentDefinition>,
    ) -> Rc<Self> {
        let hooks = view_model
            .as_ref()
            .map_or(HookSet::empty(), |vm| vm.hooks.hooks());
        let registry_key = view_model.as_ref().map(|vm| vm.key);
        let (view_model, instance) = match view_model {
            Some(vm) => (Some(vm.hooks), Some(vm.instance)),
            None => (None, None),
        };

        let controller = Rc::new(Self {
            id: ControllerId::next(),
            kind,
            name: definition.name.clone(),
            context: context.clone(),
            view_model: RefCell::new(view_model),
            instance: RefCell::new(instance),
            registry_key,
            hooks,
            lifecycle_hooks: RefCell::new(ResolvedHooks::default()),
            definition: RefCell::new(definition),
            factory: RefCell::new(Weak::new()),
            state: Cell::new(State::NONE),
            flags: Cell::new(LifecycleFlags::NONE),
            parent: RefCell::new(Weak::new()),
            initiator: RefCell::new(Weak::new()),
            hydration_parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            bindings: RefCell::new(Vec::new()),
            children_observers: RefCell::new(Vec::new()),
            scope: RefCell::new(None),
            scope_locked: Cell::new(false),
            host: RefCell::new(None),
            shadow_root: RefCell::new(None),
            location: RefCell::new(None),
            mount_target: Cell::new(MountTarget::None),
            nodes: RefCell::new(None),
            activating: PhaseCounter::new(),
            detaching: PhaseCounter::new(),
            unbinding: PhaseCounter::new(),
            deferred: RefCell::new(None),
            completion: RefCell::new(None),
            wave: RefCell::new(Vec::new()),
            is_binding_done: Cell::new(false),
            is_bound: Cell::new(false),
        });
        if let Some(key) = registry_key {
            context.registry().insert(key, &controller);
        }
        tracing::trace!(controller = %controller.name, id = %controller.id, kind = ?kind, "created");
        controller
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> ControllerId {
        self.id
    }

    pub fn kind(&self) -> ViewModelKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &Rc<AppContext> {
        &self.context
    }

    pub fn state(&self) -> State {
        self.state.get()
    }

    pub fn flags(&self) -> LifecycleFlags {
        self.flags.get()
    }

    /// Activating or activated, and not on the way down.
    pub fn is_active(&self) -> bool {
        let state = self.state.get();
        state.intersects(State::ACTIVATING | State::ACTIVATED)
            && !state.contains(State::DEACTIVATING)
    }

    pub fn is_bound(&self) -> bool {
        self.is_bound.get()
    }

    pub fn hooks(&self) -> HookSet {
        self.hooks
    }

    pub fn definition(&self) -> Rc<ComponentDefinition> {
        self.definition.borrow().clone()
    }

    pub fn view_model(&self) -> Option<Rc<dyn ViewModel>> {
        self.view_model.borrow().clone()
    }

    /// The view-model, if it is a `T`.
    pub fn view_model_as<T: 'static>(&self) -> Option<Rc<T>> {
        let instance = self.instance.borrow().clone()?;
        instance.downcast::<T>().ok()
    }

    pub fn parent(&self) -> Option<Rc<Controller>> {
        self.parent.borrow().upgrade()
    }

    /// The controller whose rendering created this one.
    pub fn hydration_parent(&self) -> Option<Rc<Controller>> {
        self.hydration_parent.borrow().upgrade()
    }

    pub fn factory(&self) -> Option<Rc<ViewFactory>> {
        self.factory.borrow().upgrade()
    }

    pub fn children(&self) -> Vec<Rc<Controller>> {
        self.children.borrow().clone()
    }

    pub fn bindings(&self) -> Vec<Rc<dyn Binding>> {
        self.bindings.borrow().clone()
    }

    pub fn scope(&self) -> Option<Rc<Scope>> {
        self.scope.borrow().clone()
    }

    pub fn is_scope_locked(&self) -> bool {
        self.scope_locked.get()
    }

    pub fn host(&self) -> Option<Node> {
        self.host.borrow().clone()
    }

    pub fn shadow_root(&self) -> Option<Node> {
        self.shadow_root.borrow().clone()
    }

    pub fn location(&self) -> Option<RenderLocation> {
        self.location.borrow().clone()
    }

    pub fn mount_target(&self) -> MountTarget {
        self.mount_target.get()
    }

    pub fn nodes(&self) -> Option<Rc<NodeSequence>> {
        self.nodes.borrow().clone()
    }

    /// The pending completion of the current wave, if any hook went async.
    pub fn completion(&self) -> Option<Completion> {
        self.completion.borrow().clone()
    }

    // =========================================================================
    // Mutators
    // =========================================================================

    pub fn add_child(&self, child: Rc<Controller>) {
        self.children.borrow_mut().push(child);
    }

    pub fn add_binding(&self, binding: Rc<dyn Binding>) {
        self.bindings.borrow_mut().push(binding);
    }

    pub fn add_children_observer(&self, observer: Rc<dyn ChildrenObserver>) {
        self.children_observers.borrow_mut().push(observer);
    }

    /// Mark a synthetic view as returnable to its factory's pool once it
    /// unbinds.
    pub fn release(&self) {
        self.state.set(self.state.get() | State::RELEASED);
    }

    pub(crate) fn clear_released(&self) {
        self.state.set(self.state.get() - State::RELEASED);
    }

    /// Pin the scope: later activations keep it instead of the incoming one.
    pub fn lock_scope(&self, scope: Rc<Scope>) {
        *self.scope.borrow_mut() = Some(scope);
        self.scope_locked.set(true);
    }

    pub fn set_host(self: &Rc<Self>, host: Node) -> &Rc<Self> {
        *self.host.borrow_mut() = Some(host);
        self.mount_target.set(MountTarget::Host);
        self
    }

    pub fn set_shadow_root(self: &Rc<Self>, shadow_root: Node) -> &Rc<Self> {
        *self.shadow_root.borrow_mut() = Some(shadow_root);
        self.mount_target.set(MountTarget::ShadowRoot);
        self
    }

    pub fn set_location(self: &Rc<Self>, location: RenderLocation) -> &Rc<Self> {
        *self.location.borrow_mut() = Some(location);
        self.mount_target.set(MountTarget::Location);
        self
    }

    pub(crate) fn set_nodes(&self, nodes: Rc<NodeSequence>) {
        *self.nodes.borrow_mut() = Some(nodes);
    }

    pub(crate) fn set_scope(&self, scope: Option<Rc<Scope>>) {
        *self.scope.borrow_mut() = scope;
    }

    pub(crate) fn set_factory(&self, factory: &Rc<ViewFactory>) {
        *self.factory.borrow_mut() = Rc::downgrade(factory);
    }

    pub(crate) fn set_hydration_parent(&self, parent: Option<&Rc<Controller>>) {
        *self.hydration_parent.borrow_mut() = parent.map(Rc::downgrade).unwrap_or_default();
    }

    pub(crate) fn set_definition(&self, definition: Rc<ComponentDefinition>) {
        *self.definition.borrow_mut() = definition;
    }

    pub(crate) fn set_lifecycle_hooks(&self, hooks: ResolvedHooks) {
        *self.lifecycle_hooks.borrow_mut() = hooks;
    }

    // =========================================================================
    // Wave plumbing
    // =========================================================================

    fn initiator(&self) -> Option<Rc<Controller>> {
        self.initiator.borrow().upgrade()
    }

    fn initiator_or_self(self: &Rc<Self>) -> Rc<Controller> {
        self.initiator().unwrap_or_else(|| self.clone())
    }

    fn is_initiator(self: &Rc<Self>) -> bool {
        self.initiator().is_some_and(|initiator| Rc::ptr_eq(&initiator, self))
    }

    fn set_initiator(&self, initiator: Option<&Rc<Controller>>) {
        *self.initiator.borrow_mut() = initiator.map(Rc::downgrade).unwrap_or_default();
    }

    /// Materialize the bridging completion, and the ones of every ancestor up
    /// to the initiator, so the whole wave can be awaited from the top.
    fn ensure_promise(self: &Rc<Self>) {
        if self.deferred.borrow().is_some() {
            return;
        }
        let deferred = Deferred::new(&self.name);
        *self.completion.borrow_mut() = Some(deferred.completion());
        *self.deferred.borrow_mut() = Some(deferred);
        if !self.is_initiator() {
            if let Some(parent) = self.parent() {
                parent.ensure_promise();
            }
        }
    }

    fn resolve(&self) {
        let deferred = self.deferred.borrow_mut().take();
        self.completion.borrow_mut().take();
        if let Some(deferred) = deferred {
            deferred.resolve();
        }
    }

    /// Reject this controller's completion and every ancestor's up to the
    /// initiator.
    fn reject(self: &Rc<Self>, err: LifecycleError) {
        tracing::debug!(controller = %self.name, id = %self.id, error = %err, "wave rejected");
        let deferred = self.deferred.borrow_mut().take();
        self.completion.borrow_mut().take();
        if let Some(deferred) = deferred {
            deferred.reject(err.clone());
        }
        if !self.is_initiator() {
            if let Some(parent) = self.parent() {
                parent.reject(err);
            }
        }
    }

    fn spawn(&self, fut: impl Future<Output = ()> + 'static) {
        self.context.platform().spawn(fut);
    }

    /// Run `phase` through the cross-cutting hooks and the view-model's own
    /// hook.
    fn run_hook(
        self: &Rc<Self>,
        phase: Phase,
        initiator: &Rc<Controller>,
        parent: Option<&Rc<Controller>>,
    ) -> HookResult {
        let own = self.hooks.contains(phase.flag());
        let lifecycle_hooks = self.lifecycle_hooks.borrow().clone();
        if !own && !lifecycle_hooks.handles(phase) {
            return Ok(Settle::Done);
        }
        let Some(view_model) = self.view_model() else {
            return Ok(Settle::Done);
        };
        tracing::trace!(controller = %self.name, id = %self.id, %phase, "hook");
        let cx = HookContext {
            controller: self,
            initiator,
            parent,
            flags: self.flags.get(),
        };
        lifecycle_hooks.run(phase, &view_model, own, &cx)
    }

    fn remove_nodes(&self) {
        if let Some(nodes) = self.nodes() {
            nodes.remove();
        }
    }

    // =========================================================================
    // Dispose / Accept
    // =========================================================================

    /// Irreversible teardown. Cascades to children and drops the host, nodes,
    /// scope and view-model.
    pub fn dispose(self: &Rc<Self>) {
        let state = self.state.get();
        if state.contains(State::DISPOSED) {
            return;
        }
        self.state.set(state | State::DISPOSED);
        tracing::trace!(controller = %self.name, id = %self.id, "dispose");

        if self.hooks.contains(HookSet::DISPOSE) {
            if let Some(view_model) = self.view_model() {
                view_model.dispose();
            }
        }

        let children = std::mem::take(&mut *self.children.borrow_mut());
        for child in children {
            child.dispose();
        }

        self.scope.borrow_mut().take();
        self.nodes.borrow_mut().take();
        self.location.borrow_mut().take();
        self.host.borrow_mut().take();
        self.shadow_root.borrow_mut().take();
        *self.factory.borrow_mut() = Weak::new();
        if let Some(key) = self.registry_key {
            self.context.registry().remove(key);
        }
        self.view_model.borrow_mut().take();
        self.instance.borrow_mut().take();
    }

    /// Visit this controller, whatever its view-model forwards to, and its
    /// children, depth first. Stops at the first `Break`.
    pub fn accept(self: &Rc<Self>, visitor: &mut Visitor<'_>) -> ControlFlow<()> {
        visitor(self)?;
        if self.hooks.contains(HookSet::ACCEPT) {
            if let Some(view_model) = self.view_model() {
                view_model.accept(visitor)?;
            }
        }
        for child in self.children() {
            child.accept(visitor)?;
        }
        ControlFlow::Continue(())
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("state", &self.state.get())
            .field("children", &self.children.borrow().len())
            .finish_non_exhaustive()
    }
}
