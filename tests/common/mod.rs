//! Shared fixtures: a logging probe view-model, gates for async hooks,
//! logging lifecycle hooks and small builders.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::executor::LocalPool;

use trellis::{
    AppConfig, AppContext, ComponentDefinition, Controller, HookContext, HookResult, HookSet,
    LifecycleError, LifecycleFlags, LifecycleHook, Next, Node, Phase, RenderContext, Settle,
    ViewModel,
};

// =============================================================================
// Log
// =============================================================================

#[derive(Clone, Default)]
pub struct Log(Rc<RefCell<Vec<String>>>);

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// Entries containing `needle`, in order.
    pub fn matching(&self, needle: &str) -> Vec<String> {
        self.0
            .borrow()
            .iter()
            .filter(|entry| entry.contains(needle))
            .cloned()
            .collect()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.borrow().iter().position(|e| e == entry)
    }

    pub fn rposition(&self, entry: &str) -> Option<usize> {
        self.0.borrow().iter().rposition(|e| e == entry)
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.position(entry).is_some()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

// =============================================================================
// Gate
// =============================================================================

/// Holds an async hook open until `open` or `fail` is called.
pub struct Gate(Option<oneshot::Sender<Result<(), LifecycleError>>>);

impl Gate {
    pub fn open(mut self) {
        if let Some(sender) = self.0.take() {
            let _ = sender.send(Ok(()));
        }
    }

    pub fn fail(mut self, message: &str) {
        if let Some(sender) = self.0.take() {
            let _ = sender.send(Err(LifecycleError::hook(message)));
        }
    }
}

enum Behavior {
    Throw(String),
    Gate(oneshot::Receiver<Result<(), LifecycleError>>),
}

// =============================================================================
// Probe
// =============================================================================

/// A view-model implementing every activation and deactivation hook. Each
/// hook logs `name.phase.enter`, then `name.phase.leave` once it finished.
/// A hook can be made to throw or to wait on a [`Gate`].
pub struct Probe {
    name: String,
    log: Log,
    behaviors: RefCell<HashMap<Phase, Behavior>>,
    disposed: RefCell<bool>,
}

impl Probe {
    pub fn new(name: &str, log: &Log) -> Rc<Self> {
        Rc::new(Self {
            name: name.to_string(),
            log: log.clone(),
            behaviors: RefCell::new(HashMap::new()),
            disposed: RefCell::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every call of `phase` fails with `message`.
    pub fn throw_on(&self, phase: Phase, message: &str) {
        self.behaviors
            .borrow_mut()
            .insert(phase, Behavior::Throw(message.to_string()));
    }

    /// The next call of `phase` waits for the returned gate.
    pub fn gate(&self, phase: Phase) -> Gate {
        let (sender, receiver) = oneshot::channel();
        self.behaviors
            .borrow_mut()
            .insert(phase, Behavior::Gate(receiver));
        Gate(Some(sender))
    }

    pub fn is_disposed(&self) -> bool {
        *self.disposed.borrow()
    }

    fn run(&self, phase: Phase) -> HookResult {
        let enter = format!("{}.{}.enter", self.name, phase.name());
        let leave = format!("{}.{}.leave", self.name, phase.name());
        self.log.push(enter);

        let behavior = {
            let mut behaviors = self.behaviors.borrow_mut();
            if matches!(behaviors.get(&phase), Some(Behavior::Gate(_))) {
                behaviors.remove(&phase)
            } else {
                match behaviors.get(&phase) {
                    Some(Behavior::Throw(message)) => Some(Behavior::Throw(message.clone())),
                    _ => None,
                }
            }
        };

        match behavior {
            None => {
                self.log.push(leave);
                Ok(Settle::Done)
            }
            Some(Behavior::Throw(message)) => Err(LifecycleError::hook(message)),
            Some(Behavior::Gate(receiver)) => {
                let log = self.log.clone();
                Ok(Settle::pending(async move {
                    match receiver.await {
                        Ok(Ok(())) => {
                            log.push(leave);
                            Ok(())
                        }
                        Ok(Err(err)) => Err(err),
                        Err(_) => Err(LifecycleError::hook("gate dropped")),
                    }
                }))
            }
        }
    }
}

impl ViewModel for Probe {
    fn hooks(&self) -> HookSet {
        HookSet::ACTIVATION | HookSet::DEACTIVATION | HookSet::DISPOSE
    }

    fn binding(&self, _cx: &HookContext<'_>) -> HookResult {
        self.run(Phase::Binding)
    }

    fn bound(&self, _cx: &HookContext<'_>) -> HookResult {
        self.run(Phase::Bound)
    }

    fn attaching(&self, _cx: &HookContext<'_>) -> HookResult {
        self.run(Phase::Attaching)
    }

    fn attached(&self, _cx: &HookContext<'_>) -> HookResult {
        self.run(Phase::Attached)
    }

    fn detaching(&self, _cx: &HookContext<'_>) -> HookResult {
        self.run(Phase::Detaching)
    }

    fn unbinding(&self, _cx: &HookContext<'_>) -> HookResult {
        self.run(Phase::Unbinding)
    }

    fn dispose(&self) {
        *self.disposed.borrow_mut() = true;
        self.log.push(format!("{}.dispose", self.name));
    }
}

// =============================================================================
// Logging lifecycle hook
// =============================================================================

/// A cross-cutting hook logging `name.phase.enter` / `name.phase.leave`
/// around the rest of the chain.
pub struct LoggingHook {
    name: String,
    log: Log,
}

impl LoggingHook {
    pub fn new(name: &str, log: &Log) -> Rc<Self> {
        Rc::new(Self {
            name: name.to_string(),
            log: log.clone(),
        })
    }
}

impl LifecycleHook for LoggingHook {
    fn phases(&self) -> HookSet {
        HookSet::ACTIVATION | HookSet::DEACTIVATION
    }

    fn invoke(
        &self,
        phase: Phase,
        _view_model: &Rc<dyn ViewModel>,
        _cx: &HookContext<'_>,
        next: Next<'_>,
    ) -> HookResult {
        self.log.push(format!("{}.{}.enter", self.name, phase.name()));
        let outcome = next.run();
        self.log.push(format!("{}.{}.leave", self.name, phase.name()));
        outcome
    }
}

// =============================================================================
// Builders
// =============================================================================

pub fn setup() -> (LocalPool, Rc<AppContext>) {
    setup_with(AppConfig::default())
}

pub fn setup_with(config: AppConfig) -> (LocalPool, Rc<AppContext>) {
    let pool = LocalPool::new();
    let context = AppContext::new(pool.spawner(), config);
    (pool, context)
}

/// A definition with no template.
pub fn definition(name: &str) -> Rc<ComponentDefinition> {
    ComponentDefinition::new(name).build()
}

/// A definition whose template renders `render`.
pub fn template(
    name: &str,
    render: impl Fn(&RenderContext<'_>) -> Result<(), LifecycleError> + 'static,
) -> Rc<ComponentDefinition> {
    ComponentDefinition::new(name).with_template(render).build()
}

/// Hydrate `view_model` as a root custom element under a fresh host.
pub fn hydrate_root<V: ViewModel>(
    context: &Rc<AppContext>,
    view_model: Rc<V>,
    definition: Rc<ComponentDefinition>,
) -> Rc<Controller> {
    let host = Node::element("host");
    Controller::for_custom_element(context, view_model, host, definition, None)
        .expect("root hydrates")
}

/// Activate a root as its own wave.
pub fn activate(root: &Rc<Controller>) -> trellis::Activation {
    root.activate(root, None, LifecycleFlags::FROM_BIND, None)
}

/// Deactivate a root as its own wave.
pub fn deactivate(root: &Rc<Controller>) -> trellis::Activation {
    root.deactivate(root, None, LifecycleFlags::FROM_UNBIND)
}

/// A slot a template closure can fill with what it built.
pub struct Slot<T>(Rc<RefCell<Option<Rc<T>>>>);

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Slot(self.0.clone())
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot(Rc::new(RefCell::new(None)))
    }
}

impl<T> Slot<T> {
    pub fn set(&self, value: Rc<T>) {
        *self.0.borrow_mut() = Some(value);
    }

    pub fn get(&self) -> Rc<T> {
        self.0.borrow().clone().expect("slot filled during render")
    }
}
