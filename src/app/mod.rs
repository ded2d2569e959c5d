//! App - Bootstraps the root controller.
//!
//! An [`App`] hydrates one root custom element into a host node and
//! activates it, running registered [`AppTask`]s at fixed points:
//!
//! ```text
//! start:  creating -> hydrating -> (hydrate root) -> hydrated
//!         -> activating -> (activate root) -> activated
//! stop:   deactivating -> (deactivate root) -> deactivated
//! ```
//!
//! Tasks of one slot run side by side; the next step waits for all of them.
//!
//! # Example
//!
//! ```ignore
//! let mut pool = LocalPool::new();
//! let context = AppContext::new(pool.spawner(), AppConfig::default());
//! let app = App::new(context).with_root(Node::element("app"), vm, definition);
//!
//! pool.run_until(app.start())?;
//! pool.run_until(app.stop())?;
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use futures::future::try_join_all;

use crate::context::AppContext;
use crate::controller::{ComponentDefinition, Controller};
use crate::dom::Node;
use crate::error::LifecycleError;
use crate::lifecycle::{HookResult, LifecycleFuture, Settle, ViewModel};
use crate::types::LifecycleFlags;

// =============================================================================
// App Tasks
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppTaskSlot {
    Creating,
    Hydrating,
    Hydrated,
    Activating,
    Activated,
    Deactivating,
    Deactivated,
}

impl AppTaskSlot {
    pub const fn name(self) -> &'static str {
        match self {
            AppTaskSlot::Creating => "creating",
            AppTaskSlot::Hydrating => "hydrating",
            AppTaskSlot::Hydrated => "hydrated",
            AppTaskSlot::Activating => "activating",
            AppTaskSlot::Activated => "activated",
            AppTaskSlot::Deactivating => "deactivating",
            AppTaskSlot::Deactivated => "deactivated",
        }
    }
}

impl fmt::Display for AppTaskSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Work run at one point of the app's start or stop sequence.
pub struct AppTask {
    slot: AppTaskSlot,
    callback: Box<dyn Fn() -> HookResult>,
}

impl AppTask {
    pub fn new(slot: AppTaskSlot, callback: impl Fn() -> HookResult + 'static) -> Self {
        Self {
            slot,
            callback: Box::new(callback),
        }
    }

    pub fn slot(&self) -> AppTaskSlot {
        self.slot
    }

    fn run(&self) -> HookResult {
        (self.callback)()
    }
}

impl fmt::Debug for AppTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppTask").field("slot", &self.slot).finish()
    }
}

// =============================================================================
// App
// =============================================================================

type RootBuilder = Box<dyn FnOnce(&Rc<AppContext>, Node) -> Result<Rc<Controller>, LifecycleError>>;

/// The running root: its controller and the node hosting it.
#[derive(Debug)]
pub struct AppRoot {
    controller: Rc<Controller>,
    host: Node,
}

impl AppRoot {
    pub fn controller(&self) -> &Rc<Controller> {
        &self.controller
    }

    pub fn host(&self) -> &Node {
        &self.host
    }
}

pub struct App {
    context: Rc<AppContext>,
    tasks: RefCell<Vec<Rc<AppTask>>>,
    component: RefCell<Option<(Node, RootBuilder)>>,
    root: RefCell<Option<Rc<AppRoot>>>,
    starting: Cell<bool>,
}

impl App {
    pub fn new(context: Rc<AppContext>) -> Self {
        Self {
            context,
            tasks: RefCell::new(Vec::new()),
            component: RefCell::new(None),
            root: RefCell::new(None),
            starting: Cell::new(false),
        }
    }

    /// Use `view_model` rendered from `definition` as the root, hosted by
    /// `host`.
    pub fn with_root<V: ViewModel>(
        self,
        host: Node,
        view_model: Rc<V>,
        definition: Rc<ComponentDefinition>,
    ) -> Self {
        let build: RootBuilder = Box::new(move |context, host| {
            Controller::for_custom_element(context, view_model, host, definition, None)
        });
        *self.component.borrow_mut() = Some((host, build));
        self
    }

    pub fn context(&self) -> &Rc<AppContext> {
        &self.context
    }

    pub fn register_task(&self, task: AppTask) {
        self.tasks.borrow_mut().push(Rc::new(task));
    }

    /// The root, once `start` succeeded and until `stop` is called.
    pub fn root(&self) -> Option<Rc<AppRoot>> {
        self.root.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.root.borrow().is_some()
    }

    /// Hydrate and activate the root. The root is only kept when its
    /// activation succeeded; a failed start leaves nothing to stop.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        if self.starting.get() || self.is_running() {
            return Err(LifecycleError::AlreadyStarted);
        }
        let Some((host, build)) = self.component.borrow_mut().take() else {
            return Err(LifecycleError::NotConfigured);
        };
        self.starting.set(true);
        let outcome = self.boot(host, build).await;
        self.starting.set(false);
        if let Err(err) = &outcome {
            tracing::debug!(error = %err, "app start failed");
        }
        outcome
    }

    async fn boot(&self, host: Node, build: RootBuilder) -> Result<(), LifecycleError> {
        self.run_tasks(AppTaskSlot::Creating).await?;
        self.run_tasks(AppTaskSlot::Hydrating).await?;
        let controller = build(&self.context, host.clone())?;
        self.run_tasks(AppTaskSlot::Hydrated).await?;

        self.run_tasks(AppTaskSlot::Activating).await?;
        let flags = self.context.config().activation_flags();
        if let Some(completion) = controller.activate(&controller, None, flags, None)? {
            completion.await?;
        }
        tracing::trace!(controller = %controller.name(), "app root activated");
        *self.root.borrow_mut() = Some(Rc::new(AppRoot { controller, host }));
        self.run_tasks(AppTaskSlot::Activated).await
    }

    /// Deactivate the root, disposing it when the config asks for it.
    pub async fn stop(&self) -> Result<(), LifecycleError> {
        self.stop_with(self.context.config().dispose_on_stop).await
    }

    /// Deactivate the root. With `dispose` the root is disposed once
    /// unbound. Stopping an app that is not running does nothing.
    pub async fn stop_with(&self, dispose: bool) -> Result<(), LifecycleError> {
        let Some(root) = self.root.borrow_mut().take() else {
            return Ok(());
        };
        self.run_tasks(AppTaskSlot::Deactivating).await?;

        let mut flags = LifecycleFlags::FROM_UNBIND;
        if dispose {
            flags |= LifecycleFlags::DISPOSE;
        }
        let controller = root.controller();
        if let Some(completion) = controller.deactivate(controller, None, flags)? {
            completion.await?;
        }
        tracing::trace!(controller = %controller.name(), dispose, "app root deactivated");
        self.run_tasks(AppTaskSlot::Deactivated).await
    }

    async fn run_tasks(&self, slot: AppTaskSlot) -> Result<(), LifecycleError> {
        let tasks: Vec<Rc<AppTask>> = self
            .tasks
            .borrow()
            .iter()
            .filter(|task| task.slot() == slot)
            .cloned()
            .collect();
        if tasks.is_empty() {
            return Ok(());
        }
        tracing::trace!(%slot, count = tasks.len(), "app tasks");
        let mut pending: Vec<LifecycleFuture> = Vec::new();
        for task in tasks {
            if let Settle::Pending(fut) = task.run()? {
                pending.push(fut);
            }
        }
        try_join_all(pending).await.map(|_| ())
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("tasks", &self.tasks.borrow().len())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
