//! App context - The explicit hosting context every controller shares.
//!
//! Owns the platform (executor seam and task queue), the controller
//! identity registry, the rendering service, the globally registered
//! lifecycle hooks and the app configuration. Tests build a fresh context
//! per test instead of resetting globals.

use std::cell::RefCell;
use std::rc::Rc;

use futures::executor::LocalSpawner;

use crate::config::AppConfig;
use crate::controller::{ControllerRegistry, DefaultRendering, Rendering};
use crate::lifecycle::LifecycleHook;
use crate::platform::Platform;

pub struct AppContext {
    platform: Rc<Platform>,
    registry: ControllerRegistry,
    rendering: Rc<dyn Rendering>,
    hooks: RefCell<Vec<Rc<dyn LifecycleHook>>>,
    config: AppConfig,
}

impl AppContext {
    pub fn new(spawner: LocalSpawner, config: AppConfig) -> Rc<Self> {
        Self::with_rendering(spawner, config, Rc::new(DefaultRendering))
    }

    pub fn with_rendering(
        spawner: LocalSpawner,
        config: AppConfig,
        rendering: Rc<dyn Rendering>,
    ) -> Rc<Self> {
        Rc::new(Self {
            platform: Platform::new(spawner),
            registry: ControllerRegistry::new(),
            rendering,
            hooks: RefCell::new(Vec::new()),
            config,
        })
    }

    pub fn platform(&self) -> &Rc<Platform> {
        &self.platform
    }

    pub fn registry(&self) -> &ControllerRegistry {
        &self.registry
    }

    pub fn rendering(&self) -> &Rc<dyn Rendering> {
        &self.rendering
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Register a global lifecycle hook. Only controllers hydrated afterwards
    /// see it.
    pub fn register_hook(&self, hook: Rc<dyn LifecycleHook>) {
        self.hooks.borrow_mut().push(hook);
    }

    pub fn global_hooks(&self) -> Vec<Rc<dyn LifecycleHook>> {
        self.hooks.borrow().clone()
    }
}
