//! Component definitions and templates.
//!
//! A [`ComponentDefinition`] is the compiled description a controller is
//! hydrated from. Its template is an opaque render routine: the controller
//! never inspects it, it only hands it a [`RenderContext`] once.

use std::fmt;
use std::rc::Rc;

use super::RenderContext;
use crate::binding::WatchCallback;
use crate::error::LifecycleError;
use crate::lifecycle::LifecycleHook;
use crate::types::ShadowMode;

/// A compiled render description.
pub trait Template {
    fn render(&self, cx: &RenderContext<'_>) -> Result<(), LifecycleError>;
}

impl<F> Template for F
where
    F: Fn(&RenderContext<'_>) -> Result<(), LifecycleError>,
{
    fn render(&self, cx: &RenderContext<'_>) -> Result<(), LifecycleError> {
        self(cx)
    }
}

/// A `@watch` declaration: call `callback` when `expression` changes while
/// the controller is bound.
#[derive(Clone)]
pub struct WatchDefinition {
    pub expression: String,
    pub callback: WatchCallback,
}

#[derive(Clone)]
pub struct ComponentDefinition {
    pub name: String,
    pub template: Option<Rc<dyn Template>>,
    /// Render at a location pair instead of inside a host element.
    pub containerless: bool,
    pub shadow: Option<ShadowMode>,
    pub strict_binding: bool,
    pub needs_compile: bool,
    /// Names declared in the element's own scope before rendering.
    pub bindables: Vec<String>,
    pub watches: Vec<WatchDefinition>,
    /// Local cross-cutting hooks, run after the global ones.
    pub lifecycle_hooks: Vec<Rc<dyn LifecycleHook>>,
}

impl ComponentDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: None,
            containerless: false,
            shadow: None,
            strict_binding: false,
            needs_compile: true,
            bindables: Vec::new(),
            watches: Vec::new(),
            lifecycle_hooks: Vec::new(),
        }
    }

    pub fn with_template<F>(mut self, render: F) -> Self
    where
        F: Fn(&RenderContext<'_>) -> Result<(), LifecycleError> + 'static,
    {
        self.template = Some(Rc::new(render));
        self
    }

    pub fn containerless(mut self) -> Self {
        self.containerless = true;
        self
    }

    pub fn with_shadow(mut self, mode: ShadowMode) -> Self {
        self.shadow = Some(mode);
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict_binding = true;
        self
    }

    pub fn with_bindable(mut self, name: impl Into<String>) -> Self {
        self.bindables.push(name.into());
        self
    }

    pub fn watch(mut self, expression: impl Into<String>, callback: WatchCallback) -> Self {
        self.watches.push(WatchDefinition {
            expression: expression.into(),
            callback,
        });
        self
    }

    pub fn with_lifecycle_hook(mut self, hook: Rc<dyn LifecycleHook>) -> Self {
        self.lifecycle_hooks.push(hook);
        self
    }

    pub fn build(self) -> Rc<Self> {
        Rc::new(self)
    }
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("name", &self.name)
            .field("has_template", &self.template.is_some())
            .field("containerless", &self.containerless)
            .field("shadow", &self.shadow)
            .field("strict_binding", &self.strict_binding)
            .field("needs_compile", &self.needs_compile)
            .field("bindables", &self.bindables)
            .field("watches", &self.watches.len())
            .field("lifecycle_hooks", &self.lifecycle_hooks.len())
            .finish()
    }
}
