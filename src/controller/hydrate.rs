//! Hydration - Turning a view-model and a definition into a controller.
//!
//! Hydration runs once per instance, before any activation:
//!
//! ```text
//! define -> hydrating -> compile -> mount target -> scope -> create nodes
//!        -> hydrated -> render -> watches -> created
//! ```
//!
//! The [`Rendering`] service owns compilation and the render walk. The
//! controller only hands it a [`RenderContext`] and never looks at what the
//! template does with it.

use std::rc::Rc;

use super::{ComponentDefinition, Controller, ViewFactory, ViewModelHandle};
use crate::binding::{Binding, Scope, TextBinding, WatchBinding};
use crate::context::AppContext;
use crate::dom::{Node, NodeSequence, RenderLocation};
use crate::error::LifecycleError;
use crate::lifecycle::{ResolvedHooks, ViewModel};
use crate::types::{HookSet, ViewModelKind};

// =============================================================================
// Rendering service
// =============================================================================

pub trait Rendering {
    /// Produce the compiled form of `definition`.
    fn compile(&self, definition: &Rc<ComponentDefinition>) -> Rc<ComponentDefinition>;

    /// Fresh, unmounted nodes for one instance of `definition`.
    fn create_nodes(&self, definition: &ComponentDefinition) -> Rc<NodeSequence>;

    /// Walk the render description, creating nodes, bindings and child
    /// controllers for `controller`.
    fn render(
        &self,
        controller: &Rc<Controller>,
        definition: &ComponentDefinition,
        nodes: &NodeSequence,
    ) -> Result<(), LifecycleError>;
}

/// Renders a definition's [`Template`](super::Template) into the instance's
/// fragment.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRendering;

impl Rendering for DefaultRendering {
    fn compile(&self, definition: &Rc<ComponentDefinition>) -> Rc<ComponentDefinition> {
        if !definition.needs_compile {
            return definition.clone();
        }
        let mut compiled = ComponentDefinition::clone(definition);
        compiled.needs_compile = false;
        Rc::new(compiled)
    }

    fn create_nodes(&self, _definition: &ComponentDefinition) -> Rc<NodeSequence> {
        Rc::new(NodeSequence::new())
    }

    fn render(
        &self,
        controller: &Rc<Controller>,
        definition: &ComponentDefinition,
        nodes: &NodeSequence,
    ) -> Result<(), LifecycleError> {
        let Some(template) = &definition.template else {
            return Ok(());
        };
        template.render(&RenderContext::new(controller, nodes.fragment()))
    }
}

// =============================================================================
// Render context
// =============================================================================

/// What a template gets to build one instance with.
pub struct RenderContext<'a> {
    controller: &'a Rc<Controller>,
    root: &'a Node,
}

impl<'a> RenderContext<'a> {
    pub fn new(controller: &'a Rc<Controller>, root: &'a Node) -> Self {
        Self { controller, root }
    }

    /// The controller being rendered.
    pub fn controller(&self) -> &Rc<Controller> {
        self.controller
    }

    pub fn app(&self) -> &Rc<AppContext> {
        self.controller.context()
    }

    /// The instance's fragment; top-level nodes go here.
    pub fn root(&self) -> &Node {
        self.root
    }

    pub fn text(&self, parent: &Node, content: &str) -> Node {
        let node = Node::text(content);
        parent.append_child(&node);
        node
    }

    pub fn element_node(&self, parent: &Node, name: &str) -> Node {
        let node = Node::element(name);
        parent.append_child(&node);
        node
    }

    /// A text node bound to `name` in the controller's scope.
    pub fn bind_text(&self, parent: &Node, name: &str) -> Node {
        let node = self.text(parent, "");
        self.add_binding(Rc::new(TextBinding::new(name, node.clone())));
        node
    }

    pub fn add_binding(&self, binding: Rc<dyn Binding>) {
        self.controller.add_binding(binding);
    }

    /// A child custom element hosted by a new `<name>` element under
    /// `parent`.
    pub fn element<V: ViewModel>(
        &self,
        parent: &Node,
        view_model: Rc<V>,
        definition: Rc<ComponentDefinition>,
    ) -> Result<Rc<Controller>, LifecycleError> {
        let host = self.element_node(parent, &definition.name);
        let child = Controller::for_custom_element(
            self.app(),
            view_model,
            host,
            definition,
            Some(self.controller),
        )?;
        self.controller.add_child(child.clone());
        Ok(child)
    }

    /// A child custom attribute.
    pub fn attribute<V: ViewModel>(
        &self,
        view_model: Rc<V>,
        definition: Rc<ComponentDefinition>,
    ) -> Result<Rc<Controller>, LifecycleError> {
        let child = Controller::for_custom_attribute(
            self.app(),
            view_model,
            definition,
            Some(self.controller),
        )?;
        self.controller.add_child(child.clone());
        Ok(child)
    }

    /// A template controller named `name` whose content is `view`.
    ///
    /// A render location is placed under `parent`; `build` receives the
    /// factory for `view` and that location and returns the view-model.
    pub fn template_controller<V: ViewModel>(
        &self,
        parent: &Node,
        name: &str,
        view: Rc<ComponentDefinition>,
        build: impl FnOnce(Rc<ViewFactory>, RenderLocation) -> Rc<V>,
    ) -> Result<Rc<V>, LifecycleError> {
        let location = RenderLocation::new();
        location.append_to(parent);
        let factory = ViewFactory::new(self.app(), view);
        let view_model = build(factory, location);
        self.attribute(view_model.clone(), ComponentDefinition::new(name).build())?;
        Ok(view_model)
    }
}

// =============================================================================
// Hydration
// =============================================================================

impl Controller {
    /// Hydrate a custom element hosted by `host`. Hydrating an instance that
    /// already has a controller returns that controller.
    pub fn for_custom_element<V: ViewModel>(
        context: &Rc<AppContext>,
        view_model: Rc<V>,
        host: Node,
        definition: Rc<ComponentDefinition>,
        hydration_parent: Option<&Rc<Controller>>,
    ) -> Result<Rc<Controller>, LifecycleError> {
        if let Some(existing) = context.registry().get(&view_model) {
            return Ok(existing);
        }
        let controller = Controller::new(
            context,
            ViewModelKind::CustomElement,
            Some(ViewModelHandle::new(view_model)),
            definition,
        );
        controller.set_hydration_parent(hydration_parent);
        controller.hydrate_custom_element(host)?;
        Ok(controller)
    }

    /// Hydrate a custom attribute (template controllers included).
    pub fn for_custom_attribute<V: ViewModel>(
        context: &Rc<AppContext>,
        view_model: Rc<V>,
        definition: Rc<ComponentDefinition>,
        hydration_parent: Option<&Rc<Controller>>,
    ) -> Result<Rc<Controller>, LifecycleError> {
        if let Some(existing) = context.registry().get(&view_model) {
            return Ok(existing);
        }
        let controller = Controller::new(
            context,
            ViewModelKind::CustomAttribute,
            Some(ViewModelHandle::new(view_model)),
            definition,
        );
        controller.set_hydration_parent(hydration_parent);
        let definition = controller.definition();
        controller.resolve_lifecycle_hooks(&definition);
        controller.add_watches(&definition);
        controller.call_created();
        Ok(controller)
    }

    pub(crate) fn for_synthetic_view(
        context: &Rc<AppContext>,
        factory: &Rc<ViewFactory>,
        hydration_parent: Option<&Rc<Controller>>,
    ) -> Result<Rc<Controller>, LifecycleError> {
        let rendering = context.rendering().clone();
        let definition = rendering.compile(factory.definition());
        let controller = Controller::new(
            context,
            ViewModelKind::Synthetic,
            None,
            definition.clone(),
        );
        controller.set_factory(factory);
        controller.set_hydration_parent(hydration_parent);

        let nodes = rendering.create_nodes(&definition);
        controller.set_nodes(nodes.clone());
        rendering.render(&controller, &definition, &nodes)?;
        Ok(controller)
    }

    fn hydrate_custom_element(self: &Rc<Self>, host: Node) -> Result<(), LifecycleError> {
        let Some(view_model) = self.view_model() else {
            return Ok(());
        };

        if self.hooks.contains(HookSet::DEFINE) {
            if let Some(definition) = view_model.define(self, &self.definition()) {
                self.set_definition(definition);
            }
        }
        let definition = self.definition();
        self.resolve_lifecycle_hooks(&definition);

        if self.hooks.contains(HookSet::HYDRATING) {
            view_model.hydrating(self);
        }

        let rendering = self.context.rendering().clone();
        let definition = rendering.compile(&definition);
        self.set_definition(definition.clone());

        if definition.containerless {
            let location = RenderLocation::replace(&host);
            self.set_host(host);
            self.set_location(location);
        } else if definition.shadow.is_some() {
            let shadow_root = host.attach_shadow();
            self.set_host(host);
            self.set_shadow_root(shadow_root);
        } else {
            self.set_host(host);
        }

        if let Some(instance) = self.instance.borrow().clone() {
            let scope = Scope::new(instance);
            for bindable in &definition.bindables {
                scope.override_context().declare(bindable);
            }
            self.set_scope(Some(scope));
        }

        let nodes = rendering.create_nodes(&definition);
        self.set_nodes(nodes.clone());

        if self.hooks.contains(HookSet::HYDRATED) {
            view_model.hydrated(self);
        }

        rendering.render(self, &definition, &nodes)?;
        self.add_watches(&definition);
        self.call_created();
        Ok(())
    }

    fn resolve_lifecycle_hooks(&self, definition: &ComponentDefinition) {
        let global = self.context.global_hooks();
        self.set_lifecycle_hooks(ResolvedHooks::new(&global, &definition.lifecycle_hooks));
    }

    fn add_watches(&self, definition: &ComponentDefinition) {
        for watch in &definition.watches {
            self.add_binding(Rc::new(WatchBinding::new(
                watch.expression.clone(),
                watch.callback.clone(),
            )));
        }
    }

    fn call_created(self: &Rc<Self>) {
        if !self.hooks.contains(HookSet::CREATED) {
            return;
        }
        if let Some(view_model) = self.view_model() {
            view_model.created(self);
        }
    }
}
