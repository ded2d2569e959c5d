//! `compose` - Render a component chosen at runtime.
//!
//! A [`Composition`] is either a custom element (view-model plus
//! definition, hosted by a new element inserted at the location) or a bare
//! view built from a definition. Changing the composition deactivates and
//! disposes the previous one before the next is activated; changes are
//! serialized.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};

use super::{SwapQueue, track, upgrade};
use crate::binding::Scope;
use crate::controller::{ComponentDefinition, Controller, ViewFactory};
use crate::dom::{Node, RenderLocation};
use crate::error::LifecycleError;
use crate::lifecycle::{Activation, HookContext, HookResult, Settle, ViewModel, Visitor};
use crate::types::{HookSet, LifecycleFlags};

/// How a composed view relates to the declaring scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScopeBehavior {
    /// The composed view sees the declaring scope.
    #[default]
    Auto,
    /// The composed view gets a fresh scope with no parent.
    Scoped,
}

type ElementBuilder =
    Box<dyn FnOnce(&Rc<Controller>, Node) -> Result<Rc<Controller>, LifecycleError>>;

enum CompositionKind {
    Element(ElementBuilder),
    View(Rc<ComponentDefinition>),
}

/// What to compose.
pub struct Composition {
    name: String,
    kind: CompositionKind,
}

impl Composition {
    pub fn element<V: ViewModel>(view_model: Rc<V>, definition: Rc<ComponentDefinition>) -> Self {
        let name = definition.name.clone();
        let build: ElementBuilder = Box::new(move |owner, host| {
            Controller::for_custom_element(owner.context(), view_model, host, definition, Some(owner))
        });
        Self {
            name,
            kind: CompositionKind::Element(build),
        }
    }

    pub fn view(definition: Rc<ComponentDefinition>) -> Self {
        Self {
            name: definition.name.clone(),
            kind: CompositionKind::View(definition),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            CompositionKind::Element(_) => "element",
            CompositionKind::View(_) => "view",
        };
        f.debug_struct("Composition")
            .field("name", &self.name)
            .field("kind", &kind)
            .finish()
    }
}

/// A built composition.
struct Composed {
    controller: Rc<Controller>,
    host: Option<Node>,
}

impl Composed {
    fn dispose(self) {
        self.controller.dispose();
        if let Some(host) = self.host {
            host.remove();
        }
    }
}

pub struct Compose {
    this: Weak<Compose>,
    location: RenderLocation,
    controller: RefCell<Weak<Controller>>,
    scope_behavior: Cell<ScopeBehavior>,
    pending: RefCell<Option<Composition>>,
    composed: RefCell<Option<Composed>>,
    queue: SwapQueue,
}

impl Compose {
    pub fn new(location: RenderLocation, composition: Option<Composition>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            location,
            controller: RefCell::new(Weak::new()),
            scope_behavior: Cell::new(ScopeBehavior::Auto),
            pending: RefCell::new(composition),
            composed: RefCell::new(None),
            queue: SwapQueue::new(),
        })
    }

    pub fn with_scope_behavior(self: Rc<Self>, behavior: ScopeBehavior) -> Rc<Self> {
        self.scope_behavior.set(behavior);
        self
    }

    pub fn scope_behavior(&self) -> ScopeBehavior {
        self.scope_behavior.get()
    }

    /// The controller of the current composition.
    pub fn composition(&self) -> Option<Rc<Controller>> {
        self.composed.borrow().as_ref().map(|composed| composed.controller.clone())
    }

    /// Replace the composition. While inactive the composition is only
    /// recorded and built on the next activation.
    pub fn compose(&self, composition: Composition) -> Activation {
        let active = upgrade(&self.controller).filter(|controller| controller.is_active());
        let (Some(controller), Some(this)) = (active, self.this.upgrade()) else {
            *self.pending.borrow_mut() = Some(composition);
            return Ok(None);
        };
        let platform = controller.context().platform().clone();
        let outcome = self.queue.enqueue(&platform, move || {
            let previous = this.composed.borrow_mut().take();
            let deactivation = match &previous {
                Some(previous) => previous.controller.deactivate(
                    &previous.controller,
                    Some(&controller),
                    LifecycleFlags::NONE,
                )?,
                None => None,
            };
            let platform = controller.context().platform().clone();
            platform.on_resolve(Ok(deactivation), move || {
                if let Some(previous) = previous {
                    previous.dispose();
                }
                this.activate_composition(composition, None, &controller, controller.flags())
            })
        });
        track(&platform, &outcome);
        outcome
    }

    fn build(&self, composition: Composition, owner: &Rc<Controller>) -> Result<Composed, LifecycleError> {
        match composition.kind {
            CompositionKind::Element(build) => {
                let host = Node::element(composition.name);
                self.location.insert_node(&host);
                let controller = build(owner, host.clone())?;
                Ok(Composed {
                    controller,
                    host: Some(host),
                })
            }
            CompositionKind::View(definition) => {
                let factory = ViewFactory::new(owner.context(), definition);
                let controller = factory.create(Some(owner))?;
                controller.set_location(self.location.clone());
                if self.scope_behavior.get() == ScopeBehavior::Scoped {
                    controller.lock_scope(Scope::empty());
                }
                Ok(Composed {
                    controller,
                    host: None,
                })
            }
        }
    }

    fn activate_composition(
        &self,
        composition: Composition,
        initiator: Option<&Rc<Controller>>,
        owner: &Rc<Controller>,
        flags: LifecycleFlags,
    ) -> Activation {
        let composed = self.build(composition, owner)?;
        let controller = composed.controller.clone();
        *self.composed.borrow_mut() = Some(composed);
        self.activate_composed(&controller, initiator, owner, flags)
    }

    fn activate_composed(
        &self,
        controller: &Rc<Controller>,
        initiator: Option<&Rc<Controller>>,
        owner: &Rc<Controller>,
        flags: LifecycleFlags,
    ) -> Activation {
        let scope = match self.scope_behavior.get() {
            ScopeBehavior::Scoped if controller.is_scope_locked() => controller.scope(),
            ScopeBehavior::Scoped => Some(Scope::empty()),
            ScopeBehavior::Auto => owner.scope(),
        };
        controller.activate(initiator.unwrap_or(controller), Some(owner), flags, scope)
    }
}

impl ViewModel for Compose {
    fn hooks(&self) -> HookSet {
        HookSet::CREATED | HookSet::ATTACHING | HookSet::DETACHING | HookSet::DISPOSE | HookSet::ACCEPT
    }

    fn created(&self, controller: &Rc<Controller>) {
        *self.controller.borrow_mut() = Rc::downgrade(controller);
    }

    fn attaching(&self, cx: &HookContext<'_>) -> HookResult {
        let pending = self.pending.borrow_mut().take();
        let activation = match pending {
            Some(composition) => {
                if let Some(previous) = self.composed.borrow_mut().take() {
                    previous.dispose();
                }
                self.activate_composition(composition, Some(cx.initiator), cx.controller, cx.flags)?
            }
            None => match self.composition() {
                Some(controller) => {
                    self.activate_composed(&controller, Some(cx.initiator), cx.controller, cx.flags)?
                }
                None => None,
            },
        };
        Ok(Settle::from(activation))
    }

    fn detaching(&self, cx: &HookContext<'_>) -> HookResult {
        let Some(controller) = self.composition() else {
            return Ok(Settle::Done);
        };
        let deactivation = controller.deactivate(cx.initiator, Some(cx.controller), cx.flags)?;
        Ok(Settle::from(deactivation))
    }

    fn dispose(&self) {
        self.pending.borrow_mut().take();
        if let Some(composed) = self.composed.borrow_mut().take() {
            composed.dispose();
        }
    }

    fn accept(&self, visitor: &mut Visitor<'_>) -> ControlFlow<()> {
        match self.composition() {
            Some(controller) => controller.accept(visitor),
            None => ControlFlow::Continue(()),
        }
    }
}
