//! Activation: binding -> bind -> attach -> attached.

use std::rc::Rc;

use super::Controller;
use crate::binding::Scope;
use crate::error::LifecycleError;
use crate::lifecycle::{Activation, Settle};
use crate::types::{LifecycleFlags, MountTarget, Phase, State, ViewModelKind};

impl Controller {
    /// Activate this controller and, fire-and-forget, its children.
    ///
    /// Returns `Ok(None)` when every hook finished synchronously, or the
    /// bridging completion of the wave when something went async. A hook
    /// that fails synchronously surfaces as `Err`; one that fails
    /// asynchronously rejects the completion. Nothing is rolled back.
    pub fn activate(
        self: &Rc<Self>,
        initiator: &Rc<Controller>,
        parent: Option<&Rc<Controller>>,
        flags: LifecycleFlags,
        scope: Option<Rc<Scope>>,
    ) -> Activation {
        let state = self.state.get();
        if state.contains(State::DISPOSED) {
            return Err(LifecycleError::ActivateDisposed {
                name: self.name.clone(),
            });
        }
        if state == State::ACTIVATED {
            return Ok(None);
        }
        if state != State::NONE && state != State::DEACTIVATED {
            return Err(LifecycleError::UnexpectedActivationState {
                name: self.name.clone(),
                state,
            });
        }
        if parent.is_some_and(|parent| !parent.is_active()) {
            return Ok(None);
        }
        if self.kind == ViewModelKind::Synthetic && scope.is_none() {
            return Err(LifecycleError::MissingScope {
                name: self.name.clone(),
            });
        }

        tracing::trace!(controller = %self.name, id = %self.id, "activate");
        self.state.set(State::ACTIVATING);
        self.activating.reset();
        *self.parent.borrow_mut() = parent.map(Rc::downgrade).unwrap_or_default();
        self.flags.set(flags | LifecycleFlags::FROM_BIND);

        match self.kind {
            ViewModelKind::CustomElement => {
                if let Some(own) = self.scope() {
                    own.set_parent(scope);
                }
            }
            ViewModelKind::CustomAttribute => self.set_scope(scope),
            ViewModelKind::Synthetic => {
                if !self.scope_locked.get() {
                    self.set_scope(scope);
                }
            }
        }

        self.set_initiator(Some(initiator));
        self.enter_activating();

        match self.run_hook(Phase::Binding, initiator, parent)? {
            Settle::Pending(fut) => {
                self.ensure_promise();
                let this = self.clone();
                self.spawn(async move {
                    match fut.await {
                        Ok(()) => {
                            this.is_binding_done.set(true);
                            let next = if this.state.get() == State::ACTIVATING {
                                this.bind()
                            } else {
                                this.leave_activating()
                            };
                            if let Err(err) = next {
                                this.reject(err);
                            }
                        }
                        Err(err) => this.reject(err),
                    }
                });
            }
            Settle::Done => {
                self.is_binding_done.set(true);
                self.bind()?;
            }
        }

        Ok(self.completion())
    }

    /// Start children observers, bind bindings in order, run `bound`.
    fn bind(self: &Rc<Self>) -> Result<(), LifecycleError> {
        tracing::trace!(controller = %self.name, id = %self.id, "bind");

        let observers = self.children_observers.borrow().clone();
        for observer in observers {
            observer.start();
        }

        if let Some(scope) = self.scope() {
            let mut flags = self.flags.get();
            if self.definition.borrow().strict_binding {
                flags |= LifecycleFlags::STRICT_BINDING;
            }
            for binding in self.bindings() {
                binding.bind(flags, &scope)?;
            }
        }

        let initiator = self.initiator_or_self();
        let parent = self.parent();
        match self.run_hook(Phase::Bound, &initiator, parent.as_ref())? {
            Settle::Pending(fut) => {
                self.ensure_promise();
                let this = self.clone();
                self.spawn(async move {
                    match fut.await {
                        Ok(()) => {
                            this.is_bound.set(true);
                            let next = if this.state.get() == State::ACTIVATING {
                                this.attach()
                            } else {
                                this.leave_activating()
                            };
                            if let Err(err) = next {
                                this.reject(err);
                            }
                        }
                        Err(err) => this.reject(err),
                    }
                });
                Ok(())
            }
            Settle::Done => {
                self.is_bound.set(true);
                self.attach()
            }
        }
    }

    /// Mount nodes, run `attaching`, activate children, then leave the
    /// activating phase opened in `activate`.
    fn attach(self: &Rc<Self>) -> Result<(), LifecycleError> {
        tracing::trace!(controller = %self.name, id = %self.id, "attach");
        self.mount_nodes();

        let initiator = self.initiator_or_self();
        let parent = self.parent();
        if let Settle::Pending(fut) = self.run_hook(Phase::Attaching, &initiator, parent.as_ref())? {
            self.ensure_promise();
            self.enter_activating();
            let this = self.clone();
            self.spawn(async move {
                let next = match fut.await {
                    Ok(()) => this.leave_activating(),
                    Err(err) => Err(err),
                };
                if let Err(err) = next {
                    this.reject(err);
                }
            });
        }

        let flags = self.flags.get();
        let scope = self.scope();
        for child in self.children() {
            // Completion is tracked through the activating counters.
            child.activate(&initiator, Some(self), flags, scope.clone())?;
        }

        self.leave_activating()
    }

    fn mount_nodes(&self) {
        let Some(nodes) = self.nodes() else { return };
        match self.mount_target.get() {
            MountTarget::Host => {
                if let Some(host) = self.host() {
                    nodes.append_to(&host);
                }
            }
            MountTarget::ShadowRoot => {
                if let Some(shadow_root) = self.shadow_root() {
                    nodes.append_to(&shadow_root);
                }
            }
            MountTarget::Location => {
                if let Some(location) = self.location() {
                    let reference = nodes.anchor().unwrap_or_else(|| location.end().clone());
                    nodes.insert_before(&reference);
                }
            }
            MountTarget::None => {}
        }
    }

    /// Count one more pending step here and on every ancestor up to the
    /// initiator.
    fn enter_activating(self: &Rc<Self>) {
        self.activating.enter();
        if !self.is_initiator() {
            if let Some(parent) = self.parent() {
                parent.enter_activating();
            }
        }
    }

    /// Leave one step. When this controller's count reaches zero, `attached`
    /// runs and the controller becomes active; the ancestor is told only
    /// after that, which is what makes `attached` fire leaf to root.
    fn leave_activating(self: &Rc<Self>) -> Result<(), LifecycleError> {
        if self.state.get() != State::ACTIVATING {
            // Deactivated while a hook was pending: just settle.
            self.activating.leave();
            self.resolve();
            return self.leave_parent_activating();
        }

        if self.activating.leave() {
            let initiator = self.initiator_or_self();
            let parent = self.parent();
            if let Settle::Pending(fut) = self.run_hook(Phase::Attached, &initiator, parent.as_ref())? {
                self.ensure_promise();
                let this = self.clone();
                self.spawn(async move {
                    let next = match fut.await {
                        Ok(()) => {
                            if this.state.get() == State::ACTIVATING {
                                this.mark_activated();
                            } else {
                                this.resolve();
                            }
                            this.leave_parent_activating()
                        }
                        Err(err) => Err(err),
                    };
                    if let Err(err) = next {
                        this.reject(err);
                    }
                });
                return Ok(());
            }
            self.mark_activated();
        }

        self.leave_parent_activating()
    }

    fn mark_activated(&self) {
        tracing::trace!(controller = %self.name, id = %self.id, "activated");
        self.state.set(State::ACTIVATED);
        self.resolve();
    }

    fn leave_parent_activating(self: &Rc<Self>) -> Result<(), LifecycleError> {
        if self.is_initiator() {
            return Ok(());
        }
        match self.parent() {
            Some(parent) => parent.leave_activating(),
            None => Ok(()),
        }
    }
}
