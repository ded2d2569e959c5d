//! Deactivation: detaching -> (remove nodes, unbinding) -> unbind.
//!
//! Every controller reached by a deactivation wave pushes itself onto the
//! initiator's wave list. The initiator's detaching and unbinding counters
//! are full barriers across that list: no `unbinding` runs before every
//! `detaching` settled, and nothing unbinds before every `unbinding`
//! settled.

use std::rc::Rc;

use super::Controller;
use crate::error::LifecycleError;
use crate::lifecycle::{Activation, Deferred, Settle};
use crate::types::{LifecycleFlags, Phase, State, ViewModelKind};

impl Controller {
    /// Deactivate this controller and its children as part of `initiator`'s
    /// wave.
    ///
    /// Only the initiator returns the wave's completion; other participants
    /// return `Ok(None)` and are tracked through the initiator's counters.
    /// Deactivating a controller that is not active is a no-op.
    pub fn deactivate(
        self: &Rc<Self>,
        initiator: &Rc<Controller>,
        parent: Option<&Rc<Controller>>,
        flags: LifecycleFlags,
    ) -> Activation {
        let state = self.state.get();
        let released = state & State::RELEASED;
        let masked = state - State::RELEASED;

        let previous = if masked == State::ACTIVATED {
            None
        } else if masked == State::ACTIVATING {
            // An activation failed or is still pending. Wait for it to
            // settle; its outcome no longer matters.
            self.completion()
        } else if masked == State::NONE
            || masked == State::DEACTIVATED
            || masked == State::DISPOSED
            || masked == (State::DEACTIVATED | State::DISPOSED)
        {
            return Ok(None);
        } else {
            return Err(LifecycleError::UnexpectedDeactivationState {
                name: self.name.clone(),
                state,
            });
        };

        tracing::trace!(controller = %self.name, id = %self.id, "deactivate");
        self.state.set(State::DEACTIVATING | released);
        self.set_initiator(Some(initiator));
        self.flags.set(flags);

        let is_initiator = Rc::ptr_eq(self, initiator);
        if is_initiator {
            self.detaching.enter();
        }

        if self.is_binding_done.get() {
            let observers = self.children_observers.borrow().clone();
            for observer in observers {
                observer.stop();
            }
        }

        for child in self.children() {
            child.deactivate(initiator, Some(self), flags)?;
        }

        let Some(previous) = previous else {
            self.detach(initiator, parent)?;
            return Ok(if is_initiator { self.completion() } else { None });
        };

        initiator.detaching.enter();
        let outer = is_initiator.then(|| Deferred::new(&self.name));
        let result = outer.as_ref().map(Deferred::completion);
        let this = self.clone();
        let initiator = initiator.clone();
        let parent = parent.cloned();
        self.spawn(async move {
            let _ = previous.await;
            let outcome = this.detach(&initiator, parent.as_ref());
            let outcome = match outcome {
                Ok(()) => initiator.leave_detaching(),
                Err(err) => Err(err),
            };
            let Some(outer) = outer else {
                if let Err(err) = outcome {
                    initiator.reject(err);
                }
                return;
            };
            match (outcome, this.completion()) {
                (Err(err), _) => outer.reject(err),
                (Ok(()), Some(wave)) => outer.settle(wave.await),
                (Ok(()), None) => outer.resolve(),
            }
        });
        Ok(result)
    }

    /// Run `detaching` and join the initiator's wave.
    fn detach(
        self: &Rc<Self>,
        initiator: &Rc<Controller>,
        parent: Option<&Rc<Controller>>,
    ) -> Result<(), LifecycleError> {
        if self.is_bound.get() {
            if let Settle::Pending(fut) = self.run_hook(Phase::Detaching, initiator, parent)? {
                self.ensure_promise();
                initiator.detaching.enter();
                let initiator = initiator.clone();
                self.spawn(async move {
                    let next = match fut.await {
                        Ok(()) => initiator.leave_detaching(),
                        Err(err) => Err(err),
                    };
                    if let Err(err) = next {
                        initiator.reject(err);
                    }
                });
            }
        }

        initiator.wave.borrow_mut().push(self.clone());
        if Rc::ptr_eq(self, initiator) {
            self.leave_detaching()?;
        }
        Ok(())
    }

    /// On the initiator: once every `detaching` settled, remove nodes and run
    /// `unbinding` across the whole wave.
    fn leave_detaching(self: &Rc<Self>) -> Result<(), LifecycleError> {
        if !self.detaching.leave() {
            return Ok(());
        }
        tracing::trace!(controller = %self.name, id = %self.id, "detached");

        self.unbinding.enter();
        self.remove_nodes();

        let wave = self.wave.borrow().clone();
        for participant in &wave {
            if !Rc::ptr_eq(participant, self) {
                participant.remove_nodes();
            }
            if !participant.is_binding_done.get() {
                continue;
            }
            let parent = participant.parent();
            if let Settle::Pending(fut) =
                participant.run_hook(Phase::Unbinding, self, parent.as_ref())?
            {
                self.ensure_promise();
                self.unbinding.enter();
                let this = self.clone();
                self.spawn(async move {
                    let next = match fut.await {
                        Ok(()) => this.leave_unbinding(),
                        Err(err) => Err(err),
                    };
                    if let Err(err) = next {
                        this.reject(err);
                    }
                });
            }
        }

        self.leave_unbinding()
    }

    /// On the initiator: once every `unbinding` settled, unbind every other
    /// participant, then itself.
    fn leave_unbinding(self: &Rc<Self>) -> Result<(), LifecycleError> {
        if !self.unbinding.leave() {
            return Ok(());
        }
        let wave = std::mem::take(&mut *self.wave.borrow_mut());
        for participant in &wave {
            if !Rc::ptr_eq(participant, self) {
                participant.unbind();
            }
        }
        self.unbind();
        Ok(())
    }

    fn unbind(self: &Rc<Self>) {
        tracing::trace!(controller = %self.name, id = %self.id, "unbind");
        let flags = self.flags.get() | LifecycleFlags::FROM_UNBIND;
        for binding in self.bindings() {
            binding.unbind(flags);
        }
        self.is_binding_done.set(false);
        self.is_bound.set(false);
        *self.parent.borrow_mut() = Default::default();

        let is_initiator = self.is_initiator();
        match self.kind {
            ViewModelKind::CustomAttribute => self.set_scope(None),
            ViewModelKind::Synthetic => {
                if !self.scope_locked.get() {
                    self.set_scope(None);
                }
                if self.state.get().contains(State::RELEASED) {
                    let pooled = self
                        .factory()
                        .is_some_and(|factory| factory.try_return_to_cache(self));
                    if !pooled && is_initiator {
                        self.dispose();
                    }
                }
            }
            ViewModelKind::CustomElement => {
                if let Some(scope) = self.scope() {
                    scope.set_parent(None);
                }
            }
        }

        if flags.contains(LifecycleFlags::DISPOSE) && is_initiator {
            self.dispose();
        }

        let kept = self.state.get() & (State::RELEASED | State::DISPOSED);
        self.state.set(State::DEACTIVATED | kept);
        self.set_initiator(None);
        self.resolve();
    }
}

