//! View-model hooks and cross-cutting lifecycle hooks.
//!
//! A view-model declares the hooks it implements once, through
//! [`ViewModel::hooks`]. Cross-cutting [`LifecycleHook`]s registered on the
//! app (global) or on a definition (local) wrap the view-model's own hook
//! like middleware: each receives a [`Next`] and decides when to run the
//! inner part of the chain. A hook that logs around `next.run()` therefore
//! nests as
//!
//! ```text
//! Global.enter, Local.enter, own.enter, own.leave, Local.leave, Global.leave
//! ```

use std::any::Any;
use std::ops::ControlFlow;
use std::rc::Rc;

use super::settle::{HookResult, Settle};
use crate::controller::{ComponentDefinition, Controller};
use crate::types::{HookSet, LifecycleFlags, Phase};

// =============================================================================
// Hook Context
// =============================================================================

/// Arguments every async-capable hook receives.
pub struct HookContext<'a> {
    /// The controller whose hook is running.
    pub controller: &'a Rc<Controller>,
    /// The controller that started the current wave.
    pub initiator: &'a Rc<Controller>,
    pub parent: Option<&'a Rc<Controller>>,
    pub flags: LifecycleFlags,
}

/// Visitor passed to [`Controller::accept`].
pub type Visitor<'v> = dyn FnMut(&Rc<Controller>) -> ControlFlow<()> + 'v;

// =============================================================================
// ViewModel
// =============================================================================

/// A component, attribute or template-controller instance.
///
/// Every hook has a no-op default; only the ones named by [`ViewModel::hooks`]
/// are ever called.
#[allow(unused_variables)]
pub trait ViewModel: Any {
    /// The hooks this view-model implements. Read once at construction.
    fn hooks(&self) -> HookSet;

    /// Replace the definition before compilation.
    fn define(
        &self,
        controller: &Rc<Controller>,
        definition: &Rc<ComponentDefinition>,
    ) -> Option<Rc<ComponentDefinition>> {
        None
    }

    fn hydrating(&self, controller: &Rc<Controller>) {}

    fn hydrated(&self, controller: &Rc<Controller>) {}

    fn created(&self, controller: &Rc<Controller>) {}

    fn binding(&self, cx: &HookContext<'_>) -> HookResult {
        Ok(Settle::Done)
    }

    fn bound(&self, cx: &HookContext<'_>) -> HookResult {
        Ok(Settle::Done)
    }

    fn attaching(&self, cx: &HookContext<'_>) -> HookResult {
        Ok(Settle::Done)
    }

    fn attached(&self, cx: &HookContext<'_>) -> HookResult {
        Ok(Settle::Done)
    }

    fn detaching(&self, cx: &HookContext<'_>) -> HookResult {
        Ok(Settle::Done)
    }

    fn unbinding(&self, cx: &HookContext<'_>) -> HookResult {
        Ok(Settle::Done)
    }

    fn dispose(&self) {}

    /// Forward a visitor to controllers this view-model owns but that are not
    /// registered as children (template-controller views).
    fn accept(&self, visitor: &mut Visitor<'_>) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Dispatch a phase to the matching view-model method.
pub(crate) fn call_phase(
    view_model: &dyn ViewModel,
    phase: Phase,
    cx: &HookContext<'_>,
) -> HookResult {
    match phase {
        Phase::Binding => view_model.binding(cx),
        Phase::Bound => view_model.bound(cx),
        Phase::Attaching => view_model.attaching(cx),
        Phase::Attached => view_model.attached(cx),
        Phase::Detaching => view_model.detaching(cx),
        Phase::Unbinding => view_model.unbinding(cx),
    }
}

// =============================================================================
// Lifecycle Hooks
// =============================================================================

/// A cross-cutting hook invoked around the view-model's own hook.
pub trait LifecycleHook {
    /// Phases this hook participates in.
    fn phases(&self) -> HookSet;

    /// Run this hook for `phase`. Call `next.run()` to run the rest of the
    /// chain; skipping it skips the inner hooks.
    fn invoke(
        &self,
        phase: Phase,
        view_model: &Rc<dyn ViewModel>,
        cx: &HookContext<'_>,
        next: Next<'_>,
    ) -> HookResult;
}

/// The remainder of a hook chain.
pub struct Next<'a> {
    rest: &'a [Rc<dyn LifecycleHook>],
    phase: Phase,
    view_model: &'a Rc<dyn ViewModel>,
    cx: &'a HookContext<'a>,
    own: bool,
}

impl Next<'_> {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn run(self) -> HookResult {
        let mut rest = self.rest;
        while let Some((hook, tail)) = rest.split_first() {
            if hook.phases().contains(self.phase.flag()) {
                let next = Next { rest: tail, ..self };
                return hook.invoke(self.phase, self.view_model, self.cx, next);
            }
            rest = tail;
        }
        if self.own {
            call_phase(self.view_model.as_ref(), self.phase, self.cx)
        } else {
            Ok(Settle::Done)
        }
    }
}

/// Global then local hooks, resolved once at hydration.
#[derive(Clone, Default)]
pub struct ResolvedHooks {
    hooks: Vec<Rc<dyn LifecycleHook>>,
    phases: HookSet,
}

impl ResolvedHooks {
    pub fn new(global: &[Rc<dyn LifecycleHook>], local: &[Rc<dyn LifecycleHook>]) -> Self {
        let hooks: Vec<Rc<dyn LifecycleHook>> = global.iter().chain(local).cloned().collect();
        let phases = hooks
            .iter()
            .fold(HookSet::empty(), |acc, hook| acc | hook.phases());
        Self { hooks, phases }
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn handles(&self, phase: Phase) -> bool {
        self.phases.contains(phase.flag())
    }

    /// Run the chain for `phase` with the view-model's own hook innermost.
    pub fn run(
        &self,
        phase: Phase,
        view_model: &Rc<dyn ViewModel>,
        own: bool,
        cx: &HookContext<'_>,
    ) -> HookResult {
        Next {
            rest: &self.hooks,
            phase,
            view_model,
            cx,
            own,
        }
        .run()
    }
}
