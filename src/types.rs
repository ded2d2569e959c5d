//! Core types for trellis.
//!
//! Flag sets and small discriminants shared by the controller, the
//! template controllers and the app root.

use std::cell::Cell;
use std::fmt;

// =============================================================================
// Controller State (bitflags)
// =============================================================================

bitflags::bitflags! {
    /// Lifecycle state of a controller.
    ///
    /// Not an exclusive enum: `RELEASED` and `DISPOSED` are layered on top of
    /// the phase bits, so a view can be `DEACTIVATED | RELEASED` and later
    /// `DEACTIVATED | DISPOSED`. Compare with `==` for the main phase and
    /// `contains` for the orthogonal bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct State: u8 {
        const NONE = 0;
        const ACTIVATING = 1 << 0;
        const ACTIVATED = 1 << 1;
        const DEACTIVATING = 1 << 2;
        const DEACTIVATED = 1 << 3;
        const RELEASED = 1 << 4;
        const DISPOSED = 1 << 5;
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self
            .iter_names()
            .map(|(name, _)| name)
            .filter(|name| *name != "NONE")
            .collect();
        f.write_str(&names.join("|").to_lowercase())
    }
}

// =============================================================================
// Lifecycle Flags (bitflags)
// =============================================================================

bitflags::bitflags! {
    /// Behaviour flags propagated to every binding of an activation wave.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct LifecycleFlags: u8 {
        const NONE = 0;
        const FROM_BIND = 1 << 0;
        const FROM_UNBIND = 1 << 1;
        /// Dispose the initiator once the deactivation wave has unbound.
        const DISPOSE = 1 << 2;
        const STRICT_BINDING = 1 << 3;
    }
}

// =============================================================================
// Hook Capabilities (bitflags)
// =============================================================================

bitflags::bitflags! {
    /// The set of hooks a view-model implements.
    ///
    /// Declared once by [`crate::ViewModel::hooks`] and read a single time when
    /// the controller is built; adding behaviour later does not change which
    /// hooks fire.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct HookSet: u16 {
        const DEFINE = 1 << 0;
        const HYDRATING = 1 << 1;
        const HYDRATED = 1 << 2;
        const CREATED = 1 << 3;
        const BINDING = 1 << 4;
        const BOUND = 1 << 5;
        const ATTACHING = 1 << 6;
        const ATTACHED = 1 << 7;
        const DETACHING = 1 << 8;
        const UNBINDING = 1 << 9;
        const DISPOSE = 1 << 10;
        const ACCEPT = 1 << 11;

        const ACTIVATION = Self::BINDING.bits()
            | Self::BOUND.bits()
            | Self::ATTACHING.bits()
            | Self::ATTACHED.bits();
        const DEACTIVATION = Self::DETACHING.bits() | Self::UNBINDING.bits();
    }
}

// =============================================================================
// Phase
// =============================================================================

/// An async-capable lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Binding,
    Bound,
    Attaching,
    Attached,
    Detaching,
    Unbinding,
}

impl Phase {
    /// Capability bit that enables this phase on a view-model or hook.
    pub const fn flag(self) -> HookSet {
        match self {
            Phase::Binding => HookSet::BINDING,
            Phase::Bound => HookSet::BOUND,
            Phase::Attaching => HookSet::ATTACHING,
            Phase::Attached => HookSet::ATTACHED,
            Phase::Detaching => HookSet::DETACHING,
            Phase::Unbinding => HookSet::UNBINDING,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Phase::Binding => "binding",
            Phase::Bound => "bound",
            Phase::Attaching => "attaching",
            Phase::Attached => "attached",
            Phase::Detaching => "detaching",
            Phase::Unbinding => "unbinding",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Kinds and Mount Targets
// =============================================================================

/// Which kind of instance a controller wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewModelKind {
    CustomElement,
    CustomAttribute,
    Synthetic,
}

/// Where a controller's rendered nodes are inserted on attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum MountTarget {
    #[default]
    None,
    Host,
    ShadowRoot,
    Location,
}

/// Shadow root mode requested by a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowMode {
    Open,
    Closed,
}

// =============================================================================
// Controller Id
// =============================================================================

/// Process-unique controller identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ControllerId(pub u64);

thread_local! {
    static NEXT_CONTROLLER_ID: Cell<u64> = const { Cell::new(0) };
}

impl ControllerId {
    pub(crate) fn next() -> Self {
        NEXT_CONTROLLER_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            ControllerId(id)
        })
    }
}

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
