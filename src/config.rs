//! App configuration.
//!
//! Construct with struct literal syntax or the `with_*` builders:
//!
//! ```ignore
//! let config = AppConfig::default()
//!     .with_view_cache_size(8)
//!     .with_strict_binding(true);
//! ```

use crate::types::LifecycleFlags;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Default pool capacity for every view factory (0 disables pooling).
    pub view_cache_size: usize,
    /// Adds [`LifecycleFlags::STRICT_BINDING`] to every activation wave.
    pub strict_binding: bool,
    /// Whether `App::stop` disposes the root by default.
    pub dispose_on_stop: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            view_cache_size: 0,
            strict_binding: false,
            dispose_on_stop: false,
        }
    }
}

impl AppConfig {
    pub fn with_view_cache_size(mut self, size: usize) -> Self {
        self.view_cache_size = size;
        self
    }

    pub fn with_strict_binding(mut self, strict: bool) -> Self {
        self.strict_binding = strict;
        self
    }

    pub fn with_dispose_on_stop(mut self, dispose: bool) -> Self {
        self.dispose_on_stop = dispose;
        self
    }

    /// Flags every activation started by the app carries.
    pub fn activation_flags(&self) -> LifecycleFlags {
        let mut flags = LifecycleFlags::FROM_BIND;
        if self.strict_binding {
            flags |= LifecycleFlags::STRICT_BINDING;
        }
        flags
    }
}
