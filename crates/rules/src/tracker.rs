use std::fmt::Display;

use tracing::debug;

/// Debug attribution for condition evaluation.
///
/// When enabled, every node logs why it returned what it returned, keyed by
/// its path in the trigger chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionTracker {
    enabled: bool,
}

impl ConditionTracker {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn log(&self, path: &str, message: impl Display) {
        if self.enabled {
            debug!(path, "{}", message);
        }
    }

    /// Log the outcome of a node and hand it back.
    pub fn result(&self, ret: bool, path: &str, because: impl Display) -> bool {
        if self.enabled {
            debug!(
                path,
                "returned {} because {}.",
                if ret { "TRUE" } else { "FALSE" },
                because
            );
        }
        ret
    }
}
