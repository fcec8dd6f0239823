//! Process-wide machine toggles.

use serde::Deserialize;

/// Configuration for a [`crate::Machine`].
///
/// All three toggles are also flippable at run time (the REPL exposes them
/// as meta-commands).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Emit assembly comments and progress lines during compilation, and
    /// print the listing after each definition.
    pub logging: bool,
    /// Generate an escape poll in loop closers so runaway loops can be
    /// cancelled cooperatively.
    pub loop_check: bool,
    /// Reset the code buffer at the start of every definition.
    pub auto_reset: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            logging: false,
            loop_check: false,
            auto_reset: true,
        }
    }
}

impl MachineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logging(mut self, on: bool) -> Self {
        self.logging = on;
        self
    }

    pub fn with_loop_check(mut self, on: bool) -> Self {
        self.loop_check = on;
        self
    }

    pub fn with_auto_reset(mut self, on: bool) -> Self {
        self.auto_reset = on;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = MachineConfig::default();
        assert!(!c.logging);
        assert!(!c.loop_check);
        assert!(c.auto_reset);
    }

    #[test]
    fn test_builder_chain() {
        let c = MachineConfig::new().with_logging(true).with_loop_check(true);
        assert!(c.logging);
        assert!(c.loop_check);
        assert!(c.auto_reset);
    }
}
