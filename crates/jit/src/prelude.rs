//! The embedded prelude.
//!
//! A small vocabulary defined in the language itself and compiled through
//! the ordinary pipeline at startup, so every prelude word is a real JIT
//! word. The REPL installs it unless told not to.

use crate::error::MachineError;
use crate::machine::Machine;

/// Prelude source, embedded at build time.
pub const PRELUDE: &str = include_str!("prelude.fjord");

/// Compile the prelude into `m`.
pub fn install(m: &mut Machine) -> Result<(), MachineError> {
    m.interpret(PRELUDE)
}
