//! Fjord JIT: the compiler half of the system.
//!
//! A dictionary-driven Forth-family compiler/interpreter. Colon definitions
//! are lowered token by token to x86-64 machine code at definition time;
//! the resulting native functions run against four runtime stacks pinned to
//! callee-saved registers (r15 data, r14 return, r13 locals, r12 strings).
//!
//! The public surface is [`Machine`]: construct one, feed it input with
//! [`Machine::interpret`], observe the data stack.
//!
//! ```no_run
//! use fjord_jit::Machine;
//!
//! let mut m = Machine::new()?;
//! m.interpret(": sq dup * ;")?;
//! m.interpret("5 sq")?;
//! assert_eq!(m.ds_pop()?, 25);
//! # Ok::<(), fjord_jit::MachineError>(())
//! ```
//!
//! # Modules
//!
//! - `asm`: x86-64 instruction encoder with labels and rel32 fixups
//! - `exec`: W^X executable pages
//! - `context`: the single current-compilation context
//! - `dictionary`: linked entries with four function slots and arena data
//!   cells
//! - `labels`: compile-time control-flow frames
//! - `codegen`: the generators (primitives, control flow, locals,
//!   immediates)
//! - `compiler`: token-by-token lowering of definition bodies
//! - `interp`: the outer interpreter
//! - `builtins`: base vocabulary registration
//! - `machine`: the world value tying it all together

pub mod asm;
pub mod builtins;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod context;
pub mod dictionary;
pub mod error;
pub mod exec;
pub mod interp;
pub mod labels;
pub mod lexer;
pub mod machine;
pub mod prelude;

pub use config::MachineConfig;
pub use dictionary::{Dictionary, WordKind, WordState};
pub use error::{CompileError, DictError, MachineError};
pub use exec::WordFn;
pub use machine::Machine;
