//! Fjord Core: the runtime kernel underneath the JIT
//!
//! This crate owns everything generated code touches at run time:
//!
//! - `stacks`: the four fixed-size runtime stacks (data, return, locals,
//!   strings), each full-descending with canary regions, plus the heap-pinned
//!   pointer cells that generated code and host code agree on at every
//!   JIT/host boundary.
//! - `interner`: the refcounted string store backing `s"` / `."` literals.
//!   Interned bytes are NUL-terminated and address-stable so their address
//!   can be baked into generated code as an immediate.
//! - `host`: the `extern "C"` helpers that generated code calls (`emit`,
//!   `.`, `."`, the escape poll, stack introspection).
//!
//! Nothing in here knows how code is generated; the compiler crate depends on
//! this one, never the other way around.

pub mod host;
pub mod interner;
pub mod stacks;

pub use host::{
    clear_escape, fjord_depth, fjord_dot_s, fjord_emit_byte, fjord_escape_pressed,
    fjord_print_signed, fjord_puts, raise_escape,
};
pub use interner::StringInterner;
pub use stacks::{PointerCells, StackError, StackId, StackSet};
