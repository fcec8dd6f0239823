//! Locals frames: `{ args | locals -- returns }`.
//!
//! The opening brace is a compile-immediate that consumes tokens up to `}`.
//! Offsets are assigned in declaration order, 8 bytes apart, relative to the
//! locals-stack register after the frame allocation, growing from the frame
//! base toward higher offsets.
//!
//! Prologue (emitted while `{` is processed): reserve the frame, pop each
//! argument from the data stack into its slot in declaration order (the
//! first-declared argument receives TOS), zero body locals and return
//! values. Epilogue (on the definition's exit path): push return values in
//! declaration order, free the frame.

use super::{pop_ds, push_ds, RLS};
use crate::asm::{Mem, Reg};
use crate::error::{CompileError, MachineError};
use crate::machine::Machine;
use tracing::debug;

/// Name→offset bindings for the current definition.
#[derive(Debug, Default)]
pub struct LocalsFrame {
    pub args: Vec<String>,
    pub locals: Vec<String>,
    pub rets: Vec<String>,
}

impl LocalsFrame {
    pub fn clear(&mut self) {
        self.args.clear();
        self.locals.clear();
        self.rets.clear();
    }

    pub fn total(&self) -> usize {
        self.args.len() + self.locals.len() + self.rets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Byte offset of `name` from the locals-stack register, if bound.
    pub fn offset_of(&self, name: &str) -> Option<i32> {
        self.args
            .iter()
            .chain(self.locals.iter())
            .chain(self.rets.iter())
            .position(|n| n == name)
            .map(|i| (i * 8) as i32)
    }

    /// Name bound at `offset`, for listing comments.
    pub fn name_at(&self, offset: i32) -> Option<&str> {
        let idx = (offset / 8) as usize;
        self.args
            .iter()
            .chain(self.locals.iter())
            .chain(self.rets.iter())
            .nth(idx)
            .map(String::as_str)
    }
}

/// Compile-immediate for `{`: parse the declaration, allocate the frame,
/// emit argument copy-in and zeroing.
pub(crate) fn gen_left_brace(m: &mut Machine) -> Result<(), MachineError> {
    m.locals.clear();

    enum Mode {
        Args,
        Locals,
        Rets,
    }
    let mut mode = Mode::Args;
    let mut pos = m.jit.pos_next + 1;
    let mut closed = false;
    while pos < m.jit.tokens.len() {
        let token = m.jit.tokens[pos].clone();
        if token == "}" {
            closed = true;
            break;
        } else if token == "|" {
            mode = Mode::Locals;
        } else if token == "--" {
            mode = Mode::Rets;
        } else {
            match mode {
                Mode::Args => m.locals.args.push(token),
                Mode::Locals => m.locals.locals.push(token),
                Mode::Rets => m.locals.rets.push(token),
            }
        }
        pos += 1;
    }
    if !closed {
        m.locals.clear();
        return Err(CompileError::ControlMismatch("locals brace not closed").into());
    }
    m.jit.pos_last = pos;
    debug!(
        args = m.locals.args.len(),
        locals = m.locals.locals.len(),
        rets = m.locals.rets.len(),
        "locals frame parsed"
    );

    let total = m.locals.total();
    if total == 0 {
        return Ok(());
    }

    m.jit.comment_with_word("allocate locals");
    let arg_count = m.locals.args.len();
    let asm = &mut m.jit.asm;
    asm.sub_ri(RLS, (total * 8) as i32);
    // Copy arguments from the data stack: first-declared gets TOS.
    for i in 0..arg_count {
        pop_ds(asm, Reg::Rcx);
        asm.mov_mr(Mem::disp(RLS, (i * 8) as i32), Reg::Rcx);
    }
    // Zero body locals and return values.
    for i in arg_count..total {
        asm.mov_mi32(Mem::disp(RLS, (i * 8) as i32), 0);
    }
    Ok(())
}

impl Machine {
    /// Push the local at `offset` onto the data stack.
    pub(crate) fn gen_push_local(&mut self, offset: i32) {
        if self.jit.logging {
            if let Some(name) = self.locals.name_at(offset) {
                let text = format!("fetch local {}", name);
                self.jit.asm.comment(&text);
            }
        }
        let asm = &mut self.jit.asm;
        asm.mov_rm(Reg::Rcx, Mem::disp(RLS, offset));
        push_ds(asm, Reg::Rcx);
    }

    /// Pop the data stack into the local at `offset` (the `to` path).
    pub(crate) fn gen_store_local(&mut self, offset: i32) {
        let asm = &mut self.jit.asm;
        pop_ds(asm, Reg::Rcx);
        asm.mov_mr(Mem::disp(RLS, offset), Reg::Rcx);
    }

    /// Epilogue half of the frame: copy return values out, free the frame.
    /// Called from the standard epilogue; a no-op without locals.
    pub(crate) fn gen_locals_epilogue(&mut self) {
        let total = self.locals.total();
        if total == 0 {
            return;
        }
        self.jit.comment_with_word("copy return values, free locals");
        let base = self.locals.args.len() + self.locals.locals.len();
        let ret_count = self.locals.rets.len();
        let asm = &mut self.jit.asm;
        for i in 0..ret_count {
            let offset = ((base + i) * 8) as i32;
            asm.mov_rm(Reg::Rcx, Mem::disp(RLS, offset));
            push_ds(asm, Reg::Rcx);
        }
        asm.add_ri(RLS, (total * 8) as i32);
        self.locals.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_follow_declaration_order() {
        let frame = LocalsFrame {
            args: vec!["a".into(), "b".into()],
            locals: vec!["t".into()],
            rets: vec!["r".into()],
        };
        assert_eq!(frame.offset_of("a"), Some(0));
        assert_eq!(frame.offset_of("b"), Some(8));
        assert_eq!(frame.offset_of("t"), Some(16));
        assert_eq!(frame.offset_of("r"), Some(24));
        assert_eq!(frame.offset_of("missing"), None);
        assert_eq!(frame.total(), 4);
        assert_eq!(frame.name_at(16), Some("t"));
    }
}
