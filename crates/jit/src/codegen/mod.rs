//! Code generation against the pinned-register stack model.
//!
//! Register assignment (all callee-saved under SysV):
//!
//! | register | stack |
//! |---|---|
//! | r15 | data (RDS) |
//! | r14 | return (RRS) |
//! | r13 | locals (RLS) |
//! | r12 | strings (RSS) |
//!
//! Everything else is scratch; no generator sequence assumes any scratch
//! register survives past its own emission boundary.
//!
//! Every compiled word opens with `push rbp; mov rbp, rsp; and rsp, -16`
//! and closes with `mov rsp, rbp; pop rbp; ret`, so the native stack is
//! 16-aligned at every interior point. A fellow-word call is then just
//! `mov rax, imm64; call rax`; a host call needs no shadow space under
//! SysV, only the single RDI argument. Host helpers that touch the stacks
//! get the pinned registers spilled to the pointer cells first and reloaded
//! after, keeping cells and registers in agreement at the boundary.

pub mod control;
pub mod immediates;
pub mod locals;
pub mod primitives;

use crate::asm::{Assembler, Label, Mem, Reg};
use crate::error::MachineError;
use crate::exec::WordFn;
use crate::labels::ControlFrame;
use crate::machine::Machine;
use tracing::debug;

/// Data-stack pointer register.
pub const RDS: Reg = Reg::R15;
/// Return-stack pointer register.
pub const RRS: Reg = Reg::R14;
/// Locals-stack pointer register.
pub const RLS: Reg = Reg::R13;
/// String-stack pointer register.
pub const RSS: Reg = Reg::R12;

/// Offsets of the pointer cells inside [`fjord_core::PointerCells`].
const CELL_DS: i32 = 0;
const CELL_RS: i32 = 8;
const CELL_LS: i32 = 16;
const CELL_SS: i32 = 24;

// ── pinned-stack push/pop sequences ──

pub(crate) fn push_ds(asm: &mut Assembler, reg: Reg) {
    asm.sub_ri(RDS, 8);
    asm.mov_mr(Mem::base(RDS), reg);
}

pub(crate) fn pop_ds(asm: &mut Assembler, reg: Reg) {
    asm.mov_rm(reg, Mem::base(RDS));
    asm.add_ri(RDS, 8);
}

pub(crate) fn push_rs(asm: &mut Assembler, reg: Reg) {
    asm.sub_ri(RRS, 8);
    asm.mov_mr(Mem::base(RRS), reg);
}

pub(crate) fn pop_rs(asm: &mut Assembler, reg: Reg) {
    asm.mov_rm(reg, Mem::base(RRS));
    asm.add_ri(RRS, 8);
}

pub(crate) fn push_ss(asm: &mut Assembler, reg: Reg) {
    asm.sub_ri(RSS, 8);
    asm.mov_mr(Mem::base(RSS), reg);
}

/// Fetch the cell at `addr` and push it onto the data stack.
pub(crate) fn load_ds(asm: &mut Assembler, addr: u64) {
    asm.mov_ri(Reg::Rax, addr);
    asm.mov_rm(Reg::Rax, Mem::base(Reg::Rax));
    push_ds(asm, Reg::Rax);
}

/// Pop the data stack into the cell at `addr`.
pub(crate) fn store_ds(asm: &mut Assembler, addr: u64) {
    pop_ds(asm, Reg::Rax);
    asm.mov_ri(Reg::Rcx, addr);
    asm.mov_mr(Mem::base(Reg::Rcx), Reg::Rax);
}

/// Fetch the cell at `addr` and push it onto the string stack.
pub(crate) fn load_ss(asm: &mut Assembler, addr: u64) {
    asm.mov_ri(Reg::Rax, addr);
    asm.mov_rm(Reg::Rax, Mem::base(Reg::Rax));
    push_ss(asm, Reg::Rax);
}

/// Write the four pinned registers out to the pointer cells.
pub(crate) fn spill_pinned(asm: &mut Assembler, cells: u64) {
    asm.mov_ri(Reg::Rax, cells);
    asm.mov_mr(Mem::disp(Reg::Rax, CELL_DS), RDS);
    asm.mov_mr(Mem::disp(Reg::Rax, CELL_RS), RRS);
    asm.mov_mr(Mem::disp(Reg::Rax, CELL_LS), RLS);
    asm.mov_mr(Mem::disp(Reg::Rax, CELL_SS), RSS);
}

/// Reload the four pinned registers from the pointer cells.
pub(crate) fn reload_pinned(asm: &mut Assembler, cells: u64) {
    asm.mov_ri(Reg::Rax, cells);
    asm.mov_rm(RDS, Mem::disp(Reg::Rax, CELL_DS));
    asm.mov_rm(RRS, Mem::disp(Reg::Rax, CELL_RS));
    asm.mov_rm(RLS, Mem::disp(Reg::Rax, CELL_LS));
    asm.mov_rm(RSS, Mem::disp(Reg::Rax, CELL_SS));
}

impl Machine {
    /// Standard function prologue: frame, alignment, entry/exit frame on the
    /// control stack.
    pub(crate) fn gen_prologue(&mut self) -> Result<(), MachineError> {
        debug!(word = %self.jit.word, "prologue");
        self.locals.clear();
        self.jit.comment_with_word("function prologue");
        let asm = &mut self.jit.asm;
        asm.push_r(Reg::Rbp);
        asm.mov_rr(Reg::Rbp, Reg::Rsp);
        asm.and_ri(Reg::Rsp, -16);
        let entry = asm.new_label();
        let exit = asm.new_label();
        asm.bind(entry)?;
        self.cflow.push(ControlFrame::Function { entry, exit });
        Ok(())
    }

    /// Standard epilogue: bind the exit label, copy out locals return
    /// values, free the locals frame, restore the native frame.
    pub(crate) fn gen_epilogue(&mut self) -> Result<(), MachineError> {
        let frame = self
            .cflow
            .pop()
            .ok_or(crate::error::CompileError::ControlMismatch(
                "epilogue with empty control stack",
            ))?;
        let ControlFrame::Function { exit, .. } = frame else {
            return Err(crate::error::CompileError::ControlMismatch(
                "unclosed construct at end of definition",
            )
            .into());
        };
        debug!(word = %self.jit.word, "epilogue");
        self.jit.comment_with_word("function epilogue");
        self.jit.asm.bind(exit)?;
        self.gen_locals_epilogue();
        let asm = &mut self.jit.asm;
        asm.mov_rr(Reg::Rsp, Reg::Rbp);
        asm.pop_r(Reg::Rbp);
        asm.ret();
        Ok(())
    }

    /// Call a fellow compiled word. Callees preserve the pinned registers by
    /// contract, so no saves are needed.
    pub(crate) fn gen_call_word(&mut self, f: WordFn) {
        self.jit.comment_with_word("call word");
        let asm = &mut self.jit.asm;
        asm.mov_ri(Reg::Rax, f as usize as u64);
        asm.call_r(Reg::Rax);
    }

    /// Call a host helper that does not touch the stacks. The argument, if
    /// any, must already be in RDI.
    pub(crate) fn emit_host_call(&mut self, target: u64) {
        let asm = &mut self.jit.asm;
        asm.mov_ri(Reg::Rax, target);
        asm.call_r(Reg::Rax);
    }

    /// Call a stack-touching host helper: pinned registers are spilled to
    /// the pointer cells before the call and reloaded after, so the helper
    /// observes and may mutate live pointers.
    pub(crate) fn emit_stack_host_call(&mut self, target: u64, arg: u64) {
        let cells = self.stacks().pointer_cells() as u64;
        let asm = &mut self.jit.asm;
        spill_pinned(asm, cells);
        asm.mov_ri(Reg::Rdi, arg);
        asm.mov_ri(Reg::Rax, target);
        asm.call_r(Reg::Rax);
        reload_pinned(asm, cells);
    }

    /// When the loop-check toggle is on, poll the escape flag and jump to
    /// `leave` if it is raised. RAX is preserved around the poll.
    pub(crate) fn emit_loop_check(&mut self, leave: Label) {
        if !self.jit.loop_check {
            return;
        }
        self.jit.comment_with_word("escape poll");
        let asm = &mut self.jit.asm;
        asm.push_r(Reg::Rax);
        asm.sub_ri(Reg::Rsp, 8);
        asm.mov_ri(Reg::Rax, fjord_core::fjord_escape_pressed as usize as u64);
        asm.call_r(Reg::Rax);
        asm.add_ri(Reg::Rsp, 8);
        asm.mov_rr(Reg::Rcx, Reg::Rax);
        asm.pop_r(Reg::Rax);
        asm.test_rr(Reg::Rcx, Reg::Rcx);
        asm.jcc(crate::asm::Cond::Ne, leave);
    }

    /// Wrap a generator's inline emission between a prologue and epilogue
    /// and publish it as a standalone compiled function. Builtins get their
    /// interpret-mode bodies this way.
    pub(crate) fn build_word(
        &mut self,
        generator: fn(&mut Machine) -> Result<(), MachineError>,
    ) -> Result<WordFn, MachineError> {
        self.jit.reset();
        self.gen_prologue()?;
        generator(self)?;
        self.gen_epilogue()?;
        self.finish_word()
    }

    /// Finalise the current stream and publish it as an executable page.
    pub(crate) fn finish_word(&mut self) -> Result<WordFn, MachineError> {
        let code = self.jit.finish()?;
        let f = self.publish(code)?;
        debug!(entry = f as usize, "word published");
        Ok(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_ds_sequences() {
        let mut a = Assembler::new(false);
        push_ds(&mut a, Reg::Rax);
        pop_ds(&mut a, Reg::Rcx);
        assert_eq!(
            a.finalize().unwrap(),
            vec![
                0x49, 0x83, 0xEF, 0x08, // sub r15, 8
                0x49, 0x89, 0x07, // mov [r15], rax
                0x49, 0x8B, 0x0F, // mov rcx, [r15]
                0x49, 0x83, 0xC7, 0x08, // add r15, 8
            ]
        );
    }

    #[test]
    fn test_spill_sequence_hits_all_four_cells() {
        let mut a = Assembler::new(false);
        spill_pinned(&mut a, 0x1000);
        let code = a.finalize().unwrap();
        let mut expected = vec![0x48, 0xB8];
        expected.extend_from_slice(&0x1000u64.to_le_bytes());
        expected.extend_from_slice(&[
            0x4C, 0x89, 0x38, // mov [rax], r15
            0x4C, 0x89, 0x70, 0x08, // mov [rax+8], r14
            0x4C, 0x89, 0x68, 0x10, // mov [rax+16], r13
            0x4C, 0x89, 0x60, 0x18, // mov [rax+24], r12
        ]);
        assert_eq!(code, expected);
    }

    #[test]
    fn test_reload_mirrors_spill() {
        let mut a = Assembler::new(false);
        reload_pinned(&mut a, 0x1000);
        let code = a.finalize().unwrap();
        let mut expected = vec![0x48, 0xB8];
        expected.extend_from_slice(&0x1000u64.to_le_bytes());
        expected.extend_from_slice(&[
            0x4C, 0x8B, 0x38, // mov r15, [rax]
            0x4C, 0x8B, 0x70, 0x08, // mov r14, [rax+8]
            0x4C, 0x8B, 0x68, 0x10, // mov r13, [rax+16]
            0x4C, 0x8B, 0x60, 0x18, // mov r12, [rax+24]
        ]);
        assert_eq!(code, expected);
    }

    #[test]
    fn test_string_push_uses_r12() {
        let mut a = Assembler::new(false);
        push_ss(&mut a, Reg::Rcx);
        assert_eq!(
            a.finalize().unwrap(),
            vec![
                0x49, 0x83, 0xEC, 0x08, // sub r12, 8
                0x49, 0x89, 0x0C, 0x24, // mov [r12], rcx (SIB form)
            ]
        );
    }
}
