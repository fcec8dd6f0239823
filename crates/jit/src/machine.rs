//! The machine: one self-contained interpreter/compiler instance.
//!
//! Everything that was process-global in classical systems lives here as an
//! explicit value: the stacks, the dictionary, the interner, the current
//! compilation context, the control-flow and locals state, and the pages of
//! code this machine has published. Tests instantiate independent machines
//! for isolation.
//!
//! The stacks and the dictionary are held through raw owned pointers
//! (`Box::into_raw`) because generated code embeds their addresses; the
//! machine value itself is free to move.

use crate::asm::{Assembler, EmitError, Mem, Reg};
use crate::builtins;
use crate::codegen::locals::LocalsFrame;
use crate::config::MachineConfig;
use crate::context::JitContext;
use crate::dictionary::Dictionary;
use crate::error::MachineError;
use crate::exec::{ExecBuffer, WordFn};
use crate::labels::LabelStack;
use fjord_core::{StackSet, StringInterner};

/// Entry shim: saves callee-saved registers, materialises the pinned
/// registers from the pointer cells, calls the word, writes the registers
/// back.
type Trampoline = unsafe extern "C" fn(WordFn);

pub struct Machine {
    stacks: *mut StackSet,
    dict: *mut Dictionary,
    pub interner: StringInterner,
    pub(crate) jit: JitContext,
    pub(crate) cflow: LabelStack,
    pub(crate) locals: LocalsFrame,
    pub(crate) do_loop_depth: usize,
    code_pages: Vec<ExecBuffer>,
    _trampoline_page: ExecBuffer,
    trampoline: Trampoline,
}

impl Machine {
    pub fn new() -> Result<Self, MachineError> {
        Self::with_config(MachineConfig::default())
    }

    pub fn with_config(config: MachineConfig) -> Result<Self, MachineError> {
        let stacks = Box::into_raw(Box::new(StackSet::new()));
        let cells = unsafe { &*stacks }.pointer_cells() as u64;
        let code = build_trampoline(cells).map_err(MachineError::from);
        let page = match code.and_then(|c| ExecBuffer::publish(&c).map_err(MachineError::from)) {
            Ok(page) => page,
            Err(e) => {
                // Reclaim the stacks before bailing out.
                drop(unsafe { Box::from_raw(stacks) });
                return Err(e);
            }
        };
        let trampoline =
            unsafe { std::mem::transmute::<*const u8, Trampoline>(page.as_ptr()) };
        let mut machine = Machine {
            stacks,
            dict: Box::into_raw(Box::new(Dictionary::new())),
            interner: StringInterner::new(),
            jit: JitContext::new(config),
            cflow: LabelStack::default(),
            locals: LocalsFrame::default(),
            do_loop_depth: 0,
            code_pages: Vec::new(),
            _trampoline_page: page,
            trampoline,
        };
        builtins::install(&mut machine)?;
        Ok(machine)
    }

    // ── owned-pointer accessors ──

    pub(crate) fn stacks(&self) -> &StackSet {
        unsafe { &*self.stacks }
    }

    pub(crate) fn stacks_mut(&mut self) -> &mut StackSet {
        unsafe { &mut *self.stacks }
    }

    pub(crate) fn stacks_ptr(&self) -> *mut StackSet {
        self.stacks
    }

    pub(crate) fn dict(&self) -> &Dictionary {
        unsafe { &*self.dict }
    }

    pub(crate) fn dict_mut(&mut self) -> &mut Dictionary {
        unsafe { &mut *self.dict }
    }

    pub(crate) fn dict_ptr(&self) -> *mut Dictionary {
        self.dict
    }

    // ── execution ──

    /// Run a compiled word through the entry trampoline.
    pub(crate) fn execute(&mut self, f: WordFn) {
        unsafe { (self.trampoline)(f) };
    }

    /// Publish finalised bytes as an executable page owned by this machine.
    pub(crate) fn publish(&mut self, code: Vec<u8>) -> Result<WordFn, MachineError> {
        let page = ExecBuffer::publish(&code)?;
        let entry = page.entry();
        self.code_pages.push(page);
        Ok(entry)
    }

    // ── public surface for the REPL and tests ──

    pub fn ds_push(&mut self, value: u64) -> Result<(), MachineError> {
        self.stacks_mut().push_ds(value)?;
        Ok(())
    }

    pub fn ds_pop(&mut self) -> Result<u64, MachineError> {
        let v = self.stacks_mut().pop_ds()?;
        Ok(v)
    }

    pub fn ds_depth(&self) -> usize {
        self.stacks().depth_ds()
    }

    pub fn rs_depth(&self) -> usize {
        self.stacks().depth_rs()
    }

    pub fn ss_depth(&self) -> usize {
        self.stacks().depth_ss()
    }

    pub fn ss_pop(&mut self) -> Result<u64, MachineError> {
        let v = self.stacks_mut().pop_ss()?;
        Ok(v)
    }

    pub fn reset_stacks(&mut self) {
        self.stacks_mut().reset_all();
    }

    pub fn canaries_intact(&self) -> bool {
        self.stacks().canaries_intact()
    }

    pub fn display_stacks(&self) {
        self.stacks().display_stacks();
    }

    pub fn dictionary(&self) -> &Dictionary {
        self.dict()
    }

    pub fn forget_last(&mut self) -> Result<String, MachineError> {
        let name = self.dict_mut().forget_last()?;
        Ok(name)
    }

    pub fn logging(&self) -> bool {
        self.jit.logging
    }

    pub fn set_logging(&mut self, on: bool) {
        self.jit.logging = on;
    }

    pub fn loop_check(&self) -> bool {
        self.jit.loop_check
    }

    pub fn set_loop_check(&mut self, on: bool) {
        self.jit.loop_check = on;
    }

    pub fn auto_reset(&self) -> bool {
        self.jit.auto_reset
    }

    pub fn set_auto_reset(&mut self, on: bool) {
        self.jit.auto_reset = on;
    }

    /// Code pages published so far (the trampoline not included).
    pub fn page_count(&self) -> usize {
        self.code_pages.len()
    }
}

impl Drop for Machine {
    fn drop(&mut self) {
        unsafe {
            drop(Box::from_raw(self.dict));
            drop(Box::from_raw(self.stacks));
        }
    }
}

/// Emit the entry trampoline for a machine whose pointer cells live at
/// `cells`.
fn build_trampoline(cells: u64) -> Result<Vec<u8>, EmitError> {
    let mut a = Assembler::new(false);
    a.push_r(Reg::Rbp);
    a.mov_rr(Reg::Rbp, Reg::Rsp);
    a.and_ri(Reg::Rsp, -16);
    a.push_r(Reg::Rbx);
    a.push_r(Reg::R12);
    a.push_r(Reg::R13);
    a.push_r(Reg::R14);
    a.push_r(Reg::R15);
    a.sub_ri(Reg::Rsp, 8); // keep the call site 16-aligned
    // Materialise the pinned registers from the pointer cells.
    a.mov_ri(Reg::Rax, cells);
    a.mov_rm(Reg::R15, Mem::disp(Reg::Rax, 0));
    a.mov_rm(Reg::R14, Mem::disp(Reg::Rax, 8));
    a.mov_rm(Reg::R13, Mem::disp(Reg::Rax, 16));
    a.mov_rm(Reg::R12, Mem::disp(Reg::Rax, 24));
    a.call_r(Reg::Rdi);
    // Write them back so host code observes the same pointers.
    a.mov_ri(Reg::Rax, cells);
    a.mov_mr(Mem::disp(Reg::Rax, 0), Reg::R15);
    a.mov_mr(Mem::disp(Reg::Rax, 8), Reg::R14);
    a.mov_mr(Mem::disp(Reg::Rax, 16), Reg::R13);
    a.mov_mr(Mem::disp(Reg::Rax, 24), Reg::R12);
    a.add_ri(Reg::Rsp, 8);
    a.pop_r(Reg::R15);
    a.pop_r(Reg::R14);
    a.pop_r(Reg::R13);
    a.pop_r(Reg::R12);
    a.pop_r(Reg::Rbx);
    a.mov_rr(Reg::Rsp, Reg::Rbp);
    a.pop_r(Reg::Rbp);
    a.ret();
    a.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_constructs_with_builtins() {
        let m = Machine::new().unwrap();
        assert!(m.dictionary().find("dup").is_some());
        assert!(m.dictionary().find("+").is_some());
        assert!(m.dictionary().find("if").is_some());
        assert!(m.canaries_intact());
    }

    #[test]
    fn test_independent_machines() {
        let mut a = Machine::new().unwrap();
        let mut b = Machine::new().unwrap();
        a.ds_push(1).unwrap();
        assert_eq!(a.ds_depth(), 1);
        assert_eq!(b.ds_depth(), 0);
        b.ds_push(2).unwrap();
        assert_eq!(a.ds_pop().unwrap(), 1);
        assert_eq!(b.ds_pop().unwrap(), 2);
    }
}
