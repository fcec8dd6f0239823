//! Control-flow constructs.
//!
//! Openers push a tagged frame on the control stack, closers pop their own
//! frame and bind the labels it carries. `leave` and `exit` search the stack
//! without mutating it.
//!
//! `do`/`loop` keep the post-test `jl` convention: the body always executes
//! at least once, and a loop whose limit equals its start runs exactly once.
//! `exit` across an open `do` loop leaves the two counter cells on the
//! return stack; callers must `leave` first.

use super::{pop_ds, pop_rs, push_rs, RRS};
use crate::asm::{Cond, Mem, Reg};
use crate::error::{CompileError, MachineError};
use crate::labels::ControlFrame;
use crate::machine::Machine;

// ── if / else / then ──

pub(crate) fn gen_if(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word("if");
    let asm = &mut m.jit.asm;
    let else_lbl = asm.new_label();
    let end_lbl = asm.new_label();
    pop_ds(asm, Reg::Rax);
    asm.test_rr(Reg::Rax, Reg::Rax);
    asm.jcc(Cond::E, else_lbl);
    m.cflow.push(ControlFrame::IfElse {
        else_lbl,
        end_lbl,
        has_else: false,
    });
    Ok(())
}

pub(crate) fn gen_else(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word("else");
    let Some(ControlFrame::IfElse {
        else_lbl, end_lbl, ..
    }) = m.cflow.top_mut().copied()
    else {
        return Err(CompileError::ControlMismatch("else without if").into());
    };
    let asm = &mut m.jit.asm;
    asm.jmp(end_lbl);
    asm.bind(else_lbl)?;
    if let Some(ControlFrame::IfElse { has_else, .. }) = m.cflow.top_mut() {
        *has_else = true;
    }
    Ok(())
}

pub(crate) fn gen_then(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word("then");
    let Some(frame) = m.cflow.pop() else {
        return Err(CompileError::ControlMismatch("then without if").into());
    };
    let ControlFrame::IfElse {
        else_lbl,
        end_lbl,
        has_else,
    } = frame
    else {
        m.cflow.push(frame);
        return Err(CompileError::ControlMismatch("then without if").into());
    };
    let target = if has_else { end_lbl } else { else_lbl };
    m.jit.asm.bind(target)?;
    Ok(())
}

// ── begin / again / until / while / repeat ──

pub(crate) fn gen_begin(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word("begin");
    let asm = &mut m.jit.asm;
    let begin_lbl = asm.new_label();
    let again_lbl = asm.new_label();
    let repeat_lbl = asm.new_label();
    let until_lbl = asm.new_label();
    let while_lbl = asm.new_label();
    let leave_lbl = asm.new_label();
    asm.bind(begin_lbl)?;
    m.cflow.push(ControlFrame::Begin {
        begin_lbl,
        again_lbl,
        repeat_lbl,
        until_lbl,
        while_lbl,
        leave_lbl,
    });
    Ok(())
}

fn pop_begin_frame(m: &mut Machine, closer: &'static str) -> Result<ControlFrame, MachineError> {
    match m.cflow.pop() {
        Some(frame @ ControlFrame::Begin { .. }) => Ok(frame),
        Some(other) => {
            m.cflow.push(other);
            Err(CompileError::ControlMismatch(closer).into())
        }
        None => Err(CompileError::ControlMismatch(closer).into()),
    }
}

pub(crate) fn gen_again(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word("again");
    let ControlFrame::Begin {
        begin_lbl,
        again_lbl,
        while_lbl,
        leave_lbl,
        ..
    } = pop_begin_frame(m, "again without begin")?
    else {
        unreachable!("pop_begin_frame returns Begin frames only");
    };
    m.emit_loop_check(leave_lbl);
    let asm = &mut m.jit.asm;
    asm.jmp(begin_lbl);
    asm.bind(again_lbl)?;
    asm.bind(leave_lbl)?;
    asm.bind(while_lbl)?;
    Ok(())
}

pub(crate) fn gen_until(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word("until");
    let ControlFrame::Begin {
        begin_lbl,
        until_lbl,
        leave_lbl,
        ..
    } = pop_begin_frame(m, "until without begin")?
    else {
        unreachable!("pop_begin_frame returns Begin frames only");
    };
    pop_ds(&mut m.jit.asm, Reg::Rax);
    m.emit_loop_check(leave_lbl);
    let asm = &mut m.jit.asm;
    asm.test_rr(Reg::Rax, Reg::Rax);
    asm.jcc(Cond::E, begin_lbl);
    asm.bind(until_lbl)?;
    asm.bind(leave_lbl)?;
    Ok(())
}

pub(crate) fn gen_while(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word("while");
    let Some(&mut ControlFrame::Begin { while_lbl, .. }) = m.cflow.top_mut() else {
        return Err(CompileError::ControlMismatch("while without begin").into());
    };
    let asm = &mut m.jit.asm;
    pop_ds(asm, Reg::Rax);
    asm.test_rr(Reg::Rax, Reg::Rax);
    asm.jcc(Cond::E, while_lbl);
    Ok(())
}

pub(crate) fn gen_repeat(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word("repeat");
    let ControlFrame::Begin {
        begin_lbl,
        repeat_lbl,
        while_lbl,
        leave_lbl,
        ..
    } = pop_begin_frame(m, "repeat without begin")?
    else {
        unreachable!("pop_begin_frame returns Begin frames only");
    };
    m.emit_loop_check(leave_lbl);
    let asm = &mut m.jit.asm;
    asm.jmp(begin_lbl);
    asm.bind(repeat_lbl)?;
    asm.bind(leave_lbl)?;
    asm.bind(while_lbl)?;
    Ok(())
}

// ── do / loop / +loop ──

pub(crate) fn gen_do(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word("do");
    let asm = &mut m.jit.asm;
    pop_ds(asm, Reg::Rdx); // index (TOS)
    pop_ds(asm, Reg::Rcx); // limit
    push_rs(asm, Reg::Rcx);
    push_rs(asm, Reg::Rdx);
    let do_lbl = asm.new_label();
    let loop_lbl = asm.new_label();
    let leave_lbl = asm.new_label();
    asm.bind(do_lbl)?;
    m.do_loop_depth += 1;
    m.cflow.push(ControlFrame::DoLoop {
        do_lbl,
        loop_lbl,
        leave_lbl,
    });
    Ok(())
}

fn pop_do_frame(m: &mut Machine, closer: &'static str) -> Result<ControlFrame, MachineError> {
    match m.cflow.pop() {
        Some(frame @ ControlFrame::DoLoop { .. }) => Ok(frame),
        Some(other) => {
            m.cflow.push(other);
            Err(CompileError::ControlMismatch(closer).into())
        }
        None => Err(CompileError::ControlMismatch(closer).into()),
    }
}

pub(crate) fn gen_loop(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word("loop");
    let ControlFrame::DoLoop {
        do_lbl,
        loop_lbl,
        leave_lbl,
    } = pop_do_frame(m, "loop without do")?
    else {
        unreachable!("pop_do_frame returns DoLoop frames only");
    };
    m.emit_loop_check(leave_lbl);
    let asm = &mut m.jit.asm;
    pop_rs(asm, Reg::Rcx); // index
    pop_rs(asm, Reg::Rdx); // limit
    push_rs(asm, Reg::Rdx);
    asm.add_ri(Reg::Rcx, 1);
    push_rs(asm, Reg::Rcx);
    asm.cmp_rr(Reg::Rcx, Reg::Rdx);
    asm.jcc(Cond::L, do_lbl);
    asm.bind(loop_lbl)?;
    asm.bind(leave_lbl)?;
    // Drop the counters so leave converges on a stack-consistent point.
    pop_rs(asm, Reg::Rcx);
    pop_rs(asm, Reg::Rdx);
    m.do_loop_depth -= 1;
    Ok(())
}

pub(crate) fn gen_plus_loop(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word("+loop");
    let ControlFrame::DoLoop {
        do_lbl,
        loop_lbl,
        leave_lbl,
    } = pop_do_frame(m, "+loop without do")?
    else {
        unreachable!("pop_do_frame returns DoLoop frames only");
    };
    m.emit_loop_check(leave_lbl);
    let asm = &mut m.jit.asm;
    pop_rs(asm, Reg::Rcx); // index
    pop_rs(asm, Reg::Rdx); // limit
    push_rs(asm, Reg::Rdx);
    pop_ds(asm, Reg::Rsi); // increment
    asm.add_rr(Reg::Rcx, Reg::Rsi);
    push_rs(asm, Reg::Rcx);
    let positive = asm.new_label();
    let done = asm.new_label();
    asm.cmp_ri(Reg::Rsi, 0);
    asm.jcc(Cond::G, positive);
    // Negative increment: continue while index >= limit.
    asm.cmp_rr(Reg::Rcx, Reg::Rdx);
    asm.jcc(Cond::Ge, do_lbl);
    asm.jmp(done);
    // Positive increment: continue while index < limit.
    asm.bind(positive)?;
    asm.cmp_rr(Reg::Rcx, Reg::Rdx);
    asm.jcc(Cond::L, do_lbl);
    asm.bind(done)?;
    asm.bind(loop_lbl)?;
    asm.bind(leave_lbl)?;
    pop_rs(asm, Reg::Rcx);
    pop_rs(asm, Reg::Rdx);
    m.do_loop_depth -= 1;
    Ok(())
}

// ── loop indices ──

/// Innermost loop index: RS offset 0.
pub(crate) fn gen_i(m: &mut Machine) -> Result<(), MachineError> {
    if m.do_loop_depth == 0 {
        return Err(CompileError::LoopDepth("i", 1).into());
    }
    let asm = &mut m.jit.asm;
    asm.mov_rm(Reg::Rcx, Mem::base(RRS));
    super::push_ds(asm, Reg::Rcx);
    Ok(())
}

/// Next-outer loop index: each open loop occupies two RS cells (index on
/// top of its limit), so the outer index sits two cells down.
pub(crate) fn gen_j(m: &mut Machine) -> Result<(), MachineError> {
    if m.do_loop_depth < 2 {
        return Err(CompileError::LoopDepth("j", 2).into());
    }
    let asm = &mut m.jit.asm;
    asm.mov_rm(Reg::Rax, Mem::disp(RRS, 2 * 8));
    super::push_ds(asm, Reg::Rax);
    Ok(())
}

/// Next-next-outer loop index: four RS cells down.
pub(crate) fn gen_k(m: &mut Machine) -> Result<(), MachineError> {
    if m.do_loop_depth < 3 {
        return Err(CompileError::LoopDepth("k", 3).into());
    }
    let asm = &mut m.jit.asm;
    asm.mov_rm(Reg::Rax, Mem::disp(RRS, 4 * 8));
    super::push_ds(asm, Reg::Rax);
    Ok(())
}

// ── leave / exit ──

/// Jump to the innermost loop's leave label. The frame stack is searched,
/// not popped.
pub(crate) fn gen_leave(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word("leave");
    let target = m
        .cflow
        .innermost_leave()
        .ok_or(CompileError::LeaveOutsideLoop)?;
    m.jit.asm.jmp(target);
    Ok(())
}

/// Jump to the function's exit label. Open loop frames between here and the
/// function frame are not unwound; any counters they pushed stay on the
/// return stack.
pub(crate) fn gen_exit(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word("exit");
    let target = m
        .cflow
        .innermost_exit()
        .ok_or(CompileError::ExitOutsideFunction)?;
    m.jit.asm.jmp(target);
    Ok(())
}
