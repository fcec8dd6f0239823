//! Immediate words: handlers that run during compilation or interpretation
//! and consume forward tokens through the shared cursor.
//!
//! `value`, `variable` and `svalue` create container words at interpret
//! time, emitting a tiny compiled body into a fresh context. `to` updates a
//! container (or a local, in compile mode). `s"` and `."` consume the
//! sentinel token the literal scanner left behind.

use super::{load_ds, load_ss, pop_ds, push_ss, store_ds};
use crate::asm::{Mem, Reg};
use crate::dictionary::WordKind;
use crate::error::{CompileError, MachineError};
use crate::lexer::strip_sentinel;
use crate::machine::Machine;
use tracing::debug;

/// `<x> value <name>` (interpret): create a VALUE word holding `x`.
pub(crate) fn value_interp(m: &mut Machine) -> Result<(), MachineError> {
    let name = m
        .jit
        .next_token()
        .ok_or(CompileError::MissingName("value"))?;
    let initial = m.stacks_mut().pop_ds()?;
    m.jit.reset();
    m.dict_mut().add(&name, None, None, None, None)?;
    m.dict_mut().set_kind(WordKind::Value);
    m.dict_mut().set_data(initial);
    let cell = m.dict().latest_data_addr().expect("entry just added") as u64;
    m.jit.word = name;
    m.jit.comment_with_word("value body");
    load_ds(&mut m.jit.asm, cell);
    m.jit.asm.ret();
    let f = m.finish_word()?;
    m.dict_mut().set_compiled(f);
    debug!(word = %m.jit.word, value = initial, "value defined");
    Ok(())
}

/// `variable <name>` (interpret): create a VARIABLE word whose compiled
/// body pushes the address of its cell.
pub(crate) fn variable_interp(m: &mut Machine) -> Result<(), MachineError> {
    let name = m
        .jit
        .next_token()
        .ok_or(CompileError::MissingName("variable"))?;
    m.jit.reset();
    m.dict_mut().add(&name, None, None, None, None)?;
    m.dict_mut().set_kind(WordKind::Variable);
    m.dict_mut().set_data(0);
    let cell = m.dict().latest_data_addr().expect("entry just added") as u64;
    m.jit.word = name;
    m.jit.comment_with_word("variable body");
    let asm = &mut m.jit.asm;
    asm.mov_ri(Reg::Rax, cell);
    super::push_ds(asm, Reg::Rax);
    asm.ret();
    let f = m.finish_word()?;
    m.dict_mut().set_compiled(f);
    debug!(word = %m.jit.word, cell, "variable defined");
    Ok(())
}

/// `s" text" svalue <name>` (interpret): create a string word from the
/// topmost string-stack index; its compiled body pushes the index back.
pub(crate) fn svalue_interp(m: &mut Machine) -> Result<(), MachineError> {
    let name = m
        .jit
        .next_token()
        .ok_or(CompileError::MissingName("svalue"))?;
    let index = m.stacks_mut().pop_ss()?;
    m.jit.reset();
    m.dict_mut().add(&name, None, None, None, None)?;
    m.dict_mut().set_kind(WordKind::StringValue);
    m.dict_mut().set_data(index);
    let cell = m.dict().latest_data_addr().expect("entry just added") as u64;
    m.jit.word = name;
    m.jit.comment_with_word("string value body");
    load_ss(&mut m.jit.asm, cell);
    m.jit.asm.ret();
    let f = m.finish_word()?;
    m.dict_mut().set_compiled(f);
    debug!(word = %m.jit.word, index, "string value defined");
    Ok(())
}

/// `to <name>` in a definition: store TOS into a local, a VALUE's cell, or
/// through a VARIABLE's cell.
pub(crate) fn to_compile(m: &mut Machine) -> Result<(), MachineError> {
    let name = m.jit.next_token().ok_or(CompileError::MissingName("to"))?;
    m.jit.word = name.clone();

    if let Some(offset) = m.locals.offset_of(&name) {
        m.jit.comment_with_word("to local");
        m.gen_store_local(offset);
        return Ok(());
    }

    let target = m.dict().find(&name).map(|e| (e.kind, e.data));
    let Some((kind, cell)) = target else {
        return Err(CompileError::BadToTarget(name).into());
    };
    match kind {
        WordKind::Value => {
            m.jit.comment_with_word("to value");
            let asm = &mut m.jit.asm;
            asm.mov_ri(Reg::Rax, cell as u64);
            pop_ds(asm, Reg::Rcx);
            asm.mov_mr(Mem::base(Reg::Rax), Reg::Rcx);
        }
        WordKind::Variable => {
            m.jit.comment_with_word("to variable");
            store_ds(&mut m.jit.asm, cell as u64);
        }
        _ => return Err(CompileError::BadToTarget(name).into()),
    }
    Ok(())
}

/// `to <name>` at interpret time.
pub(crate) fn to_interp(m: &mut Machine) -> Result<(), MachineError> {
    let name = m.jit.next_token().ok_or(CompileError::MissingName("to"))?;
    let target = m.dict().find(&name).map(|e| (e.kind, e.data));
    let Some((kind, cell)) = target else {
        return Err(CompileError::BadToTarget(name).into());
    };
    match kind {
        WordKind::Value | WordKind::Variable => {
            let value = m.stacks_mut().pop_ds()?;
            unsafe { *cell = value };
            Ok(())
        }
        _ => Err(CompileError::BadToTarget(name).into()),
    }
}

/// `see <name>`: dump the entry.
pub(crate) fn see_interp(m: &mut Machine) -> Result<(), MachineError> {
    let name = m.jit.next_token().ok_or(CompileError::MissingName("see"))?;
    m.dict().display_word(&name);
    Ok(())
}

fn sentinel_addr(m: &mut Machine, what: &'static str) -> Result<u64, MachineError> {
    let token = m.jit.next_token().ok_or(CompileError::MissingName(what))?;
    strip_sentinel(&token)
        .ok_or_else(|| CompileError::BadLiteralSentinel(token).into())
}

/// `s"` in a definition: push the literal's address onto the string stack
/// at run time.
pub(crate) fn squote_compile(m: &mut Machine) -> Result<(), MachineError> {
    let addr = sentinel_addr(m, "s\"")?;
    m.jit.comment_with_word("s\" stacking text");
    let asm = &mut m.jit.asm;
    asm.mov_ri(Reg::Rcx, addr);
    push_ss(asm, Reg::Rcx);
    Ok(())
}

/// `s"` at interpret time: push the address host-side.
pub(crate) fn squote_interp(m: &mut Machine) -> Result<(), MachineError> {
    let addr = sentinel_addr(m, "s\"")?;
    m.stacks_mut().push_ss(addr)?;
    Ok(())
}

/// `."` in a definition: print the literal at run time.
pub(crate) fn dotquote_compile(m: &mut Machine) -> Result<(), MachineError> {
    let addr = sentinel_addr(m, ".\"")?;
    m.jit.comment_with_word(".\" displaying text");
    m.jit.asm.mov_ri(Reg::Rdi, addr);
    m.emit_host_call(fjord_core::fjord_puts as usize as u64);
    Ok(())
}

/// `."` at interpret time: print immediately.
pub(crate) fn dotquote_interp(m: &mut Machine) -> Result<(), MachineError> {
    let addr = sentinel_addr(m, ".\"")?;
    unsafe { fjord_core::fjord_puts(addr as *const std::os::raw::c_char) };
    Ok(())
}
