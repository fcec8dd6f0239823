//! Base vocabulary registration.
//!
//! Plain primitives get both slots: the generator for inline emission
//! inside definitions, and a prebuilt compiled body (the generator wrapped
//! between prologue and epilogue) for interpret mode. Control-flow words
//! are generator-only — they make no sense outside a definition.
//! Token-consuming words get their immediate slots.

use crate::codegen::{control, immediates, locals, primitives as prim};
use crate::dictionary::{Handler, WordState};
use crate::error::MachineError;
use crate::machine::Machine;

/// Words with a generator and a prebuilt compiled entry.
const PRIMITIVES: &[(&str, Handler)] = &[
    ("+", prim::gen_plus),
    ("-", prim::gen_sub),
    ("*", prim::gen_mul),
    ("/", prim::gen_div),
    ("and", prim::gen_and),
    ("or", prim::gen_or),
    ("xor", prim::gen_xor),
    ("not", prim::gen_not),
    ("=", prim::gen_eq),
    ("<", prim::gen_lt),
    (">", prim::gen_gt),
    ("dup", prim::gen_dup),
    ("drop", prim::gen_drop),
    ("swap", prim::gen_swap),
    ("over", prim::gen_over),
    ("rot", prim::gen_rot),
    ("nip", prim::gen_nip),
    ("tuck", prim::gen_tuck),
    ("pick", prim::gen_pick),
    (">r", prim::gen_to_r),
    ("r>", prim::gen_r_from),
    ("r@", prim::gen_r_fetch),
    ("sp@", prim::gen_sp_fetch),
    ("sp!", prim::gen_sp_store),
    ("rp@", prim::gen_rp_fetch),
    ("rp!", prim::gen_rp_store),
    ("@", prim::gen_fetch),
    ("!", prim::gen_store),
    ("emit", prim::gen_emit),
    (".", prim::gen_dot),
    (".s", prim::gen_dot_s),
    ("words", prim::gen_words),
    ("depth", prim::gen_depth),
    ("forget", prim::gen_forget),
    ("1", prim::gen_push1),
    ("2", prim::gen_push2),
    ("3", prim::gen_push3),
    ("4", prim::gen_push4),
    ("8", prim::gen_push8),
    ("16", prim::gen_push16),
    ("32", prim::gen_push32),
    ("64", prim::gen_push64),
    ("-1", prim::gen_push_neg1),
    ("spbase", prim::gen_spbase),
    ("1+", prim::gen_one_inc),
    ("1-", prim::gen_one_dec),
    ("2+", prim::gen_two_inc),
    ("2-", prim::gen_two_dec),
    ("16+", prim::gen_sixteen_inc),
    ("16-", prim::gen_sixteen_dec),
    ("2*", prim::gen_two_mul),
    ("4*", prim::gen_four_mul),
    ("8*", prim::gen_eight_mul),
    ("16*", prim::gen_sixteen_mul),
    ("2/", prim::gen_two_div),
    ("4/", prim::gen_four_div),
    ("8/", prim::gen_eight_div),
    ("10*", prim::gen_mul_by_10),
];

/// Generator-only control-flow words.
const CONTROL: &[(&str, Handler)] = &[
    ("if", control::gen_if),
    ("else", control::gen_else),
    ("then", control::gen_then),
    ("begin", control::gen_begin),
    ("again", control::gen_again),
    ("until", control::gen_until),
    ("while", control::gen_while),
    ("repeat", control::gen_repeat),
    ("do", control::gen_do),
    ("loop", control::gen_loop),
    ("+loop", control::gen_plus_loop),
    ("i", control::gen_i),
    ("j", control::gen_j),
    ("k", control::gen_k),
    ("leave", control::gen_leave),
    ("exit", control::gen_exit),
];

/// Interpret-immediate words (token-consuming definers and inspectors).
const INTERP_IMMEDIATE: &[(&str, Handler)] = &[
    ("value", immediates::value_interp),
    ("variable", immediates::variable_interp),
    ("svalue", immediates::svalue_interp),
    ("see", immediates::see_interp),
];

/// Register the base vocabulary into a fresh machine.
pub(crate) fn install(m: &mut Machine) -> Result<(), MachineError> {
    for &(name, generator) in PRIMITIVES {
        let compiled = m.build_word(generator)?;
        m.dict_mut()
            .add(name, Some(generator), Some(compiled), None, None)?;
    }
    for &(name, generator) in CONTROL {
        m.dict_mut().add(name, Some(generator), None, None, None)?;
    }
    for &(name, handler) in INTERP_IMMEDIATE {
        m.dict_mut().add(name, None, None, None, Some(handler))?;
        m.dict_mut().set_state(WordState::InterpImmediate);
    }
    m.dict_mut()
        .add("{", None, None, Some(locals::gen_left_brace), None)?;
    m.dict_mut().add(
        "to",
        None,
        None,
        Some(immediates::to_compile),
        Some(immediates::to_interp),
    )?;
    m.dict_mut().set_state(WordState::InterpImmediate);
    m.dict_mut().add(
        "s\"",
        None,
        None,
        Some(immediates::squote_compile),
        Some(immediates::squote_interp),
    )?;
    m.dict_mut().set_state(WordState::InterpImmediate);
    m.dict_mut().add(
        ".\"",
        None,
        None,
        Some(immediates::dotquote_compile),
        Some(immediates::dotquote_interp),
    )?;
    m.dict_mut().set_state(WordState::InterpImmediate);
    Ok(())
}
