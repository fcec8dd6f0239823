//! Inline emitters for the primitive words.
//!
//! Each generator emits a short, self-contained sequence against the pinned
//! registers. Comparisons produce 0 for false and -1 (all bits set) for
//! true, the classical convention. Division is signed (`cqo`/`idiv`);
//! division by zero is not intercepted.

use super::{pop_ds, pop_rs, push_ds, push_rs, RDS, RRS};
use crate::asm::{Cond, Mem, Reg};
use crate::error::MachineError;
use crate::machine::Machine;

// ── arithmetic ──

pub(crate) fn gen_plus(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word("+");
    let asm = &mut m.jit.asm;
    pop_ds(asm, Reg::Rax);
    pop_ds(asm, Reg::Rcx);
    asm.add_rr(Reg::Rcx, Reg::Rax);
    push_ds(asm, Reg::Rcx);
    Ok(())
}

pub(crate) fn gen_sub(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word("-");
    let asm = &mut m.jit.asm;
    pop_ds(asm, Reg::Rax);
    pop_ds(asm, Reg::Rcx);
    asm.sub_rr(Reg::Rcx, Reg::Rax);
    push_ds(asm, Reg::Rcx);
    Ok(())
}

pub(crate) fn gen_mul(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word("*");
    let asm = &mut m.jit.asm;
    pop_ds(asm, Reg::Rax);
    pop_ds(asm, Reg::Rcx);
    asm.imul_rr(Reg::Rcx, Reg::Rax);
    push_ds(asm, Reg::Rcx);
    Ok(())
}

pub(crate) fn gen_div(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word("/");
    let asm = &mut m.jit.asm;
    pop_ds(asm, Reg::Rcx); // divisor
    pop_ds(asm, Reg::Rax); // dividend
    asm.cqo();
    asm.idiv_r(Reg::Rcx);
    push_ds(asm, Reg::Rax);
    Ok(())
}

/// Push the literal held in the context's `uint64_a` slot.
pub(crate) fn gen_push_long(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word("push long");
    let value = m.jit.uint64_a;
    let asm = &mut m.jit.asm;
    asm.mov_ri(Reg::Rcx, value);
    push_ds(asm, Reg::Rcx);
    Ok(())
}

/// Add the `uint64_a` literal to TOS.
pub(crate) fn gen_plus_long(m: &mut Machine) -> Result<(), MachineError> {
    let value = m.jit.uint64_a;
    let asm = &mut m.jit.asm;
    pop_ds(asm, Reg::Rax);
    if let Ok(imm) = i32::try_from(value as i64) {
        asm.add_ri(Reg::Rax, imm);
    } else {
        asm.mov_ri(Reg::Rcx, value);
        asm.add_rr(Reg::Rax, Reg::Rcx);
    }
    push_ds(asm, Reg::Rax);
    Ok(())
}

/// Subtract the `uint64_a` literal from TOS.
pub(crate) fn gen_sub_long(m: &mut Machine) -> Result<(), MachineError> {
    let value = m.jit.uint64_a;
    let asm = &mut m.jit.asm;
    pop_ds(asm, Reg::Rax);
    if let Ok(imm) = i32::try_from(value as i64) {
        asm.sub_ri(Reg::Rax, imm);
    } else {
        asm.mov_ri(Reg::Rcx, value);
        asm.sub_rr(Reg::Rax, Reg::Rcx);
    }
    push_ds(asm, Reg::Rax);
    Ok(())
}

// ── logic ──

pub(crate) fn gen_and(m: &mut Machine) -> Result<(), MachineError> {
    let asm = &mut m.jit.asm;
    pop_ds(asm, Reg::Rax);
    pop_ds(asm, Reg::Rcx);
    asm.and_rr(Reg::Rcx, Reg::Rax);
    push_ds(asm, Reg::Rcx);
    Ok(())
}

pub(crate) fn gen_or(m: &mut Machine) -> Result<(), MachineError> {
    let asm = &mut m.jit.asm;
    pop_ds(asm, Reg::Rax);
    pop_ds(asm, Reg::Rcx);
    asm.or_rr(Reg::Rcx, Reg::Rax);
    push_ds(asm, Reg::Rcx);
    Ok(())
}

pub(crate) fn gen_xor(m: &mut Machine) -> Result<(), MachineError> {
    let asm = &mut m.jit.asm;
    pop_ds(asm, Reg::Rax);
    pop_ds(asm, Reg::Rcx);
    asm.xor_rr(Reg::Rcx, Reg::Rax);
    push_ds(asm, Reg::Rcx);
    Ok(())
}

/// Bitwise complement of TOS, in place.
pub(crate) fn gen_not(m: &mut Machine) -> Result<(), MachineError> {
    let asm = &mut m.jit.asm;
    asm.mov_rm(Reg::Rax, Mem::base(RDS));
    asm.not_r(Reg::Rax);
    asm.mov_mr(Mem::base(RDS), Reg::Rax);
    Ok(())
}

// ── comparisons ──

fn gen_compare(m: &mut Machine, cond: Cond) {
    let asm = &mut m.jit.asm;
    pop_ds(asm, Reg::Rax); // b
    pop_ds(asm, Reg::Rcx); // a
    asm.cmp_rr(Reg::Rcx, Reg::Rax);
    asm.set_cc_al(cond);
    asm.movzx_r_al(Reg::Rax);
    asm.neg_r(Reg::Rax); // 1 -> -1, 0 -> 0
    push_ds(asm, Reg::Rax);
}

pub(crate) fn gen_eq(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word("=");
    gen_compare(m, Cond::E);
    Ok(())
}

pub(crate) fn gen_lt(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word("<");
    gen_compare(m, Cond::L);
    Ok(())
}

pub(crate) fn gen_gt(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word(">");
    gen_compare(m, Cond::G);
    Ok(())
}

// ── stack juggling ──

pub(crate) fn gen_dup(m: &mut Machine) -> Result<(), MachineError> {
    let asm = &mut m.jit.asm;
    asm.mov_rm(Reg::Rax, Mem::base(RDS));
    push_ds(asm, Reg::Rax);
    Ok(())
}

pub(crate) fn gen_drop(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.asm.add_ri(RDS, 8);
    Ok(())
}

pub(crate) fn gen_swap(m: &mut Machine) -> Result<(), MachineError> {
    let asm = &mut m.jit.asm;
    asm.mov_rm(Reg::Rax, Mem::base(RDS));
    asm.mov_rm(Reg::Rcx, Mem::disp(RDS, 8));
    asm.mov_mr(Mem::base(RDS), Reg::Rcx);
    asm.mov_mr(Mem::disp(RDS, 8), Reg::Rax);
    Ok(())
}

pub(crate) fn gen_over(m: &mut Machine) -> Result<(), MachineError> {
    let asm = &mut m.jit.asm;
    asm.mov_rm(Reg::Rax, Mem::disp(RDS, 8));
    push_ds(asm, Reg::Rax);
    Ok(())
}

/// ( a b c -- b c a )
pub(crate) fn gen_rot(m: &mut Machine) -> Result<(), MachineError> {
    let asm = &mut m.jit.asm;
    asm.mov_rm(Reg::Rax, Mem::base(RDS)); // c
    asm.mov_rm(Reg::Rcx, Mem::disp(RDS, 8)); // b
    asm.mov_rm(Reg::Rdx, Mem::disp(RDS, 16)); // a
    asm.mov_mr(Mem::base(RDS), Reg::Rdx);
    asm.mov_mr(Mem::disp(RDS, 16), Reg::Rcx);
    asm.mov_mr(Mem::disp(RDS, 8), Reg::Rax);
    Ok(())
}

/// ( a b -- b )
pub(crate) fn gen_nip(m: &mut Machine) -> Result<(), MachineError> {
    let asm = &mut m.jit.asm;
    asm.mov_rm(Reg::Rax, Mem::base(RDS));
    asm.add_ri(RDS, 8);
    asm.mov_mr(Mem::base(RDS), Reg::Rax);
    Ok(())
}

/// ( a b -- b a b )
pub(crate) fn gen_tuck(m: &mut Machine) -> Result<(), MachineError> {
    let asm = &mut m.jit.asm;
    asm.mov_rm(Reg::Rax, Mem::base(RDS)); // b
    asm.mov_rm(Reg::Rcx, Mem::disp(RDS, 8)); // a
    asm.sub_ri(RDS, 8);
    asm.mov_mr(Mem::base(RDS), Reg::Rax);
    asm.mov_mr(Mem::disp(RDS, 8), Reg::Rcx);
    asm.mov_mr(Mem::disp(RDS, 16), Reg::Rax);
    Ok(())
}

/// ( xn … x0 n -- xn … x0 xn ): copy the cell at runtime depth n.
pub(crate) fn gen_pick(m: &mut Machine) -> Result<(), MachineError> {
    let asm = &mut m.jit.asm;
    pop_ds(asm, Reg::Rcx);
    asm.shl_ri(Reg::Rcx, 3);
    asm.add_rr(Reg::Rcx, RDS);
    asm.mov_rm(Reg::Rax, Mem::base(Reg::Rcx));
    push_ds(asm, Reg::Rax);
    Ok(())
}

// ── return-stack transfer ──

pub(crate) fn gen_to_r(m: &mut Machine) -> Result<(), MachineError> {
    let asm = &mut m.jit.asm;
    pop_ds(asm, Reg::Rax);
    push_rs(asm, Reg::Rax);
    Ok(())
}

pub(crate) fn gen_r_from(m: &mut Machine) -> Result<(), MachineError> {
    let asm = &mut m.jit.asm;
    pop_rs(asm, Reg::Rax);
    push_ds(asm, Reg::Rax);
    Ok(())
}

pub(crate) fn gen_r_fetch(m: &mut Machine) -> Result<(), MachineError> {
    let asm = &mut m.jit.asm;
    asm.mov_rm(Reg::Rax, Mem::base(RRS));
    push_ds(asm, Reg::Rax);
    Ok(())
}

// ── pointer accessors (unsafe by design) ──

pub(crate) fn gen_sp_fetch(m: &mut Machine) -> Result<(), MachineError> {
    let asm = &mut m.jit.asm;
    asm.mov_rr(Reg::Rax, RDS);
    push_ds(asm, Reg::Rax);
    Ok(())
}

pub(crate) fn gen_sp_store(m: &mut Machine) -> Result<(), MachineError> {
    let asm = &mut m.jit.asm;
    pop_ds(asm, Reg::Rax);
    asm.mov_rr(RDS, Reg::Rax);
    Ok(())
}

pub(crate) fn gen_rp_fetch(m: &mut Machine) -> Result<(), MachineError> {
    let asm = &mut m.jit.asm;
    asm.mov_rr(Reg::Rax, RRS);
    push_ds(asm, Reg::Rax);
    Ok(())
}

pub(crate) fn gen_rp_store(m: &mut Machine) -> Result<(), MachineError> {
    let asm = &mut m.jit.asm;
    pop_ds(asm, Reg::Rax);
    asm.mov_rr(RRS, Reg::Rax);
    Ok(())
}

// ── memory access ──

/// `@` ( addr -- x )
pub(crate) fn gen_fetch(m: &mut Machine) -> Result<(), MachineError> {
    let asm = &mut m.jit.asm;
    pop_ds(asm, Reg::Rax);
    asm.mov_rm(Reg::Rax, Mem::base(Reg::Rax));
    push_ds(asm, Reg::Rax);
    Ok(())
}

/// `!` ( x addr -- )
pub(crate) fn gen_store(m: &mut Machine) -> Result<(), MachineError> {
    let asm = &mut m.jit.asm;
    pop_ds(asm, Reg::Rcx); // address
    pop_ds(asm, Reg::Rax); // value
    asm.mov_mr(Mem::base(Reg::Rcx), Reg::Rax);
    Ok(())
}

// ── constants ──

fn gen_push_constant(m: &mut Machine, value: i64) {
    let asm = &mut m.jit.asm;
    if let Ok(imm) = i32::try_from(value) {
        asm.sub_ri(RDS, 8);
        asm.mov_mi32(Mem::base(RDS), imm);
    } else {
        asm.mov_ri(Reg::Rcx, value as u64);
        push_ds(asm, Reg::Rcx);
    }
}

macro_rules! push_const_fn {
    ($name:ident, $value:expr) => {
        pub(crate) fn $name(m: &mut Machine) -> Result<(), MachineError> {
            gen_push_constant(m, $value);
            Ok(())
        }
    };
}

push_const_fn!(gen_push1, 1);
push_const_fn!(gen_push2, 2);
push_const_fn!(gen_push3, 3);
push_const_fn!(gen_push4, 4);
push_const_fn!(gen_push8, 8);
push_const_fn!(gen_push16, 16);
push_const_fn!(gen_push32, 32);
push_const_fn!(gen_push64, 64);
push_const_fn!(gen_push_neg1, -1);

/// `spbase`: base address of the data stack.
pub(crate) fn gen_spbase(m: &mut Machine) -> Result<(), MachineError> {
    let base = m.stacks().top_of_ds();
    let asm = &mut m.jit.asm;
    asm.mov_ri(Reg::Rax, base);
    push_ds(asm, Reg::Rax);
    Ok(())
}

// ── specialised increment/decrement ──

pub(crate) fn gen_one_inc(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.asm.inc_m(Mem::base(RDS));
    Ok(())
}

pub(crate) fn gen_one_dec(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.asm.dec_m(Mem::base(RDS));
    Ok(())
}

macro_rules! inc_dec_fn {
    ($name:ident, $op:ident, $value:expr) => {
        pub(crate) fn $name(m: &mut Machine) -> Result<(), MachineError> {
            m.jit.uint64_a = $value;
            $op(m)
        }
    };
}

inc_dec_fn!(gen_two_inc, gen_plus_long, 2);
inc_dec_fn!(gen_sixteen_inc, gen_plus_long, 16);
inc_dec_fn!(gen_two_dec, gen_sub_long, 2);
inc_dec_fn!(gen_sixteen_dec, gen_sub_long, 16);

// ── shift multiply/divide ──

fn gen_left_shift(m: &mut Machine, count: u8) {
    let asm = &mut m.jit.asm;
    asm.mov_rm(Reg::Rax, Mem::base(RDS));
    asm.shl_ri(Reg::Rax, count);
    asm.mov_mr(Mem::base(RDS), Reg::Rax);
}

fn gen_right_shift(m: &mut Machine, count: u8) {
    let asm = &mut m.jit.asm;
    asm.mov_rm(Reg::Rax, Mem::base(RDS));
    asm.sar_ri(Reg::Rax, count);
    asm.mov_mr(Mem::base(RDS), Reg::Rax);
}

macro_rules! shift_fn {
    ($name:ident, $dir:ident, $count:expr) => {
        pub(crate) fn $name(m: &mut Machine) -> Result<(), MachineError> {
            $dir(m, $count);
            Ok(())
        }
    };
}

shift_fn!(gen_two_mul, gen_left_shift, 1);
shift_fn!(gen_four_mul, gen_left_shift, 2);
shift_fn!(gen_eight_mul, gen_left_shift, 3);
shift_fn!(gen_sixteen_mul, gen_left_shift, 4);
shift_fn!(gen_two_div, gen_right_shift, 1);
shift_fn!(gen_four_div, gen_right_shift, 2);
shift_fn!(gen_eight_div, gen_right_shift, 3);

/// `10*` encoded as (x<<3)+(x<<1).
pub(crate) fn gen_mul_by_10(m: &mut Machine) -> Result<(), MachineError> {
    let asm = &mut m.jit.asm;
    pop_ds(asm, Reg::Rax);
    asm.mov_rr(Reg::Rdx, Reg::Rax);
    asm.shl_ri(Reg::Rdx, 3);
    asm.shl_ri(Reg::Rax, 1);
    asm.add_rr(Reg::Rdx, Reg::Rax);
    push_ds(asm, Reg::Rdx);
    Ok(())
}

// ── host I/O ──

/// `emit` ( c -- ): write the low byte to stdout.
pub(crate) fn gen_emit(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word("emit");
    pop_ds(&mut m.jit.asm, Reg::Rdi);
    m.emit_host_call(fjord_core::fjord_emit_byte as usize as u64);
    Ok(())
}

/// `.` ( n -- ): print as signed decimal.
pub(crate) fn gen_dot(m: &mut Machine) -> Result<(), MachineError> {
    m.jit.comment_with_word(".");
    pop_ds(&mut m.jit.asm, Reg::Rdi);
    m.emit_host_call(fjord_core::fjord_print_signed as usize as u64);
    Ok(())
}

/// `.s`: dump the stacks.
pub(crate) fn gen_dot_s(m: &mut Machine) -> Result<(), MachineError> {
    let target = fjord_core::fjord_dot_s as usize as u64;
    let arg = m.stacks_ptr() as u64;
    m.emit_stack_host_call(target, arg);
    Ok(())
}

/// `depth` ( -- n ): cells on the data stack.
pub(crate) fn gen_depth(m: &mut Machine) -> Result<(), MachineError> {
    let target = fjord_core::fjord_depth as usize as u64;
    let arg = m.stacks_ptr() as u64;
    m.emit_stack_host_call(target, arg);
    Ok(())
}

/// `words`: list the dictionary.
pub(crate) fn gen_words(m: &mut Machine) -> Result<(), MachineError> {
    let target = crate::dictionary::fjord_words as usize as u64;
    let arg = m.dict_ptr() as u64;
    m.emit_stack_host_call(target, arg);
    Ok(())
}

/// `forget`: drop the most recent definition.
pub(crate) fn gen_forget(m: &mut Machine) -> Result<(), MachineError> {
    let target = crate::dictionary::fjord_forget as usize as u64;
    let arg = m.dict_ptr() as u64;
    m.emit_stack_host_call(target, arg);
    Ok(())
}
