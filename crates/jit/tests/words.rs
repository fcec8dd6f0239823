//! End-to-end tests: interpret real input, execute the generated code, and
//! check what is left on the data stack.

use fjord_jit::{Machine, MachineConfig, MachineError};
use serial_test::serial;

fn machine() -> Machine {
    Machine::new().expect("machine construction")
}

fn run(m: &mut Machine, input: &str) {
    if let Err(e) = m.interpret(input) {
        panic!("interpret `{}` failed: {}", input, e);
    }
}

fn top(m: &mut Machine) -> i64 {
    m.ds_pop().expect("data stack should not be empty") as i64
}

/// Run `input` on a fresh machine and check the cell at the apex of the
/// data stack, plus canary integrity.
fn check(input: &str, expected: i64) {
    let mut m = machine();
    run(&mut m, input);
    assert_eq!(top(&mut m), expected, "input: {}", input);
    assert!(m.canaries_intact(), "canaries clobbered by: {}", input);
}

fn expect_err(input: &str) -> MachineError {
    let mut m = machine();
    m.interpret(input)
        .expect_err(&format!("`{}` should fail", input))
}

// ── the six specification scenarios ──

#[test]
fn test_scenario_addition() {
    check("16 16 +", 32);
}

#[test]
fn test_scenario_square() {
    check(": sq dup * ;  5 sq", 25);
}

#[test]
fn test_scenario_counted_loop() {
    check(": cnt 0 11 1 do i + loop ;  cnt", 55);
}

#[test]
fn test_scenario_begin_while_again() {
    check(": ba 0 begin dup 10 < while 1+ again ;  ba", 10);
}

#[test]
fn test_scenario_begin_until_with_leave() {
    check(": bu 0 begin 1+ dup 5 > if leave then dup 10 = until ;  0 bu", 6);
}

#[test]
fn test_scenario_locals_add() {
    check(": tl { a b } a b + ;  10 1 tl", 11);
}

// ── arithmetic and logic ──

#[test]
fn test_arithmetic() {
    check("1 2 3 + +", 6);
    check("10 2 -", 8);
    check("6 3 *", 18);
    check("8 2 /", 4);
    check("7 2 /", 3);
    check("-9 3 /", -3);
    check("-7 2 /", -3); // idiv truncates toward zero
    check("-3 -4 *", 12);
}

#[test]
fn test_logic() {
    check("12 10 and", 8);
    check("12 10 or", 14);
    check("12 10 xor", 6);
    check("0 not", -1);
    check("-1 not", 0);
}

#[test]
fn test_comparisons_use_minus_one_for_true() {
    check("3 4 <", -1);
    check("4 3 <", 0);
    check("5 5 =", -1);
    check("5 6 =", 0);
    check("7 2 >", -1);
    check("2 7 >", 0);
    check("-5 3 <", -1); // signed compare
}

#[test]
fn test_specialised_constants_and_shifts() {
    check("8 8*", 64);
    check("1987 1+", 1988);
    check("1987 1-", 1986);
    check("5 2+", 7);
    check("5 2-", 3);
    check("3 16+", 19);
    check("20 16-", 4);
    check("5 2*", 10);
    check("5 4*", 20);
    check("3 16*", 48);
    check("64 2/", 32);
    check("64 4/", 16);
    check("64 8/", 8);
    check("-8 2/", -4); // arithmetic shift
    check("7 10*", 70);
    check("-1", -1);
}

// ── stack juggling ──

#[test]
fn test_juggling() {
    check("1 2 3 rot", 1);
    check("1 2 3 over", 2);
    check("1 2 3 swap", 2);
    check("1 2 nip", 2);
    check("5 dup +", 10);
    check("1 2 tuck +", 3); // ( 1 2 -- 2 1 2 ), + -> ( 2 3 )
    check("10 20 30 0 pick", 30);
    check("10 20 30 2 pick", 10);
}

#[test]
fn test_roundtrips_leave_stack_unchanged() {
    check("9 dup drop", 9);
    check("1 2 swap swap", 2);
    let mut m = machine();
    run(&mut m, "42 >r r>");
    assert_eq!(top(&mut m), 42);
    assert_eq!(m.ds_depth(), 0);
    assert_eq!(m.rs_depth(), 0);
}

#[test]
fn test_return_stack_words() {
    let mut m = machine();
    run(&mut m, ": rr 42 >r r@ r> drop ;  rr");
    assert_eq!(top(&mut m), 42);
    assert_eq!(m.rs_depth(), 0);
}

#[test]
fn test_depth_counts_cells() {
    let mut m = machine();
    run(&mut m, "1 2 3 4 5 depth");
    assert_eq!(top(&mut m), 5);
    assert_eq!(m.ds_depth(), 5);
}

#[test]
fn test_pointer_accessors() {
    check("sp@ spbase =", -1);
}

// ── memory access ──

#[test]
fn test_variable_store_fetch() {
    check("variable v  123 v !  v @", 123);
    check("variable w  7 to w  w @", 7);
}

#[test]
fn test_value_and_to() {
    check("10 value fred  fred fred +", 20);
    check("10 value barney  55 to barney  barney", 55);
    check("1 value dino  : setd 99 to dino ;  setd dino", 99);
}

// ── control flow ──

#[test]
fn test_if_else_then() {
    check(": t 1 if 10 else 20 then ;  t", 10);
    check(": t 0 if 10 else 20 then ;  t", 20);
    check(": t 0 if 99 then 7 ;  t", 7);
    check(": t -1 if 99 then ;  t", 99);
}

#[test]
fn test_do_loop_boundaries() {
    // limit == start still runs the body once under the post-test jl.
    check(": one 0 5 5 do 1+ loop ;  one", 1);
    check(": ten 0 10 0 do 1+ loop ;  ten", 10);
}

#[test]
fn test_plus_loop_positive_step() {
    check(": ev 0 10 0 do i + 2 +loop ;  ev", 20);
}

#[test]
fn test_plus_loop_negative_step_terminates() {
    check(": dn 0 0 10 do i + -1 +loop ;  dn", 55);
}

#[test]
fn test_nested_loop_indices() {
    check(": nj 0 3 0 do 3 0 do j + loop loop ;  nj", 9);
    check(": nk 0 2 0 do 2 0 do 2 0 do k + loop loop loop ;  nk", 4);
}

#[test]
fn test_loop_counters_leave_rs_clean() {
    let mut m = machine();
    run(&mut m, ": cnt 0 11 1 do i + loop ;  cnt");
    assert_eq!(top(&mut m), 55);
    assert_eq!(m.rs_depth(), 0);
}

#[test]
fn test_leave_from_do_loop_restores_rs() {
    let mut m = machine();
    run(&mut m, ": lv 0 100 0 do 1+ i 4 > if leave then loop ;  lv");
    assert_eq!(top(&mut m), 6);
    assert_eq!(m.rs_depth(), 0);
}

#[test]
fn test_exit_skips_rest_of_word() {
    let mut m = machine();
    run(&mut m, ": ex 1 exit 2 ;  ex");
    assert_eq!(m.ds_depth(), 1);
    assert_eq!(top(&mut m), 1);
}

#[test]
fn test_begin_until_counts() {
    check(": c5 0 begin 1+ dup 5 = until ;  c5", 5);
}

// ── locals ──

#[test]
fn test_first_declared_argument_receives_tos() {
    check(": fst { a b } a ;  10 1 fst", 1);
    check(": snd { a b } b ;  10 1 snd", 10);
}

#[test]
fn test_locals_return_values() {
    let mut m = machine();
    run(&mut m, ": lr { a b | t -- r } a b + to r ;  3 4 lr");
    assert_eq!(top(&mut m), 7);
    assert_eq!(m.ds_depth(), 0);
}

#[test]
fn test_body_locals_are_zeroed() {
    check(": z { a | t } t ;  99 z", 0);
}

#[test]
fn test_locals_shadow_dictionary_words() {
    // A local named `dup` hides the primitive for the body's duration.
    check(": sh { dup } dup dup + ;  21 sh", 42);
}

// ── definitions and the dictionary ──

#[test]
fn test_definition_then_use_on_one_line() {
    check("16 : dbl 2* ;  dbl", 32);
}

#[test]
fn test_words_calling_words() {
    check(": sq dup * ;  : quad sq sq ;  3 quad", 81);
}

#[test]
fn test_redefinition_is_skipped_with_original_kept() {
    let mut m = machine();
    run(&mut m, ": sq dup * ;");
    run(&mut m, ": sq dup + ;"); // skipped, diagnostic printed
    run(&mut m, "5 sq");
    assert_eq!(top(&mut m), 25);
}

#[test]
fn test_forget_removes_latest() {
    let mut m = machine();
    run(&mut m, ": tmp 42 ;  forget");
    let err = m.interpret("tmp").expect_err("tmp should be forgotten");
    assert!(matches!(
        err,
        MachineError::Compile(fjord_jit::CompileError::UnknownWord(_))
    ));
}

// ── strings ──

#[test]
fn test_squote_pushes_string_address() {
    let mut m = machine();
    run(&mut m, r#"s" hello world""#);
    assert_eq!(m.ss_depth(), 1);
    let addr = m.ss_pop().unwrap();
    let text = unsafe { std::ffi::CStr::from_ptr(addr as *const std::os::raw::c_char) };
    assert_eq!(text.to_str().unwrap(), "hello world");
}

#[test]
fn test_svalue_creates_string_word() {
    let mut m = machine();
    run(&mut m, r#"s" greetings" svalue hail"#);
    assert_eq!(m.ss_depth(), 0);
    run(&mut m, "hail");
    let addr = m.ss_pop().unwrap();
    let text = unsafe { std::ffi::CStr::from_ptr(addr as *const std::os::raw::c_char) };
    assert_eq!(text.to_str().unwrap(), "greetings");
}

#[test]
fn test_dot_quote_compiles_and_runs() {
    let mut m = machine();
    run(&mut m, r#": hi ." hey" ;  hi"#);
    assert_eq!(m.ds_depth(), 0);
}

#[test]
fn test_comments_are_ignored() {
    check(": sq ( n -- n*n ) dup * ;  4 sq", 16);
}

// ── errors ──

#[test]
fn test_unknown_word_is_reported() {
    let err = expect_err("definitely-not-a-word");
    assert!(matches!(
        err,
        MachineError::Compile(fjord_jit::CompileError::UnknownWord(_))
    ));
}

#[test]
fn test_leave_outside_loop_is_a_compile_error() {
    let err = expect_err(": bad leave ;");
    assert!(matches!(
        err,
        MachineError::Compile(fjord_jit::CompileError::LeaveOutsideLoop)
    ));
}

#[test]
fn test_j_and_k_need_nesting() {
    let err = expect_err(": bad 10 0 do j loop ;");
    assert!(matches!(
        err,
        MachineError::Compile(fjord_jit::CompileError::LoopDepth("j", 2))
    ));
    let err = expect_err(": bad 10 0 do 10 0 do k loop loop ;");
    assert!(matches!(
        err,
        MachineError::Compile(fjord_jit::CompileError::LoopDepth("k", 3))
    ));
}

#[test]
fn test_mismatched_control_flow_is_rejected() {
    assert!(matches!(
        expect_err(": bad 1 if 2 ;"),
        MachineError::Compile(fjord_jit::CompileError::ControlMismatch(_))
    ));
    assert!(matches!(
        expect_err(": bad loop ;"),
        MachineError::Compile(fjord_jit::CompileError::ControlMismatch(_))
    ));
    assert!(matches!(
        expect_err(": bad then ;"),
        MachineError::Compile(fjord_jit::CompileError::ControlMismatch(_))
    ));
}

#[test]
fn test_missing_semicolon_and_name() {
    assert!(matches!(
        expect_err(": bad dup"),
        MachineError::Compile(fjord_jit::CompileError::MissingSemicolon)
    ));
    assert!(matches!(
        expect_err(":"),
        MachineError::Compile(fjord_jit::CompileError::MissingName(_))
    ));
}

#[test]
fn test_interp_only_word_inside_definition_is_rejected() {
    assert!(matches!(
        expect_err(": bad 1 value x ;"),
        MachineError::Compile(fjord_jit::CompileError::NotCompilable(_))
    ));
}

#[test]
fn test_failed_definition_leaves_machine_usable() {
    let mut m = machine();
    assert!(m.interpret(": bad no-such-word ;").is_err());
    run(&mut m, ": good 2 3 + ;  good");
    assert_eq!(top(&mut m), 5);
    assert!(m.dictionary().find("bad").is_none());
}

#[test]
fn test_host_pop_underflow_is_reported() {
    let mut m = machine();
    let err = m.ds_pop().expect_err("empty stack");
    assert!(matches!(err, MachineError::Stack(_)));
}

// ── mixed programs ──

#[test]
fn test_interpret_mode_primitives_run_via_trampoline() {
    check("1 2 3 rot drop drop", 2);
    check("5 1+ 1+ 1-", 6);
}

#[test]
fn test_prelude_vocabulary() {
    let mut m = machine();
    fjord_jit::prelude::install(&mut m).expect("prelude compiles");
    run(&mut m, "7 sq");
    assert_eq!(top(&mut m), 49);
    run(&mut m, "3 cube");
    assert_eq!(top(&mut m), 27);
    run(&mut m, "-5 abs");
    assert_eq!(top(&mut m), 5);
    run(&mut m, "5 abs");
    assert_eq!(top(&mut m), 5);
    run(&mut m, "3 9 max");
    assert_eq!(top(&mut m), 9);
    run(&mut m, "9 3 max");
    assert_eq!(top(&mut m), 9);
    run(&mut m, "3 9 min");
    assert_eq!(top(&mut m), 3);
    run(&mut m, "4 negate");
    assert_eq!(top(&mut m), -4);
    run(&mut m, "1 2 2dup + + +");
    assert_eq!(top(&mut m), 6);
    assert_eq!(m.ds_depth(), 0);
    assert!(m.canaries_intact());
}

#[test]
fn test_introspection_words_run() {
    let mut m = machine();
    run(&mut m, ": sq dup * ;");
    run(&mut m, "words");
    run(&mut m, "see sq");
    run(&mut m, ".s");
    assert_eq!(m.ds_depth(), 0);
}

#[test]
fn test_each_definition_publishes_a_page() {
    let mut m = machine();
    let before = m.page_count();
    run(&mut m, ": a1 1 ;");
    run(&mut m, ": a2 2 ;");
    assert_eq!(m.page_count(), before + 2);
}

#[test]
#[serial]
fn test_loop_check_escape_breaks_runaway_loop() {
    let mut m = Machine::with_config(MachineConfig::new().with_loop_check(true))
        .expect("machine construction");
    run(&mut m, ": inf begin again ;");
    fjord_core::raise_escape();
    // The escape poll in the loop closer observes the flag and jumps to the
    // leave label, so this returns instead of spinning.
    run(&mut m, "inf");
    fjord_core::clear_escape();
    assert!(m.canaries_intact());
}

#[test]
fn test_script_from_file() {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, ": sq dup * ;").unwrap();
    writeln!(file, "6 sq").unwrap();
    let text = std::fs::read_to_string(file.path()).unwrap();
    let mut m = machine();
    run(&mut m, &text);
    assert_eq!(top(&mut m), 36);
}

#[test]
fn test_larger_program() {
    let mut m = machine();
    run(
        &mut m,
        ": fib { n } 0 1 n 0 do over over + rot drop loop drop ;",
    );
    run(&mut m, "10 fib");
    assert_eq!(top(&mut m), 55);
    assert!(m.canaries_intact());
}
