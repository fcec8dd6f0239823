//! Host helpers called from generated code.
//!
//! Every function here is `extern "C"` with the SysV calling convention:
//! the single argument (if any) arrives in RDI, the result (if any) leaves
//! in RAX. Callee-saved registers, including the four pinned stack
//! registers, are preserved by the ABI.
//!
//! Helpers that touch the stacks take a raw [`StackSet`] pointer; the
//! generator spills the pinned registers to the pointer cells before such a
//! call and reloads them after, so the helper always observes live
//! pointers.

use crate::stacks::StackSet;
use std::io::Write;
use std::os::raw::c_char;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative-cancellation flag polled by generated loop closers.
static ESCAPE: AtomicBool = AtomicBool::new(false);

/// Arm the escape flag (the REPL's SIGINT handler calls this).
pub fn raise_escape() {
    ESCAPE.store(true, Ordering::SeqCst);
}

/// Clear the escape flag (the REPL does this before each line).
pub fn clear_escape() {
    ESCAPE.store(false, Ordering::SeqCst);
}

/// `escape_pressed()` poll: non-zero once [`raise_escape`] has been called.
#[unsafe(no_mangle)]
pub extern "C" fn fjord_escape_pressed() -> u64 {
    u64::from(ESCAPE.load(Ordering::SeqCst))
}

/// `emit`: write the low byte of a cell to stdout.
#[unsafe(no_mangle)]
pub extern "C" fn fjord_emit_byte(cell: u64) {
    let byte = [(cell & 0xFF) as u8];
    let mut out = std::io::stdout();
    let _ = out.write_all(&byte);
    let _ = out.flush();
}

/// `.`: print a cell as signed decimal followed by a space.
#[unsafe(no_mangle)]
pub extern "C" fn fjord_print_signed(n: i64) {
    let mut out = std::io::stdout();
    let _ = write!(out, "{} ", n);
    let _ = out.flush();
}

/// `."`: print a NUL-terminated string.
///
/// # Safety
/// `p` must point to a valid NUL-terminated byte sequence; in practice it is
/// an interner address baked into generated code, valid for the entry's
/// lifetime.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fjord_puts(p: *const c_char) {
    if p.is_null() {
        return;
    }
    let text = unsafe { std::ffi::CStr::from_ptr(p) }.to_string_lossy();
    let mut out = std::io::stdout();
    let _ = out.write_all(text.as_bytes());
    let _ = out.flush();
}

/// `depth`: push the data-stack depth (in cells) onto the data stack.
///
/// # Safety
/// `stacks` must point to the live [`StackSet`] of the executing machine,
/// with the pinned registers spilled to its pointer cells.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fjord_depth(stacks: *mut StackSet) {
    if stacks.is_null() {
        return;
    }
    let stacks = unsafe { &mut *stacks };
    let depth = stacks.depth_ds() as u64;
    if let Err(e) = stacks.push_ds(depth) {
        tracing::warn!("depth: {}", e);
    }
}

/// `.s`: dump depths and top cells of the stacks.
///
/// # Safety
/// Same contract as [`fjord_depth`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fjord_dot_s(stacks: *mut StackSet) {
    if stacks.is_null() {
        return;
    }
    unsafe { &*stacks }.display_stacks();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_escape_flag_roundtrip() {
        clear_escape();
        assert_eq!(fjord_escape_pressed(), 0);
        raise_escape();
        assert_eq!(fjord_escape_pressed(), 1);
        clear_escape();
        assert_eq!(fjord_escape_pressed(), 0);
    }

    #[test]
    fn test_depth_pushes_cell_count() {
        let mut stacks = StackSet::new();
        stacks.push_ds(10).unwrap();
        stacks.push_ds(20).unwrap();
        unsafe { fjord_depth(&mut stacks) };
        assert_eq!(stacks.pop_ds().unwrap(), 2);
        assert_eq!(stacks.depth_ds(), 2);
    }

    #[test]
    fn test_depth_null_is_ignored() {
        unsafe { fjord_depth(std::ptr::null_mut()) };
    }
}
