//! Executable code pages.
//!
//! Finalised instruction bytes are copied into an anonymous mapping which is
//! then flipped read+execute (W^X). The resulting page owns the code for a
//! compiled word; pages are only unmapped when the machine is dropped.
//! Forgetting a word does not reclaim its page.

use std::fmt;
use std::os::raw::c_void;

/// A compiled word: no arguments, no return value, all communication through
/// the pinned stacks.
pub type WordFn = unsafe extern "C" fn();

/// Failure to publish a code page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// Nothing was emitted.
    Empty,
    /// `mmap` refused the allocation.
    Map(i32),
    /// `mprotect` refused the RX flip.
    Protect(i32),
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::Empty => write!(f, "no code to publish"),
            ExecError::Map(errno) => write!(f, "mmap failed (errno {})", errno),
            ExecError::Protect(errno) => write!(f, "mprotect failed (errno {})", errno),
        }
    }
}

impl std::error::Error for ExecError {}

/// An owned read+execute mapping holding one finalised code stream.
pub struct ExecBuffer {
    ptr: *mut u8,
    map_len: usize,
    code_len: usize,
}

impl ExecBuffer {
    /// Copy `code` into a fresh mapping and make it executable.
    pub fn publish(code: &[u8]) -> Result<Self, ExecError> {
        if code.is_empty() {
            return Err(ExecError::Empty);
        }
        let page = page_size();
        let map_len = code.len().div_ceil(page) * page;
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(ExecError::Map(errno()));
        }
        let ptr = ptr as *mut u8;
        unsafe {
            std::ptr::copy_nonoverlapping(code.as_ptr(), ptr, code.len());
        }
        let rc = unsafe { libc::mprotect(ptr as *mut c_void, map_len, libc::PROT_READ | libc::PROT_EXEC) };
        if rc != 0 {
            let e = errno();
            unsafe {
                libc::munmap(ptr as *mut c_void, map_len);
            }
            return Err(ExecError::Protect(e));
        }
        Ok(ExecBuffer {
            ptr,
            map_len,
            code_len: code.len(),
        })
    }

    /// Entry point of the published code.
    ///
    /// The returned function is only sound to call through the machine's
    /// trampoline (or from other published code), with the pinned-register
    /// contract in force.
    pub fn entry(&self) -> WordFn {
        unsafe { std::mem::transmute::<*mut u8, WordFn>(self.ptr) }
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.code_len
    }

    pub fn is_empty(&self) -> bool {
        self.code_len == 0
    }
}

impl Drop for ExecBuffer {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr as *mut c_void, self.map_len);
        }
    }
}

fn page_size() -> usize {
    let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if sz <= 0 { 4096 } else { sz as usize }
}

fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_execute_ret() {
        // A bare `ret` is callable with the plain C ABI.
        let buf = ExecBuffer::publish(&[0xC3]).unwrap();
        unsafe { buf.entry()() };
    }

    #[test]
    fn test_publish_empty_is_error() {
        assert_eq!(
            ExecBuffer::publish(&[]).map(|_| ()),
            Err(ExecError::Empty)
        );
    }

    #[test]
    fn test_publish_copies_code() {
        let buf = ExecBuffer::publish(&[0x90, 0x90, 0xC3]).unwrap();
        let copied = unsafe { std::slice::from_raw_parts(buf.as_ptr(), buf.len()) };
        assert_eq!(copied, &[0x90, 0x90, 0xC3]);
    }
}
