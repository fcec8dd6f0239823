//! Refcounted string store for `s"` / `."` literals.
//!
//! Literals are interned once and addressed by index. The backing bytes are
//! NUL-terminated and never move for the lifetime of the entry, so the
//! address can be embedded in generated code as an immediate operand and
//! handed straight to the `puts`-style host helper.
//!
//! Slots are insertion-ordered. Releasing the last reference clears the slot
//! to a tombstone; the store never compacts, and new strings always append.
//!
//! All operations serialise on one mutex. The core itself is single-threaded;
//! the lock exists so an optional UI thread can intern concurrently without
//! corrupting the maps.

use std::collections::HashMap;
use std::ffi::CString;
use std::os::raw::c_char;
use std::sync::Mutex;

struct Slot {
    bytes: CString,
    refs: usize,
}

#[derive(Default)]
struct Inner {
    slots: Vec<Option<Slot>>,
    by_text: HashMap<String, usize>,
}

/// Dense, insertion-ordered store of strings with per-entry reference counts.
#[derive(Default)]
pub struct StringInterner {
    inner: Mutex<Inner>,
}

impl StringInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `text`, returning its index. A repeat insertion bumps the
    /// refcount and returns the existing index.
    pub fn intern(&self, text: &str) -> usize {
        let mut inner = self.inner.lock().expect("interner mutex poisoned");
        if let Some(&idx) = inner.by_text.get(text) {
            if let Some(slot) = inner.slots[idx].as_mut() {
                slot.refs += 1;
                return idx;
            }
        }
        let bytes = CString::new(text.as_bytes().to_vec())
            .unwrap_or_else(|_| CString::new("?").expect("fallback literal"));
        let idx = inner.slots.len();
        inner.slots.push(Some(Slot { bytes, refs: 1 }));
        inner.by_text.insert(text.to_string(), idx);
        idx
    }

    /// The interned text, if the slot is live.
    pub fn string_of(&self, idx: usize) -> Option<String> {
        let inner = self.inner.lock().expect("interner mutex poisoned");
        inner
            .slots
            .get(idx)
            .and_then(|s| s.as_ref())
            .map(|s| s.bytes.to_string_lossy().into_owned())
    }

    /// Address of the NUL-terminated bytes. Valid until the entry's refcount
    /// reaches zero; generated code embedding this address must not outlive
    /// the entry.
    pub fn address_of(&self, idx: usize) -> Option<*const c_char> {
        let inner = self.inner.lock().expect("interner mutex poisoned");
        inner
            .slots
            .get(idx)
            .and_then(|s| s.as_ref())
            .map(|s| s.bytes.as_ptr())
    }

    pub fn incref(&self, idx: usize) {
        let mut inner = self.inner.lock().expect("interner mutex poisoned");
        if let Some(Some(slot)) = inner.slots.get_mut(idx) {
            slot.refs += 1;
        }
    }

    /// Drop one reference; the slot is cleared when the count reaches zero.
    pub fn decref(&self, idx: usize) {
        let mut inner = self.inner.lock().expect("interner mutex poisoned");
        Self::decref_locked(&mut inner, idx);
    }

    /// Release the entry only if this is the last reference.
    pub fn release_if_last(&self, idx: usize) {
        let mut inner = self.inner.lock().expect("interner mutex poisoned");
        let is_last = matches!(inner.slots.get(idx), Some(Some(slot)) if slot.refs == 1);
        if is_last {
            Self::decref_locked(&mut inner, idx);
        }
    }

    /// Current refcount, if the slot is live.
    pub fn refcount(&self, idx: usize) -> Option<usize> {
        let inner = self.inner.lock().expect("interner mutex poisoned");
        inner.slots.get(idx).and_then(|s| s.as_ref()).map(|s| s.refs)
    }

    /// Intern the concatenation of two interned strings.
    pub fn concat(&self, a: usize, b: usize) -> Option<usize> {
        let joined = {
            let inner = self.inner.lock().expect("interner mutex poisoned");
            let left = inner.slots.get(a)?.as_ref()?;
            let right = inner.slots.get(b)?.as_ref()?;
            format!(
                "{}{}",
                left.bytes.to_string_lossy(),
                right.bytes.to_string_lossy()
            )
        };
        Some(self.intern(&joined))
    }

    /// Number of slots ever created (tombstones included).
    pub fn slot_count(&self) -> usize {
        self.inner.lock().expect("interner mutex poisoned").slots.len()
    }

    /// Print every live entry with index, refcount and address.
    pub fn display_list(&self) {
        let inner = self.inner.lock().expect("interner mutex poisoned");
        for (idx, slot) in inner.slots.iter().enumerate() {
            if let Some(slot) = slot {
                println!(
                    "[{}] (Index: {}, Ref Count: {}, Address: {:p})",
                    slot.bytes.to_string_lossy(),
                    idx,
                    slot.refs,
                    slot.bytes.as_ptr()
                );
            }
        }
    }

    fn decref_locked(inner: &mut Inner, idx: usize) {
        let clear = match inner.slots.get_mut(idx) {
            Some(Some(slot)) => {
                slot.refs -= 1;
                slot.refs == 0
            }
            _ => false,
        };
        if clear {
            if let Some(Some(slot)) = inner.slots.get(idx) {
                let text = slot.bytes.to_string_lossy().into_owned();
                inner.by_text.remove(&text);
            }
            inner.slots[idx] = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_idempotent() {
        let interner = StringInterner::new();
        let a = interner.intern("hello");
        let b = interner.intern("hello");
        assert_eq!(a, b);
        assert_eq!(interner.refcount(a), Some(2));
        let text = interner.string_of(a).unwrap();
        assert_eq!(interner.intern(&text), a);
    }

    #[test]
    fn test_distinct_strings_get_distinct_indices() {
        let interner = StringInterner::new();
        let a = interner.intern("one");
        let b = interner.intern("two");
        assert_ne!(a, b);
        assert_eq!(interner.string_of(b).unwrap(), "two");
    }

    #[test]
    fn test_address_is_nul_terminated() {
        let interner = StringInterner::new();
        let idx = interner.intern("abc");
        let p = interner.address_of(idx).unwrap();
        let back = unsafe { std::ffi::CStr::from_ptr(p) };
        assert_eq!(back.to_str().unwrap(), "abc");
    }

    #[test]
    fn test_decref_to_zero_clears_slot() {
        let interner = StringInterner::new();
        let idx = interner.intern("gone");
        interner.decref(idx);
        assert_eq!(interner.string_of(idx), None);
        assert_eq!(interner.address_of(idx), None);
        // The slot is a tombstone; a re-intern appends a fresh slot.
        let again = interner.intern("gone");
        assert_ne!(again, idx);
    }

    #[test]
    fn test_release_if_last_only_releases_final_ref() {
        let interner = StringInterner::new();
        let idx = interner.intern("keep");
        interner.incref(idx);
        interner.release_if_last(idx);
        assert_eq!(interner.refcount(idx), Some(2));
        interner.decref(idx);
        interner.release_if_last(idx);
        assert_eq!(interner.string_of(idx), None);
    }

    #[test]
    fn test_concat_interns_joined_text() {
        let interner = StringInterner::new();
        let a = interner.intern("fo");
        let b = interner.intern("rth");
        let c = interner.concat(a, b).unwrap();
        assert_eq!(interner.string_of(c).unwrap(), "forth");
    }
}
