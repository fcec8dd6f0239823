//! The word dictionary.
//!
//! Entries live in a contiguous vector linked backward by index; `latest`
//! heads the chain and lookups walk it, so a later entry shadows an earlier
//! one of the same name and `forget` pops exactly the head.
//!
//! Every entry carries up to four function slots:
//!
//! - *generator* — emits inline code when the word appears in a definition;
//! - *compiled* — native code, callable at run time from interpret mode or
//!   from other compiled words;
//! - *compile-immediate* — runs during compilation and may consume forward
//!   tokens via the shared cursor;
//! - *interpret-immediate* — runs during interpretation, same cursor
//!   protocol.
//!
//! The 64-bit `data` cell of each entry is allocated from a bump arena so
//! its address is stable for the life of the machine; compiled bodies of
//! `value`/`variable`/string words embed that address as an immediate.
//! Forgetting a word abandons its cell and its code page (accepted leak).

use crate::error::DictError;
use crate::exec::WordFn;
use crate::machine::Machine;
use bumpalo::Bump;

/// Maximum stored name length in bytes; longer names are truncated on add.
pub const MAX_NAME_LEN: usize = 31;

/// Entry-count bound standing in for the original fixed arena.
pub const MAX_ENTRIES: usize = 64 * 1024;

/// Host handler invoked with the machine during compilation or
/// interpretation.
pub type Handler = fn(&mut Machine) -> Result<(), crate::error::MachineError>;

/// What a dictionary entry denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordKind {
    Word,
    Constant,
    Variable,
    Value,
    StringValue,
}

/// Entry state flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordState {
    Normal,
    /// Runs immediately when seen in interpret mode.
    InterpImmediate,
}

pub struct Entry {
    pub name: String,
    pub kind: WordKind,
    pub state: WordState,
    pub generator: Option<Handler>,
    pub compiled: Option<WordFn>,
    pub compile_imm: Option<Handler>,
    pub interp_imm: Option<Handler>,
    /// Previous entry in the chain.
    pub link: Option<u32>,
    /// The entry's 64-bit cell in the arena: VALUE contents, VARIABLE
    /// storage, or a string index.
    pub data: *mut u64,
}

pub struct Dictionary {
    entries: Vec<Entry>,
    latest: Option<u32>,
    arena: Bump,
    /// Cell the next `add` will hand out; pre-allocated so `current_here`
    /// can report it.
    next_cell: *mut u64,
}

impl Dictionary {
    pub fn new() -> Self {
        let arena = Bump::new();
        let next_cell = arena.alloc(0u64) as *mut u64;
        Dictionary {
            entries: Vec::new(),
            latest: None,
            arena,
            next_cell,
        }
    }

    /// Append a new entry with the given slots. The name is lower-cased and
    /// length-bounded; the previous `latest` becomes its link.
    pub fn add(
        &mut self,
        name: &str,
        generator: Option<Handler>,
        compiled: Option<WordFn>,
        compile_imm: Option<Handler>,
        interp_imm: Option<Handler>,
    ) -> Result<u32, DictError> {
        if self.entries.len() >= MAX_ENTRIES {
            return Err(DictError::Full);
        }
        let name = normalise(name);
        let data = self.next_cell;
        self.next_cell = self.arena.alloc(0u64) as *mut u64;
        let index = self.entries.len() as u32;
        self.entries.push(Entry {
            name,
            kind: WordKind::Word,
            state: WordState::Normal,
            generator,
            compiled,
            compile_imm,
            interp_imm,
            link: self.latest,
            data,
        });
        self.latest = Some(index);
        Ok(index)
    }

    /// Linear search from `latest` along the links; first hit wins, so later
    /// definitions shadow earlier ones.
    pub fn find(&self, name: &str) -> Option<&Entry> {
        let wanted = normalise(name);
        let mut cursor = self.latest;
        while let Some(idx) = cursor {
            let entry = &self.entries[idx as usize];
            if entry.name == wanted {
                return Some(entry);
            }
            cursor = entry.link;
        }
        None
    }

    /// Pop the most recent entry. Its code page and data cell are not
    /// reclaimed.
    pub fn forget_last(&mut self) -> Result<String, DictError> {
        let idx = self.latest.ok_or(DictError::Empty)?;
        let entry = self.entries.pop().expect("latest index tracks entries");
        debug_assert_eq!(idx as usize, self.entries.len());
        self.latest = entry.link;
        Ok(entry.name)
    }

    pub fn latest_entry(&self) -> Option<&Entry> {
        self.latest.map(|i| &self.entries[i as usize])
    }

    fn latest_mut(&mut self) -> Option<&mut Entry> {
        let idx = self.latest?;
        self.entries.get_mut(idx as usize)
    }

    // Mutators for the most recently added entry, matching the builder-ish
    // protocol the immediate words use.

    pub fn set_data(&mut self, value: u64) {
        if let Some(entry) = self.latest_mut() {
            unsafe { *entry.data = value };
        }
    }

    pub fn set_kind(&mut self, kind: WordKind) {
        if let Some(entry) = self.latest_mut() {
            entry.kind = kind;
        }
    }

    pub fn set_state(&mut self, state: WordState) {
        if let Some(entry) = self.latest_mut() {
            entry.state = state;
        }
    }

    pub fn set_compiled(&mut self, f: WordFn) {
        if let Some(entry) = self.latest_mut() {
            entry.compiled = Some(f);
        }
    }

    pub fn set_generator(&mut self, f: Handler) {
        if let Some(entry) = self.latest_mut() {
            entry.generator = Some(f);
        }
    }

    /// Address of the latest entry's data cell.
    pub fn latest_data_addr(&self) -> Option<*mut u64> {
        self.latest_entry().map(|e| e.data)
    }

    /// Address the next entry's data cell will occupy.
    pub fn current_here(&self) -> u64 {
        self.next_cell as u64
    }

    /// Reserve `n` raw bytes of arena space without creating an entry.
    pub fn allot(&mut self, n: usize) -> *mut u8 {
        let layout = std::alloc::Layout::from_size_align(n.max(1), 8)
            .expect("allot layout");
        self.arena.alloc_layout(layout).as_ptr()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Arena bytes consumed by data cells and `allot`.
    pub fn arena_bytes(&self) -> usize {
        self.arena.allocated_bytes()
    }

    /// Print all live names, newest first.
    pub fn list_words(&self) {
        let mut cursor = self.latest;
        while let Some(idx) = cursor {
            let entry = &self.entries[idx as usize];
            print!("{} ", entry.name);
            cursor = entry.link;
        }
        println!();
    }

    /// Dump one entry's slots and data for `see`.
    pub fn display_word(&self, name: &str) {
        match self.find(name) {
            None => println!("Word not found: {}", name),
            Some(entry) => {
                println!("Name: {}", entry.name);
                println!("Kind: {:?}", entry.kind);
                println!("State: {:?}", entry.state);
                println!(
                    "Compiled function: {:x}",
                    entry.compiled.map(|f| f as usize).unwrap_or(0)
                );
                println!(
                    "Generator: {:x}",
                    entry.generator.map(|f| f as usize).unwrap_or(0)
                );
                println!(
                    "Compile immediate: {:x}",
                    entry.compile_imm.map(|f| f as usize).unwrap_or(0)
                );
                println!(
                    "Interpret immediate: {:x}",
                    entry.interp_imm.map(|f| f as usize).unwrap_or(0)
                );
                println!("Data: {}", unsafe { *entry.data });
                println!("Link: {:?}", entry.link);
            }
        }
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::new()
    }
}

fn normalise(name: &str) -> String {
    let lower = name.to_lowercase();
    if lower.len() <= MAX_NAME_LEN {
        lower
    } else {
        let mut end = MAX_NAME_LEN;
        while !lower.is_char_boundary(end) {
            end -= 1;
        }
        lower[..end].to_string()
    }
}

/// `words` from compiled code.
///
/// # Safety
/// `dict` must point to the live dictionary of the executing machine.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fjord_words(dict: *mut Dictionary) {
    if dict.is_null() {
        return;
    }
    unsafe { &*dict }.list_words();
}

/// `forget` from compiled code.
///
/// # Safety
/// Same contract as [`fjord_words`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fjord_forget(dict: *mut Dictionary) {
    if dict.is_null() {
        return;
    }
    match unsafe { &mut *dict }.forget_last() {
        Ok(name) => println!("Forgetting word {}", name),
        Err(e) => println!("{}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_find_case_insensitive() {
        let mut d = Dictionary::new();
        d.add("DUP", None, None, None, None).unwrap();
        assert!(d.find("dup").is_some());
        assert!(d.find("DUP").is_some());
        assert!(d.find("swap").is_none());
    }

    #[test]
    fn test_later_definition_shadows_earlier() {
        let mut d = Dictionary::new();
        d.add("x", None, None, None, None).unwrap();
        d.set_data(1);
        d.add("x", None, None, None, None).unwrap();
        d.set_data(2);
        let found = d.find("x").unwrap();
        assert_eq!(unsafe { *found.data }, 2);
        d.forget_last().unwrap();
        let found = d.find("x").unwrap();
        assert_eq!(unsafe { *found.data }, 1);
    }

    #[test]
    fn test_forget_on_empty_is_error() {
        let mut d = Dictionary::new();
        assert_eq!(d.forget_last(), Err(DictError::Empty));
    }

    #[test]
    fn test_name_is_length_bounded() {
        let mut d = Dictionary::new();
        let long = "x".repeat(80);
        d.add(&long, None, None, None, None).unwrap();
        assert_eq!(d.latest_entry().unwrap().name.len(), MAX_NAME_LEN);
    }

    #[test]
    fn test_data_cells_are_distinct_and_stable() {
        let mut d = Dictionary::new();
        d.add("a", None, None, None, None).unwrap();
        let a = d.latest_data_addr().unwrap();
        d.add("b", None, None, None, None).unwrap();
        let b = d.latest_data_addr().unwrap();
        assert_ne!(a, b);
        unsafe {
            *a = 11;
            *b = 22;
        }
        // Growing the vector must not move the cells.
        for i in 0..100 {
            d.add(&format!("w{}", i), None, None, None, None).unwrap();
        }
        assert_eq!(unsafe { *a }, 11);
        assert_eq!(unsafe { *b }, 22);
    }

    #[test]
    fn test_current_here_predicts_next_cell() {
        let mut d = Dictionary::new();
        let here = d.current_here();
        d.add("v", None, None, None, None).unwrap();
        assert_eq!(d.latest_data_addr().unwrap() as u64, here);
    }

    #[test]
    fn test_allot_reserves_aligned_space() {
        let mut d = Dictionary::new();
        let p = d.allot(64);
        assert_eq!(p as usize % 8, 0);
        assert!(d.arena_bytes() >= 64);
    }
}
