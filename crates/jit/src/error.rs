//! Error types for compilation and execution.
//!
//! Compile-time errors abort the current definition (the context is reset,
//! any half-built entry discarded) and leave the machine usable. Runtime
//! errors are fatal to the word; the REPL resets the stacks and reports.

use crate::asm::EmitError;
use crate::exec::ExecError;
use fjord_core::StackError;
use std::fmt;

/// Errors raised while lowering a definition or running an immediate word.
#[derive(Debug)]
pub enum CompileError {
    /// Token is neither a word, a local, nor a number.
    UnknownWord(String),
    /// Dictionary entry exists but none of its slots can be applied here
    /// (e.g. an interpret-immediate used inside a definition).
    NotCompilable(String),
    /// `:` with no name following, or an immediate word at end of input.
    MissingName(&'static str),
    /// A definition body with no terminating `;`.
    MissingSemicolon,
    /// A number token that does not parse as signed 64-bit decimal.
    InvalidNumber(String),
    /// Closer without matching opener, or vice versa.
    ControlMismatch(&'static str),
    /// `leave` with no enclosing loop.
    LeaveOutsideLoop,
    /// `exit` with no enclosing function frame.
    ExitOutsideFunction,
    /// `j`/`k` used without enough nested `do` loops.
    LoopDepth(&'static str, usize),
    /// `to` applied to something that is not a value, variable or local.
    BadToTarget(String),
    /// A `sPtr_` sentinel whose address part does not parse.
    BadLiteralSentinel(String),
    /// Instruction encoding failure.
    Emit(EmitError),
    /// Could not publish the code page.
    Exec(ExecError),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UnknownWord(w) => write!(f, "unknown or uncompilable word: [{}]", w),
            CompileError::NotCompilable(w) => write!(f, "word [{}] cannot be used here", w),
            CompileError::MissingName(what) => write!(f, "missing name after {}", what),
            CompileError::MissingSemicolon => write!(f, "no ending ';' found for definition"),
            CompileError::InvalidNumber(w) => write!(f, "invalid number: {}", w),
            CompileError::ControlMismatch(what) => {
                write!(f, "mismatched control flow: {}", what)
            }
            CompileError::LeaveOutsideLoop => write!(f, "leave: no loop to leave from"),
            CompileError::ExitOutsideFunction => write!(f, "exit: no function to exit from"),
            CompileError::LoopDepth(word, need) => {
                write!(f, "{}: needs {} nested do-loops", word, need)
            }
            CompileError::BadToTarget(w) => write!(f, "to: [{}] is not a value, variable or local", w),
            CompileError::BadLiteralSentinel(w) => write!(f, "malformed string literal token: {}", w),
            CompileError::Emit(e) => write!(f, "code emission: {}", e),
            CompileError::Exec(e) => write!(f, "code publication: {}", e),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<EmitError> for CompileError {
    fn from(e: EmitError) -> Self {
        CompileError::Emit(e)
    }
}

impl From<ExecError> for CompileError {
    fn from(e: ExecError) -> Self {
        CompileError::Exec(e)
    }
}

/// Dictionary-level failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictError {
    /// The entry vector hit its configured bound.
    Full,
    /// `forget` with nothing defined.
    Empty,
}

impl fmt::Display for DictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictError::Full => write!(f, "dictionary overflow"),
            DictError::Empty => write!(f, "no words to forget"),
        }
    }
}

impl std::error::Error for DictError {}

/// Top-level error the outer interpreter reports to the REPL.
#[derive(Debug)]
pub enum MachineError {
    Compile(CompileError),
    Stack(StackError),
    Dict(DictError),
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineError::Compile(e) => write!(f, "{}", e),
            MachineError::Stack(e) => write!(f, "{}", e),
            MachineError::Dict(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for MachineError {}

impl From<CompileError> for MachineError {
    fn from(e: CompileError) -> Self {
        MachineError::Compile(e)
    }
}

impl From<StackError> for MachineError {
    fn from(e: StackError) -> Self {
        MachineError::Stack(e)
    }
}

impl From<DictError> for MachineError {
    fn from(e: DictError) -> Self {
        MachineError::Dict(e)
    }
}

impl From<EmitError> for MachineError {
    fn from(e: EmitError) -> Self {
        MachineError::Compile(CompileError::Emit(e))
    }
}

impl From<ExecError> for MachineError {
    fn from(e: ExecError) -> Self {
        MachineError::Compile(CompileError::Exec(e))
    }
}

impl MachineError {
    /// True for errors that should make the REPL reset the stacks.
    pub fn is_runtime(&self) -> bool {
        matches!(self, MachineError::Stack(_))
    }
}
