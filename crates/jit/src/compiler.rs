//! Token-by-token lowering of a definition body.
//!
//! The compiler walks the shared token vector between the definition
//! bounds. For each token, resolution order is: locals frame, then
//! dictionary (generator, then compile-immediate, then compiled call), then
//! signed decimal literal. Anything else is a compile error, which aborts
//! the definition: the context is reset, control-flow and locals state
//! cleared, and the machine stays usable.
//!
//! Immediate words cooperate through the cursor in the context: the
//! compiler stores the current index in `pos_next` before each handler and
//! jumps to `pos_last` afterwards when the handler consumed tokens.

use crate::error::{CompileError, MachineError};
use crate::exec::WordFn;
use crate::lexer::parse_number;
use crate::machine::Machine;
use tracing::{debug, warn};

impl Machine {
    /// Compile `tokens[start..end]` as the body of `name` and install the
    /// result. A name collision skips the definition with a diagnostic
    /// (shadowing is not supported; use `forget`).
    pub(crate) fn compile_definition(
        &mut self,
        name: &str,
        tokens: &[String],
        start: usize,
        end: usize,
    ) -> Result<(), MachineError> {
        if self.dict().find(name).is_some() {
            warn!(word = name, "definition skipped: name exists");
            println!("word already exists: {} (forget it first)", name);
            return Ok(());
        }
        match self.compile_body(name, tokens, start, end) {
            Ok(f) => {
                self.dict_mut().add(name, None, Some(f), None, None)?;
                debug!(word = name, "definition installed");
                Ok(())
            }
            Err(e) => {
                self.jit.force_reset();
                self.cflow.clear();
                self.locals.clear();
                self.do_loop_depth = 0;
                Err(e)
            }
        }
    }

    fn compile_body(
        &mut self,
        name: &str,
        tokens: &[String],
        start: usize,
        end: usize,
    ) -> Result<WordFn, MachineError> {
        debug!(word = name, "compiling definition");
        self.jit.reset();
        self.jit.word = name.to_string();
        self.jit.tokens = tokens.to_vec();
        self.gen_prologue()?;
        let mut i = start;
        while i < end {
            let token = self.jit.tokens[i].clone();
            self.jit.word = token.clone();
            self.jit.pos_next = i;
            self.jit.pos_last = 0;
            self.compile_token(&token)?;
            if self.jit.pos_last != 0 {
                i = self.jit.pos_last;
            }
            i += 1;
        }
        self.gen_epilogue()?;
        if !self.cflow.is_empty() {
            return Err(CompileError::ControlMismatch("unclosed control structure").into());
        }
        self.finish_word()
    }

    fn compile_token(&mut self, token: &str) -> Result<(), MachineError> {
        // Locals shadow the dictionary for the definition's duration.
        if let Some(offset) = self.locals.offset_of(token) {
            self.gen_push_local(offset);
            return Ok(());
        }
        let slots = self
            .dict()
            .find(token)
            .map(|e| (e.generator, e.compile_imm, e.compiled));
        if let Some((generator, compile_imm, compiled)) = slots {
            if let Some(g) = generator {
                return g(self);
            }
            if let Some(h) = compile_imm {
                return h(self);
            }
            if let Some(f) = compiled {
                self.gen_call_word(f);
                return Ok(());
            }
            return Err(CompileError::NotCompilable(token.to_string()).into());
        }
        if let Some(n) = parse_number(token) {
            self.jit.uint64_a = n as u64;
            return crate::codegen::primitives::gen_push_long(self);
        }
        Err(CompileError::UnknownWord(token.to_string()).into())
    }
}
