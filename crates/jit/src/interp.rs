//! The outer interpreter.
//!
//! Input text is cooked by the literal scanner, tokenised, and walked one
//! token at a time. `:` hands the token range up to the matching `;` to the
//! compiler; everything else is dispatched in interpret mode:
//! interpret-immediate handlers first (they may consume forward tokens),
//! then compiled entries through the trampoline, then literal numbers.

use crate::error::{CompileError, MachineError};
use crate::lexer::{parse_number, scan_for_literals, split};
use crate::machine::Machine;

impl Machine {
    /// Interpret one unit of input (a line, or several — definitions must be
    /// complete within it).
    pub fn interpret(&mut self, input: &str) -> Result<(), MachineError> {
        let cooked = scan_for_literals(input, &self.interner);
        let tokens = split(&cooked);
        let mut i = 0;
        while i < tokens.len() {
            if tokens[i] == ":" {
                i = self.handle_definition(&tokens, i)?;
                continue;
            }
            self.interpret_token(&tokens, &mut i)?;
            i += 1;
        }
        Ok(())
    }

    /// Capture the name and body range of a `:` definition and compile it.
    /// Returns the index just past the closing `;`.
    fn handle_definition(
        &mut self,
        tokens: &[String],
        colon: usize,
    ) -> Result<usize, MachineError> {
        let name = tokens
            .get(colon + 1)
            .ok_or(CompileError::MissingName(":"))?
            .clone();
        let body_start = colon + 2;
        let mut end = body_start;
        while end < tokens.len() && tokens[end] != ";" {
            end += 1;
        }
        if end >= tokens.len() {
            return Err(CompileError::MissingSemicolon.into());
        }
        self.compile_definition(&name, tokens, body_start, end)?;
        Ok(end + 1)
    }

    fn interpret_token(&mut self, tokens: &[String], i: &mut usize) -> Result<(), MachineError> {
        let token = &tokens[*i];
        let slots = self
            .dict()
            .find(token)
            .map(|e| (e.interp_imm, e.compiled));
        if let Some((interp_imm, compiled)) = slots {
            if let Some(h) = interp_imm {
                self.jit.tokens = tokens.to_vec();
                self.jit.pos_next = *i;
                self.jit.pos_last = 0;
                self.jit.word = token.clone();
                h(self)?;
                if self.jit.pos_last != 0 {
                    *i = self.jit.pos_last;
                }
                return Ok(());
            }
            if let Some(f) = compiled {
                self.execute(f);
                return Ok(());
            }
            return Err(CompileError::NotCompilable(token.clone()).into());
        }
        if let Some(n) = parse_number(token) {
            self.stacks_mut().push_ds(n as u64)?;
            return Ok(());
        }
        Err(CompileError::UnknownWord(token.clone()).into())
    }
}
