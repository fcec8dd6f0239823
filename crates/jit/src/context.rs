//! The single current-compilation context.
//!
//! One of these lives in the machine. It owns the assembler for whatever is
//! being emitted right now, the `uint64_a` scratch slot the literal emitters
//! read, the shared token vector with the cursor immediate words advance,
//! and the process-wide toggles.

use crate::asm::{Assembler, EmitError};
use crate::config::MachineConfig;
use tracing::debug;

pub struct JitContext {
    /// Emitter for the definition currently being built.
    pub asm: Assembler,
    /// Literal operand slot for the push-long / add-long / sub-long
    /// emitters.
    pub uint64_a: u64,
    /// Word currently being processed, for listing comments.
    pub word: String,
    /// Token vector shared with immediate words.
    pub tokens: Vec<String>,
    /// Index of the token whose handler is running.
    pub pos_next: usize,
    /// Set by a token-consuming immediate word to the last token it
    /// consumed; zero means the cursor was not advanced.
    pub pos_last: usize,
    pub logging: bool,
    pub loop_check: bool,
    pub auto_reset: bool,
}

impl JitContext {
    pub fn new(config: MachineConfig) -> Self {
        JitContext {
            asm: Assembler::new(config.logging),
            uint64_a: 0,
            word: String::new(),
            tokens: Vec::new(),
            pos_next: 0,
            pos_last: 0,
            logging: config.logging,
            loop_check: config.loop_check,
            auto_reset: config.auto_reset,
        }
    }

    /// Discard any half-built code and prepare a fresh emitter, honouring
    /// the auto-reset toggle.
    pub fn reset(&mut self) {
        if self.auto_reset {
            self.force_reset();
        }
    }

    /// Unconditional reset, used on the error path regardless of the
    /// toggle.
    pub fn force_reset(&mut self) {
        debug!(discarded = self.asm.offset(), "context reset");
        self.asm = Assembler::new(self.logging);
    }

    /// Finalise the current stream and start a fresh one.
    pub fn finish(&mut self) -> Result<Vec<u8>, EmitError> {
        let done = std::mem::replace(&mut self.asm, Assembler::new(self.logging));
        debug!(word = %self.word, bytes = done.offset(), "code stream finalised");
        if self.logging {
            let listing = done.listing();
            if !listing.is_empty() {
                println!("{}", listing);
            }
        }
        done.finalize()
    }

    /// Listing comment tagged with the current word.
    pub fn comment_with_word(&mut self, base: &str) {
        if self.logging {
            let text = format!("{} [{}]", base, self.word);
            self.asm.comment(&text);
        }
    }

    /// The token after the one being processed, as an owned string, moving
    /// `pos_last` past it. This is how `to`, `value`, `see` and friends
    /// consume their operand.
    pub fn next_token(&mut self) -> Option<String> {
        let pos = self.pos_next + 1;
        let tok = self.tokens.get(pos).cloned()?;
        self.pos_last = pos;
        Some(tok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_token_advances_cursor() {
        let mut jc = JitContext::new(MachineConfig::default());
        jc.tokens = vec!["to".into(), "fred".into(), "rest".into()];
        jc.pos_next = 0;
        jc.pos_last = 0;
        assert_eq!(jc.next_token().as_deref(), Some("fred"));
        assert_eq!(jc.pos_last, 1);
    }

    #[test]
    fn test_next_token_at_end_is_none() {
        let mut jc = JitContext::new(MachineConfig::default());
        jc.tokens = vec!["see".into()];
        jc.pos_next = 0;
        assert_eq!(jc.next_token(), None);
        assert_eq!(jc.pos_last, 0);
    }

    #[test]
    fn test_reset_honours_toggle() {
        let mut jc = JitContext::new(MachineConfig::default().with_auto_reset(false));
        jc.asm.nop();
        jc.reset();
        assert_eq!(jc.asm.offset(), 1);
        jc.force_reset();
        assert_eq!(jc.asm.offset(), 0);
    }
}
