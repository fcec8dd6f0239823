//! Compile-time control-flow frames.
//!
//! Every opening construct pushes a tagged frame holding the labels its
//! closer (and `leave`/`exit`) will need; every closer pops one. `leave` and
//! `exit` search the stack without mutating it.

use crate::asm::Label;

/// One pending control-flow construct.
#[derive(Debug, Clone, Copy)]
pub enum ControlFrame {
    /// `if … [else …] then`
    IfElse {
        /// Jump target for a false condition (bound by `else`, or by `then`
        /// when no `else` occurred).
        else_lbl: Label,
        /// Jump target past the whole construct (bound by `then` after an
        /// `else`).
        end_lbl: Label,
        has_else: bool,
    },
    /// The function body between prologue and epilogue.
    Function { entry: Label, exit: Label },
    /// `do … loop | +loop`
    DoLoop {
        do_lbl: Label,
        loop_lbl: Label,
        leave_lbl: Label,
    },
    /// `begin … again | until | while … repeat`
    Begin {
        begin_lbl: Label,
        again_lbl: Label,
        repeat_lbl: Label,
        until_lbl: Label,
        while_lbl: Label,
        leave_lbl: Label,
    },
}

/// Stack of pending frames for the current definition.
#[derive(Debug, Default)]
pub struct LabelStack {
    frames: Vec<ControlFrame>,
}

impl LabelStack {
    pub fn push(&mut self, frame: ControlFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<ControlFrame> {
        self.frames.pop()
    }

    pub fn top_mut(&mut self) -> Option<&mut ControlFrame> {
        self.frames.last_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Leave target of the innermost loop construct, if any. The stack is
    /// not modified.
    pub fn innermost_leave(&self) -> Option<Label> {
        self.frames.iter().rev().find_map(|frame| match frame {
            ControlFrame::DoLoop { leave_lbl, .. } => Some(*leave_lbl),
            ControlFrame::Begin { leave_lbl, .. } => Some(*leave_lbl),
            _ => None,
        })
    }

    /// Exit label of the innermost function frame, if any. Intervening loop
    /// frames are left alone; their closers bind their own labels on the
    /// regular path.
    pub fn innermost_exit(&self) -> Option<Label> {
        self.frames.iter().rev().find_map(|frame| match frame {
            ControlFrame::Function { exit, .. } => Some(*exit),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::Assembler;

    fn labels(n: usize) -> Vec<Label> {
        let mut a = Assembler::new(false);
        (0..n).map(|_| a.new_label()).collect()
    }

    #[test]
    fn test_innermost_leave_prefers_top_frame() {
        let l = labels(8);
        let mut stack = LabelStack::default();
        stack.push(ControlFrame::Function {
            entry: l[0],
            exit: l[1],
        });
        stack.push(ControlFrame::DoLoop {
            do_lbl: l[2],
            loop_lbl: l[3],
            leave_lbl: l[4],
        });
        stack.push(ControlFrame::IfElse {
            else_lbl: l[5],
            end_lbl: l[6],
            has_else: false,
        });
        assert_eq!(stack.innermost_leave(), Some(l[4]));
        assert_eq!(stack.innermost_exit(), Some(l[1]));
        // Searching does not pop.
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn test_no_loop_no_leave() {
        let l = labels(2);
        let mut stack = LabelStack::default();
        stack.push(ControlFrame::Function {
            entry: l[0],
            exit: l[1],
        });
        assert_eq!(stack.innermost_leave(), None);
    }
}
