//! Linear snapshot history.
//!
//! Whole-state snapshots per step; layer stacks are small, so no structural
//! sharing. Each `set` is one undo step — callers batch keystroke-level
//! edits if they want coarser steps.

#[derive(Clone, Debug, Default)]
pub struct History<T: Clone> {
    present: T,
    undo_stack: Vec<T>,
    redo_stack: Vec<T>,
}

impl<T: Clone> History<T> {
    pub fn new(initial: T) -> Self {
        Self {
            present: initial,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    pub fn present(&self) -> &T {
        &self.present
    }

    /// Replace the present state, pushing the previous one onto the undo
    /// stack and discarding any redo tail.
    pub fn set(&mut self, next: T) {
        let previous = std::mem::replace(&mut self.present, next);
        self.undo_stack.push(previous);
        self.redo_stack.clear();
    }

    /// Step back one entry; a no-op at the bottom of history.
    pub fn undo(&mut self) -> &T {
        if let Some(previous) = self.undo_stack.pop() {
            let current = std::mem::replace(&mut self.present, previous);
            self.redo_stack.push(current);
        }
        &self.present
    }

    /// Re-apply the most recently undone entry; a no-op at the top.
    pub fn redo(&mut self) -> &T {
        if let Some(next) = self.redo_stack.pop() {
            let current = std::mem::replace(&mut self.present, next);
            self.undo_stack.push(current);
        }
        &self.present
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_then_redo_restores_exact_states() {
        let mut history = History::new("a");
        history.set("b");
        assert_eq!(*history.present(), "b");
        assert_eq!(*history.undo(), "a");
        assert_eq!(*history.redo(), "b");
    }

    #[test]
    fn undo_at_bottom_is_a_noop() {
        let mut history = History::new(7);
        assert_eq!(*history.undo(), 7);
        assert!(!history.can_undo());
    }

    #[test]
    fn set_clears_the_redo_tail() {
        let mut history = History::new(1);
        history.set(2);
        history.undo();
        history.set(3);
        assert!(!history.can_redo());
        assert_eq!(*history.redo(), 3);
        assert_eq!(*history.undo(), 1);
    }
}
