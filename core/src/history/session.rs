/// Whether the live content differs from the last saved baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    Clean,
    Dirty,
}

/// Live content of one open document with undo/redo stacks of whole content strings.
///
/// Nothing here is persisted; a session lives as long as the document is open.
#[derive(Debug, Clone)]
pub struct EditSession {
    live: String,
    baseline: String,
    undo_stack: Vec<String>,
    redo_stack: Vec<String>,
}

impl EditSession {
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        EditSession {
            baseline: content.clone(),
            live: content,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    pub fn live(&self) -> &str {
        &self.live
    }

    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    /// Replaces the live content. Returns `false` (and records nothing) if `content` is
    /// identical to the live content. Any pending redo history is discarded.
    pub fn edit(&mut self, content: impl Into<String>) -> bool {
        let content = content.into();
        if content == self.live {
            return false;
        }
        let previous = std::mem::replace(&mut self.live, content);
        self.undo_stack.push(previous);
        self.redo_stack.clear();
        true
    }

    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.undo_stack.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.live, previous);
        self.redo_stack.push(current);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(next) = self.redo_stack.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.live, next);
        self.undo_stack.push(current);
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn state(&self) -> EditState {
        if self.live == self.baseline {
            EditState::Clean
        } else {
            EditState::Dirty
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.state() == EditState::Dirty
    }

    /// Makes the live content the new baseline. The undo/redo stacks are kept.
    pub fn mark_saved(&mut self) {
        self.baseline = self.live.clone();
    }

    /// Replaces the live content with `content` and empties both stacks. The baseline is
    /// kept, so the result is dirty unless `content` equals the saved content.
    pub fn restore(&mut self, content: impl Into<String>) {
        self.live = content.into();
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Starts over from `content`: it becomes both live content and baseline, and both
    /// stacks are emptied.
    pub fn reset(&mut self, content: impl Into<String>) {
        *self = EditSession::new(content);
    }
}
