//! Bounded undo/redo history of full project snapshots.
//!
//! Discrete edits record exactly one snapshot. Continuous pointer gestures
//! are bracketed by [`History::begin_gesture`] / [`History::commit_gesture`]
//! so a drag over hundreds of frames undoes in one step.

use std::collections::VecDeque;

use crate::Project;

/// Default number of snapshots kept on each stack.
pub const DEFAULT_HISTORY_DEPTH: usize = 50;

/// Undo/redo stacks.
#[derive(Debug, Clone)]
pub struct History {
    past: VecDeque<Project>,
    future: VecDeque<Project>,
    max_depth: usize,
    /// State captured when the open gesture began.
    gesture: Option<Project>,
}

impl Default for History {
    fn default() -> Self {
        Self::with_depth(DEFAULT_HISTORY_DEPTH)
    }
}

impl History {
    /// Create a history with a custom maximum depth (at least 1).
    #[must_use]
    pub fn with_depth(max_depth: usize) -> Self {
        let max_depth = max_depth.max(1);
        Self {
            past: VecDeque::with_capacity(max_depth),
            future: VecDeque::with_capacity(max_depth),
            max_depth,
            gesture: None,
        }
    }

    fn push_bounded(stack: &mut VecDeque<Project>, snapshot: Project, max_depth: usize) {
        if stack.len() >= max_depth {
            stack.pop_front();
        }
        stack.push_back(snapshot);
    }

    /// Record the state from before a discrete edit and drop the redo stack.
    ///
    /// Ignored while a gesture is open; the gesture commits its own snapshot.
    pub fn record(&mut self, before: Project) {
        if self.gesture.is_some() {
            return;
        }
        Self::push_bounded(&mut self.past, before, self.max_depth);
        self.future.clear();
    }

    /// Whether a gesture is currently open.
    #[must_use]
    pub fn in_gesture(&self) -> bool {
        self.gesture.is_some()
    }

    /// Open a gesture, remembering the state it started from.
    ///
    /// Returns `false` (and keeps the original start state) if a gesture is
    /// already open.
    pub fn begin_gesture(&mut self, current: &Project) -> bool {
        if self.gesture.is_some() {
            return false;
        }
        self.gesture = Some(current.clone());
        true
    }

    /// Close the open gesture, recording one snapshot if anything changed.
    ///
    /// Returns whether a snapshot was recorded.
    pub fn commit_gesture(&mut self, current: &Project) -> bool {
        match self.gesture.take() {
            Some(start) if start != *current => {
                self.record(start);
                true
            }
            _ => false,
        }
    }

    /// Close the open gesture without recording, returning its start state.
    pub fn cancel_gesture(&mut self) -> Option<Project> {
        self.gesture.take()
    }

    /// Check if undo is available.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    /// Check if redo is available.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Number of undo steps available.
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.past.len()
    }

    /// Number of redo steps available.
    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.future.len()
    }

    /// Pop the undo stack, pushing `current` onto the redo stack.
    ///
    /// Returns the snapshot to restore, or `None` when there is nothing to undo.
    pub fn undo(&mut self, current: Project) -> Option<Project> {
        let previous = self.past.pop_back()?;
        Self::push_bounded(&mut self.future, current, self.max_depth);
        Some(previous)
    }

    /// Pop the redo stack, pushing `current` onto the undo stack.
    ///
    /// Returns the snapshot to restore, or `None` when there is nothing to redo.
    pub fn redo(&mut self, current: Project) -> Option<Project> {
        let next = self.future.pop_back()?;
        Self::push_bounded(&mut self.past, current, self.max_depth);
        Some(next)
    }

    /// Clear all undo/redo history.
    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
        self.gesture = None;
    }
}
