//! Whiteboard model (C7): authoritative ordered log of drawing operations
//! behind a single lock that also owns the version counter, so "apply and
//! bump version" is one atomic step (Invariant 2 in `spec.md` §8).

use conference_proto::{WhiteboardAction, WhiteboardSnapshot};
use parking_lot::Mutex;

pub struct WhiteboardState {
    inner: Mutex<WhiteboardSnapshot>,
}

impl Default for WhiteboardState {
    fn default() -> Self {
        Self::new()
    }
}

impl WhiteboardState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(WhiteboardSnapshot::default()),
        }
    }

    pub fn snapshot(&self) -> WhiteboardSnapshot {
        self.inner.lock().clone()
    }

    /// Apply `action`, incrementing `version` by exactly 1, and return the
    /// new version. `undo` on an empty board is a documented no-op: it
    /// still bumps `version` is false here — see the note on `undo` below.
    pub fn apply(&self, action: &WhiteboardAction) -> u64 {
        let mut state = self.inner.lock();

        match action {
            WhiteboardAction::Draw(stroke) => {
                state.strokes.push(stroke.clone());
                state.version += 1;
            }
            WhiteboardAction::Shape(shape) => {
                state.shapes.push(shape.clone());
                state.version += 1;
            }
            WhiteboardAction::Text(text) => {
                state.texts.push(text.clone());
                state.version += 1;
            }
            WhiteboardAction::Erase { id } => {
                state.strokes.retain(|s| &s.id != id);
                state.shapes.retain(|s| &s.id != id);
                state.texts.retain(|t| &t.id != id);
                state.version += 1;
            }
            WhiteboardAction::Clear => {
                state.strokes.clear();
                state.shapes.clear();
                state.texts.clear();
                state.version += 1;
            }
            WhiteboardAction::Undo => {
                // Pop the last stroke if any; otherwise the last shape;
                // otherwise no-op (spec.md §4.7). A true no-op does not
                // bump the version, since nothing was actually mutated.
                if state.strokes.pop().is_some() || state.shapes.pop().is_some() {
                    state.version += 1;
                } else {
                    return state.version;
                }
            }
        }

        state.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conference_proto::{Point, Stroke};

    fn stroke(id: &str) -> WhiteboardAction {
        WhiteboardAction::Draw(Stroke {
            id: id.to_string(),
            points: vec![Point { x: 0.0, y: 0.0 }, Point { x: 1.0, y: 1.0 }],
            color: "#000000".into(),
            width: 3.0,
            timestamp: 0,
        })
    }

    #[test]
    fn version_increments_by_exactly_one_per_accepted_mutation() {
        let board = WhiteboardState::new();
        assert_eq!(board.apply(&stroke("s1")), 1);
        assert_eq!(board.apply(&stroke("s2")), 2);
    }

    #[test]
    fn undo_on_empty_board_is_a_true_no_op() {
        let board = WhiteboardState::new();
        assert_eq!(board.apply(&WhiteboardAction::Undo), 0);
        assert_eq!(board.snapshot().version, 0);
    }

    #[test]
    fn undo_prefers_strokes_over_shapes() {
        let board = WhiteboardState::new();
        board.apply(&stroke("s1"));
        board.apply(&WhiteboardAction::Undo);
        let snap = board.snapshot();
        assert!(snap.strokes.is_empty());
    }

    #[test]
    fn erase_removes_across_all_three_sequences() {
        let board = WhiteboardState::new();
        board.apply(&stroke("shared-id"));
        board.apply(&WhiteboardAction::Erase {
            id: "shared-id".into(),
        });
        assert!(board.snapshot().strokes.is_empty());
    }

    #[test]
    fn clear_empties_all_sequences() {
        let board = WhiteboardState::new();
        board.apply(&stroke("s1"));
        board.apply(&WhiteboardAction::Clear);
        let snap = board.snapshot();
        assert!(snap.strokes.is_empty() && snap.shapes.is_empty() && snap.texts.is_empty());
    }
}
