//! Local whiteboard mirror (C9): replays the authoritative snapshot and
//! subsequent broadcast actions so the client always holds the same state
//! the server would replay to a newcomer.

use conference_proto::whiteboard::{Shape, Stroke, TextElement, WhiteboardAction, WhiteboardSnapshot};

#[derive(Debug, Clone, Default)]
pub struct WhiteboardState {
    snapshot: WhiteboardSnapshot,
}

impl WhiteboardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace local state wholesale with the server's `whiteboard_sync`.
    pub fn reset(&mut self, snapshot: WhiteboardSnapshot) {
        self.snapshot = snapshot;
    }

    pub fn snapshot(&self) -> &WhiteboardSnapshot {
        &self.snapshot
    }

    pub fn version(&self) -> u64 {
        self.snapshot.version
    }

    /// Apply a broadcast `whiteboard_action`, mirroring
    /// `conference_server::whiteboard::WhiteboardState::apply`. The
    /// server is the arbiter of `version`; this only replays what it
    /// already decided.
    pub fn apply(&mut self, action: WhiteboardAction, version: u64) {
        match action {
            WhiteboardAction::Draw(stroke) => self.snapshot.strokes.push(stroke),
            WhiteboardAction::Shape(shape) => self.snapshot.shapes.push(shape),
            WhiteboardAction::Text(text) => self.snapshot.texts.push(text),
            WhiteboardAction::Erase { id } => {
                self.snapshot.strokes.retain(|s| s.id != id);
                self.snapshot.shapes.retain(|s| s.id != id);
                self.snapshot.texts.retain(|t| t.id != id);
            }
            WhiteboardAction::Clear => {
                self.snapshot.strokes.clear();
                self.snapshot.shapes.clear();
                self.snapshot.texts.clear();
            }
            WhiteboardAction::Undo => {
                // Mirrors conference_server::whiteboard::WhiteboardState::apply:
                // pop the last stroke if any, else the last shape, else no-op.
                if self.snapshot.strokes.pop().is_none() {
                    self.snapshot.shapes.pop();
                }
            }
        }
        self.snapshot.version = version;
    }
}

/// Convenience constructors for outgoing actions, mirroring the variants
/// a client's drawing surface would produce.
pub fn draw(stroke: Stroke) -> WhiteboardAction {
    WhiteboardAction::Draw(stroke)
}

pub fn shape(shape: Shape) -> WhiteboardAction {
    WhiteboardAction::Shape(shape)
}

pub fn text(text: TextElement) -> WhiteboardAction {
    WhiteboardAction::Text(text)
}

pub fn erase(id: String) -> WhiteboardAction {
    WhiteboardAction::Erase { id }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conference_proto::whiteboard::Point;

    fn stroke(id: &str, ts: u64) -> Stroke {
        Stroke {
            id: id.to_string(),
            points: vec![Point { x: 0.0, y: 0.0 }],
            color: "#000".to_string(),
            width: 1.0,
            timestamp: ts,
        }
    }

    #[test]
    fn apply_draw_appends_and_bumps_version() {
        let mut state = WhiteboardState::new();
        state.apply(WhiteboardAction::Draw(stroke("s1", 1)), 1);
        assert_eq!(state.snapshot().strokes.len(), 1);
        assert_eq!(state.version(), 1);
    }

    #[test]
    fn undo_removes_the_most_recently_added_element() {
        let mut state = WhiteboardState::new();
        state.apply(WhiteboardAction::Draw(stroke("s1", 1)), 1);
        state.apply(WhiteboardAction::Draw(stroke("s2", 2)), 2);
        state.apply(WhiteboardAction::Undo, 3);
        assert_eq!(state.snapshot().strokes.len(), 1);
        assert_eq!(state.snapshot().strokes[0].id, "s1");
    }

    #[test]
    fn clear_empties_all_element_kinds() {
        let mut state = WhiteboardState::new();
        state.apply(WhiteboardAction::Draw(stroke("s1", 1)), 1);
        state.apply(WhiteboardAction::Clear, 2);
        assert!(state.snapshot().strokes.is_empty());
    }

    #[test]
    fn erase_removes_only_the_named_element() {
        let mut state = WhiteboardState::new();
        state.apply(WhiteboardAction::Draw(stroke("s1", 1)), 1);
        state.apply(WhiteboardAction::Draw(stroke("s2", 2)), 2);
        state.apply(WhiteboardAction::Erase { id: "s1".to_string() }, 3);
        assert_eq!(state.snapshot().strokes.len(), 1);
        assert_eq!(state.snapshot().strokes[0].id, "s2");
    }
}
