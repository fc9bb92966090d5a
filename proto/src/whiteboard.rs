//! Whiteboard element schema (C7) — shared by server and client so that a
//! client's locally replayed state is structurally identical to the
//! server's.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stroke {
    pub id: String,
    pub points: Vec<Point>,
    pub color: String,
    pub width: f64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Circle,
    Rect,
    Line,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Shape {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    pub start: Point,
    pub end: Point,
    pub color: String,
    pub width: f64,
    pub timestamp: u64,
}

impl Shape {
    /// Circles use the Euclidean distance from `start` to `end` as radius.
    pub fn circle_radius(&self) -> f64 {
        let dx = self.end.x - self.start.x;
        let dy = self.end.y - self.start.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextElement {
    pub id: String,
    pub content: String,
    pub position: Point,
    pub color: String,
    pub timestamp: u64,
}

/// One accepted mutation of the whiteboard, as carried inside
/// `whiteboard_action` (client → server) and the broadcast echo
/// (server → all clients).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", content = "data", rename_all = "lowercase")]
pub enum WhiteboardAction {
    Draw(Stroke),
    Shape(Shape),
    Text(TextElement),
    Erase { id: String },
    Clear,
    Undo,
}

/// Full authoritative snapshot, sent to a newly joined client as
/// `whiteboard_sync` before any subsequent delta.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WhiteboardSnapshot {
    pub strokes: Vec<Stroke>,
    pub shapes: Vec<Shape>,
    pub texts: Vec<TextElement>,
    pub version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circle_radius_is_euclidean_distance() {
        let shape = Shape {
            id: "s1".into(),
            kind: ShapeKind::Circle,
            start: Point { x: 0.0, y: 0.0 },
            end: Point { x: 3.0, y: 4.0 },
            color: "#000000".into(),
            width: 1.0,
            timestamp: 0,
        };
        assert_eq!(shape.circle_radius(), 5.0);
    }

    #[test]
    fn action_tag_matches_wire_shape() {
        let action = WhiteboardAction::Erase { id: "x1".into() };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action"], "erase");
        assert_eq!(json["data"]["id"], "x1");
    }
}
