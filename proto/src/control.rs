//! Control-channel message schema (C3) — newline-delimited JSON exchanged
//! on the TCP control socket.
//!
//! Client and server messages are modeled as two separate tagged enums
//! rather than one bidirectional type: a `hello` the server receives and a
//! `join` the server sends carry different fields, and giving each
//! direction its own type means a handler only ever sees the fields it
//! actually needs (per `spec.md` §9's "tagged sum-type" redesign note).

use serde::{Deserialize, Serialize};

use crate::whiteboard::{WhiteboardAction, WhiteboardSnapshot};

/// Fixed round-robin cursor/presence color palette (seven values).
pub const COLOR_PALETTE: [&str; 7] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#46f0f0", "#f032e6",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RosterEntry {
    pub name: String,
    pub color: String,
}

/// Messages a participant sends to the server after a successful `hello`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientControlMessage {
    #[serde(rename = "hello")]
    Hello {
        name: String,
        password: String,
        video_port: u16,
        audio_port: u16,
    },
    #[serde(rename = "chat")]
    Chat { message: String },
    #[serde(rename = "private_chat")]
    PrivateChat { to: String, message: String },
    #[serde(rename = "gesture")]
    Gesture { gesture_type: String },
    #[serde(rename = "whiteboard_action")]
    WhiteboardAction {
        #[serde(flatten)]
        action: WhiteboardAction,
    },
    #[serde(rename = "cursor_move")]
    CursorMove { x: f64, y: f64 },
    #[serde(rename = "present_start")]
    PresentStart,
    #[serde(rename = "present_stop")]
    PresentStop,
    #[serde(rename = "bye")]
    Bye,
}

/// Messages the server sends to one or more participants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ServerControlMessage {
    #[serde(rename = "error")]
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        auth_failed: Option<bool>,
    },
    #[serde(rename = "join")]
    Join { name: String, color: String },
    #[serde(rename = "leave")]
    Leave { name: String, addr: String },
    #[serde(rename = "user_list")]
    UserList { users: Vec<RosterEntry> },
    #[serde(rename = "whiteboard_sync")]
    WhiteboardSync {
        #[serde(flatten)]
        snapshot: WhiteboardSnapshot,
    },
    #[serde(rename = "whiteboard_action")]
    WhiteboardAction {
        #[serde(flatten)]
        action: WhiteboardAction,
        version: u64,
    },
    #[serde(rename = "chat")]
    Chat { from: String, message: String },
    #[serde(rename = "private_chat")]
    PrivateChat { from: String, message: String },
    #[serde(rename = "private_chat_sent")]
    PrivateChatSent { to: String, message: String },
    #[serde(rename = "gesture")]
    Gesture { from: String, gesture_type: String },
    #[serde(rename = "cursor_move")]
    CursorMove {
        from: String,
        x: f64,
        y: f64,
        color: String,
    },
    #[serde(rename = "present_start")]
    PresentStart { from: String },
    #[serde(rename = "present_stop")]
    PresentStop {
        #[serde(skip_serializing_if = "Option::is_none")]
        from: Option<String>,
    },
    #[serde(rename = "file_offer")]
    FileOffer {
        from: String,
        filename: String,
        size: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::whiteboard::{Point, Stroke};

    #[test]
    fn hello_round_trips() {
        let msg = ClientControlMessage::Hello {
            name: "alice".into(),
            password: "A1B2".into(),
            video_port: 10001,
            audio_port: 11001,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"hello\""));
        let back: ClientControlMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn whiteboard_action_flattens_alongside_version() {
        let msg = ServerControlMessage::WhiteboardAction {
            action: WhiteboardAction::Draw(Stroke {
                id: "s1".into(),
                points: vec![Point { x: 0.0, y: 0.0 }, Point { x: 10.0, y: 10.0 }],
                color: "#000000".into(),
                width: 3.0,
                timestamp: 0,
            }),
            version: 1,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "whiteboard_action");
        assert_eq!(json["action"], "draw");
        assert_eq!(json["data"]["id"], "s1");
        assert_eq!(json["version"], 1);
    }

    #[test]
    fn unknown_type_fails_to_parse_as_known_enum() {
        let raw = serde_json::json!({"type": "teleport", "x": 1});
        let result: Result<ClientControlMessage, _> = serde_json::from_value(raw);
        assert!(result.is_err());
    }
}
