//! Screen-share arbiter wire schema (C6) — length-prefixed JSON.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScreenRole {
    Presenter,
    Viewer,
}

/// First message a new screen-share connection must send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleSelect {
    pub role: ScreenRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusReply {
    pub status: String,
}

impl StatusReply {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Messages exchanged after role selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ScreenMessage {
    #[serde(rename = "screen_frame")]
    ScreenFrame { data: String },
    #[serde(rename = "present_stop")]
    PresentStop,
    #[serde(rename = "disconnect")]
    Disconnect,
}

pub const SCREEN_FRAME_WIDTH: u32 = 800;
pub const SCREEN_FRAME_HEIGHT: u32 = 450;
pub const SCREEN_FRAME_JPEG_QUALITY: u8 = 50;
pub const SCREEN_FRAME_RATE_HZ: u32 = 10;
pub const PRESENTER_READ_TIMEOUT_SECS: u64 = 2;
