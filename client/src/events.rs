//! Typed event stream (C9): the seam the out-of-scope UI subscribes to.
//! The protocol engine never calls into UI code directly — it only ever
//! pushes an [`Event`] onto an unbounded channel and moves on, matching
//! `spec.md` §9's "typed event stream replaces GUI signals/slots" note.

use std::net::Ipv4Addr;

use conference_proto::{RosterEntry, WhiteboardAction, WhiteboardSnapshot};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum Event {
    /// Authentication succeeded; carries the initial whiteboard snapshot
    /// and roster, in the order the server is guaranteed to send them.
    Joined {
        whiteboard: WhiteboardSnapshot,
        roster: Vec<RosterEntry>,
    },
    UserJoined {
        name: String,
        color: String,
    },
    UserLeft {
        name: String,
    },
    RosterUpdated {
        roster: Vec<RosterEntry>,
    },
    Chat {
        from: String,
        message: String,
    },
    PrivateChat {
        from: String,
        message: String,
    },
    PrivateChatSent {
        to: String,
        message: String,
    },
    Gesture {
        from: String,
        gesture_type: String,
    },
    CursorMove {
        from: String,
        x: f64,
        y: f64,
        color: String,
    },
    WhiteboardAction {
        action: WhiteboardAction,
        version: u64,
    },
    PresentStart {
        from: String,
    },
    PresentStop {
        from: Option<String>,
    },
    FileOffer {
        from: String,
        filename: String,
        size: u64,
    },
    ServerError {
        message: String,
    },
    /// One source's video frame has been fully reassembled from fragments.
    VideoFrame {
        source: Ipv4Addr,
        jpeg_bytes: Vec<u8>,
    },
    /// One presenter frame arrived on the screen-share channel.
    ScreenFrame {
        jpeg_bytes: Vec<u8>,
    },
    /// The control connection ended, for any reason other than a
    /// deliberate `leave()` call.
    Disconnected {
        reason: String,
    },
}

pub type EventSender = mpsc::UnboundedSender<Event>;
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
