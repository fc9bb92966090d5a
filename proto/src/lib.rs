//! Wire protocol shared by `conference-server` and `conference-client`:
//! framing (C1), control-channel messages (C3), whiteboard elements (C7),
//! screen-share messages (C6), file-broker messages (C8), and the raw
//! video/audio datagram layouts (C4/C5).

pub mod control;
pub mod file;
pub mod framing;
pub mod media;
pub mod ports;
pub mod screen;
pub mod whiteboard;

pub use control::{ClientControlMessage, RosterEntry, ServerControlMessage, COLOR_PALETTE};
pub use framing::FrameError;
pub use whiteboard::{Point, Shape, ShapeKind, Stroke, TextElement, WhiteboardAction, WhiteboardSnapshot};
