//! Control session (C9, control concern): maintains the newline-framed
//! connection, dispatches received messages onto the event stream, and
//! serializes outgoing requests through a dedicated writer task.

use conference_proto::framing::{write_ndjson_message, FrameError, NdjsonReader};
use conference_proto::{ClientControlMessage, ServerControlMessage, WhiteboardAction};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::error::JoinError;
use crate::events::{Event, EventSender};

/// A live control-channel session. Dropping this does not close the
/// connection cleanly — call [`Session::leave`] first.
pub struct Session {
    outbound: mpsc::UnboundedSender<ClientControlMessage>,
    name: String,
    color: String,
}

impl Session {
    /// Authenticate against the server and start the background reader and
    /// writer tasks. The session password is required; `auth_failed` and
    /// name-collision responses are both treated as fatal per `spec.md` §7.
    pub async fn connect(config: &Config, events: EventSender) -> Result<Self, JoinError> {
        let (host, port) = config.control_addr();
        let stream = TcpStream::connect((host.as_str(), port)).await?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = NdjsonReader::new(read_half);

        write_ndjson_message(
            &mut write_half,
            &ClientControlMessage::Hello {
                name: config.name.clone(),
                password: config.password.clone(),
                video_port: config.video_listen_port,
                audio_port: config.audio_listen_port,
            },
        )
        .await?;

        let first: ServerControlMessage = reader.read_message().await?;
        let whiteboard = match first {
            ServerControlMessage::WhiteboardSync { snapshot } => snapshot,
            ServerControlMessage::Error { auth_failed: Some(true), .. } => {
                return Err(JoinError::AuthFailed)
            }
            ServerControlMessage::Error { .. } => return Err(JoinError::NameTaken),
            _ => return Err(JoinError::UnexpectedMessage),
        };

        let second: ServerControlMessage = reader.read_message().await?;
        let roster = match second {
            ServerControlMessage::UserList { users } => users,
            _ => return Err(JoinError::UnexpectedMessage),
        };

        let color = roster
            .iter()
            .find(|entry| entry.name == config.name)
            .map(|entry| entry.color.clone())
            .unwrap_or_default();

        let _ = events.send(Event::Joined {
            whiteboard,
            roster,
        });

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<ClientControlMessage>();

        tokio::spawn(run_writer(write_half, outbound_rx));
        tokio::spawn(run_reader(reader, events));

        Ok(Self {
            outbound: outbound_tx,
            name: config.name.clone(),
            color,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn send_chat(&self, message: String) {
        self.send(ClientControlMessage::Chat { message });
    }

    pub fn send_private_chat(&self, to: String, message: String) {
        self.send(ClientControlMessage::PrivateChat { to, message });
    }

    pub fn send_gesture(&self, gesture_type: String) {
        self.send(ClientControlMessage::Gesture { gesture_type });
    }

    pub fn send_whiteboard_action(&self, action: WhiteboardAction) {
        self.send(ClientControlMessage::WhiteboardAction { action });
    }

    pub fn send_cursor_move(&self, x: f64, y: f64) {
        self.send(ClientControlMessage::CursorMove { x, y });
    }

    pub fn present_start(&self) {
        self.send(ClientControlMessage::PresentStart);
    }

    pub fn present_stop(&self) {
        self.send(ClientControlMessage::PresentStop);
    }

    pub fn leave(&self) {
        self.send(ClientControlMessage::Bye);
    }

    fn send(&self, msg: ClientControlMessage) {
        let _ = self.outbound.send(msg);
    }
}

async fn run_writer(
    mut write_half: tokio::net::tcp::OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<ClientControlMessage>,
) {
    while let Some(msg) = rx.recv().await {
        if write_ndjson_message(&mut write_half, &msg).await.is_err() {
            break;
        }
    }
}

async fn run_reader(mut reader: NdjsonReader<tokio::net::tcp::OwnedReadHalf>, events: EventSender) {
    loop {
        match reader.read_message::<ServerControlMessage>().await {
            Ok(ServerControlMessage::Error { message, .. }) => {
                let _ = events.send(Event::ServerError { message });
            }
            Ok(ServerControlMessage::Join { name, color }) => {
                let _ = events.send(Event::UserJoined { name, color });
            }
            Ok(ServerControlMessage::Leave { name, .. }) => {
                let _ = events.send(Event::UserLeft { name });
            }
            Ok(ServerControlMessage::UserList { users }) => {
                let _ = events.send(Event::RosterUpdated { roster: users });
            }
            Ok(ServerControlMessage::WhiteboardSync { .. }) => {
                log::debug!("ignoring unexpected second whiteboard_sync");
            }
            Ok(ServerControlMessage::WhiteboardAction { action, version }) => {
                let _ = events.send(Event::WhiteboardAction { action, version });
            }
            Ok(ServerControlMessage::Chat { from, message }) => {
                let _ = events.send(Event::Chat { from, message });
            }
            Ok(ServerControlMessage::PrivateChat { from, message }) => {
                let _ = events.send(Event::PrivateChat { from, message });
            }
            Ok(ServerControlMessage::PrivateChatSent { to, message }) => {
                let _ = events.send(Event::PrivateChatSent { to, message });
            }
            Ok(ServerControlMessage::Gesture { from, gesture_type }) => {
                let _ = events.send(Event::Gesture { from, gesture_type });
            }
            Ok(ServerControlMessage::CursorMove { from, x, y, color }) => {
                let _ = events.send(Event::CursorMove { from, x, y, color });
            }
            Ok(ServerControlMessage::PresentStart { from }) => {
                let _ = events.send(Event::PresentStart { from });
            }
            Ok(ServerControlMessage::PresentStop { from }) => {
                let _ = events.send(Event::PresentStop { from });
            }
            Ok(ServerControlMessage::FileOffer { from, filename, size }) => {
                let _ = events.send(Event::FileOffer { from, filename, size });
            }
            Err(FrameError::Malformed(e)) => {
                log::debug!("ignoring malformed server message: {e}");
            }
            Err(e) => {
                let _ = events.send(Event::Disconnected {
                    reason: e.to_string(),
                });
                break;
            }
        }
    }
}
