//! Control channel (C3): one worker per accepted TCP connection, reading
//! newline-delimited JSON. The first message from every connection must
//! be `hello`; everything else happens only after successful auth.
//!
//! Ordering guarantee: `whiteboard_sync` and `user_list` are written
//! directly to the new participant's socket, synchronously, before the
//! participant's outbox channel is handed to a writer task. Any broadcast
//! some other worker fires concurrently with registration simply queues
//! in that channel and is only drained once the writer task starts —
//! after the direct sends have already hit the wire.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use conference_proto::framing::{write_ndjson_message, FrameError, NdjsonReader};
use conference_proto::{ClientControlMessage, ServerControlMessage};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::error::RegisterError;
use crate::session::SessionRegistry;
use crate::whiteboard::WhiteboardState;

pub async fn run(
    listener: TcpListener,
    registry: Arc<SessionRegistry>,
    whiteboard: Arc<WhiteboardState>,
    password: Arc<str>,
) -> anyhow::Result<()> {
    let next_conn = AtomicU64::new(1);

    loop {
        let (stream, addr) = listener.accept().await?;
        let conn = next_conn.fetch_add(1, Ordering::Relaxed);
        let registry = registry.clone();
        let whiteboard = whiteboard.clone();
        let password = password.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(conn, stream, addr, registry, whiteboard, password).await
            {
                log::debug!("control connection {conn} ({addr}) ended: {e}");
            }
        });
    }
}

async fn handle_connection(
    conn: u64,
    stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<SessionRegistry>,
    whiteboard: Arc<WhiteboardState>,
    password: Arc<str>,
) -> anyhow::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = NdjsonReader::new(read_half);

    let hello = reader.read_message::<ClientControlMessage>().await?;
    let (name, given_password, video_port, audio_port) = match hello {
        ClientControlMessage::Hello {
            name,
            password,
            video_port,
            audio_port,
        } => (name, password, video_port, audio_port),
        _ => {
            log::debug!("control connection {conn} ({addr}): first message was not hello");
            return Ok(());
        }
    };

    if given_password != *password {
        write_ndjson_message(
            &mut write_half,
            &ServerControlMessage::Error {
                message: "invalid password".to_string(),
                auth_failed: Some(true),
            },
        )
        .await
        .ok();
        return Ok(());
    }

    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel::<ServerControlMessage>();

    let color = match registry.register(conn, name.clone(), addr, video_port, audio_port, outbox_tx) {
        Ok(color) => color,
        Err(RegisterError::NameTaken) => {
            write_ndjson_message(
                &mut write_half,
                &ServerControlMessage::Error {
                    message: "Username already taken".to_string(),
                    auth_failed: None,
                },
            )
            .await
            .ok();
            return Ok(());
        }
    };

    // Direct sends (b) and (c) — before the writer task starts draining
    // the outbox, so nothing broadcast to this connection can arrive first.
    write_ndjson_message(
        &mut write_half,
        &ServerControlMessage::WhiteboardSync {
            snapshot: whiteboard.snapshot(),
        },
    )
    .await?;
    write_ndjson_message(
        &mut write_half,
        &ServerControlMessage::UserList {
            users: registry.snapshot(),
        },
    )
    .await?;

    let writer_task = tokio::spawn(run_writer(write_half, outbox_rx));

    registry.broadcast_except(
        conn,
        ServerControlMessage::Join {
            name: name.clone(),
            color: color.clone(),
        },
    );
    registry.broadcast(ServerControlMessage::UserList {
        users: registry.snapshot(),
    });

    run_reader_loop(conn, &name, &color, &mut reader, &registry, &whiteboard).await;

    writer_task.abort();
    if let Some(participant) = registry.deregister(conn) {
        registry.broadcast(ServerControlMessage::Leave {
            name: participant.name.clone(),
            addr: participant.addr.to_string(),
        });
        registry.broadcast(ServerControlMessage::UserList {
            users: registry.snapshot(),
        });
    }

    Ok(())
}

async fn run_writer(mut write_half: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<ServerControlMessage>) {
    while let Some(msg) = rx.recv().await {
        if write_ndjson_message(&mut write_half, &msg).await.is_err() {
            break;
        }
    }
}

async fn run_reader_loop(
    conn: u64,
    name: &str,
    color: &str,
    reader: &mut NdjsonReader<tokio::net::tcp::OwnedReadHalf>,
    registry: &SessionRegistry,
    whiteboard: &WhiteboardState,
) {
    loop {
        match reader.read_message::<ClientControlMessage>().await {
            Ok(ClientControlMessage::Hello { .. }) => {
                log::debug!("control connection {conn}: ignoring repeated hello");
            }
            Ok(ClientControlMessage::Chat { message }) => {
                registry.broadcast(ServerControlMessage::Chat {
                    from: name.to_string(),
                    message,
                });
            }
            Ok(ClientControlMessage::PrivateChat { to, message }) => {
                let delivered = registry.send_to_name(
                    &to,
                    ServerControlMessage::PrivateChat {
                        from: name.to_string(),
                        message: message.clone(),
                    },
                );
                if delivered {
                    registry.send_to(
                        conn,
                        ServerControlMessage::PrivateChatSent { to, message },
                    );
                } else {
                    registry.send_to(
                        conn,
                        ServerControlMessage::Error {
                            message: format!("no such user: {to}"),
                            auth_failed: None,
                        },
                    );
                }
            }
            Ok(ClientControlMessage::Gesture { gesture_type }) => {
                registry.broadcast_except(
                    conn,
                    ServerControlMessage::Gesture {
                        from: name.to_string(),
                        gesture_type,
                    },
                );
            }
            Ok(ClientControlMessage::WhiteboardAction { action }) => {
                let version = whiteboard.apply(&action);
                registry.broadcast(ServerControlMessage::WhiteboardAction { action, version });
            }
            Ok(ClientControlMessage::CursorMove { x, y }) => {
                registry.broadcast_except(
                    conn,
                    ServerControlMessage::CursorMove {
                        from: name.to_string(),
                        x,
                        y,
                        color: color.to_string(),
                    },
                );
            }
            Ok(ClientControlMessage::PresentStart) => {
                registry.broadcast(ServerControlMessage::PresentStart {
                    from: name.to_string(),
                });
            }
            Ok(ClientControlMessage::PresentStop) => {
                registry.broadcast(ServerControlMessage::PresentStop {
                    from: Some(name.to_string()),
                });
            }
            Ok(ClientControlMessage::Bye) => break,
            Err(FrameError::Closed) | Err(FrameError::Io(_)) => break,
            Err(FrameError::Malformed(e)) => {
                log::debug!("control connection {conn}: ignoring malformed message: {e}");
            }
            Err(FrameError::Oversized(len)) => {
                log::debug!("control connection {conn}: oversized frame ({len} bytes), dropping");
                break;
            }
        }
    }
}

// Handshake ordering and the full per-message routing table are covered by
// the integration tests in `tests/control.rs` against a real accepted
// connection, rather than unit tests here.
