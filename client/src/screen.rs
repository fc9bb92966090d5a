//! Screen-share client (C9, stream concern): a presenter session sends
//! JPEG frames on a dedicated connection, a viewer session receives them.
//! Each is its own short-lived TCP connection to the arbiter, distinct
//! from the long-lived control session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use conference_proto::framing::{read_length_prefixed, write_length_prefixed};
use conference_proto::screen::{RoleSelect, ScreenMessage, ScreenRole, StatusReply, SCREEN_FRAME_RATE_HZ};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::events::{Event, EventSender};

async fn connect_and_select(config: &Config, role: ScreenRole) -> anyhow::Result<TcpStream> {
    let mut stream = TcpStream::connect((config.host.as_str(), config.screen_port)).await?;
    write_length_prefixed(&mut stream, &RoleSelect { role }).await?;
    let _: StatusReply = read_length_prefixed(&mut stream).await?;
    Ok(stream)
}

/// Present a screen share: pace outgoing JPEG frames at
/// [`SCREEN_FRAME_RATE_HZ`], sending only the latest frame handed in on
/// each tick. Returns once `present_stop` is requested or the connection
/// drops.
pub async fn run_presenter(
    config: &Config,
    stop: Arc<AtomicBool>,
    mut frames: mpsc::Receiver<Vec<u8>>,
) -> anyhow::Result<()> {
    let mut stream = connect_and_select(&config, ScreenRole::Presenter).await?;
    let mut ticker = tokio::time::interval(Duration::from_millis(1000 / SCREEN_FRAME_RATE_HZ as u64));

    loop {
        ticker.tick().await;
        if stop.load(Ordering::Relaxed) {
            write_length_prefixed(&mut stream, &ScreenMessage::PresentStop).await.ok();
            break;
        }
        let mut latest = None;
        while let Ok(frame) = frames.try_recv() {
            latest = Some(frame);
        }
        if let Some(frame) = latest {
            let msg = ScreenMessage::ScreenFrame {
                data: STANDARD.encode(&frame),
            };
            if write_length_prefixed(&mut stream, &msg).await.is_err() {
                break;
            }
        }
    }
    Ok(())
}

/// Watch a screen share: connect as a viewer and emit
/// [`Event::ScreenFrame`] for every frame received, until the presenter
/// stops or the connection drops.
pub async fn run_viewer(config: &Config, events: EventSender) -> anyhow::Result<()> {
    let mut stream = connect_and_select(&config, ScreenRole::Viewer).await?;

    loop {
        match read_length_prefixed::<ScreenMessage, _>(&mut stream).await {
            Ok(ScreenMessage::ScreenFrame { data }) => {
                let Ok(jpeg_bytes) = STANDARD.decode(&data) else {
                    continue;
                };
                if events.send(Event::ScreenFrame { jpeg_bytes }).is_err() {
                    break;
                }
            }
            Ok(ScreenMessage::PresentStop) | Ok(ScreenMessage::Disconnect) => break,
            Err(_) => break,
        }
    }
    Ok(())
}
