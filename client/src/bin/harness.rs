//! CLI harness (C9 entry point): connects the protocol engine, spawns the
//! media channels, and lets a terminal stand in for the GUI that is out
//! of scope here. Typed `Event`s are printed as they arrive; a handful of
//! stdin commands exercise the outgoing side.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use conference_client::config::{Cli, Config};
use conference_client::events::{self, Event};
use conference_client::session::Session;
use conference_client::whiteboard::WhiteboardState;
use conference_client::{audio, files, logging, video};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.apply_cli(&cli);

    logging::setup_logger(std::path::Path::new("logs"))?;

    let (events_tx, mut events_rx) = events::channel();
    let session = Session::connect(&config, events_tx.clone()).await?;
    println!("joined as {} ({})", session.name(), session.color());

    let video_socket = Arc::new(UdpSocket::bind(("0.0.0.0", config.video_listen_port)).await?);
    let audio_socket = Arc::new(UdpSocket::bind(("0.0.0.0", config.audio_listen_port)).await?);
    let video_target = (config.host.as_str(), config.video_port);
    let video_target = tokio::net::lookup_host(video_target)
        .await?
        .next()
        .ok_or_else(|| anyhow::anyhow!("could not resolve video target"))?;
    let audio_target = (config.host.as_str(), config.audio_port);
    let audio_target = tokio::net::lookup_host(audio_target)
        .await?
        .next()
        .ok_or_else(|| anyhow::anyhow!("could not resolve audio target"))?;

    let video_enabled = Arc::new(AtomicBool::new(false));
    let audio_enabled = Arc::new(AtomicBool::new(false));
    let (_video_frames_tx, video_frames_rx) = tokio::sync::mpsc::channel::<Vec<u8>>(4);
    let (_audio_packets_tx, audio_packets_rx) = tokio::sync::mpsc::channel::<Vec<i16>>(4);

    tokio::spawn(video::run_send_loop(
        video_socket.clone(),
        video_target,
        video_enabled,
        video_frames_rx,
    ));
    tokio::spawn(video::run_receive_loop(video_socket, events_tx.clone()));

    tokio::spawn(audio::run_send_loop(
        audio_socket.clone(),
        audio_target,
        audio_enabled,
        audio_packets_rx,
    ));
    let jitter_buffer = Arc::new(audio::JitterBuffer::new());
    tokio::spawn(audio::run_receive_loop(audio_socket, jitter_buffer));

    let whiteboard = Arc::new(Mutex::new(WhiteboardState::new()));

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => handle_command(&session, &config, &line).await,
                    None => break,
                }
            }
            event = events_rx.recv() => {
                match event {
                    Some(event) => print_event(&whiteboard, event),
                    None => break,
                }
            }
        }
    }

    session.leave();
    Ok(())
}

async fn handle_command(session: &Session, config: &Config, line: &str) {
    let mut parts = line.splitn(2, ' ');
    match (parts.next().unwrap_or(""), parts.next()) {
        ("chat", Some(message)) => session.send_chat(message.to_string()),
        ("present-start", _) => session.present_start(),
        ("present-stop", _) => session.present_stop(),
        ("upload", Some(path)) => {
            if let Err(e) = files::upload(config, session.name(), &PathBuf::from(path)).await {
                eprintln!("upload failed: {e}");
            }
        }
        ("download", Some(filename)) => match files::download(config, filename).await {
            Ok(dest) => println!("saved to {}", dest.display()),
            Err(e) => eprintln!("download failed: {e}"),
        },
        _ => eprintln!("unrecognized command: {line}"),
    }
}

fn print_event(whiteboard: &Arc<Mutex<WhiteboardState>>, event: Event) {
    match event {
        Event::Joined { whiteboard: snapshot, roster } => {
            whiteboard.lock().reset(snapshot);
            println!("roster: {roster:?}");
        }
        Event::WhiteboardAction { action, version } => {
            whiteboard.lock().apply(action, version);
        }
        Event::Chat { from, message } => println!("{from}: {message}"),
        Event::VideoFrame { source, jpeg_bytes } => {
            println!("video frame from {source}: {} bytes", jpeg_bytes.len());
        }
        Event::ScreenFrame { jpeg_bytes } => {
            println!("screen frame: {} bytes", jpeg_bytes.len());
        }
        Event::Disconnected { reason } => {
            println!("disconnected: {reason}");
        }
        other => println!("{other:?}"),
    }
}
