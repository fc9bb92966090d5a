//! Supervisor (C10): parses config, boots every listener, generates and
//! prints the session password, and owns shutdown.

use std::sync::Arc;

use clap::Parser;
use conference_proto::ports::{PASSWORD_ALPHABET, PASSWORD_LEN};
use conference_server::config::{Cli, Config};
use conference_server::session::SessionRegistry;
use conference_server::whiteboard::WhiteboardState;
use conference_server::{audio, control, files, logging, screen, video};
use rand::Rng;
use tokio::net::{TcpListener, UdpSocket};

fn generate_password() -> String {
    let mut rng = rand::thread_rng();
    (0..PASSWORD_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..PASSWORD_ALPHABET.len());
            PASSWORD_ALPHABET[idx] as char
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;
    config.apply_cli(&cli);

    logging::setup_logger(std::path::Path::new("logs"))?;

    let password: Arc<str> = Arc::from(generate_password());
    println!("Session password: {password}");
    log::info!("session password generated (length {})", password.len());

    let registry = Arc::new(SessionRegistry::new());
    let whiteboard = Arc::new(WhiteboardState::new());
    let screen_arbiter = Arc::new(screen::ScreenArbiter::new());
    let audio_state = Arc::new(audio::AudioState::new());

    let control_listener = TcpListener::bind((config.bind.as_str(), config.control_port)).await?;
    let screen_listener = TcpListener::bind((config.bind.as_str(), config.screen_port)).await?;
    let file_listener = TcpListener::bind((config.bind.as_str(), config.file_port)).await?;
    let video_socket = UdpSocket::bind((config.bind.as_str(), config.video_port)).await?;
    let audio_socket = Arc::new(UdpSocket::bind((config.bind.as_str(), config.audio_port)).await?);

    log::info!(
        "listening: control={} video={} audio={} screen={} file={}",
        config.control_port,
        config.video_port,
        config.audio_port,
        config.screen_port,
        config.file_port,
    );

    let control_task = tokio::spawn(control::run(
        control_listener,
        registry.clone(),
        whiteboard.clone(),
        password.clone(),
    ));
    let video_task = tokio::spawn(video::run(video_socket, registry.clone()));
    let audio_receiver_task = tokio::spawn(audio::run_receiver(audio_socket.clone(), audio_state.clone()));
    let audio_mixer_task = tokio::spawn(audio::run_mixer(audio_socket, audio_state, registry.clone()));
    let screen_task = tokio::spawn(screen::run(screen_listener, screen_arbiter));
    let files_task = tokio::spawn(files::run(file_listener, config.files_dir.clone(), registry));

    tokio::select! {
        res = control_task => log_exit("control", res),
        res = video_task => log_exit("video", res),
        res = audio_receiver_task => log_exit("audio receiver", res),
        res = audio_mixer_task => log_exit("audio mixer", res),
        res = screen_task => log_exit("screen", res),
        res = files_task => log_exit("files", res),
        _ = tokio::signal::ctrl_c() => {
            log::info!("shutdown requested, exiting");
        }
    }

    Ok(())
}

fn log_exit(name: &str, res: Result<anyhow::Result<()>, tokio::task::JoinError>) {
    match res {
        Ok(Ok(())) => log::warn!("{name} listener exited unexpectedly"),
        Ok(Err(e)) => log::error!("{name} listener failed: {e}"),
        Err(e) => log::error!("{name} task panicked: {e}"),
    }
}
