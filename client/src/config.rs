//! Client configuration (C11): a `client.toml` file merged with CLI flags,
//! mirroring `conference-server`'s `config.rs` layering.

use std::path::PathBuf;

use clap::Parser;
use conference_proto::ports;
use serde::{Deserialize, Serialize};

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_control_port() -> u16 {
    ports::CONTROL_PORT
}

fn default_video_port() -> u16 {
    ports::VIDEO_PORT
}

fn default_audio_port() -> u16 {
    ports::AUDIO_PORT
}

fn default_screen_port() -> u16 {
    ports::SCREEN_PORT
}

fn default_file_port() -> u16 {
    ports::FILE_PORT
}

fn default_video_listen_port() -> u16 {
    ports::CLIENT_VIDEO_LISTEN_PORT
}

fn default_audio_listen_port() -> u16 {
    ports::CLIENT_AUDIO_LISTEN_PORT
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ConferenceFiles")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub name: String,
    pub password: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_control_port")]
    pub control_port: u16,
    #[serde(default = "default_video_port")]
    pub video_port: u16,
    #[serde(default = "default_audio_port")]
    pub audio_port: u16,
    #[serde(default = "default_screen_port")]
    pub screen_port: u16,
    #[serde(default = "default_file_port")]
    pub file_port: u16,
    #[serde(default = "default_video_listen_port")]
    pub video_listen_port: u16,
    #[serde(default = "default_audio_listen_port")]
    pub audio_listen_port: u16,
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

impl Config {
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(name) = &cli.name {
            self.name = name.clone();
        }
        if let Some(password) = &cli.password {
            self.password = password.clone();
        }
        if let Some(host) = &cli.host {
            self.host = host.clone();
        }
        if let Some(p) = cli.control_port {
            self.control_port = p;
        }
        if let Some(p) = cli.video_port {
            self.video_port = p;
        }
        if let Some(p) = cli.audio_port {
            self.audio_port = p;
        }
        if let Some(p) = cli.screen_port {
            self.screen_port = p;
        }
        if let Some(p) = cli.file_port {
            self.file_port = p;
        }
        if let Some(dir) = &cli.download_dir {
            self.download_dir = dir.clone();
        }
    }

    pub fn control_addr(&self) -> (String, u16) {
        (self.host.clone(), self.control_port)
    }
}

/// LAN conference client harness.
#[derive(Debug, Parser)]
#[command(name = "conference-client", version)]
pub struct Cli {
    /// Path to a client.toml config file (optional; `name`/`password` may
    /// instead be supplied on the command line).
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub control_port: Option<u16>,
    #[arg(long)]
    pub video_port: Option<u16>,
    #[arg(long)]
    pub audio_port: Option<u16>,
    #[arg(long)]
    pub screen_port: Option<u16>,
    #[arg(long)]
    pub file_port: Option<u16>,
    #[arg(long)]
    pub download_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "guest".to_string(),
            password: String::new(),
            host: default_host(),
            control_port: default_control_port(),
            video_port: default_video_port(),
            audio_port: default_audio_port(),
            screen_port: default_screen_port(),
            file_port: default_file_port(),
            video_listen_port: default_video_listen_port(),
            audio_listen_port: default_audio_listen_port(),
            download_dir: default_download_dir(),
        }
    }
}
