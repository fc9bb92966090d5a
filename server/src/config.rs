//! Server configuration (C11): a `server.toml` file merged with CLI flags.
//!
//! Mirrors the teacher's `Config::load()` convention of a TOML file with
//! `serde(default = ...)` fallbacks, but adds a `clap` CLI layer on top so
//! ports and paths can be overridden without editing a file.

use std::path::PathBuf;

use clap::Parser;
use conference_proto::ports;
use serde::{Deserialize, Serialize};

fn default_bind() -> String {
    "0.0.0.0".to_string()
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

fn default_files_dir() -> PathBuf {
    PathBuf::from("server_files")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind")]
    pub bind: String,
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
    #[serde(default = "default_files_dir")]
    pub files_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            control_port: default_control_port(),
            video_port: default_video_port(),
            audio_port: default_audio_port(),
            screen_port: default_screen_port(),
            file_port: default_file_port(),
            files_dir: default_files_dir(),
        }
    }
}

impl Config {
    /// Load `path` if it exists, falling back to defaults otherwise. A
    /// missing file is not an error — unlike the client CLI harness, the
    /// server should boot with sane defaults out of the box.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(bind) = &cli.bind {
            self.bind = bind.clone();
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
        if let Some(dir) = &cli.files_dir {
            self.files_dir = dir.clone();
        }
    }
}

/// LAN conference server.
#[derive(Debug, Parser)]
#[command(name = "conference-server", version)]
pub struct Cli {
    /// Path to a server.toml config file (optional).
    #[arg(long, default_value = "server.toml")]
    pub config: PathBuf,

    #[arg(long)]
    pub bind: Option<String>,
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
    pub files_dir: Option<PathBuf>,
}
