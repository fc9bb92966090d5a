//! Startup logging setup (C12), same shape as the server's.

use anyhow::{Context, Result};
use simplelog::{ColorChoice, CombinedLogger, Config, LevelFilter, TermLogger, TerminalMode, WriteLogger};
use std::fs::File;
use std::path::Path;

pub fn setup_logger(log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir).context("failed to create log directory")?;
    let log_file = File::create(log_dir.join("client.log")).context("failed to create log file")?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Debug, Config::default(), log_file),
    ])
    .ok();

    log::info!("client logger initialized");
    Ok(())
}
