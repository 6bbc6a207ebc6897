use chrono::Utc;
use log::{error, info, warn};
use stage_reveal::config::Settings;
use stage_reveal::error::{AppError, ConfigError, ScoreboardError};
use stage_reveal::models::ShowFile;
use stage_reveal::scoreboard::build_scoreboard;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;

fn run() -> Result<(), AppError> {
    let settings = Settings::from_env()?;

    // A path on the command line wins over SHOW_FILE
    let path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| settings.show_file.clone())
        .ok_or(ConfigError::MissingShowFile)?;

    info!("Loading show from {}", path.display());
    let raw = fs::read_to_string(&path)?;
    let file: ShowFile = serde_json::from_str(&raw)?;

    let options = settings.sequencer_options(file.show.id);
    let scoreboard = build_scoreboard(
        &file.show,
        &file.entries,
        &file.ballots,
        options,
        Utc::now(),
        settings.allow_open,
    )
    .inspect_err(|e| {
        if let ScoreboardError::Sequence(inner) = e {
            warn!("Rejected ballots for show {}: {}", file.show.id, inner);
        }
    })?;

    println!("{}", serde_json::to_string_pretty(&scoreboard)?);
    Ok(())
}

fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    if let Err(e) = run() {
        error!("{}", e);
        process::exit(1);
    }
}
