use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::EntryId;

// Raised while validating a show's ballots, before any ordering happens
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("voter {voter} awarded points to unknown entry {entry}")]
    UnknownEntry { voter: String, entry: EntryId },
    #[error("voter {voter} used {points} points, which is not on the point scale")]
    UnknownPoints { voter: String, points: u32 },
    #[error("voter {0} has more than one ballot")]
    DuplicateVoter(String),
    #[error("entry {0} is listed more than once")]
    DuplicateEntry(EntryId),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoreboardError {
    #[error("voting for show {show_id} has not closed yet (closes {closes})")]
    VotingOpen { show_id: i64, closes: DateTime<Utc> },
    #[error(transparent)]
    Sequence(#[from] SequenceError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
    #[error("no show file given (pass a path or set SHOW_FILE)")]
    MissingShowFile,
}

// Everything the binary can fail with
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to read show file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse show file: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scoreboard(#[from] ScoreboardError),
}
