use crate::error::ConfigError;
use crate::voting::{RevealMode, SequencerOptions};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub winner_weight: u32,
    pub swaps: usize,
    pub top_entries: usize,
    pub mode: RevealMode,
    // Overrides the show id as the reveal seed
    pub seed: Option<i64>,
    pub allow_open: bool,
    pub show_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let options = SequencerOptions::default();
        Self {
            winner_weight: options.winner_weight,
            swaps: options.swaps,
            top_entries: options.top_entries,
            mode: options.mode,
            seed: None,
            allow_open: false,
            show_file: None,
        }
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid { key, value }),
    }
}

fn parse_mode(key: &'static str, value: String) -> Result<RevealMode, ConfigError> {
    match value.trim() {
        "early-voters" => Ok(RevealMode::EarlyVoters),
        "light-shuffle" => Ok(RevealMode::LightShuffle),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.clone(),
        }),
    }
}

impl Settings {
    // Read settings from the process environment (after dotenvy has loaded .env)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(v) = lookup("REVEAL_WINNER_WEIGHT") {
            settings.winner_weight = parse("REVEAL_WINNER_WEIGHT", v)?;
        }
        if let Some(v) = lookup("REVEAL_SWAPS") {
            settings.swaps = parse("REVEAL_SWAPS", v)?;
        }
        if let Some(v) = lookup("REVEAL_TOP_ENTRIES") {
            settings.top_entries = parse("REVEAL_TOP_ENTRIES", v)?;
        }
        if let Some(v) = lookup("REVEAL_MODE") {
            settings.mode = parse_mode("REVEAL_MODE", v)?;
        }
        if let Some(v) = lookup("REVEAL_SEED") {
            settings.seed = Some(parse("REVEAL_SEED", v)?);
        }
        if let Some(v) = lookup("REVEAL_ALLOW_OPEN") {
            settings.allow_open = parse_bool("REVEAL_ALLOW_OPEN", v)?;
        }
        settings.show_file = lookup("SHOW_FILE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(settings)
    }

    pub fn sequencer_options(&self, show_id: i64) -> SequencerOptions {
        SequencerOptions {
            winner_weight: self.winner_weight,
            swaps: self.swaps,
            seed: self.seed.unwrap_or(show_id),
            top_entries: self.top_entries,
            mode: self.mode,
        }
    }
}
