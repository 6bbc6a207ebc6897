pub mod lcg;
pub mod sequencer;

pub use lcg::Lcg;
pub use sequencer::{Sequencer, Thresholds};

use serde::{Deserialize, Serialize};

// How the greedy order is perturbed before it is returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevealMode {
    // Hold back the top submitters' ballots and drop them into the first two thirds
    #[default]
    EarlyVoters,
    // Older behaviour: no hold-back, a few random swaps at the end
    LightShuffle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencerOptions {
    pub winner_weight: u32,
    pub swaps: usize,
    pub seed: i64,
    pub top_entries: usize,
    pub mode: RevealMode,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        Self {
            winner_weight: 2,
            swaps: 5,
            seed: 1,
            top_entries: 3,
            mode: RevealMode::EarlyVoters,
        }
    }
}

impl SequencerOptions {
    // Seeded by show id so every reload of the same show reveals in the same order
    pub fn for_show(show_id: i64) -> Self {
        Self {
            seed: show_id,
            ..Self::default()
        }
    }
}
