use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// Songs are identified by their database id
pub type EntryId = i64;

// Point value -> entry that received it. One entry per point value.
pub type Ballot = BTreeMap<u32, EntryId>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Show {
    pub id: i64,
    pub name: String,
    pub short_name: String,
    #[serde(default)]
    pub year: Option<i32>,
    pub points: Vec<u32>,
    #[serde(default)]
    pub voting_closes: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    // Username of whoever submitted the song, if known
    #[serde(default)]
    pub submitter: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterBallot {
    pub voter: String,
    pub points: Ballot,
}

// Everything needed to build a scoreboard for one show
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowFile {
    pub show: Show,
    pub entries: Vec<Entry>,
    #[serde(default)]
    pub ballots: Vec<VoterBallot>,
}

impl Show {
    pub fn new(id: i64, name: String, short_name: String, points: Vec<u32>) -> Self {
        Self {
            id,
            name,
            short_name,
            year: None,
            points,
            voting_closes: None,
        }
    }

    // Results stay hidden until voting closes, unless the caller may see restricted shows
    pub fn results_visible(&self, now: DateTime<Utc>, can_view_restricted: bool) -> bool {
        if can_view_restricted {
            return true;
        }
        match self.voting_closes {
            Some(closes) => closes <= now,
            None => true,
        }
    }
}

impl Entry {
    pub fn new(id: EntryId, submitter: Option<&str>) -> Self {
        Self {
            id,
            submitter: submitter.map(str::to_string),
            title: None,
            country: None,
        }
    }
}

impl VoterBallot {
    pub fn new(voter: &str, points: &[(u32, EntryId)]) -> Self {
        Self {
            voter: voter.to_string(),
            points: points.iter().copied().collect(),
        }
    }

    // Points this ballot gave to one entry
    pub fn points_for(&self, entry: EntryId) -> u32 {
        self.points
            .iter()
            .filter(|(_, id)| **id == entry)
            .map(|(pts, _)| *pts)
            .sum()
    }
}
