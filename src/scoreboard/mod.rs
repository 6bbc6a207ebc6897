use crate::error::ScoreboardError;
use crate::models::{Entry, EntryId, Show, VoterBallot};
use crate::voting::{Sequencer, SequencerOptions};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Award {
    pub points: u32,
    pub entry: EntryId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub entry: EntryId,
    pub points: u64,
    pub voters: usize,
    pub place: usize,
    pub can_win: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealStep {
    pub voter: String,
    pub awarded: Vec<Award>,
    pub standings: Vec<Standing>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scoreboard {
    pub show_id: i64,
    pub points: Vec<u32>,
    pub vote_order: Vec<String>,
    pub steps: Vec<RevealStep>,
    pub winner: Option<EntryId>,
    // Entries each voter submitted, so a renderer can flag "own entry"
    pub user_entries: BTreeMap<String, Vec<EntryId>>,
}

// Running state for one entry while the ballots are replayed
#[derive(Debug, Clone, Default)]
struct Running {
    points: u64,
    voters: usize,
    // Point value -> how many times it was received
    received: BTreeMap<u32, usize>,
    running_order: usize,
}

// Better entries sort first
fn compare(a: &Running, b: &Running) -> Ordering {
    b.points
        .cmp(&a.points)
        .then(b.voters.cmp(&a.voters))
        .then_with(|| countback(a, b))
        .then(a.running_order.cmp(&b.running_order))
}

// Bigger top score wins, then more of each smaller value counting up from the bottom
fn countback(a: &Running, b: &Running) -> Ordering {
    let ours_max = a.received.keys().max().copied().unwrap_or(0);
    let theirs_max = b.received.keys().max().copied().unwrap_or(0);
    if ours_max != theirs_max {
        return theirs_max.cmp(&ours_max);
    }

    let mut values: Vec<u32> = a
        .received
        .keys()
        .chain(b.received.keys())
        .copied()
        .filter(|v| *v < ours_max)
        .collect();
    values.sort_unstable();
    values.dedup();
    for value in values {
        let ours = a.received.get(&value).copied().unwrap_or(0);
        let theirs = b.received.get(&value).copied().unwrap_or(0);
        if ours != theirs {
            return theirs.cmp(&ours);
        }
    }
    Ordering::Equal
}

fn standings(
    running: &BTreeMap<EntryId, Running>,
    remaining: usize,
    max_point: u32,
) -> Vec<Standing> {
    let mut ranked: Vec<(&EntryId, &Running)> = running.iter().collect();
    ranked.sort_by(|(_, a), (_, b)| compare(a, b));

    let leader_points = ranked.first().map_or(0, |(_, r)| r.points);
    let still_available = remaining as u64 * u64::from(max_point);

    ranked
        .into_iter()
        .enumerate()
        .map(|(i, (entry, r))| Standing {
            entry: *entry,
            points: r.points,
            voters: r.voters,
            place: i + 1,
            can_win: i == 0 || r.points + still_available > leader_points,
        })
        .collect()
}

// Replay ballots in reveal order, recording the table after each one
pub fn replay(
    order: &[String],
    ballots: &[VoterBallot],
    entries: &[Entry],
    points: &[u32],
) -> Vec<RevealStep> {
    let by_voter: HashMap<&str, &VoterBallot> =
        ballots.iter().map(|b| (b.voter.as_str(), b)).collect();
    let max_point = points.iter().max().copied().unwrap_or(0);

    let mut running: BTreeMap<EntryId, Running> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            (
                entry.id,
                Running {
                    running_order: i,
                    ..Running::default()
                },
            )
        })
        .collect();

    let mut steps = Vec::with_capacity(order.len());
    for (revealed, voter) in order.iter().enumerate() {
        let Some(ballot) = by_voter.get(voter.as_str()) else {
            warn!("Voter {} is in the reveal order but has no ballot", voter);
            continue;
        };

        let mut awarded = Vec::with_capacity(ballot.points.len());
        let mut seen = Vec::new();
        for (pts, entry) in ballot.points.iter().rev() {
            awarded.push(Award {
                points: *pts,
                entry: *entry,
            });
            if let Some(r) = running.get_mut(entry) {
                r.points += u64::from(*pts);
                *r.received.entry(*pts).or_insert(0) += 1;
                if !seen.contains(entry) {
                    r.voters += 1;
                    seen.push(*entry);
                }
            }
        }

        let remaining = order.len() - revealed - 1;
        steps.push(RevealStep {
            voter: voter.clone(),
            awarded,
            standings: standings(&running, remaining, max_point),
        });
    }
    steps
}

pub fn user_entries(order: &[String], entries: &[Entry]) -> BTreeMap<String, Vec<EntryId>> {
    let mut owned: BTreeMap<String, Vec<EntryId>> = BTreeMap::new();
    for voter in order {
        let songs: Vec<EntryId> = entries
            .iter()
            .filter(|e| e.submitter.as_deref() == Some(voter.as_str()))
            .map(|e| e.id)
            .collect();
        if !songs.is_empty() {
            owned.insert(voter.clone(), songs);
        }
    }
    owned
}

pub fn build_scoreboard(
    show: &Show,
    entries: &[Entry],
    ballots: &[VoterBallot],
    options: SequencerOptions,
    now: DateTime<Utc>,
    can_view_restricted: bool,
) -> Result<Scoreboard, ScoreboardError> {
    if !show.results_visible(now, can_view_restricted) {
        if let Some(closes) = show.voting_closes {
            return Err(ScoreboardError::VotingOpen {
                show_id: show.id,
                closes,
            });
        }
    }

    let sequencer = Sequencer::new(ballots, entries, &show.points, options)?;
    let vote_order = sequencer.get_order();
    info!(
        "Built reveal order for show {} ({} voters)",
        show.id,
        vote_order.len()
    );

    let steps = replay(&vote_order, ballots, entries, &show.points);
    let winner = steps
        .last()
        .and_then(|step| step.standings.first())
        .map(|s| s.entry);

    let mut points = show.points.clone();
    points.sort_unstable_by(|a, b| b.cmp(a));

    Ok(Scoreboard {
        show_id: show.id,
        points,
        user_entries: user_entries(&vote_order, entries),
        vote_order,
        steps,
        winner,
    })
}
