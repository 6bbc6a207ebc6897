use crate::error::SequenceError;
use crate::models::{Ballot, Entry, EntryId, VoterBallot};
use crate::voting::{Lcg, RevealMode, SequencerOptions};
use log::debug;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};

// Running points per entry
pub type Tally = BTreeMap<EntryId, u64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub high: u32,
    pub medium: u32,
}

impl Thresholds {
    // Split the descending scale into thirds; each threshold is the smallest value in its third
    pub fn from_scale(points: &[u32]) -> Self {
        let mut sorted = points.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        let n = sorted.len();

        let high = sorted[..n / 3].iter().min().copied().unwrap_or(0);
        let medium = sorted[n / 3..2 * n / 3].iter().min().copied().unwrap_or(0);

        // With an empty top third everything is "high" anyway
        Self {
            high,
            medium: medium.min(high),
        }
    }
}

// The tally as it would look after revealing `ballot`, leaving the input untouched
pub fn simulate_apply(tally: &Tally, ballot: &Ballot) -> Tally {
    let mut next = tally.clone();
    for (pts, entry) in ballot {
        *next.entry(*entry).or_insert(0) += u64::from(*pts);
    }
    next
}

// Distance between first and second place, zero with fewer than two entries
pub fn top_two_gap(tally: &Tally) -> u64 {
    let mut first = None;
    let mut second = None;
    for &score in tally.values() {
        match first {
            Some(top) if score <= top => {
                if second.is_none_or(|s| score > s) {
                    second = Some(score);
                }
            }
            _ => {
                second = first;
                first = Some(score);
            }
        }
    }
    match (first, second) {
        (Some(top), Some(next)) => top - next,
        _ => 0,
    }
}

/// Orders a show's ballots for a live reveal.
///
/// Final scores are computed up front so the sequencer knows the winner, then
/// ballots are revealed greedily so the winner's lead stays as small as
/// possible for as long as possible.
pub struct Sequencer<'a> {
    ballots: &'a [VoterBallot],
    entries: &'a [Entry],
    options: SequencerOptions,
    thresholds: Thresholds,
    final_scores: Tally,
    known_winner: Option<EntryId>,
    top_entries: Vec<EntryId>,
}

impl<'a> Sequencer<'a> {
    pub fn new(
        ballots: &'a [VoterBallot],
        entries: &'a [Entry],
        points: &[u32],
        options: SequencerOptions,
    ) -> Result<Self, SequenceError> {
        validate(ballots, entries, points)?;

        let thresholds = Thresholds::from_scale(points);
        let final_scores = ballots
            .iter()
            .fold(zero_tally(entries), |tally, ballot| {
                simulate_apply(&tally, &ballot.points)
            });

        // Ties go to the lowest entry id
        let known_winner = final_scores
            .iter()
            .max_by_key(|(id, score)| (**score, Reverse(**id)))
            .map(|(id, _)| *id);

        let mut ranked: Vec<(EntryId, u64)> =
            final_scores.iter().map(|(id, score)| (*id, *score)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let top_entries = ranked
            .into_iter()
            .take(options.top_entries)
            .map(|(id, _)| id)
            .collect();

        debug!(
            "Sequencer ready: {} ballots, thresholds high={} medium={}, known winner {:?}",
            ballots.len(),
            thresholds.high,
            thresholds.medium,
            known_winner
        );

        Ok(Self {
            ballots,
            entries,
            options,
            thresholds,
            final_scores,
            known_winner,
            top_entries,
        })
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn final_scores(&self) -> &Tally {
        &self.final_scores
    }

    pub fn known_winner(&self) -> Option<EntryId> {
        self.known_winner
    }

    pub fn top_entries(&self) -> &[EntryId] {
        &self.top_entries
    }

    // Voters who submitted one of the top entries, in ballot order
    pub fn early_voters(&self) -> Vec<&'a str> {
        if self.options.mode != RevealMode::EarlyVoters {
            return Vec::new();
        }
        let top_submitters: HashSet<&str> = self
            .entries
            .iter()
            .filter(|entry| self.top_entries.contains(&entry.id))
            .filter_map(|entry| entry.submitter.as_deref())
            .collect();

        self.ballots
            .iter()
            .map(|ballot| ballot.voter.as_str())
            .filter(|voter| top_submitters.contains(voter))
            .collect()
    }

    fn winner_points(&self, ballot: &VoterBallot) -> u32 {
        self.known_winner
            .map_or(0, |winner| ballot.points_for(winner))
    }

    // Buckets in reveal rotation order: low, medium, high
    fn classify(&self, early_voters: &[&str]) -> [Vec<&'a VoterBallot>; 3] {
        let mut low = Vec::new();
        let mut medium = Vec::new();
        let mut high = Vec::new();

        for ballot in self.ballots {
            if early_voters.contains(&ballot.voter.as_str()) {
                continue;
            }
            let winner_points = self.winner_points(ballot);
            if winner_points >= self.thresholds.high {
                high.push(ballot);
            } else if winner_points >= self.thresholds.medium {
                medium.push(ballot);
            } else {
                low.push(ballot);
            }
        }

        [low, medium, high]
    }

    fn suspense_metric(&self, tally: &Tally, ballot: &VoterBallot) -> u64 {
        let after = simulate_apply(tally, &ballot.points);
        u64::from(self.winner_points(ballot)) * u64::from(self.options.winner_weight)
            + top_two_gap(&after)
    }

    // Position of the least revealing ballot; the earliest wins a tie
    fn best_candidate(&self, tally: &Tally, bucket: &[&VoterBallot]) -> Option<usize> {
        bucket
            .iter()
            .enumerate()
            .min_by_key(|(_, ballot)| self.suspense_metric(tally, ballot))
            .map(|(pos, _)| pos)
    }

    pub fn get_order(&self) -> Vec<String> {
        let early_voters = self.early_voters();
        let mut buckets = self.classify(&early_voters);
        let mut tally = zero_tally(self.entries);
        let mut order: Vec<String> = Vec::with_capacity(self.ballots.len());
        let mut bucket_idx = 0;

        while buckets.iter().any(|bucket| !bucket.is_empty()) {
            // Take from the next non-empty bucket in rotation
            for _ in 0..buckets.len() {
                let idx = bucket_idx % buckets.len();
                bucket_idx += 1;

                let Some(pos) = self.best_candidate(&tally, &buckets[idx]) else {
                    continue;
                };
                let chosen = buckets[idx].remove(pos);
                tally = simulate_apply(&tally, &chosen.points);
                order.push(chosen.voter.clone());
                break;
            }
        }

        let mut lcg = Lcg::new(self.options.seed);
        match self.options.mode {
            RevealMode::EarlyVoters => {
                debug!("Reinserting {} early voter(s)", early_voters.len());
                let boundary = (self.ballots.len() / 3 * 2).max(1) as u64;
                for voter in early_voters {
                    let at = (lcg.next() % boundary) as usize;
                    order.insert(at.min(order.len()), voter.to_string());
                }
            }
            RevealMode::LightShuffle => lcg.lightly_shuffle(&mut order, self.options.swaps),
        }

        order
    }
}

fn zero_tally(entries: &[Entry]) -> Tally {
    entries.iter().map(|entry| (entry.id, 0)).collect()
}

fn validate(
    ballots: &[VoterBallot],
    entries: &[Entry],
    points: &[u32],
) -> Result<(), SequenceError> {
    let mut entry_ids = HashSet::new();
    for entry in entries {
        if !entry_ids.insert(entry.id) {
            return Err(SequenceError::DuplicateEntry(entry.id));
        }
    }

    let scale: HashSet<u32> = points.iter().copied().collect();
    let mut voters = HashSet::new();
    for ballot in ballots {
        if !voters.insert(ballot.voter.as_str()) {
            return Err(SequenceError::DuplicateVoter(ballot.voter.clone()));
        }
        for (pts, entry) in &ballot.points {
            if !scale.contains(pts) {
                return Err(SequenceError::UnknownPoints {
                    voter: ballot.voter.clone(),
                    points: *pts,
                });
            }
            if !entry_ids.contains(entry) {
                return Err(SequenceError::UnknownEntry {
                    voter: ballot.voter.clone(),
                    entry: *entry,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: EntryId = 1;
    const B: EntryId = 2;
    const C: EntryId = 3;

    fn abc_entries() -> Vec<Entry> {
        vec![
            Entry::new(A, Some("alice")),
            Entry::new(B, Some("bob")),
            Entry::new(C, Some("carol")),
        ]
    }

    fn abc_ballots() -> Vec<VoterBallot> {
        vec![
            VoterBallot::new("voter1", &[(5, A), (3, B), (1, C)]),
            VoterBallot::new("voter2", &[(5, A), (3, C), (1, B)]),
            VoterBallot::new("voter3", &[(5, B), (3, A), (1, C)]),
        ]
    }

    // Five songs, nine juries, three of whom submitted the top three songs
    fn jury_show() -> (Vec<Entry>, Vec<VoterBallot>, Vec<u32>) {
        let entries = vec![
            Entry::new(1, Some("ann")),
            Entry::new(2, Some("ben")),
            Entry::new(3, Some("cat")),
            Entry::new(4, Some("dan")),
            Entry::new(5, Some("eve")),
        ];
        let ballots = vec![
            VoterBallot::new("ann", &[(12, 2), (10, 3), (8, 4)]),
            VoterBallot::new("ben", &[(12, 1), (10, 3), (8, 5)]),
            VoterBallot::new("cat", &[(12, 1), (10, 2), (8, 4)]),
            VoterBallot::new("dan", &[(12, 1), (10, 2), (8, 3)]),
            VoterBallot::new("eve", &[(12, 3), (10, 1), (8, 2)]),
            VoterBallot::new("fay", &[(12, 1), (10, 4), (8, 5)]),
            VoterBallot::new("gus", &[(12, 5), (10, 1), (8, 2)]),
            VoterBallot::new("hal", &[(12, 4), (10, 5), (8, 1)]),
            VoterBallot::new("ivy", &[(12, 2), (10, 1), (8, 3)]),
        ];
        (entries, ballots, vec![12, 10, 8, 6, 4, 2])
    }

    fn sorted(mut voters: Vec<String>) -> Vec<String> {
        voters.sort();
        voters
    }

    #[test]
    fn thresholds_for_three_point_scale() {
        let t = Thresholds::from_scale(&[1, 5, 3]);
        assert_eq!(t, Thresholds { high: 5, medium: 3 });
    }

    #[test]
    fn thresholds_for_eurovision_scale() {
        let t = Thresholds::from_scale(&[12, 10, 8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(t, Thresholds { high: 8, medium: 5 });
    }

    #[test]
    fn thresholds_are_ordered_for_every_scale_length() {
        for n in 0..=20u32 {
            let scale: Vec<u32> = (1..=n).rev().collect();
            let t = Thresholds::from_scale(&scale);
            assert!(t.high >= t.medium, "scale of {} values", n);
            for value in &scale[..scale.len() / 3] {
                assert!(*value >= t.high);
            }
        }
    }

    #[test]
    fn short_scales_collapse_thresholds() {
        assert_eq!(Thresholds::from_scale(&[]), Thresholds { high: 0, medium: 0 });
        assert_eq!(Thresholds::from_scale(&[4]), Thresholds { high: 0, medium: 0 });
        assert_eq!(Thresholds::from_scale(&[4, 2]), Thresholds { high: 0, medium: 0 });
    }

    #[test]
    fn gap_between_leaders() {
        let tally: Tally = [(1, 4), (2, 9), (3, 7)].into_iter().collect();
        assert_eq!(top_two_gap(&tally), 2);

        let tied: Tally = [(1, 9), (2, 9)].into_iter().collect();
        assert_eq!(top_two_gap(&tied), 0);

        let single: Tally = [(1, 9)].into_iter().collect();
        assert_eq!(top_two_gap(&single), 0);
    }

    #[test]
    fn simulate_apply_leaves_input_untouched() {
        let tally: Tally = [(A, 1), (B, 0)].into_iter().collect();
        let ballot: Ballot = [(5, A), (3, B)].into_iter().collect();
        let next = simulate_apply(&tally, &ballot);
        assert_eq!(next.get(&A), Some(&6));
        assert_eq!(next.get(&B), Some(&3));
        assert_eq!(tally.get(&A), Some(&1));
    }

    #[test]
    fn final_scores_match_naive_sum() {
        let (entries, ballots, points) = jury_show();
        let sequencer =
            Sequencer::new(&ballots, &entries, &points, SequencerOptions::default()).unwrap();

        let mut expected: BTreeMap<EntryId, u64> = BTreeMap::new();
        for entry in &entries {
            let mut total = 0;
            for ballot in &ballots {
                for (pts, id) in &ballot.points {
                    if *id == entry.id {
                        total += u64::from(*pts);
                    }
                }
            }
            expected.insert(entry.id, total);
        }
        assert_eq!(sequencer.final_scores(), &expected);
        assert_eq!(sequencer.known_winner(), Some(1));
        assert_eq!(sequencer.top_entries(), &[1, 2, 3]);
    }

    #[test]
    fn three_voter_scenario() {
        let entries = abc_entries();
        let ballots = abc_ballots();
        let sequencer =
            Sequencer::new(&ballots, &entries, &[5, 3, 1], SequencerOptions::default()).unwrap();

        assert_eq!(sequencer.final_scores().get(&A), Some(&13));
        assert_eq!(sequencer.final_scores().get(&B), Some(&9));
        assert_eq!(sequencer.final_scores().get(&C), Some(&5));
        assert_eq!(sequencer.known_winner(), Some(A));
        assert_eq!(sequencer.thresholds(), Thresholds { high: 5, medium: 3 });

        // voter3 is the only medium ballot; voter1 then keeps A and B level
        let order = sequencer.get_order();
        assert_eq!(order, vec!["voter3", "voter1", "voter2"]);
        assert_eq!(order, sequencer.get_order());
    }

    #[test]
    fn winner_tie_goes_to_lowest_id() {
        let entries = vec![Entry::new(7, None), Entry::new(3, None)];
        let ballots = vec![
            VoterBallot::new("x", &[(2, 7), (1, 3)]),
            VoterBallot::new("y", &[(2, 3), (1, 7)]),
        ];
        let sequencer =
            Sequencer::new(&ballots, &entries, &[2, 1], SequencerOptions::default()).unwrap();
        assert_eq!(sequencer.known_winner(), Some(3));
    }

    #[test]
    fn early_voters_are_top_submitters_in_ballot_order() {
        let (entries, ballots, points) = jury_show();
        let sequencer =
            Sequencer::new(&ballots, &entries, &points, SequencerOptions::default()).unwrap();
        assert_eq!(sequencer.early_voters(), vec!["ann", "ben", "cat"]);

        let light = SequencerOptions {
            mode: RevealMode::LightShuffle,
            ..SequencerOptions::default()
        };
        let sequencer = Sequencer::new(&ballots, &entries, &points, light).unwrap();
        assert!(sequencer.early_voters().is_empty());
    }

    #[test]
    fn early_voter_order_is_recorded() {
        let (entries, ballots, points) = jury_show();
        let options = SequencerOptions::for_show(11);
        let sequencer = Sequencer::new(&ballots, &entries, &points, options).unwrap();
        assert_eq!(
            sequencer.get_order(),
            vec!["cat", "hal", "gus", "ann", "ben", "fay", "eve", "ivy", "dan"]
        );

        let sequencer =
            Sequencer::new(&ballots, &entries, &points, SequencerOptions::default()).unwrap();
        assert_eq!(
            sequencer.get_order(),
            vec!["ann", "hal", "cat", "gus", "ben", "fay", "eve", "ivy", "dan"]
        );
    }

    #[test]
    fn light_shuffle_order_is_recorded() {
        let (entries, ballots, points) = jury_show();
        let options = SequencerOptions {
            seed: 11,
            swaps: 2,
            mode: RevealMode::LightShuffle,
            ..SequencerOptions::default()
        };
        let sequencer = Sequencer::new(&ballots, &entries, &points, options).unwrap();
        assert_eq!(
            sequencer.get_order(),
            vec!["ann", "cat", "gus", "eve", "ivy", "hal", "dan", "ben", "fay"]
        );
    }

    #[test]
    fn early_voters_land_in_first_two_thirds() {
        let (entries, ballots, points) = jury_show();
        let boundary = ballots.len() / 3 * 2;
        for seed in 0..200 {
            let sequencer =
                Sequencer::new(&ballots, &entries, &points, SequencerOptions::for_show(seed))
                    .unwrap();
            let early = sequencer.early_voters();
            let order = sequencer.get_order();
            for (k, voter) in early.iter().enumerate() {
                let at = order.iter().position(|v| v == voter).unwrap();
                // Each later insert can push an earlier one back by one slot
                let shift = early.len() - 1 - k;
                assert!(
                    at < boundary + shift,
                    "seed {}: {} at {} (boundary {})",
                    seed,
                    voter,
                    at,
                    boundary
                );
            }
        }
    }

    #[test]
    fn light_shuffle_accepts_huge_swap_count() {
        let (entries, ballots, points) = jury_show();
        let options = SequencerOptions {
            swaps: usize::MAX,
            mode: RevealMode::LightShuffle,
            ..SequencerOptions::default()
        };
        let order = Sequencer::new(&ballots, &entries, &points, options)
            .unwrap()
            .get_order();
        let voters: Vec<String> = ballots.iter().map(|b| b.voter.clone()).collect();
        assert_eq!(sorted(order), sorted(voters));
    }

    #[test]
    fn order_is_a_permutation_of_voters() {
        let (entries, ballots, points) = jury_show();
        for seed in 0..20 {
            let options = SequencerOptions::for_show(seed);
            let order = Sequencer::new(&ballots, &entries, &points, options)
                .unwrap()
                .get_order();
            let voters: Vec<String> = ballots.iter().map(|b| b.voter.clone()).collect();
            assert_eq!(sorted(order), sorted(voters));
        }
    }

    #[test]
    fn few_ballots_with_early_voter() {
        // Boundary would be zero with two ballots
        let entries = vec![Entry::new(1, Some("ann")), Entry::new(2, Some("ben"))];
        let ballots = vec![
            VoterBallot::new("ann", &[(2, 2), (1, 1)]),
            VoterBallot::new("zed", &[(2, 1), (1, 2)]),
        ];
        let order = Sequencer::new(&ballots, &entries, &[2, 1], SequencerOptions::default())
            .unwrap()
            .get_order();
        assert_eq!(order, vec!["ann", "zed"]);
    }

    #[test]
    fn empty_ballots_give_empty_order() {
        let entries = abc_entries();
        let sequencer =
            Sequencer::new(&[], &entries, &[5, 3, 1], SequencerOptions::default()).unwrap();
        assert!(sequencer.get_order().is_empty());

        let sequencer = Sequencer::new(&[], &[], &[], SequencerOptions::default()).unwrap();
        assert_eq!(sequencer.known_winner(), None);
        assert!(sequencer.get_order().is_empty());
    }

    #[test]
    fn blank_ballot_lands_in_low_bucket() {
        let entries = abc_entries();
        let mut ballots = abc_ballots();
        ballots.push(VoterBallot::new("blank", &[]));
        let sequencer =
            Sequencer::new(&ballots, &entries, &[5, 3, 1], SequencerOptions::default()).unwrap();
        let order = sequencer.get_order();
        // Low bucket leads the rotation
        assert_eq!(order[0], "blank");
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn rejects_unknown_entry() {
        let entries = abc_entries();
        let ballots = vec![VoterBallot::new("v", &[(5, 99)])];
        let err = Sequencer::new(&ballots, &entries, &[5, 3, 1], SequencerOptions::default())
            .err()
            .unwrap();
        assert_eq!(
            err,
            SequenceError::UnknownEntry {
                voter: "v".to_string(),
                entry: 99
            }
        );
    }

    #[test]
    fn rejects_points_off_the_scale() {
        let entries = abc_entries();
        let ballots = vec![VoterBallot::new("v", &[(4, A)])];
        let err = Sequencer::new(&ballots, &entries, &[5, 3, 1], SequencerOptions::default())
            .err()
            .unwrap();
        assert_eq!(
            err,
            SequenceError::UnknownPoints {
                voter: "v".to_string(),
                points: 4
            }
        );
    }

    #[test]
    fn rejects_duplicates() {
        let entries = abc_entries();
        let mut ballots = abc_ballots();
        ballots.push(VoterBallot::new("voter1", &[(5, B)]));
        let err = Sequencer::new(&ballots, &entries, &[5, 3, 1], SequencerOptions::default())
            .err()
            .unwrap();
        assert_eq!(err, SequenceError::DuplicateVoter("voter1".to_string()));

        let mut entries = abc_entries();
        entries.push(Entry::new(A, None));
        let err = Sequencer::new(&[], &entries, &[5, 3, 1], SequencerOptions::default())
            .err()
            .unwrap();
        assert_eq!(err, SequenceError::DuplicateEntry(A));
    }
}
