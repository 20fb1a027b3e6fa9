//! Lynch vote bookkeeping for the day cycle.
//!
//! Each voter holds at most one ballot: a vote against a target or an
//! abstention. Casting a new ballot replaces the previous one, which keeps a
//! voter from ever being counted in two places at once.

use log::debug;
use shared::{PlayerId, Resolution, SessionError, TallyEntry, TallySnapshot};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ballot {
    Lynch(PlayerId),
    NoLynch,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct VoteTally {
    ballots: BTreeMap<PlayerId, Ballot>,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `voter`'s vote against `target`, replacing any earlier ballot.
    pub fn cast_lynch_vote(
        &mut self,
        alive: &BTreeSet<PlayerId>,
        voter: PlayerId,
        target: PlayerId,
    ) -> Result<(), SessionError> {
        if !alive.contains(&voter) {
            return Err(SessionError::NotAlive(voter));
        }
        if !alive.contains(&target) {
            return Err(SessionError::NotAlive(target));
        }
        if voter == target {
            return Err(SessionError::InvalidTarget(voter));
        }

        self.ballots.insert(voter, Ballot::Lynch(target));
        debug!("Player {} votes to lynch {}", voter, target);
        Ok(())
    }

    /// Records an abstention for `voter`, replacing any earlier ballot.
    pub fn cast_no_lynch_vote(
        &mut self,
        alive: &BTreeSet<PlayerId>,
        voter: PlayerId,
    ) -> Result<(), SessionError> {
        if !alive.contains(&voter) {
            return Err(SessionError::NotAlive(voter));
        }

        self.ballots.insert(voter, Ballot::NoLynch);
        debug!("Player {} votes for no lynch", voter);
        Ok(())
    }

    pub fn retract_vote(
        &mut self,
        alive: &BTreeSet<PlayerId>,
        voter: PlayerId,
    ) -> Result<(), SessionError> {
        if !alive.contains(&voter) {
            return Err(SessionError::NotAlive(voter));
        }

        match self.ballots.remove(&voter) {
            Some(_) => {
                debug!("Player {} retracted their vote", voter);
                Ok(())
            }
            None => Err(SessionError::NoActiveVote(voter)),
        }
    }

    pub fn tally(&self) -> TallySnapshot {
        let mut voters_by_target: BTreeMap<PlayerId, Vec<PlayerId>> = BTreeMap::new();
        let mut abstentions = 0;

        for (voter, ballot) in &self.ballots {
            match ballot {
                Ballot::Lynch(target) => voters_by_target.entry(*target).or_default().push(*voter),
                Ballot::NoLynch => abstentions += 1,
            }
        }

        let mut entries: Vec<TallyEntry> = voters_by_target
            .into_iter()
            .map(|(target, voters)| TallyEntry {
                target,
                votes: voters.len(),
                voters,
            })
            .collect();
        entries.sort_by(|a, b| b.votes.cmp(&a.votes).then(a.target.cmp(&b.target)));

        TallySnapshot {
            entries,
            abstentions,
        }
    }

    /// Decides the day's outcome and clears every ballot.
    ///
    /// A target is lynched only when its vote count is non-zero and strictly
    /// greater than both every other target's count and the abstention count.
    /// Ties are never broken. Ballots from or against players outside `alive`
    /// are not counted. The roster is left untouched; the caller applies the kill.
    pub fn resolve(&mut self, alive: &BTreeSet<PlayerId>) -> Resolution {
        let mut counts: BTreeMap<PlayerId, usize> = BTreeMap::new();
        let mut abstentions = 0;

        for (voter, ballot) in std::mem::take(&mut self.ballots) {
            if !alive.contains(&voter) {
                continue;
            }
            match ballot {
                Ballot::Lynch(target) if alive.contains(&target) => {
                    *counts.entry(target).or_default() += 1;
                }
                Ballot::Lynch(_) => {}
                Ballot::NoLynch => abstentions += 1,
            }
        }

        let top = counts.values().copied().max().unwrap_or(0);
        let mut leaders = counts.iter().filter(|(_, count)| **count == top);

        match (leaders.next(), leaders.next()) {
            (Some((target, _)), None) if top > abstentions => Resolution::Lynch(*target),
            _ => Resolution::NoLynch,
        }
    }

    #[cfg(test)]
    fn ballot_count(&self, voter: PlayerId) -> usize {
        let snapshot = self.tally();
        let lynch = snapshot
            .entries
            .iter()
            .filter(|entry| entry.voters.contains(&voter))
            .count();
        let abstain = usize::from(self.ballots.get(&voter) == Some(&Ballot::NoLynch));
        lynch + abstain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: PlayerId = PlayerId(1);
    const B: PlayerId = PlayerId(2);
    const C: PlayerId = PlayerId(3);
    const D: PlayerId = PlayerId(4);

    fn alive(ids: &[PlayerId]) -> BTreeSet<PlayerId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_plurality_lynches_leader() {
        let alive = alive(&[A, B, C, D]);
        let mut tally = VoteTally::new();

        tally.cast_lynch_vote(&alive, A, C).unwrap();
        tally.cast_lynch_vote(&alive, B, C).unwrap();
        tally.cast_no_lynch_vote(&alive, D).unwrap();

        assert_eq!(tally.resolve(&alive), Resolution::Lynch(C));
    }

    #[test]
    fn test_tie_is_no_lynch() {
        let alive = alive(&[A, B, C, D]);
        let mut tally = VoteTally::new();

        tally.cast_lynch_vote(&alive, A, C).unwrap();
        tally.cast_lynch_vote(&alive, B, D).unwrap();

        assert_eq!(tally.resolve(&alive), Resolution::NoLynch);
    }

    #[test]
    fn test_abstentions_matching_leader_is_no_lynch() {
        let alive = alive(&[A, B, C, D]);
        let mut tally = VoteTally::new();

        tally.cast_lynch_vote(&alive, A, C).unwrap();
        tally.cast_no_lynch_vote(&alive, B).unwrap();

        assert_eq!(tally.resolve(&alive), Resolution::NoLynch);
    }

    #[test]
    fn test_no_votes_is_no_lynch() {
        let alive = alive(&[A, B, C]);
        let mut tally = VoteTally::new();

        assert_eq!(tally.resolve(&alive), Resolution::NoLynch);
    }

    #[test]
    fn test_resolution_only_names_alive_players() {
        let mut tally = VoteTally::new();
        tally.cast_lynch_vote(&alive(&[A, B, C, D]), A, D).unwrap();
        tally.cast_lynch_vote(&alive(&[A, B, C, D]), B, D).unwrap();
        tally.cast_lynch_vote(&alive(&[A, B, C, D]), C, A).unwrap();

        // D is no longer alive when the day is resolved.
        assert_eq!(tally.resolve(&alive(&[A, B, C])), Resolution::Lynch(A));
    }

    #[test]
    fn test_resolve_clears_ballots() {
        let alive = alive(&[A, B, C]);
        let mut tally = VoteTally::new();
        tally.cast_lynch_vote(&alive, A, C).unwrap();

        tally.resolve(&alive);

        assert_eq!(tally.tally(), TallySnapshot::default());
        assert_eq!(
            tally.retract_vote(&alive, A),
            Err(SessionError::NoActiveVote(A))
        );
    }

    #[test]
    fn test_self_vote_rejected() {
        let alive = alive(&[A, B, C]);
        let mut tally = VoteTally::new();

        assert_eq!(
            tally.cast_lynch_vote(&alive, A, A),
            Err(SessionError::InvalidTarget(A))
        );
    }

    #[test]
    fn test_vote_requires_alive_voter_and_target() {
        let alive = alive(&[A, B, C]);
        let mut tally = VoteTally::new();

        assert_eq!(
            tally.cast_lynch_vote(&alive, D, A),
            Err(SessionError::NotAlive(D))
        );
        assert_eq!(
            tally.cast_lynch_vote(&alive, A, D),
            Err(SessionError::NotAlive(D))
        );
        assert_eq!(
            tally.cast_no_lynch_vote(&alive, D),
            Err(SessionError::NotAlive(D))
        );
    }

    #[test]
    fn test_revote_replaces_previous_ballot() {
        let alive = alive(&[A, B, C]);
        let mut tally = VoteTally::new();

        tally.cast_lynch_vote(&alive, A, B).unwrap();
        tally.cast_lynch_vote(&alive, A, C).unwrap();

        let snapshot = tally.tally();
        assert_eq!(snapshot.votes_for(B), 0);
        assert_eq!(snapshot.votes_for(C), 1);

        tally.cast_no_lynch_vote(&alive, A).unwrap();

        let snapshot = tally.tally();
        assert!(snapshot.entries.is_empty());
        assert_eq!(snapshot.abstentions, 1);
    }

    #[test]
    fn test_retract_vote() {
        let alive = alive(&[A, B, C]);
        let mut tally = VoteTally::new();
        tally.cast_no_lynch_vote(&alive, A).unwrap();

        assert_eq!(tally.retract_vote(&alive, A), Ok(()));
        assert_eq!(
            tally.retract_vote(&alive, A),
            Err(SessionError::NoActiveVote(A))
        );
        assert_eq!(
            tally.retract_vote(&alive, D),
            Err(SessionError::NotAlive(D))
        );
    }

    #[test]
    fn test_tally_ordering() {
        let alive = alive(&[A, B, C, D]);
        let mut tally = VoteTally::new();

        tally.cast_lynch_vote(&alive, A, B).unwrap();
        tally.cast_lynch_vote(&alive, B, D).unwrap();
        tally.cast_lynch_vote(&alive, C, D).unwrap();

        let snapshot = tally.tally();
        assert_eq!(snapshot.entries.len(), 2);
        assert_eq!(snapshot.entries[0].target, D);
        assert_eq!(snapshot.entries[0].votes, 2);
        assert_eq!(snapshot.entries[0].voters, vec![B, C]);
        assert_eq!(snapshot.entries[1].target, B);
        assert_eq!(snapshot.abstentions, 0);
    }

    #[test]
    fn test_each_voter_counted_at_most_once() {
        let alive = alive(&[A, B, C, D]);
        let mut tally = VoteTally::new();
        let players = [A, B, C, D];

        // Deterministic pseudo-random walk over the three vote operations.
        let mut state: u64 = 0x9e37_79b9;
        for _ in 0..500 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let voter = players[(state >> 33) as usize % players.len()];
            let target = players[(state >> 40) as usize % players.len()];

            let _ = match (state >> 50) % 3 {
                0 => tally.cast_lynch_vote(&alive, voter, target),
                1 => tally.cast_no_lynch_vote(&alive, voter),
                _ => tally.retract_vote(&alive, voter),
            };

            for player in players {
                assert!(tally.ballot_count(player) <= 1);
            }
        }
    }
}
