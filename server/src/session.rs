//! The per-group game session state machine.
//!
//! A session moves `Terminated -> Signup -> Running -> Terminated`. While
//! running it alternates between day and night; the day's lynch vote is
//! resolved whenever `tick` finds the day expired.
//!
//! Game state lives inside the phase it belongs to, so ending a game drops the
//! roster, votes and clock together and only the group id survives.

use crate::clock::CycleClock;
use crate::roster::Roster;
use crate::tally::VoteTally;
use log::{info, warn};
use shared::{
    Cycle, CycleTransition, GroupId, PlayerId, Resolution, RosterSnapshot, SessionError,
    SessionPhase, SessionStatus, Status, TallySnapshot, TimeRemaining, MAX_CYCLE_DURATION,
    MIN_PLAYERS,
};
use std::time::{Duration, Instant};

#[derive(Debug)]
enum Phase {
    Terminated,
    Signup {
        roster: Roster,
    },
    Running {
        roster: Roster,
        tally: VoteTally,
        clock: CycleClock,
    },
}

/// One game session for one group.
#[derive(Debug)]
pub struct GameSession {
    group: GroupId,
    phase: Phase,
}

impl GameSession {
    /// Creates the session for a group the bot has just joined. No game is in
    /// progress until signup is opened.
    pub fn new(group: GroupId) -> Self {
        Self {
            group,
            phase: Phase::Terminated,
        }
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn status(&self) -> Status {
        match self.phase {
            Phase::Terminated => Status::Terminated,
            Phase::Signup { .. } => Status::Signup,
            Phase::Running { .. } => Status::Running,
        }
    }

    pub fn cycle(&self) -> Option<Cycle> {
        match &self.phase {
            Phase::Running { clock, .. } => Some(clock.cycle()),
            _ => None,
        }
    }

    pub fn session_status(&self) -> SessionStatus {
        SessionStatus {
            group: self.group,
            status: self.status(),
            cycle: self.cycle(),
        }
    }

    fn invalid_state(&self) -> SessionError {
        let phase = match &self.phase {
            Phase::Terminated => SessionPhase::Terminated,
            Phase::Signup { .. } => SessionPhase::Signup,
            Phase::Running { clock, .. } => match clock.cycle() {
                Cycle::Day => SessionPhase::Day,
                Cycle::Night => SessionPhase::Night,
            },
        };
        SessionError::InvalidState(phase)
    }

    pub fn open_signup(&mut self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Terminated => {
                self.phase = Phase::Signup {
                    roster: Roster::new(),
                };
                info!("Group {}: signup opened", self.group);
                Ok(())
            }
            _ => Err(self.invalid_state()),
        }
    }

    pub fn signup(&mut self, player: PlayerId) -> Result<(), SessionError> {
        match &mut self.phase {
            Phase::Signup { roster } => roster.signup(player),
            _ => Err(self.invalid_state()),
        }
    }

    pub fn dropout(&mut self, player: PlayerId) -> Result<(), SessionError> {
        match &mut self.phase {
            Phase::Signup { roster } => roster.dropout(player),
            _ => Err(self.invalid_state()),
        }
    }

    /// Freezes the signup list and begins day one.
    ///
    /// Both durations must be non-zero and at most `MAX_CYCLE_DURATION`.
    pub fn start(
        &mut self,
        now: Instant,
        day_duration: Duration,
        night_duration: Duration,
    ) -> Result<RosterSnapshot, SessionError> {
        let roster = match &mut self.phase {
            Phase::Signup { roster } => roster,
            _ => return Err(self.invalid_state()),
        };

        let signed_up = roster.signed_up_count();
        if signed_up < MIN_PLAYERS {
            return Err(SessionError::InsufficientPlayers {
                signed_up,
                required: MIN_PLAYERS,
            });
        }

        let usable = |length: Duration| !length.is_zero() && length <= MAX_CYCLE_DURATION;
        if !usable(day_duration) || !usable(night_duration) {
            return Err(SessionError::InvalidDuration);
        }
        let clock = CycleClock::start(now, day_duration, night_duration)
            .ok_or(SessionError::InvalidDuration)?;

        let mut roster = std::mem::take(roster);
        roster.freeze();
        let snapshot = roster.snapshot();

        self.phase = Phase::Running {
            roster,
            tally: VoteTally::new(),
            clock,
        };
        info!(
            "Group {}: game started with {} players",
            self.group, signed_up
        );

        Ok(snapshot)
    }

    /// Ends whatever is in progress. Always succeeds.
    pub fn end(&mut self) {
        if !matches!(self.phase, Phase::Terminated) {
            info!("Group {}: game ended", self.group);
        }
        self.phase = Phase::Terminated;
    }

    pub fn cast_lynch_vote(
        &mut self,
        voter: PlayerId,
        target: PlayerId,
    ) -> Result<(), SessionError> {
        match &mut self.phase {
            Phase::Running {
                roster,
                tally,
                clock,
            } if clock.cycle() == Cycle::Day => tally.cast_lynch_vote(roster.alive(), voter, target),
            _ => Err(self.invalid_state()),
        }
    }

    pub fn cast_no_lynch_vote(&mut self, voter: PlayerId) -> Result<(), SessionError> {
        match &mut self.phase {
            Phase::Running {
                roster,
                tally,
                clock,
            } if clock.cycle() == Cycle::Day => tally.cast_no_lynch_vote(roster.alive(), voter),
            _ => Err(self.invalid_state()),
        }
    }

    pub fn retract_vote(&mut self, voter: PlayerId) -> Result<(), SessionError> {
        match &mut self.phase {
            Phase::Running { roster, tally, .. } => tally.retract_vote(roster.alive(), voter),
            _ => Err(self.invalid_state()),
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        match &self.phase {
            Phase::Running { clock, .. } => clock.is_expired(now),
            _ => false,
        }
    }

    /// Flips the cycle if it has expired, resolving the day's vote first.
    ///
    /// Returns `None` when nothing happened, which includes every call on a
    /// session that is not running.
    pub fn tick(&mut self, now: Instant) -> Option<CycleTransition> {
        let Phase::Running {
            roster,
            tally,
            clock,
        } = &mut self.phase
        else {
            return None;
        };

        if !clock.is_expired(now) {
            return None;
        }

        let ended = clock.cycle();
        let Some(started) = clock.advance(now) else {
            warn!(
                "Group {}: cannot schedule the end of the next {}",
                self.group,
                ended.flipped()
            );
            return None;
        };

        let resolution = match ended {
            Cycle::Day => {
                let resolution = tally.resolve(roster.alive());
                match resolution {
                    Resolution::Lynch(target) => match roster.kill(target) {
                        Ok(()) => info!("Group {}: player {} was lynched", self.group, target),
                        Err(error) => {
                            warn!(
                                "Group {}: lynch of player {} not applied: {}",
                                self.group, target, error
                            );
                            debug_assert!(false, "lynch target {} was not alive", target);
                        }
                    },
                    Resolution::NoLynch => info!("Group {}: nobody was lynched", self.group),
                }
                Some(resolution)
            }
            Cycle::Night => None,
        };
        info!("Group {}: {} has begun", self.group, started);

        Some(CycleTransition {
            ended,
            started,
            resolution,
        })
    }

    pub fn roster_snapshot(&self) -> RosterSnapshot {
        match &self.phase {
            Phase::Terminated => RosterSnapshot::default(),
            Phase::Signup { roster } | Phase::Running { roster, .. } => roster.snapshot(),
        }
    }

    pub fn tally_snapshot(&self) -> TallySnapshot {
        match &self.phase {
            Phase::Running { tally, .. } => tally.tally(),
            _ => TallySnapshot::default(),
        }
    }

    /// Time left in the current cycle; zero when no game is running.
    pub fn remaining(&self, now: Instant) -> TimeRemaining {
        match &self.phase {
            Phase::Running { clock, .. } => clock.remaining(now),
            _ => TimeRemaining::default(),
        }
    }
}
