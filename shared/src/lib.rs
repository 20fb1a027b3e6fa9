//! Types shared between the mafia server and its clients.
//!
//! Everything that crosses the wire lives here: identifiers, the read-only
//! snapshots a session hands out, the error taxonomy and the `Packet` enum
//! encoded with bincode over UDP.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Minimum number of signed-up players required to start a game.
pub const MIN_PLAYERS: usize = 3;

/// Maximum number of players that can sign up for one game. Keeps every reply
/// packet well inside a single UDP datagram.
pub const MAX_PLAYERS: usize = 1000;

/// Longest day or night a game may be started with.
pub const MAX_CYCLE_MINUTES: u64 = 365 * 24 * 60;
pub const MAX_CYCLE_DURATION: Duration = Duration::from_secs(MAX_CYCLE_MINUTES * 60);

/// Largest UDP payload over IPv4; receive buffers on both ends use this size.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Stable, opaque identifier of a player (a chat user).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable, opaque identifier of a group. Exactly one session exists per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Signup,
    Running,
    Terminated,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Signup => "signup",
            Status::Running => "running",
            Status::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Day/night tag of a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cycle {
    Day,
    Night,
}

impl Cycle {
    pub fn flipped(self) -> Self {
        match self {
            Cycle::Day => Cycle::Night,
            Cycle::Night => Cycle::Day,
        }
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cycle::Day => f.write_str("day"),
            Cycle::Night => f.write_str("night"),
        }
    }
}

/// Status and cycle folded into one value, used when reporting a rejected
/// operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Terminated,
    Signup,
    Day,
    Night,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Terminated => "no game",
            SessionPhase::Signup => "signup",
            SessionPhase::Day => "the day",
            SessionPhase::Night => "the night",
        };
        f.write_str(name)
    }
}

/// Every failure a session operation can report. All of them are local and
/// recoverable; the adapter turns them into user-facing messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum SessionError {
    #[error("that is not possible during {0}")]
    InvalidState(SessionPhase),
    #[error("player {0} is already signed up")]
    AlreadySignedUp(PlayerId),
    #[error("player {0} is not signed up")]
    NotSignedUp(PlayerId),
    #[error("player {0} is not alive")]
    NotAlive(PlayerId),
    #[error("player {0} cannot vote for themselves")]
    InvalidTarget(PlayerId),
    #[error("player {0} has no vote to retract")]
    NoActiveVote(PlayerId),
    #[error("need at least {required} players to start, only {signed_up} signed up")]
    InsufficientPlayers { signed_up: usize, required: usize },
    #[error("the game is full ({capacity} players)")]
    RosterFull { capacity: usize },
    #[error("cycle durations must be non-zero and at most {} days", MAX_CYCLE_MINUTES / (24 * 60))]
    InvalidDuration,
}

/// Time left in the current cycle, truncated to whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeRemaining {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
}

impl TimeRemaining {
    pub fn from_duration(duration: Duration) -> Self {
        let secs = duration.as_secs();
        Self {
            days: secs / SECS_PER_DAY,
            hours: (secs % SECS_PER_DAY) / SECS_PER_HOUR,
            minutes: (secs % SECS_PER_HOUR) / SECS_PER_MINUTE,
        }
    }
}

impl fmt::Display for TimeRemaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d {}h {}m", self.days, self.hours, self.minutes)
    }
}

/// Point-in-time view of the roster. Lists are sorted by player id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RosterSnapshot {
    pub signed_up: Vec<PlayerId>,
    pub alive: Vec<PlayerId>,
    pub dead: Vec<PlayerId>,
}

/// Votes currently cast against one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyEntry {
    pub target: PlayerId,
    pub votes: usize,
    pub voters: Vec<PlayerId>,
}

/// Point-in-time view of the lynch vote. Only targets with at least one voter
/// appear, ordered by descending vote count and then by target id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TallySnapshot {
    pub entries: Vec<TallyEntry>,
    pub abstentions: usize,
}

impl TallySnapshot {
    pub fn votes_for(&self, target: PlayerId) -> usize {
        self.entries
            .iter()
            .find(|entry| entry.target == target)
            .map_or(0, |entry| entry.votes)
    }
}

/// Outcome of the day's vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Lynch(PlayerId),
    NoLynch,
}

/// Reported by `tick` whenever a cycle flips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleTransition {
    pub ended: Cycle,
    pub started: Cycle,
    /// Present only when a day ended.
    pub resolution: Option<Resolution>,
}

/// Read-only status query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub group: GroupId,
    pub status: Status,
    /// `None` unless the session is running.
    pub cycle: Option<Cycle>,
}

/// Operations a client can ask the server to perform on a group's session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    OpenSignup,
    Signup,
    Dropout,
    /// Durations fall back to the server defaults when omitted.
    Start {
        day: Option<Duration>,
        night: Option<Duration>,
    },
    End,
    LynchVote {
        target: PlayerId,
    },
    NoLynchVote,
    RetractVote,
    Status,
    Roster,
    Tally,
    Remaining,
}

impl Command {
    /// Read-only commands never change a session.
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Command::Status | Command::Roster | Command::Tally | Command::Remaining
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Command {
        group: GroupId,
        player: PlayerId,
        command: Command,
    },

    Ack,
    Rejected {
        error: SessionError,
    },
    Started {
        roster: RosterSnapshot,
    },
    Status(SessionStatus),
    Roster(RosterSnapshot),
    Tally(TallySnapshot),
    Remaining(TimeRemaining),
    CycleChanged {
        group: GroupId,
        transition: CycleTransition,
    },
}
