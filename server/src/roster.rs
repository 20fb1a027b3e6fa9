//! Signup, alive and dead player sets for a single session.
//!
//! The roster only enforces membership rules. Whether an operation is allowed
//! in the current status is decided by the session that owns it.

use log::debug;
use shared::{PlayerId, RosterSnapshot, SessionError, MAX_PLAYERS};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub(crate) struct Roster {
    signed_up: BTreeSet<PlayerId>,
    alive: BTreeSet<PlayerId>,
    dead: BTreeSet<PlayerId>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signup(&mut self, player: PlayerId) -> Result<(), SessionError> {
        if self.signed_up.contains(&player) {
            return Err(SessionError::AlreadySignedUp(player));
        }
        if self.signed_up.len() >= MAX_PLAYERS {
            return Err(SessionError::RosterFull {
                capacity: MAX_PLAYERS,
            });
        }
        self.signed_up.insert(player);
        debug!("Player {} signed up", player);
        Ok(())
    }

    /// Removes exactly `player` from the signup list.
    pub fn dropout(&mut self, player: PlayerId) -> Result<(), SessionError> {
        if !self.signed_up.remove(&player) {
            return Err(SessionError::NotSignedUp(player));
        }
        debug!("Player {} dropped out", player);
        Ok(())
    }

    /// Moves every signed-up player into the alive set. Called once per game.
    pub fn freeze(&mut self) {
        self.alive = std::mem::take(&mut self.signed_up);
        self.dead.clear();
    }

    pub fn kill(&mut self, player: PlayerId) -> Result<(), SessionError> {
        if !self.alive.remove(&player) {
            return Err(SessionError::NotAlive(player));
        }
        self.dead.insert(player);
        Ok(())
    }

    pub fn signed_up_count(&self) -> usize {
        self.signed_up.len()
    }

    pub fn alive(&self) -> &BTreeSet<PlayerId> {
        &self.alive
    }

    pub fn snapshot(&self) -> RosterSnapshot {
        RosterSnapshot {
            signed_up: self.signed_up.iter().copied().collect(),
            alive: self.alive.iter().copied().collect(),
            dead: self.dead.iter().copied().collect(),
        }
    }
}
