//! Per-group session registry
//!
//! Each group the bot has joined owns exactly one `GameSession`, guarded by its
//! own mutex. Every mutation of a session happens while holding that mutex, so
//! concurrent commands for one group are applied one at a time while
//! different groups never wait on each other.

use crate::session::GameSession;
use log::info;
use shared::{CycleTransition, GroupId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};

/// Shared handle to one group's session.
pub type SessionHandle = Arc<Mutex<GameSession>>;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<GroupId, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the group's session, creating it in the terminated state the
    /// first time the group is seen.
    pub async fn join_group(&self, group: GroupId) -> SessionHandle {
        {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(&group) {
                return Arc::clone(handle);
            }
        }

        let mut sessions = self.sessions.write().await;
        let handle = sessions.entry(group).or_insert_with(|| {
            info!("Joined group {}", group);
            Arc::new(Mutex::new(GameSession::new(group)))
        });
        Arc::clone(handle)
    }

    /// Looks the group up without creating it.
    pub async fn find(&self, group: GroupId) -> Option<SessionHandle> {
        self.sessions.read().await.get(&group).map(Arc::clone)
    }

    /// Forgets the group and its session. Returns false if it was unknown.
    pub async fn leave_group(&self, group: GroupId) -> bool {
        let removed = self.sessions.write().await.remove(&group).is_some();
        if removed {
            info!("Left group {}", group);
        }
        removed
    }

    /// Runs `f` against the group's session while holding its lock.
    pub async fn with_session<T>(
        &self,
        group: GroupId,
        f: impl FnOnce(&mut GameSession) -> T,
    ) -> T {
        let handle = self.join_group(group).await;
        let mut session = handle.lock().await;
        f(&mut *session)
    }

    /// Ticks every session and returns the cycles that flipped.
    pub async fn tick_all(&self, now: Instant) -> Vec<(GroupId, CycleTransition)> {
        let handles: Vec<(GroupId, SessionHandle)> = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .map(|(group, handle)| (*group, Arc::clone(handle)))
                .collect()
        };

        let mut transitions = Vec::new();
        for (group, handle) in handles {
            let mut session = handle.lock().await;
            if let Some(transition) = session.tick(now) {
                transitions.push((group, transition));
            }
        }
        transitions
    }

    /// Known groups, sorted by id.
    pub async fn groups(&self) -> Vec<GroupId> {
        let mut groups: Vec<GroupId> = self.sessions.read().await.keys().copied().collect();
        groups.sort();
        groups
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
