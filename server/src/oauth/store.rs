use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;

use super::session::{PendingLogin, Session};

#[derive(Default)]
struct Maps {
    pending: HashMap<String, PendingLogin>,
    sessions: HashMap<String, Session>,
}

/// The login store and the session store, both keyed by state token.
///
/// One lock guards both maps. It is only ever held for map operations, never across a
/// request to the provider.
#[derive(Default)]
pub struct FlowStore {
    maps: Mutex<Maps>,
}

impl FlowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a pending login. When `prune_older_than` is set, expired pending logins are
    /// dropped in the same critical section; returns how many were dropped.
    pub async fn put_pending(
        &self,
        state: String,
        login: PendingLogin,
        prune_older_than: Option<Duration>,
    ) -> usize {
        let mut maps = self.maps.lock().await;

        let mut pruned = 0;
        if let Some(ttl) = prune_older_than {
            let before = maps.pending.len();
            maps.pending.retain(|_, pending| !pending.is_expired(ttl));
            pruned = before - maps.pending.len();
        }

        maps.pending.insert(state, login);
        pruned
    }

    /// Atomically removes and returns the pending login for `state`
    pub async fn take_pending(&self, state: &str) -> Option<PendingLogin> {
        self.maps.lock().await.pending.remove(state)
    }

    pub async fn put_session(&self, state: String, session: Session) {
        self.maps.lock().await.sessions.insert(state, session);
    }

    pub async fn get_session(&self, state: &str) -> Option<Session> {
        self.maps.lock().await.sessions.get(state).cloned()
    }

    pub async fn pending_len(&self) -> usize {
        self.maps.lock().await.pending.len()
    }

    pub async fn session_len(&self) -> usize {
        self.maps.lock().await.sessions.len()
    }
}
