//! Token-keyed session table.
//!
//! Sessions are checked out for the duration of a chat turn and checked
//! back in afterwards, so the store lock is never held across a provider
//! call. Two concurrent turns on the same token therefore race: the second
//! checkout starts a fresh session and the last checkin wins, dropping the
//! other turn from history. Idle entries are evicted by the cleanup task;
//! when the table is full the oldest entry makes room.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::agent::session::Session;

struct SessionEntry {
    session: Session,
    last_accessed: Instant,
}

pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
            max_sessions,
        }
    }

    /// Take the session for `token` out of the table, creating one with
    /// `make` if none exists. Pair with [`checkin`](Self::checkin).
    pub async fn checkout(&self, token: &str, make: impl FnOnce() -> Session) -> Session {
        let mut sessions = self.sessions.lock().await;
        match sessions.remove(token) {
            Some(entry) => entry.session,
            None => {
                let session = make();
                info!("Created session {} for token: {}", session.id(), token);
                session
            }
        }
    }

    pub async fn checkin(&self, token: String, session: Session) {
        let mut sessions = self.sessions.lock().await;

        if !sessions.contains_key(&token) && sessions.len() >= self.max_sessions {
            if let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, e)| e.last_accessed)
                .map(|(t, _)| t.clone())
            {
                sessions.remove(&oldest);
                info!("Removed oldest session {} to make room", oldest);
            }
        }

        sessions.insert(
            token,
            SessionEntry {
                session,
                last_accessed: Instant::now(),
            },
        );
    }

    pub async fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();

        sessions.retain(|token, entry| {
            let expired = entry.last_accessed.elapsed() > self.idle_timeout;
            if expired {
                debug!("Expiring session: {}", token);
            }
            !expired
        });

        let removed = before - sessions.len();
        if removed > 0 {
            info!("Cleaned up {} expired sessions", removed);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn contains(&self, token: &str) -> bool {
        self.sessions.lock().await.contains_key(token)
    }
}
