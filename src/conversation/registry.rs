//! Live sessions, keyed by id.
//!
//! Sessions idle past the timeout are dropped by a periodic sweep, saved
//! sessions sooner, after a short grace period. The registry refuses new
//! sessions once it holds `max_sessions`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::conversation::core::config::SessionConfig;
use crate::conversation::core::errors::{ConversationError, ConversationResult};
use crate::conversation::core::ids::SessionId;
use crate::conversation::session::{ConversationSession, SessionBackends};

/// Shared handle to one session. Operations on a session are serialized by its lock.
pub type SessionHandle = Arc<Mutex<ConversationSession>>;

struct SessionEntry {
    handle: SessionHandle,
    last_active: Instant,
}

/// Concurrent map of active and recently ended sessions.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionEntry>,
    backends: SessionBackends,
    settings: SessionConfig,
}

impl SessionRegistry {
    /// Create an empty registry with default limits.
    #[must_use]
    pub fn new(backends: SessionBackends) -> Self {
        Self::with_settings(backends, SessionConfig::default())
    }

    /// Create an empty registry with custom limits.
    #[must_use]
    pub fn with_settings(backends: SessionBackends, settings: SessionConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            backends,
            settings,
        }
    }

    /// Start a new active session.
    ///
    /// # Errors
    /// `SessionLimit` if the registry is still full after dropping expired sessions.
    pub fn start(&self) -> ConversationResult<(SessionId, SessionHandle)> {
        if self.sessions.len() >= self.settings.max_sessions {
            let dropped = self.cleanup_expired(Instant::now());
            debug!("Registry full, dropped {dropped} expired sessions");
            if self.sessions.len() >= self.settings.max_sessions {
                warn!("Refusing new session: {} live", self.sessions.len());
                return Err(ConversationError::SessionLimit(self.settings.max_sessions));
            }
        }

        let id = SessionId::new();
        let handle = Arc::new(Mutex::new(ConversationSession::new(id, self.backends.clone())));
        self.sessions.insert(
            id,
            SessionEntry {
                handle: Arc::clone(&handle),
                last_active: Instant::now(),
            },
        );
        info!("Started session {id} ({} live)", self.sessions.len());
        Ok((id, handle))
    }

    /// Look up a session and mark it active.
    ///
    /// # Errors
    /// `SessionNotFound` if the id is unknown, removed, or expired.
    pub fn get(&self, id: SessionId) -> ConversationResult<SessionHandle> {
        self.sessions
            .get_mut(&id)
            .map(|mut entry| {
                entry.last_active = Instant::now();
                Arc::clone(&entry.handle)
            })
            .ok_or(ConversationError::SessionNotFound(id))
    }

    /// Drop a session from memory. Returns whether it existed.
    #[must_use]
    pub fn remove(&self, id: SessionId) -> bool {
        let removed = self.sessions.remove(&id).is_some();
        if removed {
            debug!("Removed session {id}");
        }
        removed
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop sessions that expired as of `now`. Returns how many were dropped.
    ///
    /// A session whose lock is held is in use and never expires.
    #[must_use]
    pub fn cleanup_expired(&self, now: Instant) -> usize {
        let expired: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|entry| self.is_expired(entry.value(), now))
            .map(|entry| *entry.key())
            .collect();

        let mut dropped = 0;
        for id in expired {
            if self
                .sessions
                .remove_if(&id, |_, entry| self.is_expired(entry, now))
                .is_some()
            {
                dropped += 1;
                info!("Cleaned up expired session {id}");
            }
        }
        dropped
    }

    /// Sweep expired sessions every `cleanup_interval`, forever.
    pub async fn run_cleanup(&self) {
        let period = self.settings.cleanup_interval().max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let dropped = self.cleanup_expired(Instant::now());
            if dropped > 0 {
                debug!("Session sweep dropped {dropped}, {} live", self.sessions.len());
            }
        }
    }

    fn is_expired(&self, entry: &SessionEntry, now: Instant) -> bool {
        let idle = now.saturating_duration_since(entry.last_active);
        if idle < self.settings.saved_grace() && idle < self.settings.idle_timeout() {
            return false;
        }
        entry.handle.try_lock().is_ok_and(|session| {
            idle >= self.settings.idle_timeout() || session.is_persisted()
        })
    }
}
