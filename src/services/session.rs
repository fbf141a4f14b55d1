use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{BrowsingHistory, Preferences, PreferencesUpdate},
};

/// Per-session state passed explicitly to the recommendation core
#[derive(Debug, Clone, Serialize)]
pub struct SessionContext {
    pub id: Uuid,
    pub preferences: Preferences,
    #[serde(rename = "browsing_history")]
    pub history: BrowsingHistory,
    /// Set while a recommendation request is in flight
    pub pending: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            preferences: Preferences::default(),
            history: BrowsingHistory::new(),
            pending: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn update_preferences(&mut self, update: PreferencesUpdate) {
        self.preferences.apply(update);
        self.touch();
    }

    /// Records a product view. Returns false for a repeat view.
    pub fn record_view(&mut self, product_id: impl Into<String>) -> bool {
        let recorded = self.history.record(product_id);
        self.touch();
        recorded
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.touch();
    }

    /// Marks a recommendation request as started; rejects re-entry
    pub fn begin_request(&mut self) -> AppResult<()> {
        if self.pending {
            return Err(AppError::Conflict(format!(
                "A recommendation request is already in progress for session {}",
                self.id
            )));
        }
        self.pending = true;
        Ok(())
    }

    pub fn finish_request(&mut self) {
        self.pending = false;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Default number of live sessions kept before the least recently used is
/// evicted
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Default idle time after which a session is evicted
pub const DEFAULT_SESSION_TTL_SECS: i64 = 3600;

/// In-memory session registry.
///
/// Sessions idle longer than the TTL are evicted when a new session is
/// created, and the store never holds more than `max_sessions`. Sessions
/// with a request in flight are never evicted for idleness.
#[derive(Debug)]
pub struct SessionStore {
    sessions: HashMap<Uuid, SessionContext>,
    max_sessions: usize,
    idle_ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(
            DEFAULT_MAX_SESSIONS,
            Duration::seconds(DEFAULT_SESSION_TTL_SECS),
        )
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_sessions: usize, idle_ttl: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            max_sessions: max_sessions.max(1),
            idle_ttl,
        }
    }

    /// Creates a fresh session and returns a snapshot of it
    pub fn create(&mut self) -> SessionContext {
        self.evict(Utc::now());

        let session = SessionContext::new();
        self.sessions.insert(session.id, session.clone());
        tracing::info!(session_id = %session.id, "Session created");
        session
    }

    /// Drops idle sessions, then the least recently updated ones until there
    /// is room for one more
    fn evict(&mut self, now: DateTime<Utc>) {
        let before = self.sessions.len();
        let idle_ttl = self.idle_ttl;
        self.sessions
            .retain(|_, session| session.pending || now - session.updated_at <= idle_ttl);

        while self.sessions.len() >= self.max_sessions {
            let oldest = self
                .sessions
                .values()
                .min_by_key(|session| (session.pending, session.updated_at))
                .map(|session| session.id);
            match oldest {
                Some(id) => {
                    self.sessions.remove(&id);
                }
                None => break,
            }
        }

        let evicted = before - self.sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, remaining = self.sessions.len(), "Sessions evicted");
        }
    }

    pub fn get(&self, id: &Uuid) -> AppResult<&SessionContext> {
        self.sessions.get(id).ok_or_else(|| not_found(id))
    }

    pub fn get_mut(&mut self, id: &Uuid) -> AppResult<&mut SessionContext> {
        self.sessions.get_mut(id).ok_or_else(|| not_found(id))
    }

    pub fn remove(&mut self, id: &Uuid) -> AppResult<SessionContext> {
        let session = self.sessions.remove(id).ok_or_else(|| not_found(id))?;
        tracing::info!(session_id = %id, "Session ended");
        Ok(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn not_found(id: &Uuid) -> AppError {
    AppError::NotFound(format!("Session {} not found", id))
}
