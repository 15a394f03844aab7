//! Session storage service

use super::event::Event;
use super::store::{Session, SessionKey};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Storage for conversation sessions.
///
/// A key addresses at most one session: `create` must fail for a key that
/// already exists, and `get` must report a missing key as [`Error::NotFound`]
/// so callers can tell "absent" apart from "storage failed".
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Fetch a session
    async fn get(&self, key: &SessionKey) -> Result<Session>;

    /// Create a new, empty session
    async fn create(&self, key: &SessionKey) -> Result<Session>;

    /// Append a completed event to an existing session
    async fn append_event(&self, key: &SessionKey, event: Event) -> Result<()>;
}

/// Process-local session storage
#[derive(Debug, Default)]
pub struct InMemorySessionService {
    sessions: RwLock<HashMap<SessionKey, Session>>,
}

impl InMemorySessionService {
    /// Create an empty session service
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Check if no session is stored
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[async_trait]
impl SessionService for InMemorySessionService {
    async fn get(&self, key: &SessionKey) -> Result<Session> {
        self.sessions
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("session {}", key)))
    }

    async fn create(&self, key: &SessionKey) -> Result<Session> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(key) {
            return Err(Error::Session(format!("session {} already exists", key)));
        }
        let session = Session::new(key.clone());
        sessions.insert(key.clone(), session.clone());
        tracing::debug!("Created session {}", key);
        Ok(session)
    }

    async fn append_event(&self, key: &SessionKey, event: Event) -> Result<()> {
        if event.partial {
            return Ok(());
        }
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(format!("session {}", key)))?;
        session.add_event(event);
        Ok(())
    }
}
