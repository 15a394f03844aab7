//! Session data structures

use super::event::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Address of a session: `(app_name, user_id, session_id)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.app_name, self.user_id, self.session_id)
    }
}

/// A conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session address
    pub key: SessionKey,
    /// Events in the session, oldest first
    pub events: Vec<Event>,
    /// Session creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub last_update_time: DateTime<Utc>,
}

impl Session {
    /// Create a new empty session
    pub fn new(key: SessionKey) -> Self {
        let now = Utc::now();
        Self {
            key,
            events: Vec::new(),
            created_at: now,
            last_update_time: now,
        }
    }

    /// Append an event to the session
    pub fn add_event(&mut self, event: Event) {
        self.last_update_time = event.timestamp;
        self.events.push(event);
    }

    /// Get the most recent events for LLM context
    pub fn get_history(&self, max_events: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(max_events);
        &self.events[start..]
    }
}
