//! Agent events

use crate::content::Content;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One step of agent activity: a user turn, a model turn, a tool result,
/// or a streamed fragment of a model turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event id
    pub id: String,
    /// Id shared by every event produced for one user request
    pub invocation_id: String,
    /// Who produced the event ("user" or the agent name)
    pub author: String,
    /// Turn content, if any
    pub content: Option<Content>,
    /// Streamed fragment of a turn that is still being produced
    #[serde(default)]
    pub partial: bool,
    /// The agent has nothing further to emit for this invocation
    #[serde(default)]
    pub turn_complete: bool,
    /// Event timestamp
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Create a complete (non-partial) event
    pub fn new(
        invocation_id: impl Into<String>,
        author: impl Into<String>,
        content: Option<Content>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            invocation_id: invocation_id.into(),
            author: author.into(),
            content,
            partial: false,
            turn_complete: false,
            timestamp: Utc::now(),
        }
    }

    /// Mark the event as a streamed fragment
    pub fn partial(mut self) -> Self {
        self.partial = true;
        self
    }

    /// Mark the event as the end of the invocation
    pub fn complete(mut self) -> Self {
        self.turn_complete = true;
        self
    }

    /// Whether this event is the agent's final answer for the invocation.
    ///
    /// Partial fragments and turns that call tools or carry tool results are
    /// never final.
    pub fn is_final_response(&self) -> bool {
        if self.partial {
            return false;
        }
        match &self.content {
            Some(content) => !content.has_function_calls() && !content.has_function_responses(),
            None => true,
        }
    }
}
