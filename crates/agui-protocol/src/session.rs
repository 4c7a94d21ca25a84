//! Session model shared by the bridge and the session stores.

use crate::ids::{RunId, SessionEventId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Explicit configuration for session resolution, owned by the HTTP layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub app_name: String,
    pub default_user_id: String,
    /// Author recorded on every state delta the bridge appends.
    pub agent_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            app_name: "agui-bridge".to_owned(),
            default_user_id: "anonymous".to_owned(),
            agent_name: "orchestrator".to_owned(),
        }
    }
}

impl SessionConfig {
    /// The caller-provided user id, or the configured default.
    pub fn resolve_user_id(&self, user_id: Option<&str>) -> String {
        user_id
            .filter(|user_id| !user_id.is_empty())
            .unwrap_or(&self.default_user_id)
            .to_owned()
    }
}

/// A persisted conversation: identity, state bag, and append-only event log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub app_name: String,
    pub user_id: String,
    #[serde(default)]
    pub state: Map<String, Value>,
    #[serde(default)]
    pub events: Vec<SessionEvent>,
    pub last_update_time: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId, app_name: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            id,
            app_name: app_name.into(),
            user_id: user_id.into(),
            state: Map::new(),
            events: Vec::new(),
            last_update_time: Utc::now(),
        }
    }

    /// Record an event: overwrite state keys from its delta and push it onto
    /// the log.
    pub fn apply(&mut self, event: SessionEvent) {
        for (key, value) in &event.state_delta {
            self.state.insert(key.clone(), value.clone());
        }
        self.last_update_time = event.timestamp;
        self.events.push(event);
    }
}

/// One entry in a session's event log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionEvent {
    pub id: SessionEventId,
    pub invocation_id: RunId,
    pub author: String,
    #[serde(default)]
    pub state_delta: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl SessionEvent {
    pub fn state_delta(
        invocation_id: RunId,
        author: impl Into<String>,
        state_delta: Map<String, Value>,
    ) -> Self {
        Self {
            id: SessionEventId::default(),
            invocation_id,
            author: author.into(),
            state_delta,
            timestamp: Utc::now(),
        }
    }
}
