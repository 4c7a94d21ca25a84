use std::collections::HashMap;

use agui_protocol::{BridgeError, BridgeResult, Session, SessionEvent, SessionId, SessionStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, instrument};

type SessionKey = (String, String, SessionId);

/// Process-local session store. Sessions are lost on restart.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<SessionKey, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(app_name: &str, user_id: &str, session_id: &SessionId) -> SessionKey {
        (app_name.to_owned(), user_id.to_owned(), session_id.clone())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: Option<SessionId>,
    ) -> BridgeResult<Session> {
        let session_id = session_id.unwrap_or_default();
        let key = Self::key(app_name, user_id, &session_id);
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&key) {
            return Err(BridgeError::SessionExists(session_id.to_string()));
        }
        let session = Session::new(session_id, app_name, user_id);
        sessions.insert(key, session.clone());
        debug!(session_id = %session.id, "session created in memory");
        Ok(session)
    }

    async fn get_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &SessionId,
    ) -> BridgeResult<Option<Session>> {
        Ok(self
            .sessions
            .lock()
            .get(&Self::key(app_name, user_id, session_id))
            .cloned())
    }

    #[instrument(skip(self, session, event), fields(session_id = %session.id, event_id = %event.id))]
    async fn append_event(
        &self,
        session: &Session,
        event: SessionEvent,
    ) -> BridgeResult<SessionEvent> {
        let key = Self::key(&session.app_name, &session.user_id, &session.id);
        let mut sessions = self.sessions.lock();
        let stored = sessions
            .get_mut(&key)
            .ok_or_else(|| BridgeError::SessionNotFound(session.id.to_string()))?;
        stored.apply(event.clone());
        debug!(events = stored.events.len(), "event appended to session");
        Ok(event)
    }
}
