//! Session stores for the AG-UI bridge.
//!
//! - [`InMemorySessionStore`] keeps sessions in process memory.
//! - [`FileSessionStore`] keeps one JSONL log per session on disk.
//! - [`ensure_session`] resolves the session a request runs against.

mod file;
mod memory;

pub use file::FileSessionStore;
pub use memory::InMemorySessionStore;

use agui_protocol::{BridgeResult, Session, SessionConfig, SessionId, SessionStore};
use tracing::{debug, instrument};

/// Resolve the session for a request.
///
/// The user id falls back to `config.default_user_id`. A supplied session id
/// is looked up and created under that id if missing; without one a fresh
/// session is created.
#[instrument(skip(store, config), fields(app_name = %config.app_name))]
pub async fn ensure_session(
    store: &dyn SessionStore,
    config: &SessionConfig,
    session_id: Option<&str>,
    user_id: Option<&str>,
) -> BridgeResult<Session> {
    let user_id = config.resolve_user_id(user_id);
    let session_id = session_id
        .filter(|session_id| !session_id.is_empty())
        .map(SessionId::from);

    let session = store
        .get_or_create_session(&config.app_name, &user_id, session_id.as_ref())
        .await?;
    debug!(session_id = %session.id, user_id = %session.user_id, "session resolved");
    Ok(session)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use agui_protocol::{
        BridgeResult, RunId, Session, SessionConfig, SessionEvent, SessionId, SessionStore,
    };
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::{Map, json};

    use crate::{InMemorySessionStore, ensure_session};

    /// Store whose first lookup misses, as if another request created the
    /// session between this request's lookup and its create.
    struct LateLookupStore {
        inner: InMemorySessionStore,
        missed: AtomicBool,
    }

    #[async_trait]
    impl SessionStore for LateLookupStore {
        async fn create_session(
            &self,
            app_name: &str,
            user_id: &str,
            session_id: Option<SessionId>,
        ) -> BridgeResult<Session> {
            self.inner
                .create_session(app_name, user_id, session_id)
                .await
        }

        async fn get_session(
            &self,
            app_name: &str,
            user_id: &str,
            session_id: &SessionId,
        ) -> BridgeResult<Option<Session>> {
            if !self.missed.swap(true, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.get_session(app_name, user_id, session_id).await
        }

        async fn append_event(
            &self,
            session: &Session,
            event: SessionEvent,
        ) -> BridgeResult<SessionEvent> {
            self.inner.append_event(session, event).await
        }
    }

    #[tokio::test]
    async fn ensure_session_creates_fresh_session_for_default_user() -> Result<()> {
        let store = InMemorySessionStore::default();
        let config = SessionConfig::default();

        let session = ensure_session(&store, &config, None, None).await?;
        assert_eq!(session.user_id, "anonymous");
        assert_eq!(session.app_name, config.app_name);
        assert!(!session.id.as_str().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn ensure_session_adopts_client_thread_id() -> Result<()> {
        let store = InMemorySessionStore::default();
        let config = SessionConfig::default();

        let session = ensure_session(&store, &config, Some("thread-42"), Some("user-1")).await?;
        assert_eq!(session.id.as_str(), "thread-42");
        assert_eq!(session.user_id, "user-1");
        Ok(())
    }

    #[tokio::test]
    async fn ensure_session_returns_existing_state() -> Result<()> {
        let store = InMemorySessionStore::default();
        let config = SessionConfig::default();

        let session = ensure_session(&store, &config, Some("thread-1"), None).await?;
        let mut delta = Map::new();
        delta.insert("location".to_owned(), json!("Paris"));
        store
            .append_event(
                &session,
                SessionEvent::state_delta(RunId::from("run-1"), "orchestrator", delta),
            )
            .await?;

        let resumed = ensure_session(&store, &config, Some("thread-1"), None).await?;
        assert_eq!(resumed.state["location"], "Paris");
        assert_eq!(resumed.events.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn ensure_session_adopts_session_created_concurrently() -> Result<()> {
        let store = LateLookupStore {
            inner: InMemorySessionStore::new(),
            missed: AtomicBool::new(false),
        };
        let config = SessionConfig::default();
        let existing = store
            .inner
            .create_session(&config.app_name, "anonymous", Some(SessionId::from("thread-7")))
            .await?;
        let mut delta = Map::new();
        delta.insert("time".to_owned(), json!("12:00:00"));
        store
            .inner
            .append_event(
                &existing,
                SessionEvent::state_delta(RunId::from("run-1"), "orchestrator", delta),
            )
            .await?;

        let session = ensure_session(&store, &config, Some("thread-7"), None).await?;
        assert_eq!(session.id.as_str(), "thread-7");
        assert_eq!(session.state["time"], "12:00:00");
        Ok(())
    }
}
