//! Runtime boundary ports for the bridge.
//!
//! These traits define the only boundary between the bridge and its external
//! collaborators: the agent runtime that produces upstream events, and the
//! session store that owns durability.
//!
//! Object-safety note:
//! - Traits use `async-trait` for async dyn-dispatch.
//! - Streaming uses boxed trait objects (`UpstreamEventStream`).

use crate::error::{BridgeError, BridgeResult};
use crate::ids::SessionId;
use crate::session::{Session, SessionEvent};
use crate::upstream::{Content, UpstreamEvent};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Upstream event sequence of one run. An `Err` item ends the run.
pub type UpstreamEventStream = BoxStream<'static, BridgeResult<UpstreamEvent>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub user_id: String,
    pub session_id: SessionId,
    pub new_message: Content,
}

#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn run(&self, request: RunRequest) -> BridgeResult<UpstreamEventStream>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session, under `session_id` when one is given. Fails with
    /// [`BridgeError::SessionExists`] when that id is taken.
    async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: Option<SessionId>,
    ) -> BridgeResult<Session>;

    async fn get_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &SessionId,
    ) -> BridgeResult<Option<Session>>;

    /// Durably append `event` to the session's log and apply its state delta.
    async fn append_event(&self, session: &Session, event: SessionEvent)
    -> BridgeResult<SessionEvent>;

    /// Fetch the session, creating it when missing. Losing a create race to a
    /// concurrent caller falls back to reading the winner's session.
    async fn get_or_create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: Option<&SessionId>,
    ) -> BridgeResult<Session> {
        if let Some(session_id) = session_id
            && let Some(session) = self.get_session(app_name, user_id, session_id).await?
        {
            return Ok(session);
        }
        let created = self
            .create_session(app_name, user_id, session_id.cloned())
            .await;
        match (created, session_id) {
            (Err(BridgeError::SessionExists(_)), Some(session_id)) => self
                .get_session(app_name, user_id, session_id)
                .await?
                .ok_or_else(|| BridgeError::SessionNotFound(session_id.to_string())),
            (created, _) => created,
        }
    }
}
