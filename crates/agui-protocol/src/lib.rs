//! # agui-protocol — AG-UI bridge contract
//!
//! This crate defines the shared types, wire encoding, and trait interfaces
//! the event-stream bridge and its collaborators depend on.
//!
//! It is intentionally dependency-light (no tokio, axum, or filesystem) so it
//! can be used as a pure contract crate.
//!
//! ## Module Overview
//!
//! - [`ids`] — Typed ID wrappers (ThreadId, RunId, MessageId, ToolCallId, SessionId)
//! - [`event`] — ProtocolEvent (the AG-UI event taxonomy) and its SSE encoder
//! - [`state`] — SharedState and the closed key set reconciler
//! - [`upstream`] — UpstreamEvent shape emitted by the agent runtime, plus extractors
//! - [`session`] — Session, SessionEvent, SessionConfig
//! - [`ports`] — Runtime boundary ports (agent runtime, session store)
//! - [`error`] — BridgeError, BridgeResult

pub mod error;
pub mod event;
pub mod ids;
pub mod ports;
pub mod session;
pub mod state;
pub mod upstream;

// Re-export the most commonly used types at the crate root.
pub use error::{BridgeError, BridgeResult};
pub use event::{ProtocolEvent, encode};
pub use ids::{MessageId, RunId, SessionEventId, SessionId, ThreadId, ToolCallId};
pub use ports::{AgentRuntime, RunRequest, SessionStore, UpstreamEventStream};
pub use session::{Session, SessionConfig, SessionEvent};
pub use state::{NESTED_PAYLOAD_FIELD, SHARED_STATE_KEYS, SharedState};
pub use upstream::{
    Content, FunctionCall, FunctionResponse, Part, UpstreamEvent, extract_invocations,
    extract_results, extract_text_delta,
};
