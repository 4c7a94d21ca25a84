//! Typed ID wrappers used across the bridge.
//!
//! IDs are opaque String wrappers (serde-transparent). Clients may hand us any
//! string (e.g. a thread id chosen by the chat frontend); locally generated
//! ids are UUID v4.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string value.
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Create a new ID using UUID v4 (random).
            pub fn new_uuid() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// View as string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new_uuid()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

typed_id!(
    /// Conversation thread identifier, shared with the client.
    ThreadId
);
typed_id!(
    /// Unique identifier for one run (request/response lifecycle).
    RunId
);
typed_id!(
    /// Identifier of an assistant text message or tool result message.
    MessageId
);
typed_id!(
    /// Correlation id pairing a tool invocation with its result.
    ToolCallId
);
typed_id!(
    /// Unique identifier for a persisted session.
    SessionId
);
typed_id!(
    /// Unique identifier for an entry in a session's event log.
    SessionEventId
);

impl From<SessionId> for ThreadId {
    fn from(id: SessionId) -> Self {
        Self(id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_id_new_is_unique() {
        let a = ToolCallId::new_uuid();
        let b = ToolCallId::new_uuid();
        assert_ne!(a, b);
    }

    #[test]
    fn thread_id_from_session_id_keeps_value() {
        let session = SessionId::from_string("session-1");
        let thread: ThreadId = session.into();
        assert_eq!(thread.as_str(), "session-1");
    }

    #[test]
    fn typed_id_serializes_as_plain_string() {
        let id = RunId::from_string("RUN001");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"RUN001\"");
        let back: RunId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn typed_id_hash_equality() {
        use std::collections::HashSet;
        let a = SessionId::from_string("same");
        let b = SessionId::from_string("same");
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }
}
