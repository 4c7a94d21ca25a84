//! AG-UI protocol events and their server-sent-event framing.
//!
//! Every event is emitted as exactly one frame of the form
//! `data: <JSON>\n\n`, where the JSON object carries a `type` discriminator
//! followed by the variant's fields in camelCase.

use crate::ids::{MessageId, RunId, ThreadId, ToolCallId};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Error code reported when a run aborts.
pub const RUNTIME_ERROR_CODE: &str = "RUNTIME_ERROR";

/// Activity type used for tool call bubbles.
pub const TOOL_CALL_ACTIVITY: &str = "toolCall";

/// Author role of a streamed text message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Assistant,
}

/// The closed set of events the bridge emits to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ProtocolEvent {
    #[serde(rename = "RUN_STARTED")]
    RunStarted {
        #[serde(rename = "threadId")]
        thread_id: ThreadId,
        #[serde(rename = "runId")]
        run_id: RunId,
    },
    #[serde(rename = "STATE_SNAPSHOT")]
    StateSnapshot {
        snapshot: Value,
        #[serde(rename = "threadId", default, skip_serializing_if = "Option::is_none")]
        thread_id: Option<ThreadId>,
        #[serde(rename = "runId", default, skip_serializing_if = "Option::is_none")]
        run_id: Option<RunId>,
    },
    #[serde(rename = "TEXT_MESSAGE_START")]
    TextMessageStart {
        #[serde(rename = "messageId")]
        message_id: MessageId,
        role: Role,
    },
    #[serde(rename = "TEXT_MESSAGE_CONTENT")]
    TextMessageContent {
        #[serde(rename = "messageId")]
        message_id: MessageId,
        delta: String,
    },
    #[serde(rename = "TEXT_MESSAGE_END")]
    TextMessageEnd {
        #[serde(rename = "messageId")]
        message_id: MessageId,
    },
    #[serde(rename = "TOOL_CALL_START")]
    ToolCallStart {
        #[serde(rename = "toolCallId")]
        tool_call_id: ToolCallId,
        #[serde(rename = "toolCallName")]
        tool_call_name: String,
    },
    /// `delta` holds the JSON-stringified call arguments.
    #[serde(rename = "TOOL_CALL_ARGS")]
    ToolCallArgs {
        #[serde(rename = "toolCallId")]
        tool_call_id: ToolCallId,
        delta: String,
    },
    #[serde(rename = "TOOL_CALL_END")]
    ToolCallEnd {
        #[serde(rename = "toolCallId")]
        tool_call_id: ToolCallId,
    },
    /// `content` holds the JSON-stringified tool response.
    #[serde(rename = "TOOL_CALL_RESULT")]
    ToolCallResult {
        #[serde(rename = "messageId")]
        message_id: MessageId,
        #[serde(rename = "toolCallId")]
        tool_call_id: ToolCallId,
        content: String,
    },
    #[serde(rename = "ACTIVITY_SNAPSHOT")]
    ActivitySnapshot {
        #[serde(rename = "messageId")]
        message_id: MessageId,
        #[serde(rename = "activityType")]
        activity_type: String,
        content: Value,
    },
    #[serde(rename = "RUN_ERROR")]
    RunError { code: String, message: String },
    #[serde(rename = "RUN_FINISHED")]
    RunFinished {
        #[serde(rename = "threadId")]
        thread_id: ThreadId,
        #[serde(rename = "runId")]
        run_id: RunId,
    },
}

impl ProtocolEvent {
    /// Wire discriminator of this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "RUN_STARTED",
            Self::StateSnapshot { .. } => "STATE_SNAPSHOT",
            Self::TextMessageStart { .. } => "TEXT_MESSAGE_START",
            Self::TextMessageContent { .. } => "TEXT_MESSAGE_CONTENT",
            Self::TextMessageEnd { .. } => "TEXT_MESSAGE_END",
            Self::ToolCallStart { .. } => "TOOL_CALL_START",
            Self::ToolCallArgs { .. } => "TOOL_CALL_ARGS",
            Self::ToolCallEnd { .. } => "TOOL_CALL_END",
            Self::ToolCallResult { .. } => "TOOL_CALL_RESULT",
            Self::ActivitySnapshot { .. } => "ACTIVITY_SNAPSHOT",
            Self::RunError { .. } => "RUN_ERROR",
            Self::RunFinished { .. } => "RUN_FINISHED",
        }
    }
}

/// Frame a protocol event as a single SSE `data:` line.
pub fn encode(event: &ProtocolEvent) -> String {
    let payload = serde_json::to_string(event).unwrap_or_else(|error| {
        json!({
            "type": "RUN_ERROR",
            "code": "SERIALIZATION_ERROR",
            "message": error.to_string(),
        })
        .to_string()
    });
    format!("data: {payload}\n\n")
}

/// Stringify a JSON value for the `delta`/`content` string fields.
fn stringify(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_owned())
}

pub fn run_started(thread_id: &ThreadId, run_id: &RunId) -> String {
    encode(&ProtocolEvent::RunStarted {
        thread_id: thread_id.clone(),
        run_id: run_id.clone(),
    })
}

pub fn state_snapshot(snapshot: Value) -> String {
    encode(&ProtocolEvent::StateSnapshot {
        snapshot,
        thread_id: None,
        run_id: None,
    })
}

pub fn state_snapshot_for_run(snapshot: Value, thread_id: &ThreadId, run_id: &RunId) -> String {
    encode(&ProtocolEvent::StateSnapshot {
        snapshot,
        thread_id: Some(thread_id.clone()),
        run_id: Some(run_id.clone()),
    })
}

pub fn text_message_start(message_id: &MessageId) -> String {
    encode(&ProtocolEvent::TextMessageStart {
        message_id: message_id.clone(),
        role: Role::Assistant,
    })
}

pub fn text_message_content(message_id: &MessageId, delta: impl Into<String>) -> String {
    encode(&ProtocolEvent::TextMessageContent {
        message_id: message_id.clone(),
        delta: delta.into(),
    })
}

pub fn text_message_end(message_id: &MessageId) -> String {
    encode(&ProtocolEvent::TextMessageEnd {
        message_id: message_id.clone(),
    })
}

pub fn tool_call_start(tool_call_id: &ToolCallId, tool_call_name: impl Into<String>) -> String {
    encode(&ProtocolEvent::ToolCallStart {
        tool_call_id: tool_call_id.clone(),
        tool_call_name: tool_call_name.into(),
    })
}

pub fn tool_call_args(tool_call_id: &ToolCallId, args: &Value) -> String {
    encode(&ProtocolEvent::ToolCallArgs {
        tool_call_id: tool_call_id.clone(),
        delta: stringify(args),
    })
}

pub fn tool_call_end(tool_call_id: &ToolCallId) -> String {
    encode(&ProtocolEvent::ToolCallEnd {
        tool_call_id: tool_call_id.clone(),
    })
}

pub fn tool_call_result(
    message_id: &MessageId,
    tool_call_id: &ToolCallId,
    response: &Value,
) -> String {
    encode(&ProtocolEvent::ToolCallResult {
        message_id: message_id.clone(),
        tool_call_id: tool_call_id.clone(),
        content: stringify(response),
    })
}

pub fn activity_snapshot(
    message_id: &MessageId,
    activity_type: impl Into<String>,
    content: Value,
) -> String {
    encode(&ProtocolEvent::ActivitySnapshot {
        message_id: message_id.clone(),
        activity_type: activity_type.into(),
        content,
    })
}

pub fn run_error(code: impl Into<String>, message: impl Into<String>) -> String {
    encode(&ProtocolEvent::RunError {
        code: code.into(),
        message: message.into(),
    })
}

pub fn run_finished(thread_id: &ThreadId, run_id: &RunId) -> String {
    encode(&ProtocolEvent::RunFinished {
        thread_id: thread_id.clone(),
        run_id: run_id.clone(),
    })
}

/// Parse a frame produced by [`encode`] back into its JSON body.
///
/// Returns `None` for anything that is not a single `data:` frame.
pub fn decode_frame(frame: &str) -> Option<Value> {
    let body = frame.strip_prefix("data: ")?.strip_suffix("\n\n")?;
    serde_json::from_str(body).ok()
}
