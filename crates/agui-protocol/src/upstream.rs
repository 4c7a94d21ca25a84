//! Upstream events produced by the agent runtime.
//!
//! The runtime's event record is treated as opaque apart from its content
//! parts. Three independent facets are extracted from it: tool invocation
//! requests, tool invocation results, and a text delta. One record may carry
//! any combination of them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One unit produced by the agent runtime during a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

/// A tool invocation request. The runtime's own `id`, when present, is not
/// exposed to clients; the bridge generates its own correlation ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub args: Value,
}

/// A tool invocation result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub response: Value,
}

impl UpstreamEvent {
    pub fn text(delta: impl Into<String>) -> Self {
        Self::from_parts(vec![Part {
            text: Some(delta.into()),
            ..Part::default()
        }])
    }

    pub fn function_call(name: impl Into<String>, args: Value) -> Self {
        Self::from_parts(vec![Part {
            function_call: Some(FunctionCall {
                id: None,
                name: Some(name.into()),
                args,
            }),
            ..Part::default()
        }])
    }

    pub fn function_response(name: impl Into<String>, response: Value) -> Self {
        Self::from_parts(vec![Part {
            function_response: Some(FunctionResponse {
                id: None,
                name: Some(name.into()),
                response,
            }),
            ..Part::default()
        }])
    }

    pub fn from_parts(parts: Vec<Part>) -> Self {
        Self {
            author: None,
            partial: None,
            content: Some(Content { role: None, parts }),
        }
    }

    fn parts(&self) -> &[Part] {
        self.content
            .as_ref()
            .map(|content| content.parts.as_slice())
            .unwrap_or_default()
    }
}

/// Tool invocation requests carried by `event`, in part order.
pub fn extract_invocations(event: &UpstreamEvent) -> Vec<FunctionCall> {
    event
        .parts()
        .iter()
        .filter_map(|part| part.function_call.clone())
        .collect()
}

/// Tool invocation results carried by `event`, in part order.
pub fn extract_results(event: &UpstreamEvent) -> Vec<FunctionResponse> {
    event
        .parts()
        .iter()
        .filter_map(|part| part.function_response.clone())
        .collect()
}

/// Concatenated text of all text parts; empty when there is none.
pub fn extract_text_delta(event: &UpstreamEvent) -> String {
    event
        .parts()
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_event_yields_nothing() {
        let event = UpstreamEvent::default();
        assert!(extract_invocations(&event).is_empty());
        assert!(extract_results(&event).is_empty());
        assert_eq!(extract_text_delta(&event), "");
    }

    #[test]
    fn facets_are_extracted_independently() {
        let event: UpstreamEvent = serde_json::from_value(json!({
            "author": "weather",
            "content": {
                "role": "model",
                "parts": [
                    { "text": "Checking " },
                    { "functionCall": { "name": "get_weather", "args": { "location": "Oslo" } } },
                    { "functionResponse": { "name": "get_time", "response": { "time": "10:00" } } },
                    { "text": "now." }
                ]
            }
        }))
        .expect("deserialize upstream event");

        let calls = extract_invocations(&event);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name.as_deref(), Some("get_weather"));
        assert_eq!(calls[0].args, json!({ "location": "Oslo" }));

        let results = extract_results(&event);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].response["time"], "10:00");

        assert_eq!(extract_text_delta(&event), "Checking now.");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let event: UpstreamEvent = serde_json::from_value(json!({
            "invocationId": "e-1",
            "actions": { "stateDelta": {} },
            "content": { "parts": [{ "text": "hi", "thought": false }] }
        }))
        .expect("deserialize upstream event");
        assert_eq!(extract_text_delta(&event), "hi");
    }

    #[test]
    fn missing_args_default_to_null() {
        let event: UpstreamEvent = serde_json::from_value(json!({
            "content": { "parts": [{ "functionCall": { "name": "noop" } }] }
        }))
        .expect("deserialize upstream event");
        assert_eq!(extract_invocations(&event)[0].args, Value::Null);
    }
}
