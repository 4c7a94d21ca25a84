use serde_json::Value;

/// Pull the user prompt out of a run request body.
///
/// A non-empty `prompt` string wins. Otherwise the last `messages` entry with
/// `role == "user"` is used, reading `content` as a string or `content.text`.
/// Anything else yields an empty prompt.
pub fn extract_prompt(body: &Value) -> String {
    if let Some(prompt) = body.get("prompt").and_then(Value::as_str)
        && !prompt.is_empty()
    {
        return prompt.to_owned();
    }

    let last_user_message = body
        .get("messages")
        .and_then(Value::as_array)
        .and_then(|messages| {
            messages
                .iter()
                .rev()
                .find(|message| message.get("role").and_then(Value::as_str) == Some("user"))
        });

    let Some(content) = last_user_message.and_then(|message| message.get("content")) else {
        return String::new();
    };

    match content {
        Value::String(text) => text.clone(),
        Value::Object(object) => object
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::extract_prompt;

    #[test]
    fn direct_prompt_field_wins() {
        let body = json!({
            "prompt": "What's the weather?",
            "messages": [{ "role": "user", "content": "ignored" }]
        });
        assert_eq!(extract_prompt(&body), "What's the weather?");
    }

    #[test]
    fn empty_prompt_falls_back_to_messages() {
        let body = json!({
            "prompt": "",
            "messages": [{ "role": "user", "content": "from messages" }]
        });
        assert_eq!(extract_prompt(&body), "from messages");
    }

    #[test]
    fn last_user_message_is_used() {
        let body = json!({
            "messages": [
                { "role": "user", "content": "first" },
                { "role": "assistant", "content": "reply" },
                { "role": "user", "content": "second" },
                { "role": "assistant", "content": "another reply" }
            ]
        });
        assert_eq!(extract_prompt(&body), "second");
    }

    #[test]
    fn nested_text_content_is_supported() {
        let body = json!({
            "messages": [{ "role": "user", "content": { "text": "nested" } }]
        });
        assert_eq!(extract_prompt(&body), "nested");
    }

    #[test]
    fn unusable_bodies_yield_empty_prompt() {
        assert_eq!(extract_prompt(&json!({})), "");
        assert_eq!(extract_prompt(&json!({ "prompt": 42 })), "");
        assert_eq!(extract_prompt(&json!({ "messages": "nope" })), "");
        assert_eq!(
            extract_prompt(&json!({ "messages": [null, { "role": "system", "content": "x" }] })),
            ""
        );
        assert_eq!(
            extract_prompt(&json!({ "messages": [{ "role": "user", "content": [1, 2] }] })),
            ""
        );
    }
}
