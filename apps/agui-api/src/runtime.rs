use agui_protocol::{
    AgentRuntime, BridgeResult, Content, Part, RunRequest, UpstreamEvent, UpstreamEventStream,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use tracing::debug;

const ECHO_AUTHOR: &str = "echo";

/// Stand-in agent runtime that answers every prompt by echoing it back.
///
/// Lets the API run end to end without a model-backed runtime attached.
#[derive(Debug, Clone, Default)]
pub struct EchoAgentRuntime;

#[async_trait]
impl AgentRuntime for EchoAgentRuntime {
    async fn run(&self, request: RunRequest) -> BridgeResult<UpstreamEventStream> {
        let prompt: String = request
            .new_message
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        debug!(
            session_id = %request.session_id,
            user_id = %request.user_id,
            prompt_len = prompt.len(),
            "echo runtime invoked"
        );

        let reply = if prompt.trim().is_empty() {
            "I did not receive a prompt.".to_owned()
        } else {
            format!("You said: {prompt}")
        };

        let event = UpstreamEvent {
            author: Some(ECHO_AUTHOR.to_owned()),
            partial: None,
            content: Some(Content {
                role: Some("model".to_owned()),
                parts: vec![Part {
                    text: Some(reply),
                    ..Part::default()
                }],
            }),
        };
        Ok(stream::iter(vec![Ok(event)]).boxed())
    }
}
