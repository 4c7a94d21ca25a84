//! Event stream bridge.
//!
//! Consumes the agent runtime's upstream events for one run and re-emits
//! them as an ordered sequence of AG-UI SSE frames, while reconciling the
//! shared state against the session store.
//!
//! Every tracked state change is appended to the session before the
//! matching `STATE_SNAPSHOT` is emitted, so the store is never behind what
//! the client has been shown.

use std::sync::Arc;

use agui_protocol::event::{self, RUNTIME_ERROR_CODE, TOOL_CALL_ACTIVITY};
use agui_protocol::{
    BridgeError, BridgeResult, FunctionCall, FunctionResponse, MessageId, NESTED_PAYLOAD_FIELD,
    RunId, Session, SessionEvent, SessionStore, SharedState, ThreadId, ToolCallId, UpstreamEvent,
    UpstreamEventStream, extract_invocations, extract_results, extract_text_delta,
};
use async_stream::stream;
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use serde_json::json;
use tracing::{debug, error, info, warn};

mod correlation;

pub use correlation::CorrelationQueue;

const UNKNOWN_TOOL_NAME: &str = "unknown";
const DEFAULT_AUTHOR: &str = "orchestrator";

/// Inputs of one bridged run.
#[derive(Clone)]
pub struct BridgeRun {
    thread_id: ThreadId,
    run_id: RunId,
    session: Session,
    store: Arc<dyn SessionStore>,
    author: String,
}

impl BridgeRun {
    pub fn new(thread_id: ThreadId, session: Session, store: Arc<dyn SessionStore>) -> Self {
        Self {
            thread_id,
            run_id: RunId::default(),
            session,
            store,
            author: DEFAULT_AUTHOR.to_owned(),
        }
    }

    pub fn run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    /// Author recorded on appended state deltas.
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }
}

/// One unit of work extracted from an upstream event, in emission order.
#[derive(Debug, Clone)]
enum UpstreamStep {
    Invocation(FunctionCall),
    Result(FunctionResponse),
    Text(String),
}

fn upstream_steps(event: &UpstreamEvent) -> Vec<UpstreamStep> {
    let mut steps: Vec<UpstreamStep> = extract_invocations(event)
        .into_iter()
        .map(UpstreamStep::Invocation)
        .collect();
    steps.extend(extract_results(event).into_iter().map(UpstreamStep::Result));
    let delta = extract_text_delta(event);
    if !delta.is_empty() {
        steps.push(UpstreamStep::Text(delta));
    }
    steps
}

/// Turn an upstream event sequence into a lazy, single-pass stream of SSE
/// frames.
///
/// The stream always opens with `RUN_STARTED` and closes with `RUN_FINISHED`.
/// Failures from the upstream or from the session store end the run with
/// `RUN_ERROR` followed by `RUN_FINISHED`; the stream itself never fails.
/// Dropping the stream stops upstream consumption; deltas persisted up to
/// that point stay persisted.
pub fn stream_agent_response(
    mut upstream: UpstreamEventStream,
    run: BridgeRun,
) -> impl Stream<Item = String> + Send + 'static {
    stream! {
        let mut bridge = Bridge::new(run);
        let mut frames = Vec::new();

        yield event::run_started(&bridge.thread_id, &bridge.run_id);

        let seeded = bridge.seed(&mut frames).await;
        for frame in frames.drain(..) {
            yield frame;
        }
        if let Err(error) = seeded {
            for frame in bridge.fail(&error) {
                yield frame;
            }
            return;
        }

        while let Some(item) = upstream.next().await {
            let upstream_event = match item {
                Ok(upstream_event) => upstream_event,
                Err(error) => {
                    for frame in bridge.fail(&error) {
                        yield frame;
                    }
                    return;
                }
            };

            for step in upstream_steps(&upstream_event) {
                let applied = bridge.apply(step, &mut frames).await;
                for frame in frames.drain(..) {
                    yield frame;
                }
                if let Err(error) = applied {
                    for frame in bridge.fail(&error) {
                        yield frame;
                    }
                    return;
                }
            }
        }

        for frame in bridge.finish() {
            yield frame;
        }
    }
}

/// Mutable state of a single run. Owned exclusively by the run's stream.
struct Bridge {
    thread_id: ThreadId,
    run_id: RunId,
    message_id: MessageId,
    session: Session,
    store: Arc<dyn SessionStore>,
    author: String,
    state: SharedState,
    queue: CorrelationQueue,
    message_started: bool,
}

impl Bridge {
    fn new(run: BridgeRun) -> Self {
        Self {
            thread_id: run.thread_id,
            run_id: run.run_id,
            message_id: MessageId::default(),
            state: SharedState::new(),
            session: run.session,
            store: run.store,
            author: run.author,
            queue: CorrelationQueue::new(),
            message_started: false,
        }
    }

    /// Seed the working state from the session plus the current date, persist
    /// it, and snapshot it unconditionally.
    async fn seed(&mut self, frames: &mut Vec<String>) -> BridgeResult<()> {
        self.state = SharedState::from_persisted(&self.session.state);
        self.state.stamp_current_date(Utc::now());
        self.persist().await?;
        frames.push(event::state_snapshot(self.state.snapshot()));
        debug!(
            thread_id = %self.thread_id,
            run_id = %self.run_id,
            keys = self.state.as_map().len(),
            "working state seeded"
        );
        Ok(())
    }

    async fn apply(&mut self, step: UpstreamStep, frames: &mut Vec<String>) -> BridgeResult<()> {
        match step {
            UpstreamStep::Invocation(call) => self.on_invocation(call, frames).await,
            UpstreamStep::Result(response) => self.on_result(response, frames).await,
            UpstreamStep::Text(delta) => {
                self.on_text(delta, frames);
                Ok(())
            }
        }
    }

    async fn on_invocation(
        &mut self,
        call: FunctionCall,
        frames: &mut Vec<String>,
    ) -> BridgeResult<()> {
        let tool_call_id = ToolCallId::default();
        self.queue.push(tool_call_id.clone());

        if self.state.merge(&call.args) {
            self.persist().await?;
            frames.push(event::state_snapshot(self.state.snapshot()));
        }

        let name = call.name.unwrap_or_else(|| UNKNOWN_TOOL_NAME.to_owned());
        info!(
            thread_id = %self.thread_id,
            run_id = %self.run_id,
            tool_call_id = %tool_call_id,
            tool = %name,
            "emitting tool call"
        );
        frames.push(event::tool_call_start(&tool_call_id, name.clone()));
        frames.push(event::tool_call_args(&tool_call_id, &call.args));
        frames.push(event::tool_call_end(&tool_call_id));
        frames.push(event::activity_snapshot(
            &MessageId::from(tool_call_id.as_str()),
            TOOL_CALL_ACTIVITY,
            json!({
                "name": name,
                "arguments": call.args,
            }),
        ));
        Ok(())
    }

    async fn on_result(
        &mut self,
        response: FunctionResponse,
        frames: &mut Vec<String>,
    ) -> BridgeResult<()> {
        if self.queue.is_empty() {
            warn!(
                thread_id = %self.thread_id,
                run_id = %self.run_id,
                tool = ?response.name,
                "tool result without an open call; minting a correlation id"
            );
        }
        let tool_call_id = self.queue.pop_oldest_or_new();

        if self
            .state
            .merge_with_nested(&response.response, NESTED_PAYLOAD_FIELD)
        {
            self.persist().await?;
            frames.push(event::state_snapshot(self.state.snapshot()));
        }

        debug!(
            thread_id = %self.thread_id,
            run_id = %self.run_id,
            tool_call_id = %tool_call_id,
            "emitting tool result"
        );
        frames.push(event::tool_call_result(
            &MessageId::default(),
            &tool_call_id,
            &response.response,
        ));
        Ok(())
    }

    fn on_text(&mut self, delta: String, frames: &mut Vec<String>) {
        if !self.message_started {
            frames.push(event::text_message_start(&self.message_id));
            self.message_started = true;
        }
        frames.push(event::text_message_content(&self.message_id, delta));
    }

    async fn persist(&self) -> BridgeResult<()> {
        let delta = SessionEvent::state_delta(
            self.run_id.clone(),
            self.author.clone(),
            self.state.as_map().clone(),
        );
        self.store.append_event(&self.session, delta).await?;
        Ok(())
    }

    fn finish(&self) -> Vec<String> {
        let mut frames = Vec::with_capacity(3);
        if self.message_started {
            frames.push(event::text_message_end(&self.message_id));
        } else {
            warn!(
                thread_id = %self.thread_id,
                run_id = %self.run_id,
                "no text content was extracted from upstream events"
            );
        }
        frames.push(event::state_snapshot(self.state.snapshot()));
        frames.push(event::run_finished(&self.thread_id, &self.run_id));
        info!(thread_id = %self.thread_id, run_id = %self.run_id, "run finished");
        frames
    }

    fn fail(&self, failure: &BridgeError) -> [String; 2] {
        error!(
            thread_id = %self.thread_id,
            run_id = %self.run_id,
            error = %failure,
            "error during agent execution stream"
        );
        [
            event::run_error(RUNTIME_ERROR_CODE, failure.to_string()),
            event::run_finished(&self.thread_id, &self.run_id),
        ]
    }
}
