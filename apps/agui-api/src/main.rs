use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use agui_bridge::{BridgeRun, stream_agent_response};
use agui_protocol::{AgentRuntime, Content, Part, RunRequest, SessionConfig, SessionStore};
use agui_sessions::{FileSessionStore, InMemorySessionStore, ensure_session};
use anyhow::Result;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use futures_util::StreamExt;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

mod prompt;
mod runtime;

use crate::prompt::extract_prompt;
use crate::runtime::EchoAgentRuntime;

const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";
const INTERNAL_SERVER_ERROR_MESSAGE: &str = "Internal Server Error";

#[derive(Debug, Parser)]
#[command(name = "agui-api")]
#[command(about = "AG-UI event-stream bridge API")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1:8000")]
    listen: SocketAddr,
    #[arg(long, default_value = "agui-bridge")]
    app_name: String,
    #[arg(long, env = "DEFAULT_USER_ID", default_value = "anonymous")]
    default_user_id: String,
    #[arg(long, default_value = "orchestrator")]
    agent_name: String,
    /// Persist sessions as JSONL under this directory instead of in memory.
    #[arg(long)]
    root: Option<PathBuf>,
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            app_name: self.app_name.clone(),
            default_user_id: self.default_user_id.clone(),
            agent_name: self.agent_name.clone(),
        }
    }

    fn session_store(&self) -> Arc<dyn SessionStore> {
        match &self.root {
            Some(root) => Arc::new(FileSessionStore::new(root.clone())),
            None => Arc::new(InMemorySessionStore::new()),
        }
    }
}

#[derive(Clone)]
struct AppState {
    config: Arc<SessionConfig>,
    store: Arc<dyn SessionStore>,
    runtime: Arc<dyn AgentRuntime>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Logs the cause and hides it from the client.
    fn internal(cause: impl std::fmt::Display) -> Self {
        error!(error = %cause, "agent run failed before streaming");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: INTERNAL_SERVER_ERROR_MESSAGE.to_owned(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let state = AppState {
        config: Arc::new(cli.session_config()),
        store: cli.session_store(),
        runtime: Arc::new(EchoAgentRuntime),
    };

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!(
        listen = %cli.listen,
        app_name = %cli.app_name,
        root = ?cli.root,
        "agui-api listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(hello).post(run_agent))
        .route("/healthz", get(healthz))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn hello() -> Json<Value> {
    Json(json!({ "hello": "world" }))
}

async fn healthz() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "agui-api"
    }))
}

async fn run_agent(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let body: Value = serde_json::from_slice(&body)
        .map_err(|error| ApiError::bad_request(format!("invalid JSON body: {error}")))?;

    let prompt = extract_prompt(&body);
    let thread_id = body.get("threadId").and_then(Value::as_str);
    let user_id = body.get("userId").and_then(Value::as_str);

    let session = ensure_session(state.store.as_ref(), &state.config, thread_id, user_id)
        .await
        .map_err(ApiError::internal)?;

    let upstream = state
        .runtime
        .run(RunRequest {
            user_id: session.user_id.clone(),
            session_id: session.id.clone(),
            new_message: Content {
                role: Some("user".to_owned()),
                parts: vec![Part {
                    text: Some(prompt),
                    ..Part::default()
                }],
            },
        })
        .await
        .map_err(ApiError::internal)?;

    info!(session_id = %session.id, user_id = %session.user_id, "streaming agent run");

    let run = BridgeRun::new(session.id.clone().into(), session, state.store.clone())
        .author(state.config.agent_name.clone());
    let frames = stream_agent_response(upstream, run).map(Ok::<_, Infallible>);

    Ok((
        [
            (CONTENT_TYPE, EVENT_STREAM_CONTENT_TYPE),
            (CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames),
    )
        .into_response())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!(%error, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    {
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(error) => {
                    error!(%error, "failed to install SIGTERM handler");
                }
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use agui_protocol::event::decode_frame;
    use agui_protocol::{
        AgentRuntime, BridgeError, BridgeResult, RunRequest, SessionConfig, SessionId,
        SessionStore, UpstreamEventStream,
    };
    use agui_sessions::InMemorySessionStore;
    use anyhow::Result;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
    use axum::http::{Request, StatusCode};
    use clap::Parser;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::{AppState, Cli, EchoAgentRuntime, router};

    struct FailingRuntime;

    #[async_trait]
    impl AgentRuntime for FailingRuntime {
        async fn run(&self, _request: RunRequest) -> BridgeResult<UpstreamEventStream> {
            Err(BridgeError::upstream("model unavailable"))
        }
    }

    fn state_with(runtime: Arc<dyn AgentRuntime>) -> (AppState, Arc<InMemorySessionStore>) {
        let store = Arc::new(InMemorySessionStore::new());
        let state = AppState {
            config: Arc::new(SessionConfig::default()),
            store: store.clone(),
            runtime,
        };
        (state, store)
    }

    fn post_json(body: &Value) -> Result<Request<Body>> {
        Ok(Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body)?))?)
    }

    async fn read_json(response: axum::response::Response) -> Result<Value> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[tokio::test]
    async fn root_says_hello() -> Result<()> {
        let (state, _) = state_with(Arc::new(EchoAgentRuntime));
        let response = router(state)
            .oneshot(Request::builder().uri("/").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await?, json!({ "hello": "world" }));
        Ok(())
    }

    #[tokio::test]
    async fn healthz_reports_service() -> Result<()> {
        let (state, _) = state_with(Arc::new(EchoAgentRuntime));
        let response = router(state)
            .oneshot(Request::builder().uri("/healthz").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            read_json(response).await?,
            json!({ "status": "ok", "service": "agui-api" })
        );
        Ok(())
    }

    #[tokio::test]
    async fn run_streams_agui_frames_for_thread() -> Result<()> {
        let (state, store) = state_with(Arc::new(EchoAgentRuntime));
        let response = router(state)
            .oneshot(post_json(&json!({ "threadId": "t-1", "prompt": "hi there" }))?)
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).map(|v| v.as_bytes()),
            Some(&b"text/event-stream"[..])
        );
        assert_eq!(
            response.headers().get(CACHE_CONTROL).map(|v| v.as_bytes()),
            Some(&b"no-cache"[..])
        );

        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = String::from_utf8(bytes.to_vec())?;
        let events: Vec<Value> = body
            .split_inclusive("\n\n")
            .filter_map(decode_frame)
            .collect();
        let types: Vec<&str> = events
            .iter()
            .filter_map(|event| event["type"].as_str())
            .collect();

        assert_eq!(
            types,
            vec![
                "RUN_STARTED",
                "STATE_SNAPSHOT",
                "TEXT_MESSAGE_START",
                "TEXT_MESSAGE_CONTENT",
                "TEXT_MESSAGE_END",
                "STATE_SNAPSHOT",
                "RUN_FINISHED",
            ]
        );
        assert_eq!(events[0]["threadId"], "t-1");
        assert_eq!(events[3]["delta"], "You said: hi there");

        let session = store
            .get_session("agui-bridge", "anonymous", &SessionId::from("t-1"))
            .await?
            .expect("session created under the thread id");
        assert!(session.state.contains_key("current_date"));
        assert_eq!(session.events.len(), 1);
        assert_eq!(session.events[0].author, "orchestrator");
        Ok(())
    }

    #[tokio::test]
    async fn run_uses_last_user_message_and_user_id() -> Result<()> {
        let (state, store) = state_with(Arc::new(EchoAgentRuntime));
        let response = router(state)
            .oneshot(post_json(&json!({
                "threadId": "t-2",
                "userId": "alice",
                "messages": [{ "role": "user", "content": { "text": "nested hello" } }]
            }))?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = String::from_utf8(bytes.to_vec())?;
        assert!(body.contains("You said: nested hello"));
        assert!(body.ends_with("\n\n"));

        let session = store
            .get_session("agui-bridge", "alice", &SessionId::from("t-2"))
            .await?;
        assert!(session.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn runtime_failure_before_streaming_is_500() -> Result<()> {
        let (state, _) = state_with(Arc::new(FailingRuntime));
        let response = router(state)
            .oneshot(post_json(&json!({ "prompt": "hi" }))?)
            .await?;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            read_json(response).await?,
            json!({ "error": "Internal Server Error" })
        );
        Ok(())
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() -> Result<()> {
        let (state, _) = state_with(Arc::new(EchoAgentRuntime));
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from("not json"))?;
        let response = router(state).oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[test]
    fn cli_defaults_build_session_config() {
        let cli = Cli::parse_from(["agui-api"]);
        let config = cli.session_config();
        assert_eq!(cli.listen.to_string(), "127.0.0.1:8000");
        assert_eq!(config.app_name, "agui-bridge");
        assert_eq!(config.agent_name, "orchestrator");
        assert!(cli.root.is_none());
    }

    #[test]
    fn cli_overrides_are_applied() {
        let cli = Cli::parse_from([
            "agui-api",
            "--app-name",
            "weather",
            "--default-user-id",
            "guest",
            "--agent-name",
            "planner",
            "--root",
            "/tmp/agui",
        ]);
        let config = cli.session_config();
        assert_eq!(config.app_name, "weather");
        assert_eq!(config.default_user_id, "guest");
        assert_eq!(config.agent_name, "planner");
        assert_eq!(cli.root.as_deref(), Some(std::path::Path::new("/tmp/agui")));
    }
}
