use std::net::SocketAddr;
use std::time::Duration;

use async_stream::try_stream;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{self, HeaderValue};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use tokio::time::{timeout_at, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;

use relay_observability::{emit_event, redact_text, ObservabilityEvent, ProcessKind};
use relay_providers::{AgentEvent, AgentRuntime, ChunkStream};
use relay_types::{AgentInvocation, ChatRequest};
use relay_wire::{ChunkEnvelope, SelfTestReport, DONE_SENTINEL};

use crate::{AppState, RelayError, StreamError};

const FALLBACK_TEXT: &str = "I received your message but couldn't generate a response.";
const SELF_TEST_PROMPT: &str = "Hello";
const PREVIEW_CHARS: usize = 200;

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = app_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("agent relay listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_err() {
                futures::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}

fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/test-bedrock", get(self_test))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn chat(State(state): State<AppState>, body: Bytes) -> Response {
    match start_chat_stream(&state, &body).await {
        Ok(response) => response,
        Err(err) => {
            let detail = err.to_string();
            emit_event(
                Level::ERROR,
                ProcessKind::Server,
                ObservabilityEvent {
                    event: "chat.request.failed",
                    component: "server.chat",
                    status: Some("failed"),
                    error_code: Some(err.error_code()),
                    detail: Some(&detail),
                    ..Default::default()
                },
            );
            err.into_response_with(state.config_flags())
        }
    }
}

async fn start_chat_stream(state: &AppState, body: &[u8]) -> Result<Response, RelayError> {
    let request = parse_chat_request(body)?;
    let input_text = request.latest_text().to_string();
    tracing::debug!(
        messages = request.messages.len(),
        input = %redact_text(&input_text),
        "chat request received"
    );

    let agent_id = state.config.validate()?;
    let invocation = AgentInvocation::new(
        agent_id,
        state.config.agent_alias_id.as_deref(),
        input_text,
    );
    let session_id = invocation.session_id.clone();
    let max_duration = state.config.max_duration;
    let deadline = Instant::now() + max_duration;

    emit_event(
        Level::INFO,
        ProcessKind::Server,
        ObservabilityEvent {
            event: "agent.invoke.started",
            component: "server.chat",
            session_id: Some(&session_id),
            agent_id: Some(&invocation.agent_id),
            status: Some("running"),
            detail: Some(&format!("alias={}", invocation.agent_alias_id)),
            ..Default::default()
        },
    );

    let response = match timeout_at(deadline, state.runtime.invoke(invocation)).await {
        Ok(result) => result.map_err(RelayError::upstream)?,
        Err(_) => {
            return Err(RelayError::Upstream(format!(
                "agent invocation timed out after {}s",
                max_duration.as_secs()
            )))
        }
    };

    let events = relay_stream(response.completion, deadline, max_duration, session_id)
        .map(|frame| frame.map(|data| Event::default().data(data)));
    Ok((
        [(header::CONNECTION, HeaderValue::from_static("keep-alive"))],
        Sse::new(events),
    )
        .into_response())
}

/// Only a JSON object carrying `messages` is accepted. serde would otherwise
/// read a struct from a positional array.
fn parse_chat_request(body: &[u8]) -> Result<ChatRequest, RelayError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| RelayError::MalformedRequest(err.to_string()))?;
    if !value.is_object() {
        return Err(RelayError::MalformedRequest(
            "expected a JSON object with a `messages` array".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(|err| RelayError::MalformedRequest(err.to_string()))
}

/// Reframes the agent's completion as SSE payloads: one content envelope per
/// chunk in upstream order, then the stop envelope and `[DONE]`. Upstream
/// failures and the request deadline end the stream with an error instead.
fn relay_stream(
    completion: Option<ChunkStream>,
    deadline: Instant,
    max_duration: Duration,
    session_id: String,
) -> impl Stream<Item = Result<String, StreamError>> + Send + 'static {
    try_stream! {
        let mut full_response = String::new();
        let mut chunk_count = 0usize;

        match completion {
            Some(mut chunks) => loop {
                let next = timeout_at(deadline, chunks.next()).await.map_err(|_| {
                    stream_failure(&session_id, StreamError::DeadlineExceeded(max_duration))
                })?;
                let Some(event) = next else {
                    break;
                };
                let event = event.map_err(|err| {
                    stream_failure(&session_id, StreamError::Upstream(format!("{err:#}")))
                })?;
                match event {
                    AgentEvent::Chunk(bytes) => {
                        let text = String::from_utf8_lossy(&bytes).into_owned();
                        full_response.push_str(&text);
                        chunk_count += 1;
                        yield ChunkEnvelope::content(text).to_sse_data();
                    }
                    AgentEvent::Other(kind) => {
                        tracing::trace!(session_id = %session_id, kind = %kind, "skipping agent event");
                    }
                }
            },
            None => {
                // TODO: confirm with product whether a missing completion should fail the request.
                emit_event(
                    Level::WARN,
                    ProcessKind::Server,
                    ObservabilityEvent {
                        event: "chat.stream.fallback",
                        component: "server.chat",
                        session_id: Some(&session_id),
                        status: Some("degraded"),
                        error_code: Some("NO_COMPLETION"),
                        detail: Some("agent response had no completion stream"),
                        ..Default::default()
                    },
                );
                yield ChunkEnvelope::content(FALLBACK_TEXT).to_sse_data();
            }
        }

        emit_event(
            Level::INFO,
            ProcessKind::Server,
            ObservabilityEvent {
                event: "chat.stream.completed",
                component: "server.chat",
                session_id: Some(&session_id),
                status: Some("ok"),
                detail: Some(&format!(
                    "chunks={} response={}",
                    chunk_count,
                    redact_text(&full_response)
                )),
                ..Default::default()
            },
        );
        yield ChunkEnvelope::stop().to_sse_data();
        yield DONE_SENTINEL.to_string();
    }
}

fn stream_failure(session_id: &str, err: StreamError) -> StreamError {
    let detail = err.to_string();
    emit_event(
        Level::ERROR,
        ProcessKind::Server,
        ObservabilityEvent {
            event: "chat.stream.failed",
            component: "server.chat",
            session_id: Some(session_id),
            status: Some("aborted"),
            error_code: Some(err.error_code()),
            detail: Some(&detail),
            ..Default::default()
        },
    );
    err
}

async fn self_test(State(state): State<AppState>) -> Json<SelfTestReport> {
    let config = state.config_flags();
    let agent_id = match state.config.validate() {
        Ok(agent_id) => agent_id.to_string(),
        Err(issue) => return Json(SelfTestReport::failed(issue.to_string(), None, config)),
    };

    let invocation = AgentInvocation::new(
        agent_id,
        state.config.agent_alias_id.as_deref(),
        SELF_TEST_PROMPT,
    );
    let session_id = invocation.session_id.clone();
    let max_duration = state.config.max_duration;
    let started = Instant::now();
    let probe = probe_agent(state.runtime.as_ref(), invocation);

    let report = match tokio::time::timeout(max_duration, probe).await {
        Ok(Ok(text)) => SelfTestReport::passed(
            session_id.clone(),
            started.elapsed().as_millis() as u64,
            text.chars().take(PREVIEW_CHARS).collect(),
            config,
        ),
        Ok(Err(err)) => {
            SelfTestReport::failed("Agent invocation failed", Some(format!("{err:#}")), config)
        }
        Err(_) => SelfTestReport::failed(
            "Agent invocation timed out",
            Some(format!("no response within {}s", max_duration.as_secs())),
            config,
        ),
    };

    emit_event(
        if report.success {
            Level::INFO
        } else {
            Level::WARN
        },
        ProcessKind::Server,
        ObservabilityEvent {
            event: "self_test.completed",
            component: "server.self_test",
            session_id: Some(&session_id),
            status: Some(if report.success { "ok" } else { "failed" }),
            detail: Some(&report.message),
            ..Default::default()
        },
    );
    Json(report)
}

async fn probe_agent(
    runtime: &dyn AgentRuntime,
    invocation: AgentInvocation,
) -> anyhow::Result<String> {
    runtime.invoke(invocation).await?.collect_text().await
}
