//! JSON shapes written to the browser: OpenAI-style completion chunks for the
//! SSE stream, the error body for failed requests, and the self-test report.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const CHUNK_OBJECT: &str = "chat.completion.chunk";
pub const CHUNK_MODEL: &str = "bedrock-agent";
pub const FINISH_REASON_STOP: &str = "stop";
/// Payload of the last SSE frame of a successful stream.
pub const DONE_SENTINEL: &str = "[DONE]";
pub const INVOKE_FAILED: &str = "Failed to invoke Bedrock Agent";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkEnvelope {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChunkEnvelope {
    pub fn content(text: impl Into<String>) -> Self {
        Self::at(
            Utc::now().timestamp_millis(),
            ChunkDelta {
                content: Some(text.into()),
            },
            None,
        )
    }

    /// Terminal envelope: empty delta, `finish_reason: "stop"`.
    pub fn stop() -> Self {
        Self::at(
            Utc::now().timestamp_millis(),
            ChunkDelta::default(),
            Some(FINISH_REASON_STOP.to_string()),
        )
    }

    fn at(now_ms: i64, delta: ChunkDelta, finish_reason: Option<String>) -> Self {
        Self {
            id: format!("chunk-{now_ms}"),
            object: CHUNK_OBJECT.to_string(),
            created: now_ms,
            model: CHUNK_MODEL.to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        }
    }

    pub fn content_text(&self) -> Option<&str> {
        self.choices.first()?.delta.content.as_deref()
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.choices.first()?.finish_reason.as_deref()
    }

    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Which pieces of configuration were present when a request failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFlags {
    pub has_agent_id: bool,
    pub has_credentials: bool,
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
    pub details: String,
    pub timestamp: String,
    pub config: ConfigFlags,
}

impl ErrorPayload {
    pub fn new(details: impl Into<String>, config: ConfigFlags) -> Self {
        Self {
            error: INVOKE_FAILED.to_string(),
            details: details.into(),
            timestamp: timestamp_now(),
            config,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfTestReport {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub config: ConfigFlags,
}

impl SelfTestReport {
    pub fn passed(
        session_id: String,
        elapsed_ms: u64,
        response_preview: String,
        config: ConfigFlags,
    ) -> Self {
        Self {
            success: true,
            message: "Bedrock agent responded".to_string(),
            timestamp: timestamp_now(),
            elapsed_ms: Some(elapsed_ms),
            session_id: Some(session_id),
            response_preview: Some(response_preview),
            details: None,
            config,
        }
    }

    pub fn failed(
        message: impl Into<String>,
        details: Option<String>,
        config: ConfigFlags,
    ) -> Self {
        Self {
            success: false,
            message: message.into(),
            timestamp: timestamp_now(),
            elapsed_ms: None,
            session_id: None,
            response_preview: None,
            details,
            config,
        }
    }
}

/// RFC 3339, UTC, millisecond precision (`2024-05-01T12:00:00.000Z`).
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
