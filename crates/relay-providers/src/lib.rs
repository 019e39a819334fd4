use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use relay_types::AgentInvocation;

mod bedrock;
mod config;

pub use bedrock::BedrockAgentRuntime;
pub use config::*;

/// One item of an agent's completion stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// A fragment of the agent's answer, raw UTF-8 bytes.
    Chunk(Vec<u8>),
    /// Anything else on the stream (traces, control events). Carries the kind for logging.
    Other(String),
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = anyhow::Result<AgentEvent>> + Send>>;

pub struct AgentResponse {
    /// `None` when the agent accepted the call but produced no stream at all.
    pub completion: Option<ChunkStream>,
}

impl AgentResponse {
    pub fn streaming(completion: ChunkStream) -> Self {
        Self {
            completion: Some(completion),
        }
    }

    pub fn without_completion() -> Self {
        Self { completion: None }
    }

    /// Drains the completion and concatenates every chunk as text.
    pub async fn collect_text(self) -> anyhow::Result<String> {
        let mut out = String::new();
        let Some(mut completion) = self.completion else {
            return Ok(out);
        };
        while let Some(event) = completion.next().await {
            if let AgentEvent::Chunk(bytes) = event? {
                out.push_str(&String::from_utf8_lossy(&bytes));
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeInfo {
    pub id: String,
    pub name: String,
    pub region: Option<String>,
}

#[async_trait]
pub trait AgentRuntime: Send + Sync {
    fn info(&self) -> RuntimeInfo;
    async fn invoke(&self, invocation: AgentInvocation) -> anyhow::Result<AgentResponse>;
}
