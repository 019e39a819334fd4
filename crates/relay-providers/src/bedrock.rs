use async_stream::try_stream;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_bedrockagentruntime::config::{Credentials, Region};
use aws_sdk_bedrockagentruntime::error::DisplayErrorContext;
use aws_sdk_bedrockagentruntime::types::ResponseStream;
use aws_sdk_bedrockagentruntime::Client;

use relay_types::AgentInvocation;

use crate::{AgentEvent, AgentResponse, AgentRuntime, RelayConfig, RuntimeInfo};

/// Amazon Bedrock Agents over the `InvokeAgent` API.
pub struct BedrockAgentRuntime {
    client: Client,
    region: Option<String>,
}

impl BedrockAgentRuntime {
    /// Builds the SDK client from relay configuration. Static credentials from
    /// the config take precedence over the SDK's default provider chain.
    pub async fn from_config(config: &RelayConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = config.region.clone() {
            loader = loader.region(Region::new(region));
        }
        if let (Some(access_key_id), Some(secret_access_key)) = (
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
        ) {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "relay-config",
            ));
        }
        let sdk_config = loader.load().await;
        Self {
            client: Client::new(&sdk_config),
            region: config.region.clone(),
        }
    }
}

#[async_trait]
impl AgentRuntime for BedrockAgentRuntime {
    fn info(&self) -> RuntimeInfo {
        RuntimeInfo {
            id: "bedrock-agent".to_string(),
            name: "Amazon Bedrock Agents".to_string(),
            region: self.region.clone(),
        }
    }

    async fn invoke(&self, invocation: AgentInvocation) -> anyhow::Result<AgentResponse> {
        let session_id = invocation.session_id.clone();
        tracing::debug!(
            session_id = %session_id,
            agent_id = %invocation.agent_id,
            agent_alias_id = %invocation.agent_alias_id,
            "invoking bedrock agent"
        );
        let output = self
            .client
            .invoke_agent()
            .agent_id(invocation.agent_id)
            .agent_alias_id(invocation.agent_alias_id)
            .session_id(invocation.session_id)
            .input_text(invocation.input_text)
            .send()
            .await
            .map_err(|err| anyhow::anyhow!("{}", DisplayErrorContext(&err)))?;

        tracing::debug!(session_id = %session_id, "bedrock agent accepted invocation");

        let mut completion = output.completion;
        let stream = try_stream! {
            loop {
                let next = completion
                    .recv()
                    .await
                    .map_err(|err| anyhow::anyhow!("{}", DisplayErrorContext(&err)))?;
                let Some(event) = next else {
                    break;
                };
                yield match event {
                    ResponseStream::Chunk(part) => match part.bytes {
                        Some(blob) => AgentEvent::Chunk(blob.into_inner()),
                        None => AgentEvent::Other("chunk_without_bytes".to_string()),
                    },
                    other => AgentEvent::Other(event_kind(&other).to_string()),
                };
            }
        };
        Ok(AgentResponse::streaming(Box::pin(stream)))
    }
}

fn event_kind(event: &ResponseStream) -> &'static str {
    match event {
        ResponseStream::Chunk(_) => "chunk",
        ResponseStream::Trace(_) => "trace",
        ResponseStream::ReturnControl(_) => "return_control",
        _ => "unknown",
    }
}
