use std::sync::Arc;

use relay_providers::{AgentRuntime, RelayConfig};
use relay_wire::ConfigFlags;

mod error;
mod http;

pub use error::{RelayError, StreamError};
pub use http::serve;

/// Shared by every request. Immutable after startup, so handlers never lock.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub runtime: Arc<dyn AgentRuntime>,
}

impl AppState {
    pub fn new(config: RelayConfig, runtime: Arc<dyn AgentRuntime>) -> Self {
        Self {
            config: Arc::new(config),
            runtime,
        }
    }

    pub fn config_flags(&self) -> ConfigFlags {
        ConfigFlags {
            has_agent_id: self.config.has_agent_id(),
            has_credentials: self.config.has_credentials(),
            region: self.config.region.clone(),
        }
    }
}
