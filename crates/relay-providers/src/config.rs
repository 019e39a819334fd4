//! Process configuration for the relay.
//!
//! Built once at startup, usually with [`RelayConfig::from_env`], and handed
//! to the server explicitly. Request handling never reads the environment.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(30);

#[derive(Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub agent_id: Option<String>,
    /// Falls back to `TSTALIASID` at invocation time when unset.
    pub agent_alias_id: Option<String>,
    /// Ceiling on the whole request, invocation and streaming included.
    pub max_duration: Duration,
}

/// Why a request cannot reach the agent. Checked before any network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigIssue {
    #[error("BEDROCK_AGENT_ID environment variable is required")]
    MissingAgentId,
    #[error("AWS credentials are required")]
    MissingCredentials,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            region: None,
            access_key_id: None,
            secret_access_key: None,
            agent_id: None,
            agent_alias_id: None,
            max_duration: DEFAULT_MAX_DURATION,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let max_duration = match read("RELAY_MAX_DURATION_SECS") {
            Some(raw) => parse_duration_secs(&raw)?,
            None => DEFAULT_MAX_DURATION,
        };
        Ok(Self {
            region: read("AWS_REGION"),
            access_key_id: read("AWS_ACCESS_KEY_ID"),
            secret_access_key: read("AWS_SECRET_ACCESS_KEY"),
            agent_id: read("BEDROCK_AGENT_ID"),
            agent_alias_id: read("BEDROCK_AGENT_ALIAS_ID"),
            max_duration,
        })
    }

    pub fn has_agent_id(&self) -> bool {
        is_set(&self.agent_id)
    }

    pub fn has_credentials(&self) -> bool {
        is_set(&self.access_key_id) && is_set(&self.secret_access_key)
    }

    /// Returns the agent id when everything needed for an invocation is present.
    pub fn validate(&self) -> Result<&str, ConfigIssue> {
        let agent_id = self
            .agent_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ConfigIssue::MissingAgentId)?;
        if !self.has_credentials() {
            return Err(ConfigIssue::MissingCredentials);
        }
        Ok(agent_id)
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("agent_id", &self.agent_id)
            .field("agent_alias_id", &self.agent_alias_id)
            .field("max_duration", &self.max_duration)
            .finish()
    }
}

pub fn parse_duration_secs(raw: &str) -> anyhow::Result<Duration> {
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid duration `{}`: expected whole seconds", raw))?;
    if secs == 0 {
        anyhow::bail!("max duration must be at least one second");
    }
    Ok(Duration::from_secs(secs))
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}
