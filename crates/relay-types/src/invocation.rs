use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_AGENT_ALIAS_ID: &str = "TSTALIASID";

const SESSION_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Everything the remote agent needs for one turn. Lives for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInvocation {
    pub agent_id: String,
    pub agent_alias_id: String,
    pub session_id: String,
    pub input_text: String,
}

impl AgentInvocation {
    /// Builds an invocation with a fresh session id. A missing or blank alias
    /// falls back to [`DEFAULT_AGENT_ALIAS_ID`].
    pub fn new(
        agent_id: impl Into<String>,
        agent_alias_id: Option<&str>,
        input_text: impl Into<String>,
    ) -> Self {
        let agent_alias_id = agent_alias_id
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
            .unwrap_or(DEFAULT_AGENT_ALIAS_ID)
            .to_string();
        Self {
            agent_id: agent_id.into(),
            agent_alias_id,
            session_id: new_session_id(),
            input_text: input_text.into(),
        }
    }
}

/// `session-<unix millis>-<9 base36 chars>`. Unique in practice, not a secret.
pub fn new_session_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SESSION_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("session-{}-{}", Utc::now().timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn session_id_has_timestamp_and_base36_suffix() {
        let id = new_session_id();
        let parts = id.split('-').collect::<Vec<_>>();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "session");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), SESSION_SUFFIX_LEN);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn session_ids_do_not_collide_across_sequential_calls() {
        let ids = (0..10_000).map(|_| new_session_id()).collect::<HashSet<_>>();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn alias_defaults_when_missing_or_blank() {
        let unset = AgentInvocation::new("AGENT", None, "hi");
        assert_eq!(unset.agent_alias_id, DEFAULT_AGENT_ALIAS_ID);
        let blank = AgentInvocation::new("AGENT", Some("  "), "hi");
        assert_eq!(blank.agent_alias_id, DEFAULT_AGENT_ALIAS_ID);
        let set = AgentInvocation::new("AGENT", Some("PROD"), "hi");
        assert_eq!(set.agent_alias_id, "PROD");
    }

    #[test]
    fn each_invocation_gets_its_own_session() {
        let a = AgentInvocation::new("AGENT", None, "one");
        let b = AgentInvocation::new("AGENT", None, "two");
        assert_ne!(a.session_id, b.session_id);
    }
}
