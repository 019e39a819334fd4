use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub role: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
}

/// Body of `POST /api/chat`. Earlier history is accepted but only the last
/// message is forwarded to the agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn latest_text(&self) -> &str {
        self.messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_text_uses_last_message_only() {
        let request: ChatRequest = serde_json::from_str(
            r#"{"messages":[{"role":"user","content":"first"},{"role":"assistant","content":"reply"},{"role":"user","content":"second"}]}"#,
        )
        .expect("request");
        assert_eq!(request.latest_text(), "second");
    }

    #[test]
    fn latest_text_is_empty_for_empty_history() {
        let request: ChatRequest = serde_json::from_str(r#"{"messages":[]}"#).expect("request");
        assert_eq!(request.latest_text(), "");
    }

    #[test]
    fn missing_or_null_content_reads_as_empty() {
        let request: ChatRequest =
            serde_json::from_str(r#"{"messages":[{"role":"user"},{"role":"user","content":null}]}"#)
                .expect("request");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.latest_text(), "");
        assert_eq!(request.messages[0].content, "");
    }

    #[test]
    fn body_without_messages_is_rejected() {
        assert!(serde_json::from_str::<ChatRequest>(r#"{"prompt":"hi"}"#).is_err());
    }
}
