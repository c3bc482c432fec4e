use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiMessage {
    pub role: String,
    pub content: String,
}

impl ApiMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// One newline-delimited JSON event from the agent stream.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "message-chunk", alias = "message_chunk")]
    MessageChunk(MessageChunk),
    #[serde(rename = "tool-result", alias = "tool_result")]
    ToolResult(ToolResultEvent),
    #[serde(rename = "interrupt")]
    Interrupt(InterruptDescriptor),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct MessageChunk {
    pub id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tool_call_chunks: Vec<ToolCallChunk>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCallChunk {
    pub index: usize,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub args: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ToolResultEvent {
    #[serde(default)]
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Server request to pause the turn until a human decides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InterruptDescriptor {
    pub id: String,
    pub tool_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalChoice {
    Approve,
    Reject,
}

impl ApprovalChoice {
    pub fn wire_value(self) -> &'static str {
        match self {
            ApprovalChoice::Approve => "1",
            ApprovalChoice::Reject => "2",
        }
    }
}

impl Serialize for ApprovalChoice {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.wire_value())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ApprovalRequest {
    pub interrupt_id: String,
    pub choice: ApprovalChoice,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_chunk_without_optional_fields_parses() {
        let event: StreamEvent =
            serde_json::from_str(r#"{"type":"message-chunk","id":"m1"}"#).unwrap();
        assert_eq!(
            event,
            StreamEvent::MessageChunk(MessageChunk {
                id: "m1".to_string(),
                content: None,
                tool_call_chunks: Vec::new(),
            })
        );
    }

    #[test]
    fn test_null_tool_call_chunks_are_empty() {
        let event: StreamEvent = serde_json::from_str(
            r#"{"type":"message-chunk","id":"m1","content":"hi","tool_call_chunks":null}"#,
        )
        .unwrap();
        let StreamEvent::MessageChunk(chunk) = event else {
            panic!("expected message chunk");
        };
        assert!(chunk.tool_call_chunks.is_empty());
        assert_eq!(chunk.content.as_deref(), Some("hi"));
    }

    #[test]
    fn test_unknown_event_type_is_tolerated() {
        let event: StreamEvent =
            serde_json::from_str(r#"{"type":"heartbeat","at":12}"#).unwrap();
        assert_eq!(event, StreamEvent::Unknown);
    }

    #[test]
    fn test_approval_request_uses_numeric_choice_strings() {
        let request = ApprovalRequest {
            interrupt_id: "int-1".to_string(),
            choice: ApprovalChoice::Reject,
            additional_data: None,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"interrupt_id": "int-1", "choice": "2"})
        );
    }
}
