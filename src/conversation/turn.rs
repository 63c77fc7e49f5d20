//! Conversation turn types.

use serde::{Deserialize, Serialize};
use strum::Display;

/// One entry of a conversation transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Turn {
    UserText { text: String },
    AssistantText { text: String },
    ToolInvocation(ToolInvocation),
    ToolOutcome(ToolOutcome),
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::UserText { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::AssistantText { text: text.into() }
    }

    pub fn invocation(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self::ToolInvocation(ToolInvocation {
            id: Some(id.into()),
            name: name.into(),
            arguments,
        })
    }

    pub fn outcome(id: impl Into<String>, payload: OutcomePayload) -> Self {
        Self::ToolOutcome(ToolOutcome {
            id: id.into(),
            payload,
        })
    }
}

/// A tool call requested by the model, addressed by qualified tool name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInvocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// The result paired with an earlier [`ToolInvocation`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolOutcome {
    pub id: String,
    pub payload: OutcomePayload,
}

/// What a dispatched tool call produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomePayload {
    Success {
        content: serde_json::Value,
    },
    Error {
        kind: ToolErrorKind,
        message: String,
    },
}

impl OutcomePayload {
    pub fn success(content: serde_json::Value) -> Self {
        Self::Success { content }
    }

    pub fn error(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn error_kind(&self) -> Option<ToolErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Error { kind, .. } => Some(*kind),
        }
    }

    /// Text handed back to the model as the tool result body.
    pub fn render_for_model(&self) -> String {
        match self {
            Self::Success {
                content: serde_json::Value::String(text),
            } => text.clone(),
            Self::Success { content } => content.to_string(),
            Self::Error { kind, message } => format!("[{kind}] {message}"),
        }
    }
}

/// Why a tool call produced an error outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolErrorKind {
    /// The qualified name did not resolve; no server was contacted.
    UnknownTool,
    /// The arguments could not be sent as a JSON object; no server was contacted.
    InvalidArguments,
    /// The tool ran (or the server answered) and reported a failure.
    ToolFailed,
    /// The session, network, or a timeout failed before a result came back.
    Transport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn turns_serialize_with_type_tag() {
        let turn = Turn::invocation("tool_1", "alpha_lookup", json!({"q": "x"}));
        let value = serde_json::to_value(&turn).unwrap();
        assert_eq!(value["type"], "tool_invocation");
        assert_eq!(value["name"], "alpha_lookup");

        let outcome = Turn::outcome(
            "tool_1",
            OutcomePayload::error(ToolErrorKind::Transport, "connection reset"),
        );
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["type"], "tool_outcome");
        assert_eq!(value["payload"]["status"], "error");
        assert_eq!(value["payload"]["kind"], "transport");
    }

    #[test]
    fn invocation_without_id_deserializes() {
        let turn: Turn = serde_json::from_value(json!({
            "type": "tool_invocation",
            "name": "alpha_lookup",
            "arguments": {}
        }))
        .unwrap();
        match turn {
            Turn::ToolInvocation(invocation) => assert!(invocation.id.is_none()),
            other => panic!("expected invocation, got {other:?}"),
        }
    }

    #[test]
    fn render_for_model_distinguishes_error_kinds() {
        assert_eq!(
            OutcomePayload::success(json!("go to the gym")).render_for_model(),
            "go to the gym"
        );
        assert_eq!(
            OutcomePayload::success(json!({"n": 1})).render_for_model(),
            r#"{"n":1}"#
        );
        assert_eq!(
            OutcomePayload::error(ToolErrorKind::ToolFailed, "bad category").render_for_model(),
            "[tool_failed] bad category"
        );
        assert_eq!(
            OutcomePayload::error(ToolErrorKind::UnknownTool, "nope").error_kind(),
            Some(ToolErrorKind::UnknownTool)
        );
    }
}
