//! Typed events produced by the agent during a turn.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One event of an agent turn. Ordering within a turn is significant.
///
/// A turn is the run of events between two `End` markers. At most one
/// `Response` or `Error` is expected per turn and it is the last
/// content-bearing event before `End`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Final transcript of what the user said.
    Transcript { content: String },
    /// A non-final reasoning fragment.
    Thought { content: String },
    /// The agent is invoking a tool, optionally with a short description.
    ToolUse {
        tool: String,
        #[serde(
            default,
            deserialize_with = "lenient_text",
            skip_serializing_if = "Option::is_none"
        )]
        input: Option<String>,
    },
    /// A tool finished. Older servers send `output` instead of `result`.
    ToolResult {
        tool: String,
        #[serde(
            default,
            alias = "output",
            deserialize_with = "lenient_text",
            skip_serializing_if = "Option::is_none"
        )]
        result: Option<String>,
    },
    /// The finalized assistant utterance for this turn.
    Response { content: String },
    /// Unrecoverable failure for this turn.
    Error { content: String },
    /// Turn boundary. Carries no transcript content.
    End {
        #[serde(
            default,
            deserialize_with = "lenient_text",
            skip_serializing_if = "Option::is_none"
        )]
        content: Option<String>,
    },
    /// Any `type` this client does not understand.
    #[serde(other)]
    Unknown,
}

impl AgentEvent {
    pub fn thought(content: impl Into<String>) -> Self {
        AgentEvent::Thought {
            content: content.into(),
        }
    }

    pub fn tool_use(tool: impl Into<String>, input: Option<&str>) -> Self {
        AgentEvent::ToolUse {
            tool: tool.into(),
            input: input.map(str::to_string),
        }
    }

    pub fn response(content: impl Into<String>) -> Self {
        AgentEvent::Response {
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        AgentEvent::Error {
            content: content.into(),
        }
    }

    pub fn end() -> Self {
        AgentEvent::End { content: None }
    }

    /// Wire name of the event type.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::Transcript { .. } => "transcript",
            AgentEvent::Thought { .. } => "thought",
            AgentEvent::ToolUse { .. } => "tool_use",
            AgentEvent::ToolResult { .. } => "tool_result",
            AgentEvent::Response { .. } => "response",
            AgentEvent::Error { .. } => "error",
            AgentEvent::End { .. } => "end",
            AgentEvent::Unknown => "unknown",
        }
    }

    /// `Response` and `Error` resolve the assistant message of a turn.
    pub fn resolves_turn(&self) -> bool {
        matches!(self, AgentEvent::Response { .. } | AgentEvent::Error { .. })
    }
}

/// Accepts a string, `null`, or a missing field. Any other JSON value is
/// treated as absent rather than failing the whole event.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => Some(text),
        _ => None,
    })
}
