//! Agent Event Accumulator
//!
//! Folds the events of one turn into the thoughts shown while the agent works
//! and the text that resolves the turn. Pure and synchronous: the same events
//! always produce the same [`Accumulated`].

use nargis_realtime_types::AgentEvent;

/// Outcome of folding a turn's events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Accumulated {
    /// Thought lines and synthesized tool lines, in arrival order.
    pub thoughts: Vec<String>,
    /// Text of the latest `response`, or `"Error: …"` for a latest `error`.
    pub response: Option<String>,
}

/// Progress line for a tool invocation.
pub fn tool_line(tool: &str, input: Option<&str>) -> String {
    match input.map(str::trim).filter(|input| !input.is_empty()) {
        Some(input) => format!("Using {tool} ({input})…"),
        None => format!("Using {tool}…"),
    }
}

pub fn accumulate(events: &[AgentEvent]) -> Accumulated {
    let mut acc = Accumulated::default();
    for event in events {
        match event {
            AgentEvent::Thought { content } => {
                let thought = content.trim();
                if !thought.is_empty() {
                    acc.thoughts.push(thought.to_string());
                }
            }
            AgentEvent::ToolUse { tool, input } => {
                acc.thoughts.push(tool_line(tool, input.as_deref()));
            }
            AgentEvent::Response { content } => acc.response = Some(content.clone()),
            AgentEvent::Error { content } => acc.response = Some(format!("Error: {content}")),
            // Turn boundaries and user/tool bookkeeping belong to the session.
            AgentEvent::End { .. }
            | AgentEvent::Transcript { .. }
            | AgentEvent::ToolResult { .. }
            | AgentEvent::Unknown => {}
        }
    }
    acc
}
