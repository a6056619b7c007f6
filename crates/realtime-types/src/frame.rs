//! Normalization of inbound frames into [`AgentEvent`]s.
//!
//! Servers in the wild send two JSON shapes: a flat typed event
//! (`{ type, content?, tool?, input? }`) and a legacy envelope carrying the
//! user transcript next to a chat-completion style result
//! (`{ transcript, llm: { choices: [{ message: { content } }] } }`). Both are
//! turned into the same event sequence here so the session layer only ever
//! sees [`AgentEvent`]. Nothing in this module fails: shapes that cannot be
//! understood become [`InboundFrame::Ignored`].

use crate::{AgentEvent, Payload};
use serde::Deserialize;
use serde_json::{Map, Value};

/// An inbound frame after shape interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// One or more agent events, in wire order.
    Events(Vec<AgentEvent>),
    /// Plain text from the server: a partial transcript of the user's speech.
    InterimTranscript(String),
    /// Unparseable or unrecognized frame.
    Ignored,
}

#[derive(Deserialize)]
struct Completion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Value,
}

/// Interprets a raw payload.
pub fn parse_frame(payload: &Payload) -> InboundFrame {
    match payload {
        Payload::Text(text) => match serde_json::from_str::<Value>(text) {
            Ok(value) => normalize(value),
            Err(_) => InboundFrame::InterimTranscript(text.clone()),
        },
        Payload::Binary(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| serde_json::from_str::<Value>(text).ok())
            .map_or(InboundFrame::Ignored, normalize),
    }
}

fn normalize(value: Value) -> InboundFrame {
    match value {
        Value::String(text) => InboundFrame::InterimTranscript(text),
        Value::Object(map) if map.contains_key("type") => {
            match serde_json::from_value::<AgentEvent>(Value::Object(map)) {
                Ok(event) => InboundFrame::Events(vec![event]),
                Err(_) => InboundFrame::Ignored,
            }
        }
        Value::Object(map) => normalize_legacy(&map),
        _ => InboundFrame::Ignored,
    }
}

fn normalize_legacy(map: &Map<String, Value>) -> InboundFrame {
    if let (Some(Value::String(transcript)), Some(llm)) = (map.get("transcript"), map.get("llm")) {
        let mut events = vec![AgentEvent::Transcript {
            content: transcript.clone(),
        }];
        if let Some(text) = assistant_text(llm) {
            events.push(AgentEvent::response(text));
        }
        events.push(AgentEvent::end());
        return InboundFrame::Events(events);
    }

    if map.get("choices").is_some_and(Value::is_array) {
        if let Some(text) = completion_text(map) {
            return InboundFrame::Events(vec![AgentEvent::response(text), AgentEvent::end()]);
        }
    }

    let failure = map
        .get("detail")
        .and_then(render)
        .or_else(|| map.get("error").and_then(render));
    match failure {
        Some(message) => InboundFrame::Events(vec![AgentEvent::error(message), AgentEvent::end()]),
        None => InboundFrame::Ignored,
    }
}

/// Text of the assistant reply inside a legacy `llm` value.
fn assistant_text(llm: &Value) -> Option<String> {
    match llm {
        Value::String(text) => non_blank(text.clone()),
        Value::Object(map) => completion_text(map).or_else(|| {
            ["reply", "output", "text"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .and_then(|text| non_blank(text.to_string()))
        }),
        _ => None,
    }
}

fn completion_text(map: &Map<String, Value>) -> Option<String> {
    let completion: Completion = serde_json::from_value(Value::Object(map.clone())).ok()?;
    let content = completion.choices.into_iter().next()?.message?.content;
    render(&content)
}

/// Renders a JSON value as transcript text. Strings are taken verbatim,
/// anything structured is kept as compact JSON.
fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(text) => non_blank(text.clone()),
        other => Some(other.to_string()),
    }
}

fn non_blank(text: String) -> Option<String> {
    if text.trim().is_empty() { None } else { Some(text) }
}
