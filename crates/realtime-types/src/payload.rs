use bytes::Bytes;
use std::fmt;

/// Text sentinel marking the end of the user's speech.
pub const END_OF_SPEECH: &str = "EOS";
/// Text sentinel asking the server to cancel the turn in progress.
pub const STOP: &str = "STOP";

/// A single message carried by the transport, in either direction.
///
/// The connection manager never frames, chunks or inspects payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Bytes),
}

impl Payload {
    pub fn end_of_speech() -> Self {
        Payload::Text(END_OF_SPEECH.to_string())
    }

    pub fn stop() -> Self {
        Payload::Text(STOP.to_string())
    }

    /// The `MODE:<mode>` control message announcing how the next turn runs.
    pub fn mode(mode: VoiceMode) -> Self {
        Payload::Text(format!("MODE:{}", mode))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Binary(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Payload::Text(text) => text.len(),
            Payload::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Binary(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Binary(Bytes::from(bytes))
    }
}

/// How the server should treat the next voice turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VoiceMode {
    /// Ephemeral conversation, no side effects.
    #[default]
    Chat,
    /// The agent may execute tools against the user's data.
    Agent,
}

impl fmt::Display for VoiceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceMode::Chat => f.write_str("chat"),
            VoiceMode::Agent => f.write_str("agent"),
        }
    }
}
