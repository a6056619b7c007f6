//! Realtime Session Context
//!
//! Binds a [`ConnectionManager`] to the transcript a voice UI renders. Inbound
//! payloads are normalized with [`parse_frame`] and folded into a
//! [`SessionState`]; noteworthy changes are published as [`SessionEvent`]s.

use crate::accumulator::{accumulate, tool_line};
use bytes::Bytes;
use nargis_realtime::{ConnectionManager, Observers, RealtimeError, Subscription};
use nargis_realtime_types::{
    AgentEvent, ConnectionStatus, InboundFrame, Payload, TranscriptMessage, VoiceMode, parse_frame,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Placeholder progress line for a thought without content.
pub const THINKING: &str = "Thinking…";

/// Progress events kept for the turn in progress; the oldest go first.
pub const MAX_TURN_EVENTS: usize = 256;

// --- Errors ---

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("connection did not open within {0:?}")]
    OpenTimeout(Duration),
    #[error("connection ended up {0} instead of open")]
    Connection(ConnectionStatus),
    #[error(transparent)]
    Realtime(#[from] RealtimeError),
}

// --- Events ---

/// Something a consumer of the session may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The connection status changed.
    Status(ConnectionStatus),
    /// A message was appended to the transcript.
    MessageCommitted(TranscriptMessage),
    /// A tool run finished on the server; domain data it touched may be stale.
    ToolCompleted { tool: String, result: Option<String> },
    /// The turn was ended because it was cancelled upstream.
    TurnCancelled,
    /// The turn in progress ended.
    TurnEnded,
}

// --- State ---

/// Everything a UI needs to render the conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Finalized transcript, oldest first.
    pub messages: Vec<TranscriptMessage>,
    /// Thoughts of the turn in progress, as they stream in.
    pub live_thoughts: Vec<String>,
    /// Latest progress line of the turn in progress.
    pub current_agent_state: Option<String>,
    /// True from the first thought or tool of a turn until its `end`.
    pub processing: bool,
    /// Latest user speech, interim or final.
    pub transcribed_text: Option<String>,
    /// Text of the latest finalized assistant message.
    pub ai_response: Option<String>,
    turn: Vec<AgentEvent>,
    turn_resolved: bool,
}

impl SessionState {
    /// Applies one normalized frame and returns the events it produced.
    pub fn apply_frame(&mut self, frame: InboundFrame) -> Vec<SessionEvent> {
        match frame {
            InboundFrame::Events(events) => events
                .into_iter()
                .flat_map(|event| self.apply(event))
                .collect(),
            InboundFrame::InterimTranscript(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    self.transcribed_text = Some(text.to_string());
                }
                vec![]
            }
            InboundFrame::Ignored => {
                debug!("ignoring unrecognized frame");
                vec![]
            }
        }
    }

    /// Applies one agent event and returns the events it produced.
    pub fn apply(&mut self, event: AgentEvent) -> Vec<SessionEvent> {
        match event {
            AgentEvent::Transcript { content } => {
                let text = content.trim();
                if text.is_empty() {
                    return vec![];
                }
                self.transcribed_text = Some(text.to_string());
                let message = TranscriptMessage::user(text);
                self.messages.push(message.clone());
                vec![SessionEvent::MessageCommitted(message)]
            }
            AgentEvent::Thought { content } => {
                let line = match content.trim() {
                    "" => THINKING.to_string(),
                    text => text.to_string(),
                };
                self.progress(AgentEvent::Thought { content }, line);
                vec![]
            }
            AgentEvent::ToolUse { tool, input } => {
                let line = tool_line(&tool, input.as_deref());
                self.progress(AgentEvent::ToolUse { tool, input }, line);
                vec![]
            }
            AgentEvent::ToolResult { tool, result } => {
                info!(%tool, "tool completed");
                vec![SessionEvent::ToolCompleted { tool, result }]
            }
            AgentEvent::Response { .. } | AgentEvent::Error { .. } => self.resolve(event),
            AgentEvent::End { content } => self.end_turn(content.as_deref()),
            AgentEvent::Unknown => {
                debug!("ignoring agent event of unknown type");
                vec![]
            }
        }
    }

    fn progress(&mut self, event: AgentEvent, line: String) {
        if self.turn.len() >= MAX_TURN_EVENTS {
            debug!(cap = MAX_TURN_EVENTS, "turn event cap reached, dropping oldest");
            self.turn.remove(0);
        }
        self.turn.push(event);
        self.live_thoughts = accumulate(&self.turn).thoughts;
        self.current_agent_state = Some(line);
        self.processing = true;
    }

    fn resolve(&mut self, event: AgentEvent) -> Vec<SessionEvent> {
        if self.turn_resolved {
            warn!(kind = event.kind(), "turn already resolved, dropping late event");
            return vec![];
        }
        self.turn.push(event);
        let acc = accumulate(&self.turn);
        let Some(text) = acc.response.filter(|text| !text.trim().is_empty()) else {
            debug!("empty resolution, nothing to commit");
            return vec![];
        };

        self.turn_resolved = true;
        self.current_agent_state = None;
        self.ai_response = Some(text.clone());
        let message = TranscriptMessage::assistant(text, acc.thoughts);
        self.messages.push(message.clone());
        vec![SessionEvent::MessageCommitted(message)]
    }

    /// Forgets the turn in progress without ending it. Returns whether one was
    /// in progress.
    pub fn reset_turn(&mut self) -> bool {
        let in_progress = self.processing || !self.turn.is_empty();
        self.turn.clear();
        self.turn_resolved = false;
        self.live_thoughts.clear();
        self.current_agent_state = None;
        self.processing = false;
        in_progress
    }

    fn end_turn(&mut self, content: Option<&str>) -> Vec<SessionEvent> {
        self.reset_turn();

        let cancelled = content.is_some_and(|content| {
            let content = content.to_lowercase();
            content.contains("canceled") || content.contains("cancelled")
        });
        if cancelled {
            info!("turn cancelled upstream");
            vec![SessionEvent::TurnCancelled, SessionEvent::TurnEnded]
        } else {
            vec![SessionEvent::TurnEnded]
        }
    }
}

// --- Session ---

struct Inner {
    state: Mutex<SessionState>,
    events: Observers<SessionEvent>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `update` under the lock, then notifies outside of it so
    /// observers may read the session.
    fn update<F>(&self, update: F)
    where
        F: FnOnce(&mut SessionState) -> Vec<SessionEvent>,
    {
        let events = update(&mut self.state());
        for event in &events {
            self.events.notify(event);
        }
    }

    fn receive(&self, payload: &Payload) {
        let frame = parse_frame(payload);
        self.update(|state| state.apply_frame(frame));
    }

    /// A turn never outlives the connection it started on.
    fn connection_changed(&self, status: ConnectionStatus) {
        let leaves_turn = matches!(
            status,
            ConnectionStatus::Open
                | ConnectionStatus::Retrying
                | ConnectionStatus::Error
                | ConnectionStatus::Closed
        );
        if leaves_turn && self.state().reset_turn() {
            info!(%status, "connection changed mid-turn, dropping turn in progress");
        }
        self.events.notify(&SessionEvent::Status(status));
    }
}

/// A live conversation over one realtime connection.
pub struct RealtimeSession {
    manager: ConnectionManager,
    inner: Arc<Inner>,
    subscriptions: Vec<Subscription>,
}

impl RealtimeSession {
    pub fn new(manager: ConnectionManager) -> Self {
        let inner = Arc::new(Inner {
            state: Mutex::new(SessionState::default()),
            events: Observers::new(),
        });

        let on_message = {
            let inner = Arc::clone(&inner);
            manager.on_message(move |payload| inner.receive(payload))
        };
        let on_status = {
            let inner = Arc::clone(&inner);
            manager.on_status(move |status| inner.connection_changed(*status))
        };

        Self {
            manager,
            inner,
            subscriptions: vec![on_message, on_status],
        }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn connect(&self, url: impl Into<String>, max_retries: u32) -> Result<(), SessionError> {
        Ok(self.manager.connect(url, max_retries)?)
    }

    pub fn close(&self) {
        self.manager.close();
    }

    pub fn status(&self) -> ConnectionStatus {
        self.manager.status()
    }

    /// Resolves once the connection is open.
    ///
    /// Fails early if the connection settles in `error` or `closed` instead.
    pub async fn wait_until_open(&self, timeout: Duration) -> Result<(), SessionError> {
        if self.manager.status() == ConnectionStatus::Closed {
            return Err(SessionError::Connection(ConnectionStatus::Closed));
        }
        let mut status = self.manager.watch_status();
        let settled = tokio::time::timeout(
            timeout,
            status.wait_for(|s| {
                matches!(
                    s,
                    ConnectionStatus::Open | ConnectionStatus::Error | ConnectionStatus::Closed
                )
            }),
        )
        .await
        .map_err(|_| SessionError::OpenTimeout(timeout))?
        .map(|status| *status)
        .unwrap_or(ConnectionStatus::Closed);

        match (self.manager.status(), settled) {
            (ConnectionStatus::Closed, _) => Err(SessionError::Connection(ConnectionStatus::Closed)),
            (_, ConnectionStatus::Open) => Ok(()),
            (_, other) => Err(SessionError::Connection(other)),
        }
    }

    // --- Observation ---

    pub fn snapshot(&self) -> SessionState {
        self.inner.state().clone()
    }

    pub fn messages(&self) -> Vec<TranscriptMessage> {
        self.inner.state().messages.clone()
    }

    pub fn processing(&self) -> bool {
        self.inner.state().processing
    }

    pub fn on_event<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(callback)
    }

    // --- Injection ---

    /// Feeds `payload` through the same path as a message from the server.
    pub fn simulate_incoming(&self, payload: impl Into<Payload>) {
        self.inner.receive(&payload.into());
    }

    /// Applies an already-typed event, bypassing frame normalization.
    pub fn inject(&self, event: AgentEvent) {
        self.inner.update(|state| state.apply(event));
    }

    // --- Outbound ---

    pub fn send_audio(&self, chunk: impl Into<Bytes>) -> bool {
        self.manager.send(Payload::Binary(chunk.into()))
    }

    pub fn end_of_speech(&self) -> bool {
        self.manager.send(Payload::end_of_speech())
    }

    /// Asks the server to abandon the turn in progress.
    pub fn stop(&self) -> bool {
        self.manager.send(Payload::stop())
    }

    pub fn begin_turn(&self, mode: VoiceMode) -> bool {
        self.manager.send(Payload::mode(mode))
    }

    /// Records a message the user typed. Nothing is sent.
    pub fn send_user_message(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let message = TranscriptMessage::user(text);
        self.inner.update(|state| {
            state.messages.push(message.clone());
            vec![SessionEvent::MessageCommitted(message)]
        });
    }

    pub fn clear_messages(&self) {
        self.inner.state().messages.clear();
    }

    pub fn clear_ai_response(&self) {
        let mut state = self.inner.state();
        state.ai_response = None;
        state.transcribed_text = None;
    }
}

impl Drop for RealtimeSession {
    fn drop(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.dispose();
        }
    }
}

impl std::fmt::Debug for RealtimeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeSession")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(events: Vec<AgentEvent>) -> (SessionState, Vec<SessionEvent>) {
        let mut state = SessionState::default();
        let emitted = events.into_iter().flat_map(|e| state.apply(e)).collect();
        (state, emitted)
    }

    #[test]
    fn test_thoughts_stream_then_resolve() {
        let mut state = SessionState::default();
        state.apply(AgentEvent::thought("Starting chain…"));
        assert!(state.processing);
        assert_eq!(state.current_agent_state.as_deref(), Some("Starting chain…"));

        state.apply(AgentEvent::tool_use("search", Some("query")));
        assert_eq!(state.live_thoughts, vec!["Starting chain…", "Using search (query)…"]);
        assert_eq!(state.current_agent_state.as_deref(), Some("Using search (query)…"));

        let emitted = state.apply(AgentEvent::response("Here is the answer."));
        let [SessionEvent::MessageCommitted(message)] = emitted.as_slice() else {
            panic!("expected one committed message, got {emitted:?}");
        };
        assert_eq!(message.text, "Here is the answer.");
        assert_eq!(message.thoughts.len(), 2);
        assert!(state.processing, "still processing until end");

        state.apply(AgentEvent::end());
        assert!(!state.processing);
        assert!(state.live_thoughts.is_empty());
        assert_eq!(state.current_agent_state, None);
        assert_eq!(state.ai_response.as_deref(), Some("Here is the answer."));
    }

    #[test]
    fn test_error_resolves_turn() {
        let (state, _) = run(vec![AgentEvent::error("boom"), AgentEvent::end()]);
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].text, "Error: boom");
    }

    #[test]
    fn test_empty_thought_shows_placeholder() {
        let (state, _) = run(vec![AgentEvent::thought("  ")]);
        assert_eq!(state.current_agent_state.as_deref(), Some(THINKING));
        assert!(state.live_thoughts.is_empty());
        assert!(state.processing);
    }

    #[test]
    fn test_second_resolution_in_turn_is_dropped() {
        let (state, emitted) = run(vec![
            AgentEvent::response("first"),
            AgentEvent::response("second"),
            AgentEvent::end(),
            AgentEvent::response("next turn"),
        ]);
        let texts: Vec<_> = state.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "next turn"]);
        let committed = emitted
            .iter()
            .filter(|e| matches!(e, SessionEvent::MessageCommitted(_)))
            .count();
        assert_eq!(committed, 2);
    }

    #[test]
    fn test_cancelled_end() {
        let (_, emitted) = run(vec![AgentEvent::End {
            content: Some("Stream Canceled by user".into()),
        }]);
        assert_eq!(emitted, vec![SessionEvent::TurnCancelled, SessionEvent::TurnEnded]);
    }

    #[test]
    fn test_reset_turn_clears_progress_and_resolution() {
        let (mut state, _) = run(vec![AgentEvent::thought("working"), AgentEvent::response("half")]);
        assert!(state.reset_turn());
        assert!(!state.processing);
        assert!(state.live_thoughts.is_empty());
        assert_eq!(state.current_agent_state, None);
        assert!(!state.reset_turn(), "nothing left in progress");

        let emitted = state.apply(AgentEvent::response("fresh"));
        assert_eq!(emitted.len(), 1, "resolution after reset is committed");
        let texts: Vec<_> = state.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["half", "fresh"]);
    }

    #[test]
    fn test_turn_events_are_capped() {
        let mut state = SessionState::default();
        for step in 0..MAX_TURN_EVENTS + 10 {
            state.apply(AgentEvent::thought(format!("step {step}")));
        }
        assert_eq!(state.live_thoughts.len(), MAX_TURN_EVENTS);
        assert_eq!(state.live_thoughts[0], "step 10");
        assert_eq!(
            state.current_agent_state.as_deref(),
            Some(format!("step {}", MAX_TURN_EVENTS + 9).as_str())
        );
    }

    #[test]
    fn test_interim_then_final_transcript() {
        let mut state = SessionState::default();
        state.apply_frame(InboundFrame::InterimTranscript("add milk".into()));
        assert_eq!(state.transcribed_text.as_deref(), Some("add milk"));
        assert!(state.messages.is_empty());

        state.apply(AgentEvent::Transcript {
            content: "add milk to my list".into(),
        });
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.transcribed_text.as_deref(), Some("add milk to my list"));
    }

    #[test]
    fn test_ignored_frame_keeps_turn_state() {
        let mut state = SessionState::default();
        state.apply(AgentEvent::thought("working"));
        let before = state.clone();
        state.apply_frame(InboundFrame::Ignored);
        state.apply(AgentEvent::Unknown);
        assert_eq!(state, before);
    }
}
