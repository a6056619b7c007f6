//! Transport abstraction.
//!
//! A transport carries one connection attempt. It reports progress through
//! the [`TransportEvents`] it was opened with and never decides whether to
//! reconnect; that belongs to the connection manager.

mod websocket;

pub use websocket::WebSocketTransport;

use nargis_realtime_types::Payload;
use tokio::sync::mpsc;

/// Notification from a transport attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(Payload),
    Error(String),
    Closed { code: Option<u16>, reason: String },
}

/// Sink a transport reports into. Every event is tagged with the generation
/// of the attempt it belongs to.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
}

impl TransportEvents {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<(u64, TransportEvent)>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn opened(&self) {
        self.emit(TransportEvent::Opened);
    }

    pub fn message(&self, payload: Payload) {
        self.emit(TransportEvent::Message(payload));
    }

    pub fn error(&self, reason: impl Into<String>) {
        self.emit(TransportEvent::Error(reason.into()));
    }

    pub fn closed(&self, code: Option<u16>, reason: impl Into<String>) {
        self.emit(TransportEvent::Closed {
            code,
            reason: reason.into(),
        });
    }

    fn emit(&self, event: TransportEvent) {
        // The receiver only goes away once the manager has shut down.
        let _ = self.tx.send((self.generation, event));
    }
}

/// Opens transport attempts.
pub trait Transport: Send + Sync + 'static {
    fn open(&self, url: &str, events: TransportEvents) -> Box<dyn TransportLink>;
}

/// The outbound half of an open attempt.
pub trait TransportLink: Send {
    fn send(&self, payload: Payload);

    /// Starts an orderly close. No further events are expected to matter
    /// after this; the manager has already moved on to another generation.
    fn close(&self);
}
