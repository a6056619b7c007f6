//! In-memory transport for tests.
//!
//! Every `open` hands a [`FakeLink`] to the test, which then plays the server:
//! accept the connection, push payloads, or drop it.

use crate::transport::{Transport, TransportEvents, TransportLink};
use nargis_realtime_types::Payload;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

struct FakeInner {
    links_tx: mpsc::UnboundedSender<FakeLink>,
    links_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<FakeLink>>,
    opens: AtomicUsize,
}

#[derive(Clone)]
pub struct FakeTransport {
    inner: Arc<FakeInner>,
}

impl FakeTransport {
    pub fn new() -> Self {
        let (links_tx, links_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(FakeInner {
                links_tx,
                links_rx: tokio::sync::Mutex::new(links_rx),
                opens: AtomicUsize::new(0),
            }),
        }
    }

    /// Waits for the manager to open its next transport attempt.
    pub async fn next_link(&self) -> FakeLink {
        self.inner
            .links_rx
            .lock()
            .await
            .recv()
            .await
            .expect("fake transport keeps its own sender alive")
    }

    pub fn try_next_link(&self) -> Option<FakeLink> {
        self.inner.links_rx.try_lock().ok()?.try_recv().ok()
    }

    /// Total number of `open` calls so far.
    pub fn opens(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for FakeTransport {
    fn open(&self, url: &str, events: TransportEvents) -> Box<dyn TransportLink> {
        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        let link = FakeLink {
            url: url.to_string(),
            events,
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        };
        let handle = FakeLinkHandle {
            sent: Arc::clone(&link.sent),
            closed: Arc::clone(&link.closed),
        };
        let _ = self.inner.links_tx.send(link);
        Box::new(handle)
    }
}

/// Server-side view of one fake transport attempt.
#[derive(Clone)]
pub struct FakeLink {
    pub url: String,
    events: TransportEvents,
    sent: Arc<Mutex<Vec<Payload>>>,
    closed: Arc<AtomicBool>,
}

impl FakeLink {
    pub fn generation(&self) -> u64 {
        self.events.generation()
    }

    pub fn accept(&self) {
        self.events.opened();
    }

    pub fn deliver(&self, payload: impl Into<Payload>) {
        self.events.message(payload.into());
    }

    /// Error followed by close, the way a dropped socket reports.
    pub fn fail(&self, reason: &str) {
        self.events.error(reason);
        self.events.closed(Some(1006), reason);
    }

    pub fn close_from_server(&self, code: u16, reason: &str) {
        self.events.closed(Some(code), reason);
    }

    /// Payloads the manager sent on this attempt.
    pub fn sent(&self) -> Vec<Payload> {
        self.sent.lock().expect("sent lock").clone()
    }

    /// Whether the manager released this attempt.
    pub fn is_released(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct FakeLinkHandle {
    sent: Arc<Mutex<Vec<Payload>>>,
    closed: Arc<AtomicBool>,
}

impl TransportLink for FakeLinkHandle {
    fn send(&self, payload: Payload) {
        self.sent.lock().expect("sent lock").push(payload);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
