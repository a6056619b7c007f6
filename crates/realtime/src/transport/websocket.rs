use super::{Transport, TransportEvents, TransportLink};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use nargis_realtime_types::Payload;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{Instrument, debug, info_span, trace, warn};

/// WebSocket transport over `tokio-tungstenite`.
///
/// Each attempt runs in its own task which owns the socket. Outbound payloads
/// reach it through an unbounded channel so `send` never blocks the caller.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, url: &str, events: TransportEvents) -> Box<dyn TransportLink> {
        let (outbound, rx) = mpsc::unbounded_channel();
        let span = info_span!("ws", generation = events.generation());
        tokio::spawn(run_socket(url.to_string(), events, rx).instrument(span));
        Box::new(WebSocketLink { outbound })
    }
}

enum Outbound {
    Frame(Payload),
    Close,
}

struct WebSocketLink {
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl TransportLink for WebSocketLink {
    fn send(&self, payload: Payload) {
        let _ = self.outbound.send(Outbound::Frame(payload));
    }

    fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

fn to_message(payload: Payload) -> Message {
    match payload {
        Payload::Text(text) => Message::Text(text),
        Payload::Binary(data) => Message::Binary(data.to_vec()),
    }
}

async fn run_socket(
    url: String,
    events: TransportEvents,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
) {
    // --- 1. Handshake, abandoned if the link is released first ---
    let connecting = connect_async(url.as_str());
    tokio::pin!(connecting);
    let handshake = loop {
        tokio::select! {
            result = &mut connecting => break result,
            command = rx.recv() => match command {
                Some(Outbound::Frame(_)) => trace!("dropping frame queued before open"),
                Some(Outbound::Close) | None => {
                    debug!("released before the handshake finished");
                    return;
                }
            },
        }
    };

    let stream = match handshake {
        Ok((stream, _response)) => stream,
        Err(e) => {
            warn!(error = %e, "WebSocket connect failed");
            events.error(e.to_string());
            events.closed(None, "connect failed");
            return;
        }
    };
    debug!("WebSocket connected");
    events.opened();

    // --- 2. Pump frames both ways until either side closes ---
    let (mut sink, mut source) = stream.split();
    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(Outbound::Frame(payload)) => {
                    if let Err(e) = sink.send(to_message(payload)).await {
                        warn!(error = %e, "WebSocket send failed");
                        events.error(e.to_string());
                        events.closed(None, "send failed");
                        return;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    let _ = sink.close().await;
                    debug!("WebSocket closed locally");
                    return;
                }
            },
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => events.message(Payload::Text(text)),
                Some(Ok(Message::Binary(data))) => events.message(Payload::Binary(Bytes::from(data))),
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (Some(u16::from(f.code)), f.reason.into_owned()))
                        .unwrap_or((None, String::new()));
                    debug!(?code, %reason, "WebSocket closed by peer");
                    events.closed(code, reason);
                    return;
                }
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket receive failed");
                    events.error(e.to_string());
                    events.closed(None, e.to_string());
                    return;
                }
                None => {
                    events.closed(None, "stream ended");
                    return;
                }
            },
        }
    }
}
