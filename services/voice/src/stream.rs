//! Driving one voice turn through a session.

use crate::audio::AudioSource;
use nargis_core::{RealtimeSession, SessionEvent};
use nargis_realtime::Subscription;
use nargis_realtime_types::VoiceMode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info};

/// Announces the turn, streams every chunk of `source`, then marks the end of
/// speech. Returns the number of audio bytes sent.
///
/// Fails as soon as the connection stops accepting payloads; audio is never
/// buffered across a reconnect.
pub async fn stream_turn(
    session: &RealtimeSession,
    source: &mut dyn AudioSource,
    mode: VoiceMode,
) -> anyhow::Result<usize> {
    anyhow::ensure!(session.begin_turn(mode), "connection is {}", session.status());
    info!(%mode, "streaming voice turn");

    let mut sent = 0;
    while let Some(chunk) = source.next_chunk().await? {
        let len = chunk.len();
        anyhow::ensure!(
            session.send_audio(chunk),
            "connection went {} after {} bytes",
            session.status(),
            sent
        );
        sent += len;
    }

    anyhow::ensure!(session.end_of_speech(), "connection is {}", session.status());
    debug!(bytes = sent, "end of speech sent");
    Ok(sent)
}

/// Catches the end of the turn from the moment it is created.
///
/// Take one before [`stream_turn`]: the server may answer `EOS` before the
/// caller gets around to waiting.
pub struct TurnEnd {
    ended: Arc<Notify>,
    subscription: Subscription,
}

impl TurnEnd {
    pub fn watch(session: &RealtimeSession) -> Self {
        let ended = Arc::new(Notify::new());
        let subscription = {
            let ended = Arc::clone(&ended);
            session.on_event(move |event| {
                if matches!(event, SessionEvent::TurnEnded) {
                    // Stores a permit when nobody is waiting yet.
                    ended.notify_one();
                }
            })
        };
        Self { ended, subscription }
    }

    /// Waits for the turn to end. Returns `false` on timeout.
    pub async fn wait(self, timeout: Duration) -> bool {
        let finished = tokio::time::timeout(timeout, self.ended.notified())
            .await
            .is_ok();
        self.subscription.dispose();
        finished
    }
}
