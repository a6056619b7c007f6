//! The connection manager: a cloneable handle plus one runtime task.
//!
//! The handle validates and forwards commands. The runtime task owns the
//! [`ConnState`], feeds every command, transport notification and timer tick
//! through [`transition`], and executes the resulting effects in order.


use crate::error::RealtimeError;
use crate::observers::{Observers, Subscription};
use crate::policy::ReconnectPolicy;
use crate::state_machine::{ConnState, Effect, Event, transition};
use crate::transport::{Transport, TransportEvent, TransportEvents, TransportLink};
use nargis_realtime_types::{ConnectionStatus, Payload};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, watch};
use tokio::time::Sleep;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

enum Command {
    Connect { url: String, max_retries: u32 },
    Send(Payload),
    Close,
}

struct Shared {
    closed: AtomicBool,
    status: watch::Sender<ConnectionStatus>,
    status_observers: Observers<ConnectionStatus>,
    message_observers: Observers<Payload>,
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Handle to one logical realtime connection.
///
/// Cheap to clone; all clones drive the same connection. Must be created
/// inside a tokio runtime.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
}

impl ConnectionManager {
    pub fn new<T: Transport>(transport: T, policy: ReconnectPolicy) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(ConnectionStatus::Idle);
        let shared = Arc::new(Shared {
            closed: AtomicBool::new(false),
            status,
            status_observers: Observers::new(),
            message_observers: Observers::new(),
        });

        let runtime = ConnectionRuntime {
            state: ConnState::default(),
            policy,
            transport: Box::new(transport),
            link: None,
            retry: None,
            shared: Arc::clone(&shared),
            command_rx,
            transport_tx,
            transport_rx,
        };
        tokio::spawn(runtime.run().instrument(info_span!("connection")));

        Self { shared, commands }
    }

    /// Starts connecting to `url`, allowing `max_retries` consecutive failed
    /// attempts before settling in `error`.
    ///
    /// A no-op while already connecting, open or retrying. From `idle` or
    /// `error` it starts over with a fresh retry budget, and `status()` reads
    /// `connecting` as soon as this returns. Observers are notified by the
    /// runtime once it picks the command up.
    pub fn connect(&self, url: impl Into<String>, max_retries: u32) -> Result<(), RealtimeError> {
        if self.shared.is_closed() {
            return Err(RealtimeError::Closed);
        }
        self.commands
            .send(Command::Connect {
                url: url.into(),
                max_retries,
            })
            .map_err(|_| RealtimeError::RuntimeStopped)?;

        // Only the runtime moves out of idle or error, and only on this
        // command, so the watch cannot race it here.
        self.shared.status.send_if_modified(|status| {
            let settled = matches!(status, ConnectionStatus::Idle | ConnectionStatus::Error);
            if settled {
                *status = ConnectionStatus::Connecting;
            }
            settled
        });
        Ok(())
    }

    /// Sends `payload` if the connection is open right now.
    ///
    /// Returns whether the payload was handed to the runtime. Payloads are
    /// never buffered across reconnects; a `false` here means it was dropped.
    pub fn send(&self, payload: impl Into<Payload>) -> bool {
        let status = self.status();
        if status != ConnectionStatus::Open {
            debug!(%status, "dropping outbound payload, connection not open");
            return false;
        }
        self.commands.send(Command::Send(payload.into())).is_ok()
    }

    /// Closes the connection for good.
    ///
    /// Takes effect immediately for callers: `status()` reports `closed`, later
    /// `connect` calls fail, and no reconnect is attempted afterwards. Safe to
    /// call repeatedly and from inside observer callbacks.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.commands.send(Command::Close);
    }

    pub fn status(&self) -> ConnectionStatus {
        if self.shared.is_closed() {
            ConnectionStatus::Closed
        } else {
            *self.shared.status.borrow()
        }
    }

    /// Status as a `watch` channel, for callers that prefer awaiting changes
    /// over callbacks.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    pub fn on_status<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ConnectionStatus) + Send + Sync + 'static,
    {
        self.shared.status_observers.subscribe(callback)
    }

    pub fn on_message<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        self.shared.message_observers.subscribe(callback)
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("status", &self.status())
            .finish()
    }
}

struct RetryTimer {
    generation: u64,
    sleep: Pin<Box<Sleep>>,
}

struct ConnectionRuntime {
    state: ConnState,
    policy: ReconnectPolicy,
    transport: Box<dyn Transport>,
    link: Option<Box<dyn TransportLink>>,
    retry: Option<RetryTimer>,
    shared: Arc<Shared>,
    command_rx: mpsc::UnboundedReceiver<Command>,
    transport_tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
    transport_rx: mpsc::UnboundedReceiver<(u64, TransportEvent)>,
}

impl ConnectionRuntime {
    async fn run(mut self) {
        debug!("connection runtime started");
        loop {
            // close() flips the flag before its command is queued; honour it
            // ahead of anything else that is already waiting.
            if self.shared.is_closed() {
                self.apply(Event::Close);
            }
            if self.state.is_closed() {
                break;
            }

            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("all handles dropped");
                        self.shared.closed.store(true, Ordering::SeqCst);
                    }
                },
                Some((generation, event)) = self.transport_rx.recv() => {
                    self.handle_transport(generation, event);
                }
                generation = retry_elapsed(&mut self.retry) => {
                    self.retry = None;
                    self.apply(Event::RetryElapsed { generation });
                }
            }
        }
        debug!("connection runtime stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { url, max_retries } => {
                info!(%url, max_retries, "connect requested");
                self.apply(Event::Connect { url, max_retries });
            }
            Command::Send(payload) => match (&self.link, self.state.status) {
                (Some(link), ConnectionStatus::Open) => link.send(payload),
                (_, status) => debug!(%status, "dropping outbound payload, connection no longer open"),
            },
            Command::Close => self.apply(Event::Close),
        }
    }

    fn handle_transport(&mut self, generation: u64, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.apply(Event::TransportOpened { generation }),
            TransportEvent::Message(payload) => {
                if self.shared.is_closed() {
                    return;
                }
                trace!(generation, len = payload.len(), "inbound payload");
                self.shared.message_observers.notify(&payload);
            }
            TransportEvent::Error(reason) => {
                warn!(generation, %reason, "transport error");
                self.apply(Event::TransportFailed { generation, reason });
            }
            TransportEvent::Closed { code, reason } => {
                info!(generation, ?code, %reason, "transport closed");
                self.apply(Event::TransportFailed { generation, reason });
            }
        }
    }

    fn apply(&mut self, event: Event) {
        let result = transition(&self.state, &self.policy, event);
        self.state = result.new_state;
        for effect in result.effects {
            self.execute(effect);
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::NotifyStatus(status) => {
                if status == ConnectionStatus::Error {
                    error!(
                        attempts = self.state.retry.attempt,
                        "reconnect attempts exhausted, giving up"
                    );
                } else {
                    info!(%status, "connection status changed");
                }
                self.shared.status.send_replace(status);
                self.shared.status_observers.notify(&status);
            }
            Effect::OpenTransport { url, generation } => {
                // An observer may have closed us while handling the status
                // change that preceded this effect.
                if self.shared.is_closed() {
                    debug!(generation, "skipping transport open, manager closed");
                    return;
                }
                debug!(generation, %url, "opening transport");
                let events = TransportEvents::new(generation, self.transport_tx.clone());
                self.link = Some(self.transport.open(&url, events));
            }
            Effect::ReleaseTransport => {
                if let Some(link) = self.link.take() {
                    link.close();
                }
            }
            Effect::ScheduleRetry {
                delay,
                generation,
                attempt,
            } => {
                if self.shared.is_closed() {
                    return;
                }
                let delay = self.policy.jittered(delay, rand::random::<f64>());
                warn!(
                    attempt,
                    max_retries = self.state.retry.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "connection lost, scheduling reconnect"
                );
                self.retry = Some(RetryTimer {
                    generation,
                    sleep: Box::pin(tokio::time::sleep(delay)),
                });
            }
            Effect::CancelRetry => self.retry = None,
        }
    }
}

async fn retry_elapsed(timer: &mut Option<RetryTimer>) -> u64 {
    match timer {
        Some(timer) => {
            timer.sleep.as_mut().await;
            timer.generation
        }
        None => std::future::pending().await,
    }
}
