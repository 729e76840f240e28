//! # Connection Client
//!
//! Owns the single long-lived channel to the validation service.
//!
//! ```text
//! Idle ─open()─▶ Connecting ──▶ Open ──(drop)──▶ Closed ─▶ ReconnectWait ─┐
//!                    ▲  │                                                  │
//!                    │  └─(failed/timed out)─▶ Closed ─▶ ReconnectWait ────┤
//!                    └──────────────────(fixed delay)──────────────────────┘
//!
//! any state ─close()─▶ (Closing) ─▶ Disposed
//! ```
//!
//! A background driver task owns the raw channel; this handle only talks to
//! it through a command queue. Frames are sent only while `Open` and carry
//! the epoch of the connection they were issued on, so nothing queued before
//! a drop is replayed after a reconnect. The caller re-sends current text on
//! the next edit instead.

use crate::session::{PendingRequest, RequestKind};
use crate::transport::{Channel, Connector};
use crate::util::lock;
use crate::{Revision, TransportError};
use bbdsl_live_protocol::ServerMessage;
use futures_util::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
    ReconnectWait,
    Disposed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
            ConnectionState::ReconnectWait => "reconnect-wait",
            ConnectionState::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,

    /// Number of connections opened so far; identifies the current one
    pub epoch: u64,
}

/// Inbound frame tagged with the edit it answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundReport {
    pub revision: Revision,
    pub message: ServerMessage,
}

type MessageHandler = Arc<dyn Fn(InboundReport) + Send + Sync>;

enum Command {
    Send {
        epoch: u64,
        revision: Revision,
        text: Arc<str>,
    },
    Shutdown,
}

/// Default bound for one connect attempt
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ConnectionClient {
    connector: Arc<dyn Connector>,
    reconnect_delay: Duration,
    connect_timeout: Duration,
    status: Arc<watch::Sender<ConnectionStatus>>,
    handler: Arc<Mutex<Option<MessageHandler>>>,
    commands: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    runtime: Handle,
}

impl ConnectionClient {
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(connector: Arc<dyn Connector>, reconnect_delay: Duration) -> Self {
        let (status, _) = watch::channel(ConnectionStatus {
            state: ConnectionState::Idle,
            epoch: 0,
        });

        Self {
            connector,
            reconnect_delay,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            status: Arc::new(status),
            handler: Arc::new(Mutex::new(None)),
            commands: Mutex::new(None),
            runtime: Handle::current(),
        }
    }

    /// Give up on a connect attempt that has not completed within `timeout`
    /// and treat it as failed
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Register the single consumer of inbound reports, replacing any
    /// previous one. Malformed frames never reach it.
    pub fn on_message(&self, handler: impl Fn(InboundReport) + Send + Sync + 'static) {
        *lock(&self.handler) = Some(Arc::new(handler));
    }

    /// Start connecting. A no-op unless the client is still `Idle`.
    pub fn open(&self) {
        let mut commands = lock(&self.commands);
        if commands.is_some() || self.state() != ConnectionState::Idle {
            return;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *commands = Some(tx);
        self.status.send_replace(ConnectionStatus {
            state: ConnectionState::Connecting,
            epoch: 0,
        });

        let driver = Driver {
            connector: Arc::clone(&self.connector),
            reconnect_delay: self.reconnect_delay,
            connect_timeout: self.connect_timeout,
            status: Arc::clone(&self.status),
            handler: Arc::clone(&self.handler),
            commands: rx,
            epoch: 0,
            pending: VecDeque::new(),
            last_resolved: None,
        };
        self.runtime.spawn(driver.run());
    }

    /// Transmit `text` if the channel is open; otherwise drop it.
    ///
    /// Never fails and never queues for later replay. Returns whether the
    /// frame was handed to the open connection.
    pub fn send(&self, revision: Revision, text: Arc<str>) -> bool {
        let status = *self.status.borrow();
        if status.state != ConnectionState::Open {
            debug!(%revision, state = %status.state, "Validation channel not open, dropping frame");
            return false;
        }

        let commands = lock(&self.commands);
        match commands.as_ref() {
            Some(tx) => tx
                .send(Command::Send {
                    epoch: status.epoch,
                    revision,
                    text,
                })
                .is_ok(),
            None => false,
        }
    }

    /// Tear the connection down for good.
    ///
    /// Once a driver is running it alone publishes `Closing` and `Disposed`;
    /// repeated calls are no-ops.
    pub fn close(&self) {
        match lock(&self.commands).take() {
            // Dropping the sender also stops the driver if the send fails
            Some(tx) => {
                let _ = tx.send(Command::Shutdown);
            }
            None => {
                // Only a client that never opened is disposed here
                self.status.send_if_modified(|status| {
                    if status.state != ConnectionState::Idle {
                        return false;
                    }
                    status.state = ConnectionState::Disposed;
                    true
                });
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }
}

impl Drop for ConnectionClient {
    fn drop(&mut self) {
        self.close();
    }
}

enum Exit {
    Dropped,
    Shutdown,
}

struct Driver {
    connector: Arc<dyn Connector>,
    reconnect_delay: Duration,
    connect_timeout: Duration,
    status: Arc<watch::Sender<ConnectionStatus>>,
    handler: Arc<Mutex<Option<MessageHandler>>>,
    commands: mpsc::UnboundedReceiver<Command>,
    epoch: u64,

    /// Frames sent on the current connection, oldest first
    pending: VecDeque<PendingRequest>,
    last_resolved: Option<Revision>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            self.set_state(ConnectionState::Connecting);

            let connector = Arc::clone(&self.connector);
            let limit = self.connect_timeout;
            let attempt = time::timeout(limit, connector.connect());
            let connected = tokio::select! {
                result = attempt => result
                    .unwrap_or_else(|_| Err(TransportError::ConnectTimeout(limit))),
                () = shutdown_requested(&mut self.commands) => break,
            };

            match connected {
                Ok(channel) => {
                    self.epoch += 1;
                    self.pending.clear();
                    self.last_resolved = None;
                    self.set_state(ConnectionState::Open);
                    info!(epoch = self.epoch, "Validation channel open");

                    if let Exit::Shutdown = self.pump(channel).await {
                        break;
                    }

                    self.set_state(ConnectionState::Closed);
                    warn!(
                        epoch = self.epoch,
                        unanswered = self.pending.len(),
                        "Validation channel dropped"
                    );
                }
                Err(err) => {
                    self.set_state(ConnectionState::Closed);
                    warn!(error = %err, "Validation channel connect failed");
                }
            }

            self.set_state(ConnectionState::ReconnectWait);
            debug!(
                delay_ms = self.reconnect_delay.as_millis() as u64,
                "Scheduling reconnect"
            );
            tokio::select! {
                () = time::sleep(self.reconnect_delay) => {}
                () = shutdown_requested(&mut self.commands) => break,
            }
        }

        self.pending.clear();
        self.set_state(ConnectionState::Disposed);
        debug!("Validation channel disposed");
    }

    async fn pump(&mut self, channel: Channel) -> Exit {
        let Channel {
            mut sink,
            mut stream,
        } = channel;

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Send { epoch, revision, text }) if epoch == self.epoch => {
                        if let Err(err) = sink.send(text.to_string()).await {
                            warn!(error = %err, "Validation channel write failed");
                            return Exit::Dropped;
                        }
                        self.pending
                            .push_back(PendingRequest::new(revision, RequestKind::Validation));
                        debug!(%revision, bytes = text.len(), "Sent validation frame");
                    }
                    Some(Command::Send { revision, .. }) => {
                        debug!(%revision, "Discarding frame issued on a previous connection");
                    }
                    Some(Command::Shutdown) | None => {
                        self.set_state(ConnectionState::Closing);
                        if let Err(err) = sink.close().await {
                            debug!(error = %err, "Close handshake failed");
                        }
                        return Exit::Shutdown;
                    }
                },
                frame = stream.next() => match frame {
                    Some(Ok(text)) => self.deliver(&text),
                    Some(Err(err)) => {
                        warn!(error = %err, "Validation channel read failed");
                        return Exit::Dropped;
                    }
                    None => return Exit::Dropped,
                },
            }
        }
    }

    /// Correlate an inbound frame with the oldest unanswered send and hand
    /// it to the consumer
    fn deliver(&mut self, frame: &str) {
        let revision = match self.pending.pop_front() {
            Some(request) => {
                debug!(
                    revision = %request.revision,
                    latency_ms = request.elapsed().as_millis() as u64,
                    "Validation frame answered"
                );
                Some(request.revision)
            }
            None => self.last_resolved,
        };

        let message = match ServerMessage::parse(frame) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "Discarding malformed validation frame");
                return;
            }
        };

        let Some(revision) = revision else {
            warn!("Discarding validation frame with no outstanding request");
            return;
        };
        self.last_resolved = Some(revision);

        let handler = lock(&self.handler).clone();
        if let Some(handler) = handler {
            handler(InboundReport { revision, message });
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.status.send_replace(ConnectionStatus {
            state,
            epoch: self.epoch,
        });
    }
}

/// Resolve once shutdown is requested, discarding stale frames meanwhile
async fn shutdown_requested(commands: &mut mpsc::UnboundedReceiver<Command>) {
    loop {
        match commands.recv().await {
            Some(Command::Send { revision, .. }) => {
                debug!(%revision, "Dropping frame while channel is not open");
            }
            Some(Command::Shutdown) | None => return,
        }
    }
}
