//! In-process connector.
//!
//! Every successful `connect` hands the matching [`MemoryPeer`] to the
//! [`MemoryListener`], which plays the service side: it reads the frames the
//! client sent, pushes replies, and drops the peer to simulate a lost
//! connection. Used by headless embeddings and by the test suites.

use super::{Channel, Connector};
use crate::TransportError;
use async_trait::async_trait;
use futures_util::{sink, stream};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time;

struct Shared {
    attempts: AtomicUsize,
    refusing: AtomicBool,
    handshake_ms: AtomicU64,
    incoming: mpsc::UnboundedSender<MemoryPeer>,
}

#[derive(Clone)]
pub struct MemoryConnector {
    shared: Arc<Shared>,
}

pub struct MemoryListener {
    shared: Arc<Shared>,
    incoming: mpsc::UnboundedReceiver<MemoryPeer>,
}

/// Service end of one in-memory connection
pub struct MemoryPeer {
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: mpsc::UnboundedSender<String>,
}

pub fn memory_channel() -> (MemoryConnector, MemoryListener) {
    let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
        attempts: AtomicUsize::new(0),
        refusing: AtomicBool::new(false),
        handshake_ms: AtomicU64::new(0),
        incoming: incoming_tx,
    });

    (
        MemoryConnector {
            shared: Arc::clone(&shared),
        },
        MemoryListener {
            shared,
            incoming: incoming_rx,
        },
    )
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Channel, TransportError> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        let handshake = self.shared.handshake_ms.load(Ordering::SeqCst);
        if handshake > 0 {
            time::sleep(Duration::from_millis(handshake)).await;
        }
        if self.shared.refusing.load(Ordering::SeqCst) {
            return Err(TransportError::Refused("listener is refusing connections".to_string()));
        }

        let (client_tx, from_client) = mpsc::unbounded_channel::<String>();
        let (to_client, client_rx) = mpsc::unbounded_channel::<String>();

        self.shared
            .incoming
            .send(MemoryPeer {
                from_client,
                to_client,
            })
            .map_err(|_| TransportError::Refused("listener dropped".to_string()))?;

        let sink = sink::unfold(client_tx, |tx, frame: String| async move {
            tx.send(frame).map_err(|_| TransportError::Closed)?;
            Ok::<_, TransportError>(tx)
        });
        let stream = stream::unfold(client_rx, |mut rx| async move {
            rx.recv().await.map(|frame| (Ok(frame), rx))
        });

        Ok(Channel {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

impl MemoryListener {
    /// Wait for the next successful client connection
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.incoming.recv().await
    }

    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.incoming.try_recv().ok()
    }

    /// Number of connection attempts so far, refused ones included
    pub fn attempts(&self) -> usize {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    pub fn set_refusing(&self, refusing: bool) {
        self.shared.refusing.store(refusing, Ordering::SeqCst);
    }

    /// Make every later `connect` take `delay` before it resolves
    pub fn set_handshake_delay(&self, delay: Duration) {
        self.shared
            .handshake_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

impl MemoryPeer {
    /// Next frame from the client; `None` once the client closed
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    pub fn try_recv(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }

    /// Every frame received so far
    pub fn drain(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Some(frame) = self.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Push a frame to the client. Returns false if the client is gone.
    pub fn send(&self, frame: impl Into<String>) -> bool {
        self.to_client.send(frame.into()).is_ok()
    }

    pub fn is_client_closed(&self) -> bool {
        self.to_client.is_closed()
    }
}
