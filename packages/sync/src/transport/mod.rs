//! Transport seam for the streamed validation channel.
//!
//! A [`Connector`] produces a fresh duplex [`Channel`] of text frames each
//! time the connection client (re)connects. The client owns the channel
//! exclusively once it is handed over.

mod memory;
mod ws;

pub use memory::{memory_channel, MemoryConnector, MemoryListener, MemoryPeer};
pub use ws::WsConnector;

use crate::TransportError;
use async_trait::async_trait;
use futures_util::{Sink, Stream};
use std::pin::Pin;

pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// One established connection. The stream ending means the peer went away.
pub struct Channel {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Channel, TransportError>;
}
