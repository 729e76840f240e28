use super::{Channel, Connector};
use crate::TransportError;
use async_trait::async_trait;
use futures_util::{future, SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use url::Url;

/// WebSocket connector for the validation service
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: Url,
}

impl WsConnector {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Channel, TransportError> {
        let (socket, _response) = connect_async(self.url.as_str()).await?;
        debug!(url = %self.url, "WebSocket handshake complete");

        let (write, read) = socket.split();

        let sink = write.with(|frame: String| {
            future::ready(Ok::<_, TransportError>(Message::Text(frame)))
        });

        // Control frames are answered by tungstenite itself; a close frame
        // is followed by the end of the stream.
        let stream = read.filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(frame)) => Some(Ok(frame)),
                Ok(Message::Binary(bytes)) => {
                    debug!(len = bytes.len(), "Ignoring binary frame");
                    None
                }
                Ok(_) => None,
                Err(err) => Some(Err(TransportError::from(err))),
            })
        });

        Ok(Channel {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}
