//! The `websocket` transport variant (§4.1): symmetric bidirectional frames;
//! ping/pong every 20 s; unsolicited close frames surface as EOF.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio::time::interval;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use crate::core::{Transport, TransportError, TransportMessage, TransportResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = Arc<TokioMutex<Option<futures::stream::SplitSink<WsStream, Message>>>>;

const PING_INTERVAL: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    pub url: String,
    pub max_message_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_message_size: 16 * 1024 * 1024,
        }
    }
}

pub struct WebSocketTransport {
    config: WebSocketConfig,
    writer: WsWriter,
}

impl WebSocketTransport {
    #[must_use]
    pub fn new(config: WebSocketConfig) -> Self {
        Self {
            config,
            writer: Arc::new(TokioMutex::new(None)),
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self) -> TransportResult<mpsc::Receiver<TransportResult<TransportMessage>>> {
        let url = url::Url::parse(&self.config.url)
            .map_err(|e| TransportError::OpenFailed(format!("invalid websocket url: {e}")))?;
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;
        let (sink, mut source) = stream.split();
        *self.writer.lock().await = Some(sink);

        let (tx, rx) = mpsc::channel::<TransportResult<TransportMessage>>(64);
        let max_size = self.config.max_message_size;

        let ping_writer = Arc::clone(&self.writer);
        tokio::spawn(async move {
            let mut ticker = interval(PING_INTERVAL);
            loop {
                ticker.tick().await;
                let mut guard = ping_writer.lock().await;
                if let Some(sink) = guard.as_mut() {
                    if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                } else {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if text.len() > max_size {
                            warn!(len = text.len(), "oversized websocket frame dropped");
                            continue;
                        }
                        trace!(%text, "websocket frame received");
                        if tx
                            .send(Ok(TransportMessage::new(text.to_string())))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_) | Message::Ping(_))) => {}
                    Some(Ok(Message::Close(_))) | None => {
                        let _ = tx.send(Err(TransportError::Closed)).await;
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary/frame frames are out of scope for MCP's JSON-RPC wire format.
                    }
                    Some(Err(e)) => {
                        let _ = tx.send(Err(TransportError::OpenFailed(e.to_string()))).await;
                        break;
                    }
                }
            }
            debug!("websocket reader task stopped");
        });

        Ok(rx)
    }

    async fn send(&self, frame: TransportMessage) -> TransportResult<()> {
        let mut guard = self.writer.lock().await;
        match guard.as_mut() {
            Some(sink) => sink
                .send(Message::Text(frame.raw.into()))
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string())),
            None => Err(TransportError::Closed),
        }
    }

    async fn close(&self) {
        if let Some(mut sink) = self.writer.lock().await.take() {
            let _ = sink.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_before_open_fails_closed() {
        let transport = WebSocketTransport::new(WebSocketConfig::default());
        let err = transport
            .send(TransportMessage::new("{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[tokio::test]
    async fn open_rejects_a_malformed_url_before_dialing() {
        let transport = WebSocketTransport::new(WebSocketConfig {
            url: "not a url".to_string(),
            ..WebSocketConfig::default()
        });
        let err = transport.open().await.unwrap_err();
        assert!(matches!(err, TransportError::OpenFailed(_)));
    }
}
