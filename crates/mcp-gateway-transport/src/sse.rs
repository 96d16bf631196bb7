//! The `sse` transport variant (§4.1): outbound requests go over a companion
//! HTTP POST channel; inbound uses a long-lived GET with `text/event-stream`;
//! reconnection replays `Last-Event-ID` when the server provided one.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client as HttpClient;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::core::{Transport, TransportError, TransportMessage, TransportResult};

#[derive(Debug, Clone)]
pub struct SseConfig {
    /// Base URL for the MCP server (e.g. `https://example.com/mcp`).
    pub base_url: String,
    pub sse_path: String,
    pub post_path: String,
    pub request_timeout: Duration,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            sse_path: "/sse".to_string(),
            post_path: "/rpc".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub struct SseTransport {
    config: SseConfig,
    http: HttpClient,
    /// Shared with the reader task spawned by `open()`, so a `Last-Event-ID`
    /// the server assigns mid-stream is visible to the *next* `open()` call
    /// on reconnect (§4.1: "reconnection uses `Last-Event-ID` when provided
    /// by server").
    last_event_id_shared: Arc<StdMutex<Option<String>>>,
}

impl SseTransport {
    #[must_use]
    pub fn new(config: SseConfig) -> Self {
        Self {
            http: HttpClient::builder()
                .timeout(config.request_timeout)
                .build()
                .expect("reqwest client builder with valid timeout"),
            config,
            last_event_id_shared: Arc::new(StdMutex::new(None)),
        }
    }

    fn post_url(&self) -> String {
        format!("{}{}", self.config.base_url, self.config.post_path)
    }

    fn sse_url(&self) -> String {
        format!("{}{}", self.config.base_url, self.config.sse_path)
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn open(&self) -> TransportResult<mpsc::Receiver<TransportResult<TransportMessage>>> {
        url::Url::parse(&self.config.base_url)
            .map_err(|e| TransportError::OpenFailed(format!("invalid sse base url: {e}")))?;

        let mut request = self.http.get(self.sse_url()).header("accept", "text/event-stream");
        if let Some(last_id) = self.last_event_id_shared.lock().expect("mutex poisoned").clone() {
            request = request.header("Last-Event-ID", last_id);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(TransportError::OpenFailed(format!(
                "SSE endpoint returned {}",
                response.status()
            )));
        }

        let (tx, rx) = mpsc::channel::<TransportResult<TransportMessage>>(64);
        let mut byte_stream = response.bytes_stream();
        let last_event_id = Arc::clone(&self.last_event_id_shared);

        tokio::spawn(async move {
            let mut buffer = String::new();
            loop {
                match byte_stream.next().await {
                    Some(Ok(chunk)) => {
                        buffer.push_str(&String::from_utf8_lossy(&chunk));
                        while let Some(idx) = buffer.find("\n\n") {
                            let raw_event: String = buffer.drain(..idx + 2).collect();
                            if let Some(id) = parse_sse_id_field(&raw_event) {
                                *last_event_id.lock().expect("mutex poisoned") = Some(id);
                            }
                            if let Some(data) = parse_sse_data_field(&raw_event) {
                                trace!(%data, "sse frame received");
                                if tx.send(Ok(TransportMessage::new(data))).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        let _ = tx
                            .send(Err(TransportError::OpenFailed(e.to_string())))
                            .await;
                        return;
                    }
                    None => {
                        let _ = tx.send(Err(TransportError::Closed)).await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(&self, frame: TransportMessage) -> TransportResult<()> {
        let response = self
            .http
            .post(self.post_url())
            .header("content-type", "application/json")
            .body(frame.raw)
            .send()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::SendFailed(format!(
                "POST {} returned {}",
                self.post_url(),
                response.status()
            )))
        }
    }

    async fn close(&self) {
        debug!("sse transport closed (stateless POST leg, nothing to release there)");
    }
}

/// Extract the JSON-RPC payload from one `data:`-bearing SSE event block.
fn parse_sse_data_field(raw_event: &str) -> Option<String> {
    let mut data_lines = Vec::new();
    for line in raw_event.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim_start());
        }
    }
    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

/// Extract the `id:` field from one SSE event block, if present, so the
/// caller can remember it for `Last-Event-ID` on the next reconnect.
fn parse_sse_id_field(raw_event: &str) -> Option<String> {
    raw_event
        .lines()
        .find_map(|line| line.strip_prefix("id:"))
        .map(|rest| rest.trim_start().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_line_data_field() {
        let event = "event: message\ndata: {\"hello\":\"world\"}\n\n";
        assert_eq!(
            parse_sse_data_field(event),
            Some(r#"{"hello":"world"}"#.to_string())
        );
    }

    #[test]
    fn ignores_blocks_without_a_data_field() {
        let event = ": keep-alive\n\n";
        assert_eq!(parse_sse_data_field(event), None);
    }

    #[test]
    fn extracts_id_field_for_last_event_id_tracking() {
        let event = "id: 42\nevent: message\ndata: {\"hello\":\"world\"}\n\n";
        assert_eq!(parse_sse_id_field(event), Some("42".to_string()));
    }

    #[test]
    fn id_field_absent_yields_none() {
        let event = "data: {}\n\n";
        assert_eq!(parse_sse_id_field(event), None);
    }

    #[tokio::test]
    async fn open_rejects_a_malformed_base_url_before_dialing() {
        let transport = SseTransport::new(SseConfig {
            base_url: "not a url".to_string(),
            ..SseConfig::default()
        });
        let err = transport.open().await.unwrap_err();
        assert!(matches!(err, TransportError::OpenFailed(_)));
    }
}
