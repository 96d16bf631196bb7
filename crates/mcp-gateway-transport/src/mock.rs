//! A first-class `Transport` implementor used only by tests, selected by
//! explicit construction — never engaged implicitly at runtime. Carries
//! forward the source reference implementation's `MockMCPConnection` test
//! double (§1.1, §9), generalized to this crate's `Transport` trait.

use std::collections::VecDeque;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::core::{Transport, TransportError, TransportMessage, TransportResult};

/// One scripted inbound event: either a frame (optionally delayed) or a
/// forced EOF.
pub enum ScriptedEvent {
    Frame { raw: String, delay: Duration },
    Eof,
}

/// An in-memory transport that plays back a scripted sequence of inbound
/// frames and records every outbound frame it was asked to send, so tests can
/// assert "zero frames sent" (§8 universal invariants) without a real process
/// or socket.
pub struct MockTransport {
    script: StdMutex<VecDeque<ScriptedEvent>>,
    sent: StdMutex<Vec<String>>,
    consumed: StdMutex<usize>,
    closed: StdMutex<bool>,
    channel: StdMutex<Option<mpsc::Sender<TransportResult<TransportMessage>>>>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: StdMutex::new(VecDeque::new()),
            sent: StdMutex::new(Vec::new()),
            consumed: StdMutex::new(0),
            closed: StdMutex::new(false),
            channel: StdMutex::new(None),
        }
    }

    /// Queue a frame to be delivered the next time the reader task polls,
    /// after `delay` has elapsed.
    pub fn push_frame(&self, raw: impl Into<String>, delay: Duration) {
        self.script
            .lock()
            .expect("script mutex poisoned")
            .push_back(ScriptedEvent::Frame {
                raw: raw.into(),
                delay,
            });
    }

    /// Queue an EOF signal.
    pub fn push_eof(&self) {
        self.script
            .lock()
            .expect("script mutex poisoned")
            .push_back(ScriptedEvent::Eof);
    }

    /// Every frame `send()` has been called with so far, in order.
    #[must_use]
    pub fn sent_frames(&self) -> Vec<String> {
        self.sent.lock().expect("sent mutex poisoned").clone()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closed.lock().expect("closed mutex poisoned")
    }

    /// Block until a frame this transport hasn't handed out before arrives
    /// via `send()`, then return its JSON-RPC `id` and `method`. Request ids
    /// are generated fresh per call, so a scripted response can only be
    /// built after the live id is known — this is how tests answer a
    /// handshake or tool call without predicting a UUID.
    pub async fn await_next_request(&self) -> (String, String) {
        loop {
            let next = {
                let sent = self.sent.lock().expect("sent mutex poisoned");
                let mut consumed = self.consumed.lock().expect("consumed mutex poisoned");
                if *consumed < sent.len() {
                    let raw = sent[*consumed].clone();
                    *consumed += 1;
                    Some(raw)
                } else {
                    None
                }
            };
            if let Some(raw) = next {
                let value: serde_json::Value =
                    serde_json::from_str(&raw).expect("sent frame is valid JSON");
                let id = value.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                let method = value
                    .get("method")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                return (id, method);
            }
            sleep(Duration::from_millis(2)).await;
        }
    }

    /// Deliver a frame directly to whatever reader is currently polling this
    /// transport's channel, bypassing the scripted queue. Used together with
    /// [`MockTransport::await_next_request`] to reply to a request keyed by
    /// its live id.
    pub async fn deliver(&self, raw: impl Into<String>) {
        let sender = self.channel.lock().expect("channel mutex poisoned").clone();
        if let Some(tx) = sender {
            let _ = tx.send(Ok(TransportMessage::new(raw))).await;
        }
    }

    /// Deliver a forced EOF directly, bypassing the scripted queue.
    pub async fn deliver_eof(&self) {
        let sender = self.channel.lock().expect("channel mutex poisoned").clone();
        if let Some(tx) = sender {
            let _ = tx.send(Err(TransportError::Closed)).await;
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self) -> TransportResult<mpsc::Receiver<TransportResult<TransportMessage>>> {
        let (tx, rx) = mpsc::channel::<TransportResult<TransportMessage>>(64);
        *self.channel.lock().expect("channel mutex poisoned") = Some(tx.clone());
        let events: Vec<ScriptedEvent> = self
            .script
            .lock()
            .expect("script mutex poisoned")
            .drain(..)
            .collect();

        tokio::spawn(async move {
            for event in events {
                match event {
                    ScriptedEvent::Frame { raw, delay } => {
                        if !delay.is_zero() {
                            sleep(delay).await;
                        }
                        if tx.send(Ok(TransportMessage::new(raw))).await.is_err() {
                            return;
                        }
                    }
                    ScriptedEvent::Eof => {
                        let _ = tx.send(Err(TransportError::Closed)).await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(&self, frame: TransportMessage) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.sent.lock().expect("sent mutex poisoned").push(frame.raw);
        Ok(())
    }

    async fn close(&self) {
        *self.closed.lock().expect("closed mutex poisoned") = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_sent_frames_in_order() {
        let mock = MockTransport::new();
        mock.send(TransportMessage::new("a")).await.unwrap();
        mock.send(TransportMessage::new("b")).await.unwrap();
        assert_eq!(mock.sent_frames(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn delivers_scripted_frames_then_eof() {
        let mock = MockTransport::new();
        mock.push_frame(r#"{"id":"1"}"#, Duration::ZERO);
        mock.push_eof();

        let mut rx = mock.open().await.unwrap();
        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(first.raw, r#"{"id":"1"}"#);
        let second = rx.recv().await.unwrap();
        assert!(matches!(second, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn send_after_close_fails() {
        let mock = MockTransport::new();
        mock.close().await;
        let err = mock.send(TransportMessage::new("x")).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }
}
