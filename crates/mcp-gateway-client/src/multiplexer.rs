//! Request Multiplexer (C2, §4.2): correlates outbound requests with inbound
//! responses on one transport, with per-request timeout and cancellation.
//!
//! A concurrent map of in-flight requests, and a single `tokio::spawn`ed
//! reader task that owns the transport's inbound receiver for the lifetime
//! of the connection. `call()` races the `oneshot::Receiver` against a
//! deadline and a `CancellationToken` in one `tokio::select!`, and removes
//! the table entry from whichever branch
//! wins *before* completing — that ordering is what makes cancellation
//! non-racy (§4.2: "a late response falls into the unknown-id case").

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{instrument, trace, warn};

use mcp_gateway_core::RequestId;
use mcp_gateway_protocol::{
    JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponsePayload,
};
use mcp_gateway_transport::{Transport, TransportMessage, TransportResult};

/// Why a `call()` did not return a successful result.
#[derive(Debug, Clone)]
pub enum CallError {
    /// The deadline elapsed before a response arrived.
    Timeout,
    /// The caller's `CancellationToken` fired first.
    Cancelled,
    /// The transport reached EOF (or the frame could not be sent) before a
    /// response arrived.
    Disconnected,
    /// The server answered with a JSON-RPC error object.
    Rpc(JsonRpcError),
    /// The outbound frame itself could not be serialized, or the transport
    /// rejected the send outright.
    SendFailed(String),
}

type PendingMap = DashMap<RequestId, oneshot::Sender<Result<serde_json::Value, CallError>>>;

/// Given an opened `Transport`, correlates `call()`s with inbound responses
/// by JSON-RPC `id` (§4.2).
pub struct RequestMultiplexer {
    transport: Arc<dyn Transport>,
    pending: Arc<PendingMap>,
    send_lock: tokio::sync::Mutex<()>,
    /// Fires once the reader task observes transport EOF. The Connection
    /// Supervisor watches this to trigger a reconnect.
    pub disconnected: CancellationToken,
}

impl RequestMultiplexer {
    /// Spawn the reader task and return a multiplexer bound to it.
    /// `inbound` must be the single receiver handed out by `transport.open()`
    /// — the Multiplexer becomes its sole consumer for the connection's
    /// lifetime, per the Transport contract.
    #[must_use]
    pub fn spawn(
        transport: Arc<dyn Transport>,
        inbound: mpsc::Receiver<TransportResult<TransportMessage>>,
        notifications: mpsc::Sender<JsonRpcNotification>,
    ) -> Self {
        let pending: Arc<PendingMap> = Arc::new(DashMap::new());
        let disconnected = CancellationToken::new();

        tokio::spawn(Self::reader_loop(
            Arc::clone(&pending),
            inbound,
            notifications,
            disconnected.clone(),
        ));

        Self {
            transport,
            pending,
            send_lock: tokio::sync::Mutex::new(()),
            disconnected,
        }
    }

    /// `Multiplexer.call()` (§4.2): allocate an id, install a pending entry,
    /// send the frame, and race the response against `deadline` and `cancel`.
    #[instrument(skip(self, params, cancel), fields(method = %method))]
    pub async fn call(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, CallError> {
        let id = RequestId::new();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);

        let request = JsonRpcRequest::new(method, params, id.clone());
        let line = match JsonRpcMessage::Request(request).to_wire_line() {
            Ok(line) => line,
            Err(e) => {
                self.pending.remove(&id);
                return Err(CallError::SendFailed(e.to_string()));
            }
        };

        {
            // Outbound writes on this connection are totally ordered by this
            // lock (§5): two concurrent `call()`s never interleave partial
            // frames even though the transport itself also serializes sends.
            let _guard = self.send_lock.lock().await;
            if let Err(e) = self.transport.send(TransportMessage::new(line)).await {
                self.pending.remove(&id);
                return Err(CallError::SendFailed(e.to_string()));
            }
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                self.pending.remove(&id);
                Err(CallError::Cancelled)
            }
            () = tokio::time::sleep(deadline) => {
                self.pending.remove(&id);
                Err(CallError::Timeout)
            }
            result = rx => {
                match result {
                    Ok(outcome) => outcome,
                    Err(_) => Err(CallError::Disconnected),
                }
            }
        }
    }

    /// Single reader task: the sole consumer of the transport's inbound
    /// channel for this connection's lifetime (§4.2 step 4).
    async fn reader_loop(
        pending: Arc<PendingMap>,
        mut inbound: mpsc::Receiver<TransportResult<TransportMessage>>,
        notifications: mpsc::Sender<JsonRpcNotification>,
        disconnected: CancellationToken,
    ) {
        while let Some(frame) = inbound.recv().await {
            match frame {
                Ok(message) => Self::route(&pending, &notifications, &message.raw).await,
                Err(e) => {
                    warn!(error = %e, "transport reported an error, treating as EOF");
                    break;
                }
            }
        }

        // Driver EOF: fail all outstanding requests with `Disconnected`
        // (§4.2 step 6) and signal the supervisor.
        let ids: Vec<RequestId> = pending.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, tx)) = pending.remove(&id) {
                let _ = tx.send(Err(CallError::Disconnected));
            }
        }
        disconnected.cancel();
    }

    async fn route(
        pending: &PendingMap,
        notifications: &mpsc::Sender<JsonRpcNotification>,
        raw: &str,
    ) {
        match JsonRpcMessage::parse(raw) {
            Ok(JsonRpcMessage::Response(response)) => {
                if let Some((_, tx)) = pending.remove(&response.id) {
                    let outcome = match response.payload {
                        JsonRpcResponsePayload::Success { result } => Ok(result),
                        JsonRpcResponsePayload::Error { error } => Err(CallError::Rpc(error)),
                    };
                    let _ = tx.send(outcome);
                } else {
                    // Unknown id: log and drop, do not error the connection
                    // (§4.2 step 4) — this is exactly what protects a
                    // just-cancelled call from a late reply.
                    trace!(id = %response.id, "dropping response with unknown or already-resolved id");
                }
            }
            Ok(JsonRpcMessage::Notification(notification)) => {
                let _ = notifications.try_send(notification);
            }
            Ok(JsonRpcMessage::Request(request)) => {
                warn!(method = %request.method, "server-initiated request is unsupported by this client, dropping");
            }
            Err(e) => {
                warn!(error = %e, "dropping malformed inbound frame");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mcp_gateway_transport::MockTransport;

    use super::*;

    async fn spawn_over_mock(mock: Arc<MockTransport>) -> RequestMultiplexer {
        let inbound = mock.open().await.expect("mock open never fails");
        let (notif_tx, _notif_rx) = mpsc::channel(8);
        RequestMultiplexer::spawn(mock, inbound, notif_tx)
    }

    #[tokio::test]
    async fn happy_path_round_trips_a_call() {
        let mock = Arc::new(MockTransport::new());
        let mux = spawn_over_mock(Arc::clone(&mock)).await;

        let responder = {
            let mock = Arc::clone(&mock);
            tokio::spawn(async move {
                let (id, method) = mock.await_next_request().await;
                assert_eq!(method, "tools/call");
                mock.deliver(format!(
                    r#"{{"jsonrpc":"2.0","id":"{id}","result":{{"content":[{{"type":"text","text":"ok"}}]}}}}"#
                ))
                .await;
            })
        };

        let result = mux
            .call(
                "tools/call",
                Some(serde_json::json!({"name": "echo"})),
                Duration::from_secs(5),
                &CancellationToken::new(),
            )
            .await
            .expect("scripted response resolves the call");

        responder.await.expect("responder task does not panic");
        assert_eq!(result["content"][0]["text"], "ok");
        assert_eq!(mock.sent_frames().len(), 1);
    }

    #[tokio::test]
    async fn timed_out_call_is_not_double_completed_by_a_late_response() {
        let mock = Arc::new(MockTransport::new());
        let mux = spawn_over_mock(Arc::clone(&mock)).await;

        let result = mux
            .call(
                "tools/call",
                None,
                Duration::from_millis(20),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(CallError::Timeout)));

        // The id was already removed from the pending table by the timeout
        // branch before this reply arrives — routing it must not panic, and
        // the (already-consumed) caller observes nothing from it.
        let (id, _method) = mock.await_next_request().await;
        mock.deliver(format!(r#"{{"jsonrpc":"2.0","id":"{id}","result":{{}}}}"#))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
