//! The `stdio` transport variant (§4.1): frames are newline-delimited JSON
//! objects over a spawned child process's stdin/stdout; stderr is drained
//! and forwarded to the audit sink tagged `transport_stderr`; child exit
//! surfaces as EOF.
//!
//! Follows the hybrid-mutex pattern used throughout this workspace: the
//! child handle and write half live behind a `tokio::sync::Mutex` (crossed by
//! `.await`); liveness is a plain `std::sync::Mutex<bool>` since it is never
//! held across an await point.

use std::process::Stdio;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::core::{Transport, TransportError, TransportMessage, TransportResult};

/// A line forwarded from the child's stderr stream, surfaced to callers that
/// want to route it into the Audit Sink as a `transport_stderr` event. This
/// crate has no dependency on `mcp-gateway-audit`; the Connection Supervisor
/// is what bridges this channel into an audit record.
pub type StderrLine = String;

#[derive(Debug, Clone)]
pub struct StdioConfig {
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub startup_timeout: Duration,
    pub max_message_size: usize,
}

impl Default for StdioConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            env: Vec::new(),
            startup_timeout: Duration::from_secs(30),
            max_message_size: 10 * 1024 * 1024,
        }
    }
}

pub struct StdioTransport {
    config: StdioConfig,
    child: TokioMutex<Option<Child>>,
    stdin_tx: TokioMutex<Option<mpsc::Sender<String>>>,
    stderr_rx: StdMutex<Option<mpsc::Receiver<StderrLine>>>,
    opened: StdMutex<bool>,
}

impl StdioTransport {
    #[must_use]
    pub fn new(config: StdioConfig) -> Self {
        Self {
            config,
            child: TokioMutex::new(None),
            stdin_tx: TokioMutex::new(None),
            stderr_rx: StdMutex::new(None),
            opened: StdMutex::new(false),
        }
    }

    /// Takes the stderr-line receiver, if `open()` has run and it hasn't
    /// already been taken. Single consumer, same contract as `recv()`.
    pub fn take_stderr(&self) -> Option<mpsc::Receiver<StderrLine>> {
        self.stderr_rx.lock().expect("stderr mutex poisoned").take()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn open(&self) -> TransportResult<mpsc::Receiver<TransportResult<TransportMessage>>> {
        if self.config.command.is_empty() {
            return Err(TransportError::OpenFailed("empty command".to_string()));
        }

        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }

        let spawn = async {
            let mut child = cmd
                .spawn()
                .map_err(|e| TransportError::OpenFailed(format!("spawn failed: {e}")))?;

            let stdin = child
                .stdin
                .take()
                .ok_or_else(|| TransportError::OpenFailed("no stdin handle".to_string()))?;
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| TransportError::OpenFailed("no stdout handle".to_string()))?;
            let stderr = child
                .stderr
                .take()
                .ok_or_else(|| TransportError::OpenFailed("no stderr handle".to_string()))?;

            let (stdin_tx, mut stdin_rx) = mpsc::channel::<String>(64);
            let (inbound_tx, inbound_rx) =
                mpsc::channel::<TransportResult<TransportMessage>>(64);
            let (stderr_tx, stderr_rx) = mpsc::channel::<StderrLine>(64);

            tokio::spawn(async move {
                let mut writer = BufWriter::new(stdin);
                while let Some(line) = stdin_rx.recv().await {
                    if writer.write_all(line.as_bytes()).await.is_err()
                        || writer.write_all(b"\n").await.is_err()
                        || writer.flush().await.is_err()
                    {
                        break;
                    }
                }
                debug!("stdio stdin writer task stopped");
            });

            let max_size = self.config.max_message_size;
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            if line.len() > max_size {
                                warn!(len = line.len(), "oversized stdio frame dropped");
                                continue;
                            }
                            trace!(%line, "stdio frame received");
                            if inbound_tx
                                .send(Ok(TransportMessage::new(line)))
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        Ok(None) => {
                            // Child closed stdout: EOF.
                            let _ = inbound_tx.send(Err(TransportError::Closed)).await;
                            break;
                        }
                        Err(e) => {
                            let _ = inbound_tx
                                .send(Err(TransportError::Io(e)))
                                .await;
                            break;
                        }
                    }
                }
                debug!("stdio stdout reader task stopped");
            });

            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if stderr_tx.send(line).await.is_err() {
                        break;
                    }
                }
            });

            Ok::<_, TransportError>((child, stdin_tx, inbound_rx, stderr_rx))
        };

        let (child, stdin_tx, inbound_rx, stderr_rx) =
            timeout(self.config.startup_timeout, spawn)
                .await
                .map_err(|_| TransportError::HandshakeTimeout)??;

        *self.child.lock().await = Some(child);
        *self.stdin_tx.lock().await = Some(stdin_tx);
        *self.stderr_rx.lock().expect("stderr mutex poisoned") = Some(stderr_rx);
        *self.opened.lock().expect("opened mutex poisoned") = true;

        Ok(inbound_rx)
    }

    async fn send(&self, frame: TransportMessage) -> TransportResult<()> {
        let guard = self.stdin_tx.lock().await;
        match guard.as_ref() {
            Some(tx) => tx
                .send(frame.raw)
                .await
                .map_err(|_| TransportError::SendFailed("stdin writer task gone".to_string())),
            None => Err(TransportError::Closed),
        }
    }

    async fn close(&self) {
        *self.stdin_tx.lock().await = None;
        if let Some(mut child) = self.child.lock().await.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
        *self.opened.lock().expect("opened mutex poisoned") = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_rejects_empty_command() {
        let transport = StdioTransport::new(StdioConfig::default());
        let err = transport.open().await.unwrap_err();
        assert!(matches!(err, TransportError::OpenFailed(_)));
    }

    #[tokio::test]
    async fn send_before_open_fails_closed() {
        let transport = StdioTransport::new(StdioConfig {
            command: "cat".to_string(),
            ..StdioConfig::default()
        });
        let err = transport
            .send(TransportMessage::new("{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[tokio::test]
    async fn cat_echoes_a_line_back() {
        let transport = StdioTransport::new(StdioConfig {
            command: "cat".to_string(),
            ..StdioConfig::default()
        });
        let mut inbound = transport.open().await.expect("cat must spawn");
        transport
            .send(TransportMessage::new(r#"{"hello":"world"}"#))
            .await
            .expect("send to cat stdin");
        let msg = inbound.recv().await.expect("channel open").expect("frame");
        assert_eq!(msg.raw, r#"{"hello":"world"}"#);
        transport.close().await;
    }
}
