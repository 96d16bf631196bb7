//! The Audit Sink (C8, §4.8): a channel handed to callers, a single
//! background task owning the receiver and the log file.
//!
//! A channel-based design using `try_send` rather than `send().await` so a
//! full channel surfaces as an error the caller must handle (§4.8's
//! fail-closed backpressure requirement) instead of silently absorbing the
//! slowdown.

use std::path::PathBuf;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::event::AuditEntry;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit channel is full")]
    ChannelFull,
    #[error("audit sink has shut down")]
    Closed,
}

/// Handle callers use to submit entries. Cloneable and cheap — it's just a
/// channel sender.
#[derive(Debug, Clone)]
pub struct AuditSink {
    sender: mpsc::Sender<AuditEntry>,
}

impl AuditSink {
    /// Spawn the background writer task and return a sink handle. `capacity`
    /// bounds the channel; once full, `record` fails closed rather than
    /// blocking or dropping entries.
    #[must_use]
    pub fn spawn(log_path: PathBuf, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        tokio::spawn(Self::writer_loop(receiver, log_path));
        Self { sender }
    }

    /// Build a sink over an already-open writer, for tests that don't want
    /// to touch the filesystem.
    #[must_use]
    pub fn spawn_with_writer<W>(mut writer: W, capacity: usize) -> Self
    where
        W: tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let (sender, mut receiver) = mpsc::channel::<AuditEntry>(capacity);
        tokio::spawn(async move {
            while let Some(entry) = receiver.recv().await {
                if let Err(err) = Self::write_entry(&mut writer, &entry).await {
                    error!(error = %err, "failed to write audit entry");
                }
            }
        });
        Self { sender }
    }

    /// Submit an entry. Fails closed: a full channel returns
    /// `AuditError::ChannelFull` instead of blocking, so the Facade can
    /// propagate the failure to the caller rather than let an operation
    /// succeed unaudited.
    pub fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        match self.sender.try_send(entry) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("audit sink backpressured, failing operation closed");
                Err(AuditError::ChannelFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(AuditError::Closed),
        }
    }

    async fn writer_loop(mut receiver: mpsc::Receiver<AuditEntry>, log_path: PathBuf) {
        let file = match tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await
        {
            Ok(file) => file,
            Err(err) => {
                error!(path = %log_path.display(), error = %err, "failed to open audit log file");
                return;
            }
        };
        let mut writer = tokio::io::BufWriter::new(file);

        while let Some(entry) = receiver.recv().await {
            if let Err(err) = Self::write_entry(&mut writer, &entry).await {
                error!(error = %err, "failed to write audit entry");
            }
        }

        let _ = writer.flush().await;
    }

    async fn write_entry<W>(writer: &mut W, entry: &AuditEntry) -> std::io::Result<()>
    where
        W: tokio::io::AsyncWrite + Unpin,
    {
        let mut line = serde_json::to_vec(entry).unwrap_or_default();
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{AuditOperation, AuditOutcome};
    use chrono::Utc;
    use mcp_gateway_core::TenantId;

    fn entry() -> AuditEntry {
        AuditEntry::builder(TenantId::new("acme"), "sess-1", AuditOperation::CallTool, "srv1")
            .target("echo")
            .outcome(AuditOutcome::Success)
            .build(Utc::now())
    }

    #[tokio::test]
    async fn writes_json_lines_in_submission_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("audit.log");
        let sink = AuditSink::spawn(path.clone(), 8);

        for i in 0..3 {
            let mut e = entry();
            e.session_id = format!("sess-{i}");
            sink.record(e).expect("record succeeds");
        }

        // Give the background task a chance to drain; deterministic test
        // infra (serial_test + real sleep) is acceptable here since we are
        // asserting on file contents, not timing.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let contents = tokio::fs::read_to_string(&path).await.expect("read log");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("\"sessionId\":\"sess-0\""));
        assert!(lines[2].contains("\"sessionId\":\"sess-2\""));
    }

    #[tokio::test]
    async fn full_channel_fails_closed_instead_of_blocking() {
        let (sender, _receiver) = mpsc::channel::<AuditEntry>(1);
        let sink = AuditSink { sender };
        sink.record(entry()).expect("first record fits");
        let result = sink.record(entry());
        assert!(matches!(result, Err(AuditError::ChannelFull)));
    }
}
