//! Audit Sink (C8): append-only, redacted, hashed record of every policy
//! decision, tool call, and resource read the gateway makes (§4.8).

pub mod event;
pub mod redact;
pub mod sink;

pub use event::{AuditEntry, AuditEntryBuilder, AuditOperation, AuditOutcome};
pub use redact::{redact, redacted_hash};
pub use sink::{AuditError, AuditSink};
