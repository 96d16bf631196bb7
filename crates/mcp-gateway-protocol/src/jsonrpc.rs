//! JSON-RPC 2.0 frame types.
//!
//! Frames are modeled as a sum type discriminated on the presence of
//! `id`/`method`/`result`/`error` at parse time (§9's redesign guidance),
//! rather than a loosely-typed dict dispatched on a string `type` tag.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use mcp_gateway_core::RequestId;

/// JSON-RPC version constant.
pub const JSONRPC_VERSION: &str = "2.0";

/// Zero-sized type that serializes as the literal `"2.0"` and rejects any
/// other value on deserialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let version = String::deserialize(deserializer)?;
        if version == JSONRPC_VERSION {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!(
                "unsupported jsonrpc version {version:?}, expected \"2.0\""
            )))
        }
    }
}

/// An outbound or inbound JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: RequestId,
}

impl JsonRpcRequest {
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>, id: RequestId) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params,
            id,
        }
    }
}

/// Response payload: mutually exclusive `result`/`error`, enforced by the
/// `untagged` representation rather than a runtime check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponsePayload {
    Success { result: Value },
    Error { error: JsonRpcError },
}

/// An inbound JSON-RPC response, correlated back to a `PendingRequest` by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: JsonRpcVersion,
    #[serde(flatten)]
    pub payload: JsonRpcResponsePayload,
    pub id: RequestId,
}

/// A server-initiated notification (no `id`). Reserved for future routing;
/// the current core routes these to the audit sink and discards them (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A JSON-RPC error object, e.g. `{code: -32601, message: "Method not found"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Standard JSON-RPC error codes, plus the catch-all for MCP-application codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    Application(i32),
}

impl JsonRpcErrorCode {
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::Application(code) => code,
        }
    }
}

/// A single inbound/outbound frame, discriminated by shape rather than a
/// string tag: requests carry `method` + `id`, responses carry `id` +
/// `result`/`error`, notifications carry `method` with no `id`.
#[derive(Debug, Clone)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
    Notification(JsonRpcNotification),
}

impl JsonRpcMessage {
    /// Parse one JSON-RPC object from a wire line. This is the single place
    /// shape-discrimination happens — everything downstream matches on the
    /// resulting enum rather than re-inspecting raw JSON.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        let has_id = value.get("id").is_some();
        let has_method = value.get("method").is_some();

        if has_method && has_id {
            serde_json::from_value(value)
                .map(JsonRpcMessage::Request)
                .map_err(|e| ProtocolError::Malformed(e.to_string()))
        } else if has_method {
            serde_json::from_value(value)
                .map(JsonRpcMessage::Notification)
                .map_err(|e| ProtocolError::Malformed(e.to_string()))
        } else if has_id {
            serde_json::from_value(value)
                .map(JsonRpcMessage::Response)
                .map_err(|e| ProtocolError::Malformed(e.to_string()))
        } else {
            Err(ProtocolError::Malformed(
                "frame has neither method nor id".to_string(),
            ))
        }
    }

    /// Serialize this message as a single wire line (without trailing newline;
    /// transport drivers own framing).
    pub fn to_wire_line(&self) -> Result<String, ProtocolError> {
        let value = match self {
            Self::Request(r) => serde_json::to_string(r),
            Self::Response(r) => serde_json::to_string(r),
            Self::Notification(n) => serde_json::to_string(n),
        };
        value.map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

/// A malformed frame or unexpected shape (§7): the Connection that produced
/// this is closed outright, never retried as a transient transport error.
#[derive(Debug, Error, Clone)]
pub enum ProtocolError {
    #[error("malformed JSON-RPC frame: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminates_request_from_notification() {
        let req = JsonRpcMessage::parse(r#"{"jsonrpc":"2.0","method":"ping","id":"abc"}"#)
            .expect("valid request");
        assert!(matches!(req, JsonRpcMessage::Request(_)));

        let notif = JsonRpcMessage::parse(r#"{"jsonrpc":"2.0","method":"log"}"#)
            .expect("valid notification");
        assert!(matches!(notif, JsonRpcMessage::Notification(_)));
    }

    #[test]
    fn discriminates_response() {
        let resp =
            JsonRpcMessage::parse(r#"{"jsonrpc":"2.0","id":"abc","result":{"ok":true}}"#)
                .expect("valid response");
        assert!(matches!(resp, JsonRpcMessage::Response(_)));
    }

    #[test]
    fn rejects_frame_with_neither_method_nor_id() {
        let err = JsonRpcMessage::parse(r#"{"jsonrpc":"2.0"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn method_not_found_is_dash_32601() {
        assert_eq!(JsonRpcErrorCode::MethodNotFound.code(), -32601);
    }
}
