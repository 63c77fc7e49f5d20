//! JSON-RPC 2.0 envelope and MCP method names.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HostError;

pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol revision spoken by both the client and the tool server.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const PING: &str = "ping";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
}

pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl From<JsonRpcError> for HostError {
    fn from(error: JsonRpcError) -> Self {
        HostError::Protocol {
            code: error.code,
            message: error.message,
        }
    }
}

/// What a [`JsonRpcMessage`] is, judged by which members are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Notification,
    Response,
    Invalid,
}

/// Flat JSON-RPC envelope covering requests, notifications, and responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcMessage {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcMessage {
    fn empty() -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id: None,
            method: None,
            params: None,
            result: None,
            error: None,
        }
    }

    pub fn request(id: u64, method: &str, params: Value) -> Self {
        Self {
            id: Some(Value::from(id)),
            method: Some(method.into()),
            params: Some(params),
            ..Self::empty()
        }
    }

    pub fn notification(method: &str, params: Value) -> Self {
        Self {
            method: Some(method.into()),
            params: Some(params),
            ..Self::empty()
        }
    }

    pub fn response(id: Value, result: Value) -> Self {
        Self {
            id: Some(id),
            result: Some(result),
            ..Self::empty()
        }
    }

    pub fn error_response(id: Value, error: JsonRpcError) -> Self {
        Self {
            id: Some(id),
            error: Some(error),
            ..Self::empty()
        }
    }

    pub fn kind(&self) -> MessageKind {
        match (&self.id, &self.method, &self.result, &self.error) {
            (Some(_), Some(_), None, None) => MessageKind::Request,
            (None, Some(_), None, None) => MessageKind::Notification,
            (Some(_), None, Some(_), None) | (Some(_), None, None, Some(_)) => {
                MessageKind::Response
            }
            _ => MessageKind::Invalid,
        }
    }

    /// Numeric request id, as assigned by this crate's client.
    pub fn numeric_id(&self) -> Option<u64> {
        self.id.as_ref().and_then(Value::as_u64)
    }

    /// Collapse a response into its result, mapping an error object to [`HostError::Protocol`].
    pub fn into_result(self) -> Result<Value, HostError> {
        if let Some(error) = self.error {
            return Err(error.into());
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}
