//! Request/response channels to a tool server.

pub mod local;
pub mod sse;

use async_trait::async_trait;

use crate::error::HostError;

pub use local::{LocalChannel, LocalConnector};
pub use sse::{SseChannel, SseConnector, SseOptions};

/// A live JSON-RPC channel correlating requests with responses.
#[async_trait]
pub trait RpcChannel: Send + Sync {
    /// Identifier the server assigned to this session.
    fn session_id(&self) -> &str;

    /// Send a request and wait for its matching response.
    async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, HostError>;

    /// Send a notification; no response is expected.
    async fn notify(&self, method: &str, params: serde_json::Value) -> Result<(), HostError>;

    /// Release the session. Closing twice is a no-op.
    async fn close(&self) -> Result<(), HostError>;

    fn is_closed(&self) -> bool;
}
