//! Legacy MCP HTTP+SSE client transport.
//!
//! The client opens a long-lived `GET` event stream. The first `endpoint`
//! event names the URL to `POST` JSON-RPC messages to (carrying the
//! `sessionId`). Responses arrive on the event stream as `message` events
//! and are matched to waiting requests by id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Url;
use reqwest_eventsource::{Event, EventSource};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::RpcChannel;
use crate::error::HostError;
use crate::mcp::client::McpClient;
use crate::mcp::protocol::{JsonRpcMessage, MessageKind};
use crate::mcp::session::{SessionConnector, ToolSession};
use crate::util::sync::lock;

type PendingMap = HashMap<u64, oneshot::Sender<JsonRpcMessage>>;

/// Timeouts applied by an [`SseChannel`].
#[derive(Debug, Clone)]
pub struct SseOptions {
    /// Time allowed for the stream to open and announce its endpoint.
    pub open_timeout: Duration,
    /// Time allowed for any single request to be answered.
    pub request_timeout: Duration,
}

impl Default for SseOptions {
    fn default() -> Self {
        Self {
            open_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// One SSE session with a tool server.
pub struct SseChannel {
    session_id: String,
    post_url: Url,
    http: reqwest::Client,
    next_id: AtomicU64,
    pending: Arc<Mutex<PendingMap>>,
    closed: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
    request_timeout: Duration,
}

impl SseChannel {
    /// Open the event stream at `endpoint` and wait for the session endpoint.
    pub async fn open(
        http: reqwest::Client,
        endpoint: &str,
        options: SseOptions,
    ) -> Result<Self, HostError> {
        let stream_url = Url::parse(endpoint).map_err(|e| {
            HostError::Configuration(format!("invalid server endpoint '{endpoint}': {e}"))
        })?;

        let mut source = EventSource::new(http.get(stream_url.clone()))
            .map_err(|e| HostError::Transport(format!("cannot open event stream: {e}")))?;
        source.set_retry_policy(Box::new(reqwest_eventsource::retry::Never));

        let post_url = match tokio::time::timeout(
            options.open_timeout,
            wait_for_endpoint(&mut source, &stream_url),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                source.close();
                return Err(HostError::Timeout(options.open_timeout.as_millis() as u64));
            }
        };

        let session_id = post_url
            .query_pairs()
            .find(|(key, _)| key == "sessionId")
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| {
                HostError::Transport(format!("endpoint '{post_url}' carries no sessionId"))
            })?;
        debug!(%session_id, %post_url, "SSE session opened");

        let pending = Arc::new(Mutex::new(PendingMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_stream(
            source,
            Arc::clone(&pending),
            Arc::clone(&closed),
            session_id.clone(),
        ));

        Ok(Self {
            session_id,
            post_url,
            http,
            next_id: AtomicU64::new(1),
            pending,
            closed,
            reader: Mutex::new(Some(reader)),
            request_timeout: options.request_timeout,
        })
    }

    fn ensure_open(&self) -> Result<(), HostError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(HostError::SessionClosed(self.session_id.clone()));
        }
        Ok(())
    }

    async fn post(&self, message: &JsonRpcMessage) -> Result<(), HostError> {
        let response = self
            .http
            .post(self.post_url.clone())
            .json(message)
            .send()
            .await
            .map_err(|e| HostError::Transport(format!("POST {} failed: {e}", self.post_url)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HostError::Transport(format!(
                "POST {} returned {status}: {body}",
                self.post_url
            )));
        }
        Ok(())
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(reader) = lock(&self.reader).take() {
            reader.abort();
        }
        lock(&self.pending).clear();
    }
}

#[async_trait]
impl RpcChannel for SseChannel {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, HostError> {
        self.ensure_open()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);
        // Removes the waiter on every exit, including when this future is dropped.
        let _waiter = PendingGuard {
            pending: &self.pending,
            id,
        };

        self.post(&JsonRpcMessage::request(id, method, params)).await?;

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response.into_result(),
            Ok(Err(_)) => Err(HostError::SessionClosed(format!(
                "session {} closed while awaiting '{method}'",
                self.session_id
            ))),
            Err(_) => Err(HostError::Timeout(self.request_timeout.as_millis() as u64)),
        }
    }

    async fn notify(&self, method: &str, params: serde_json::Value) -> Result<(), HostError> {
        self.ensure_open()?;
        self.post(&JsonRpcMessage::notification(method, params))
            .await
    }

    async fn close(&self) -> Result<(), HostError> {
        if !self.closed.load(Ordering::SeqCst) {
            debug!(session_id = %self.session_id, "closing SSE session");
        }
        self.shutdown();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for SseChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct PendingGuard<'a> {
    pending: &'a Mutex<PendingMap>,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.id);
    }
}

async fn wait_for_endpoint(source: &mut EventSource, base: &Url) -> Result<Url, HostError> {
    while let Some(event) = source.next().await {
        match event {
            Ok(Event::Open) => {}
            Ok(Event::Message(message)) if message.event == "endpoint" => {
                return base.join(message.data.trim()).map_err(|e| {
                    HostError::Transport(format!("invalid endpoint '{}': {e}", message.data))
                });
            }
            Ok(Event::Message(message)) => {
                debug!(event = %message.event, "ignoring event before endpoint");
            }
            Err(err) => {
                source.close();
                return Err(HostError::Transport(format!("event stream failed: {err}")));
            }
        }
    }
    Err(HostError::Transport(
        "event stream ended before an endpoint was announced".into(),
    ))
}

async fn read_stream(
    mut source: EventSource,
    pending: Arc<Mutex<PendingMap>>,
    closed: Arc<AtomicBool>,
    session_id: String,
) {
    while let Some(event) = source.next().await {
        match event {
            Ok(Event::Open) => {}
            Ok(Event::Message(message)) if message.event == "message" => {
                match serde_json::from_str::<JsonRpcMessage>(&message.data) {
                    Ok(rpc) => route_message(&pending, rpc, &session_id),
                    Err(err) => warn!(%session_id, error = %err, "malformed JSON-RPC payload"),
                }
            }
            Ok(Event::Message(message)) => {
                debug!(%session_id, event = %message.event, "ignoring SSE event");
            }
            Err(reqwest_eventsource::Error::StreamEnded) => break,
            Err(err) => {
                warn!(%session_id, error = %err, "SSE stream failed");
                break;
            }
        }
    }
    source.close();
    closed.store(true, Ordering::SeqCst);
    // Dropping the senders wakes every waiter with a closed-session error.
    lock(&pending).clear();
    debug!(%session_id, "SSE stream ended");
}

fn route_message(pending: &Mutex<PendingMap>, message: JsonRpcMessage, session_id: &str) {
    if message.kind() != MessageKind::Response {
        debug!(%session_id, method = ?message.method, "ignoring server-initiated message");
        return;
    }
    let Some(id) = message.numeric_id() else {
        warn!(%session_id, id = ?message.id, "response with non-numeric id");
        return;
    };
    match lock(pending).remove(&id) {
        Some(waiter) => {
            let _ = waiter.send(message);
        }
        None => debug!(%session_id, id, "response for unknown or expired request"),
    }
}

/// Connects to servers over SSE and performs the MCP handshake.
#[derive(Clone)]
pub struct SseConnector {
    http: reqwest::Client,
    options: SseOptions,
}

impl SseConnector {
    pub fn new(options: SseOptions) -> Result<Self, HostError> {
        // No overall request timeout: the event stream stays open for the session's lifetime.
        let http = reqwest::Client::builder()
            .connect_timeout(options.open_timeout)
            .build()?;
        Ok(Self { http, options })
    }
}

#[async_trait]
impl SessionConnector for SseConnector {
    async fn connect(
        &self,
        server_name: &str,
        endpoint: &str,
    ) -> Result<Arc<dyn ToolSession>, HostError> {
        let channel = SseChannel::open(self.http.clone(), endpoint, self.options.clone()).await?;
        let client = McpClient::initialize(server_name, Box::new(channel)).await?;
        Ok(Arc::new(client))
    }
}
