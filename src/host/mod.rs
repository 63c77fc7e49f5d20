//! The chat host: shared state, conversation store, and HTTP API.

pub mod api;
pub mod store;

pub use api::{create_router, ApiError};
pub use store::{ConversationHandle, ConversationStore};

use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agent_loop::{ModelEndpoint, Orchestrator};
use crate::config::HostConfig;
use crate::error::HostError;
use crate::mcp::{ConnectResult, ServerRegistry, SessionConnector};

/// Shared application state
#[derive(Clone)]
pub struct HostState {
    pub registry: Arc<ServerRegistry>,
    pub orchestrator: Arc<Orchestrator>,
    pub conversations: Arc<ConversationStore>,
}

impl HostState {
    pub fn new(registry: Arc<ServerRegistry>, orchestrator: Orchestrator) -> Self {
        Self {
            registry,
            orchestrator: Arc::new(orchestrator),
            conversations: Arc::new(ConversationStore::new()),
        }
    }

    /// Register and connect every configured server, then build the
    /// orchestrator over the resulting catalog.
    ///
    /// Servers that fail to connect are reported, not fatal.
    pub async fn connect(
        config: &HostConfig,
        connector: Arc<dyn SessionConnector>,
        model: Arc<dyn ModelEndpoint>,
    ) -> Result<(Self, BTreeMap<String, ConnectResult>), HostError> {
        let registry = Arc::new(ServerRegistry::from_config(config, connector)?);
        let report = registry.connect_all().await;
        info!(
            servers = report.len(),
            tools = registry.catalog().len(),
            "tool servers connected"
        );
        let orchestrator = Orchestrator::from_config(config, model, Arc::clone(&registry));
        Ok((Self::new(registry, orchestrator), report))
    }
}

/// Serve the host API until `shutdown` resolves, then close every session.
pub async fn serve(
    listener: TcpListener,
    state: HostState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), HostError> {
    let addr: SocketAddr = listener.local_addr()?;
    let registry = Arc::clone(&state.registry);
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    info!("Host API listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    registry.shutdown().await;
    Ok(())
}
