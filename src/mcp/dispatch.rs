//! Route a qualified tool call to its server and normalize the result.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::catalog::ToolCatalog;
use super::registry::ServerRegistry;
use crate::conversation::{OutcomePayload, ToolErrorKind};
use crate::error::{ErrorCategory, HostError};
use crate::util::timeout::with_timeout;

/// Turns qualified tool calls into outcome payloads. Never fails: every
/// problem becomes an error payload the model can read.
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ServerRegistry>,
    call_timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ServerRegistry>, call_timeout: Duration) -> Self {
        Self {
            registry,
            call_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    pub fn catalog(&self) -> Arc<ToolCatalog> {
        self.registry.catalog()
    }

    pub async fn dispatch(&self, qualified_name: &str, arguments: serde_json::Value) -> OutcomePayload {
        let catalog = self.registry.catalog();
        let Some(route) = catalog.resolve(qualified_name) else {
            debug!(tool = qualified_name, "unknown tool requested");
            return OutcomePayload::error(
                ToolErrorKind::UnknownTool,
                HostError::UnknownTool(qualified_name.to_string()).to_string(),
            );
        };

        let Some(session) = self.registry.session(&route.server) else {
            return OutcomePayload::error(
                ToolErrorKind::Transport,
                format!("server '{}' is not connected", route.server),
            );
        };

        debug!(tool = qualified_name, server = %route.server, "dispatching tool call");
        match with_timeout(self.call_timeout, session.call_tool(&route.tool_name, arguments)).await {
            Ok(result) => OutcomePayload::success(result.into_value_or_text()),
            Err(err) => {
                warn!(tool = qualified_name, server = %route.server, error = %err, "tool call failed");
                let kind = match err.category() {
                    ErrorCategory::ToolExecution => ToolErrorKind::ToolFailed,
                    ErrorCategory::InvalidInput => ToolErrorKind::InvalidArguments,
                    _ => ToolErrorKind::Transport,
                };
                let message = match err {
                    HostError::ToolExecution { message, .. } => message,
                    other => other.to_string(),
                };
                OutcomePayload::error(kind, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::mcp::registry::RegistryOptions;
    use crate::mcp::transport::LocalConnector;
    use crate::server::{presets, ServerTool, ToolServer};
    use serde_json::json;

    async fn dispatcher() -> ToolDispatcher {
        let flaky = ToolServer::new("flaky", "1.0.0").with_tool(ServerTool::new(
            "explode",
            "Always fails",
            json!({"type": "object"}),
            |_args| async { Err(HostError::InvalidArgument("kaboom".into())) },
        ));
        let connector = LocalConnector::new()
            .with_server("local://todoplan", Arc::new(presets::todoplan()))
            .with_server("local://flaky", Arc::new(flaky));
        let registry = ServerRegistry::new(Arc::new(connector), RegistryOptions::default());
        registry
            .register_server(ServerConfig::new("todoplan-server", "local://todoplan"))
            .unwrap();
        registry
            .register_server(ServerConfig::new("flaky", "local://flaky"))
            .unwrap();
        registry.connect_all().await;
        ToolDispatcher::new(Arc::new(registry), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn routes_to_owning_server_with_unqualified_name() {
        let dispatcher = dispatcher().await;
        let outcome = dispatcher
            .dispatch("todoplan-server_get-todo", json!({"category": "work"}))
            .await;
        assert_eq!(
            outcome,
            OutcomePayload::success(json!("finish the project Jupiter report"))
        );
    }

    #[tokio::test]
    async fn unknown_tool_yields_unknown_tool_outcome() {
        let dispatcher = dispatcher().await;
        let outcome = dispatcher.dispatch("gamma_lookup", json!({})).await;
        assert_eq!(outcome.error_kind(), Some(ToolErrorKind::UnknownTool));
    }

    #[tokio::test]
    async fn tool_error_result_yields_tool_failed() {
        let dispatcher = dispatcher().await;
        let outcome = dispatcher.dispatch("flaky_explode", json!({})).await;
        assert_eq!(outcome.error_kind(), Some(ToolErrorKind::ToolFailed));
        assert!(outcome.render_for_model().contains("kaboom"));
    }

    #[tokio::test]
    async fn non_object_arguments_are_rejected_before_the_server() {
        let dispatcher = dispatcher().await;
        let outcome = dispatcher
            .dispatch("todoplan-server_get-todo", json!(["work"]))
            .await;
        assert_eq!(outcome.error_kind(), Some(ToolErrorKind::InvalidArguments));
        assert!(outcome
            .render_for_model()
            .starts_with("[invalid_arguments] Invalid argument: tool arguments must be a JSON object"));
    }

    #[tokio::test]
    async fn closed_session_yields_transport_outcome() {
        let dispatcher = dispatcher().await;
        let session = dispatcher.registry().session("todoplan-server").unwrap();
        session.close().await.unwrap();

        let outcome = dispatcher
            .dispatch("todoplan-server_get-plan", json!({}))
            .await;
        assert_eq!(outcome.error_kind(), Some(ToolErrorKind::Transport));
    }
}
