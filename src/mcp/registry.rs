//! Configured tool servers, their sessions, and the published catalog.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use strum::Display;
use tracing::{info, warn};

use super::catalog::{is_valid_server_name, CatalogHandle, CollisionPolicy, ToolCatalog};
use super::instructions::InstructionSource;
use super::schema::ToolDescriptor;
use super::session::{SessionConnector, ToolSession};
use crate::config::{HostConfig, ServerConfig};
use crate::error::HostError;
use crate::util::sync::{read, write};

/// Lifecycle of one server. `Failed` is terminal for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Per-server result of [`ServerRegistry::connect_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectResult {
    Connected { tools: usize },
    Failed { error: String },
}

/// Snapshot of one server for status listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    pub name: String,
    pub url: String,
    pub state: ConnectionState,
    pub tools: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RegistryOptions {
    pub collision_policy: CollisionPolicy,
    /// Bound on connecting, initializing, and listing tools for one server.
    pub connect_timeout: Duration,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            collision_policy: CollisionPolicy::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

struct ServerEntry {
    config: ServerConfig,
    state: ConnectionState,
    session: Option<Arc<dyn ToolSession>>,
    tools: Vec<ToolDescriptor>,
    last_error: Option<String>,
}

impl ServerEntry {
    fn report(&self) -> Option<ConnectResult> {
        match self.state {
            ConnectionState::Connected => Some(ConnectResult::Connected {
                tools: self.tools.len(),
            }),
            ConnectionState::Failed => Some(ConnectResult::Failed {
                error: self.last_error.clone().unwrap_or_default(),
            }),
            ConnectionState::Disconnected | ConnectionState::Connecting => None,
        }
    }

    fn fail(&mut self, error: String) {
        self.state = ConnectionState::Failed;
        self.session = None;
        self.tools.clear();
        self.last_error = Some(error);
    }
}

/// Owns one session per configured server and publishes the unified catalog.
///
/// The server table is only locked for short, synchronous sections; network
/// work happens outside the lock.
pub struct ServerRegistry {
    connector: Arc<dyn SessionConnector>,
    servers: RwLock<Vec<ServerEntry>>,
    catalog: CatalogHandle,
    options: RegistryOptions,
}

impl ServerRegistry {
    pub fn new(connector: Arc<dyn SessionConnector>, options: RegistryOptions) -> Self {
        Self {
            connector,
            servers: RwLock::new(Vec::new()),
            catalog: CatalogHandle::default(),
            options,
        }
    }

    /// Build a registry with every server from `config` registered.
    pub fn from_config(
        config: &HostConfig,
        connector: Arc<dyn SessionConnector>,
    ) -> Result<Self, HostError> {
        let registry = Self::new(
            connector,
            RegistryOptions {
                collision_policy: config.catalog.collision,
                connect_timeout: config.timeouts.connect(),
            },
        );
        for server in &config.servers {
            registry.register_server(server.clone())?;
        }
        Ok(registry)
    }

    pub fn register_server(&self, config: ServerConfig) -> Result<(), HostError> {
        if !is_valid_server_name(&config.name) {
            return Err(HostError::Configuration(format!(
                "invalid server name '{}': use letters, digits and '-'",
                config.name
            )));
        }
        if config.url.trim().is_empty() {
            return Err(HostError::Configuration(format!(
                "server '{}' has an empty url",
                config.name
            )));
        }

        let mut servers = write(&self.servers);
        if servers.iter().any(|entry| entry.config.name == config.name) {
            return Err(HostError::Configuration(format!(
                "duplicate server name '{}'",
                config.name
            )));
        }
        servers.push(ServerEntry {
            config,
            state: ConnectionState::Disconnected,
            session: None,
            tools: Vec::new(),
            last_error: None,
        });
        Ok(())
    }

    /// Connect every `Disconnected` server concurrently, then publish the catalog.
    ///
    /// One server failing never prevents the others from connecting. The
    /// returned map covers every registered server.
    pub async fn connect_all(&self) -> BTreeMap<String, ConnectResult> {
        let targets: Vec<ServerConfig> = {
            let mut servers = write(&self.servers);
            servers
                .iter_mut()
                .filter(|entry| entry.state == ConnectionState::Disconnected)
                .map(|entry| {
                    entry.state = ConnectionState::Connecting;
                    entry.config.clone()
                })
                .collect()
        };

        let attempts = targets.into_iter().map(|config| async move {
            let result = self.connect_one(&config).await;
            (config.name, result)
        });
        let outcomes = join_all(attempts).await;

        let report = {
            let mut servers = write(&self.servers);
            for (name, result) in outcomes {
                let Some(entry) = servers.iter_mut().find(|e| e.config.name == name) else {
                    continue;
                };
                match result {
                    Ok((session, tools)) => {
                        info!(server = %name, tools = tools.len(), "server connected");
                        entry.state = ConnectionState::Connected;
                        entry.session = Some(session);
                        entry.tools = tools;
                        entry.last_error = None;
                    }
                    Err(err) => {
                        warn!(server = %name, error = %err, "server failed to connect");
                        entry.fail(err.to_string());
                    }
                }
            }
            servers
                .iter()
                .filter_map(|entry| entry.report().map(|r| (entry.config.name.clone(), r)))
                .collect::<BTreeMap<_, _>>()
        };

        if let Err(err) = self.rebuild_catalog() {
            warn!(error = %err, "catalog rebuild rejected; keeping previous catalog");
        }
        report
    }

    async fn connect_one(
        &self,
        config: &ServerConfig,
    ) -> Result<(Arc<dyn ToolSession>, Vec<ToolDescriptor>), HostError> {
        let attempt = async {
            let session = self.connector.connect(&config.name, &config.url).await?;
            let schemas = session.list_tools().await?;
            Ok::<_, HostError>((session, schemas))
        };

        let connect_error = |message: String| HostError::Connect {
            server: config.name.clone(),
            message,
        };
        match tokio::time::timeout(self.options.connect_timeout, attempt).await {
            Ok(Ok((session, schemas))) => {
                let tools = schemas
                    .into_iter()
                    .map(|schema| ToolDescriptor::from_schema(&config.name, schema))
                    .collect();
                Ok((session, tools))
            }
            Ok(Err(err)) => Err(connect_error(err.to_string())),
            Err(_) => Err(connect_error(format!(
                "timed out after {}ms",
                self.options.connect_timeout.as_millis()
            ))),
        }
    }

    /// Re-list tools on every connected server and swap in the rebuilt catalog.
    ///
    /// A server whose listing fails is marked `Failed`.
    pub async fn refresh_catalog(&self) -> Result<Arc<ToolCatalog>, HostError> {
        let sessions: Vec<(String, Arc<dyn ToolSession>)> = read(&self.servers)
            .iter()
            .filter(|entry| entry.state == ConnectionState::Connected)
            .filter_map(|entry| {
                entry
                    .session
                    .as_ref()
                    .map(|session| (entry.config.name.clone(), Arc::clone(session)))
            })
            .collect();

        let listings = join_all(sessions.into_iter().map(|(name, session)| async move {
            let result = session.list_tools().await;
            (name, result)
        }))
        .await;

        {
            let mut servers = write(&self.servers);
            for (name, result) in listings {
                let Some(entry) = servers.iter_mut().find(|e| e.config.name == name) else {
                    continue;
                };
                match result {
                    Ok(schemas) => {
                        entry.tools = schemas
                            .into_iter()
                            .map(|schema| ToolDescriptor::from_schema(&name, schema))
                            .collect();
                    }
                    Err(err) => {
                        warn!(server = %name, error = %err, "tool listing failed; marking server failed");
                        entry.fail(err.to_string());
                    }
                }
            }
        }

        self.rebuild_catalog()
    }

    /// Build a catalog from connected servers in registration order and publish it.
    ///
    /// On a rejected build the previous catalog stays published.
    fn rebuild_catalog(&self) -> Result<Arc<ToolCatalog>, HostError> {
        let descriptors: Vec<ToolDescriptor> = read(&self.servers)
            .iter()
            .filter(|entry| entry.state == ConnectionState::Connected)
            .flat_map(|entry| entry.tools.iter().cloned())
            .collect();

        let catalog = ToolCatalog::build(descriptors, self.options.collision_policy)?;
        info!(tools = catalog.len(), "catalog published");
        self.catalog.swap(catalog);
        Ok(self.catalog.load())
    }

    /// The currently published catalog.
    pub fn catalog(&self) -> Arc<ToolCatalog> {
        self.catalog.load()
    }

    /// Session for `server` if it is connected.
    pub fn session(&self, server: &str) -> Option<Arc<dyn ToolSession>> {
        read(&self.servers)
            .iter()
            .find(|entry| entry.config.name == server && entry.state == ConnectionState::Connected)
            .and_then(|entry| entry.session.clone())
    }

    pub fn server_states(&self) -> Vec<ServerStatus> {
        read(&self.servers)
            .iter()
            .map(|entry| ServerStatus {
                name: entry.config.name.clone(),
                url: entry.config.url.clone(),
                state: entry.state,
                tools: entry.tools.len(),
                error: entry.last_error.clone(),
            })
            .collect()
    }

    /// Instructions supplied by connected servers during initialization.
    pub fn instruction_sources(&self) -> Vec<InstructionSource> {
        read(&self.servers)
            .iter()
            .filter(|entry| entry.state == ConnectionState::Connected)
            .filter_map(|entry| {
                let text = entry.session.as_ref()?.instructions()?;
                Some(InstructionSource::new(&entry.config.name, text))
            })
            .collect()
    }

    /// Close every open session. Servers are left `Disconnected`.
    pub async fn shutdown(&self) {
        let sessions: Vec<(String, Arc<dyn ToolSession>)> = {
            let mut servers = write(&self.servers);
            servers
                .iter_mut()
                .filter_map(|entry| {
                    let session = entry.session.take()?;
                    entry.state = ConnectionState::Disconnected;
                    entry.tools.clear();
                    Some((entry.config.name.clone(), session))
                })
                .collect()
        };
        for (name, session) in sessions {
            if let Err(err) = session.close().await {
                warn!(server = %name, error = %err, "session close failed");
            }
        }
        self.catalog.swap(ToolCatalog::empty());
    }
}
