//! Host configuration (layered: defaults < TOML file < environment).

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent_loop::DispatchMode;
use crate::error::HostError;
use crate::mcp::catalog::{is_valid_server_name, CollisionPolicy, QUALIFIER_SEPARATOR};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "MCP_HOST_CONFIG";

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// One configured tool server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub url: String,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Environment variables that may override this server's URL, most specific first.
    ///
    /// `todoplan-server` answers to `MCP_SERVER_TODOPLAN_SERVER_URL` and `MCP_SERVER_TODOPLAN_URL`.
    pub fn url_env_keys(&self) -> Vec<String> {
        let upper = self.name.to_ascii_uppercase().replace('-', "_");
        let mut keys = vec![format!("MCP_SERVER_{upper}_URL")];
        if let Some(short) = upper.strip_suffix("_SERVER").filter(|s| !s.is_empty()) {
            keys.push(format!("MCP_SERVER_{short}_URL"));
        }
        keys
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub provider: String,
    pub model: String,
    pub max_tokens: u32,
    pub base_url: Option<String>,
    /// Operator text prepended to the generated system instructions.
    pub system_prompt: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("base_url", &self.base_url)
            .field("system_prompt", &self.system_prompt)
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .finish()
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".into(),
            model: DEFAULT_MODEL.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            base_url: None,
            system_prompt: None,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    pub max_rounds: usize,
    pub cycle_timeout_secs: Option<u64>,
    pub dispatch: DispatchMode,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            cycle_timeout_secs: Some(300),
            dispatch: DispatchMode::Sequential,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub connect_ms: u64,
    pub call_ms: u64,
    pub model_ms: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn call(&self) -> Duration {
        Duration::from_millis(self.call_ms)
    }

    pub fn model(&self) -> Duration {
        Duration::from_millis(self.model_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 10_000,
            call_ms: 30_000,
            model_ms: 120_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub collision: CollisionPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".into(),
        }
    }
}

/// Complete host configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub model: ModelConfig,
    pub orchestration: OrchestrationConfig,
    pub timeouts: TimeoutConfig,
    pub catalog: CatalogConfig,
    pub http: HttpConfig,
    pub servers: Vec<ServerConfig>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            orchestration: OrchestrationConfig::default(),
            timeouts: TimeoutConfig::default(),
            catalog: CatalogConfig::default(),
            http: HttpConfig::default(),
            servers: vec![
                ServerConfig::new("todoplan-server", "http://localhost:8000/sse"),
                ServerConfig::new("project-server", "http://localhost:8001/sse"),
            ],
        }
    }
}

impl HostConfig {
    /// Parse a TOML document; missing sections take their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, HostError> {
        toml::from_str(raw).map_err(|e| HostError::Configuration(format!("invalid config: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self, HostError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            HostError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Load `.env`, then the config file, then environment overrides, then validate.
    ///
    /// File lookup: `explicit`, else `$MCP_HOST_CONFIG`, else the platform config
    /// directory if a file exists there, else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, HostError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
            .or_else(|| default_config_path().filter(|p| p.exists()));

        let mut config = match &path {
            Some(path) => {
                debug!(path = %path.display(), "loading config file");
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("ANTHROPIC_API_KEY").filter(|k| !k.is_empty()) {
            self.model.api_key = Some(key);
        }
        if let Some(url) = lookup("ANTHROPIC_BASE_URL").filter(|u| !u.is_empty()) {
            self.model.base_url = Some(url);
        }
        if let Some(model) = lookup("MCP_HOST_MODEL").filter(|m| !m.is_empty()) {
            self.model.model = model;
        }
        if let Some(port) = lookup("PORT").filter(|p| !p.is_empty()) {
            let host = self
                .http
                .bind
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "127.0.0.1".into());
            self.http.bind = format!("{host}:{port}");
        }
        for server in &mut self.servers {
            if let Some(url) = server
                .url_env_keys()
                .iter()
                .find_map(|key| lookup(key).filter(|u| !u.is_empty()))
            {
                server.url = url;
            }
        }
    }

    pub fn validate(&self) -> Result<(), HostError> {
        let mut seen = HashSet::new();
        for server in &self.servers {
            let name = server.name.as_str();
            if name.is_empty() {
                return Err(HostError::Configuration("server name must not be empty".into()));
            }
            if name.contains(QUALIFIER_SEPARATOR) {
                return Err(HostError::Configuration(format!(
                    "server name '{name}' must not contain '{QUALIFIER_SEPARATOR}'"
                )));
            }
            if !is_valid_server_name(name) {
                return Err(HostError::Configuration(format!(
                    "server name '{name}' may only contain letters, digits and '-'"
                )));
            }
            if !seen.insert(name) {
                return Err(HostError::Configuration(format!(
                    "duplicate server name '{name}'"
                )));
            }
            if server.url.trim().is_empty() {
                return Err(HostError::Configuration(format!(
                    "server '{name}' has an empty url"
                )));
            }
        }
        if self.orchestration.max_rounds == 0 {
            return Err(HostError::Configuration("max_rounds must be positive".into()));
        }
        if self.orchestration.cycle_timeout_secs == Some(0) {
            return Err(HostError::Configuration(
                "cycle_timeout_secs must be positive".into(),
            ));
        }
        if self.model.max_tokens == 0 {
            return Err(HostError::Configuration("max_tokens must be positive".into()));
        }
        let timeouts = &self.timeouts;
        if timeouts.connect_ms == 0 || timeouts.call_ms == 0 || timeouts.model_ms == 0 {
            return Err(HostError::Configuration("timeouts must be positive".into()));
        }
        Ok(())
    }

    pub fn cycle_timeout(&self) -> Option<Duration> {
        self.orchestration
            .cycle_timeout_secs
            .map(Duration::from_secs)
    }
}

/// `<platform config dir>/mcp-host/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "mcp-host")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
