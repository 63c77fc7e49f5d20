//! Closure-backed tools hosted by a [`super::ToolServer`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::error::HostError;

/// Arguments a tool was called with.
#[derive(Debug, Clone, Default)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, HostError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| HostError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Deserialize all arguments into a typed struct.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, HostError> {
        serde_json::from_value(self.value.clone())
            .map_err(|e| HostError::InvalidArgument(format!("Invalid arguments: {e}")))
    }
}

type ToolHandler = dyn Fn(ToolArguments) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, HostError>> + Send>>
    + Send
    + Sync;

/// A tool definition plus the closure that answers calls to it.
#[derive(Clone)]
pub struct ServerTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
    handler: Arc<ToolHandler>,
}

impl ServerTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, HostError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub async fn call(&self, args: ToolArguments) -> Result<serde_json::Value, HostError> {
        (self.handler)(args).await
    }

    /// Wire definition advertised by `tools/list`.
    pub fn definition(&self) -> rmcp::model::Tool {
        let schema = match &self.input_schema {
            serde_json::Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        rmcp::model::Tool::new(self.name.clone(), self.description.clone(), schema)
    }
}

impl std::fmt::Debug for ServerTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}
