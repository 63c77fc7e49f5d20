//! Model endpoint implementations.

pub mod http;

#[cfg(feature = "anthropic")]
pub mod anthropic;

use std::sync::Arc;

use crate::agent_loop::ModelEndpoint;
use crate::config::ModelConfig;
use crate::error::HostError;

/// Create the model endpoint named by `config.provider`.
#[allow(unused_variables)]
pub fn create_endpoint(config: &ModelConfig) -> Result<Arc<dyn ModelEndpoint>, HostError> {
    match config.provider.as_str() {
        #[cfg(feature = "anthropic")]
        "anthropic" => Ok(Arc::new(anthropic::AnthropicEndpoint::from_config(config)?)),
        other => Err(HostError::Configuration(format!(
            "Provider '{other}' is not available in this build"
        ))),
    }
}
