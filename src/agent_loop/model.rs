//! Model endpoint abstraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::conversation::Turn;
use crate::error::HostError;
use crate::mcp::ModelTool;

/// Everything the model sees on one round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRequest {
    pub system: String,
    pub turns: Vec<Turn>,
    pub tools: Vec<ModelTool>,
    pub max_tokens: u32,
}

/// One content block of a model response, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        name: String,
        #[serde(default)]
        arguments: serde_json::Value,
    },
}

impl ResponseBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn tool_use(
        id: Option<&str>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self::ToolUse {
            id: id.map(str::to_string),
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub blocks: Vec<ResponseBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

impl ModelResponse {
    pub fn new(blocks: Vec<ResponseBlock>) -> Self {
        Self {
            blocks,
            stop_reason: None,
        }
    }

    pub fn has_tool_use(&self) -> bool {
        self.blocks
            .iter()
            .any(|block| matches!(block, ResponseBlock::ToolUse { .. }))
    }
}

/// A language model that turns a transcript plus tools into response blocks.
#[async_trait]
pub trait ModelEndpoint: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, HostError>;
}
