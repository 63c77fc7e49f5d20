//! Anthropic Messages API endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::agent_loop::{ModelEndpoint, ModelRequest, ModelResponse, ResponseBlock};
use crate::config::{ModelConfig, DEFAULT_MODEL};
use crate::conversation::{ToolInvocation, Turn};
use crate::error::HostError;

use super::http::{anthropic_headers, shared_client, status_to_error};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicEndpoint {
    model: String,
    api_key: String,
    base_url: String,
}

impl AnthropicEndpoint {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn from_config(config: &ModelConfig) -> Result<Self, HostError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| HostError::Configuration("Missing ANTHROPIC_API_KEY".into()))?;
        let model = if config.model.is_empty() {
            DEFAULT_MODEL
        } else {
            config.model.as_str()
        };
        let endpoint = Self::new(api_key, model);
        Ok(match &config.base_url {
            Some(base_url) => endpoint.with_base_url(base_url),
            None => endpoint,
        })
    }

    fn build_request_body(&self, request: &ModelRequest) -> Result<Value, HostError> {
        let mut body = json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "messages": build_messages(&request.turns)?,
        });
        let obj = body
            .as_object_mut()
            .ok_or_else(|| HostError::model("request body is not an object"))?;

        if !request.system.is_empty() {
            obj.insert("system".into(), request.system.clone().into());
        }
        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.input_schema,
                    })
                })
                .collect();
            obj.insert("tools".into(), tools.into());
        }
        Ok(body)
    }
}

#[async_trait]
impl ModelEndpoint for AnthropicEndpoint {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, HostError> {
        let body = self.build_request_body(request)?;
        let url = format!("{}/v1/messages", self.base_url);

        debug!(model = %self.model, turns = request.turns.len(), "Anthropic complete");

        let resp = shared_client()
            .post(&url)
            .headers(anthropic_headers(&self.api_key, API_VERSION))
            .json(&body)
            .send()
            .await
            .map_err(|e| HostError::model(e.to_string()))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let data: AnthropicResponse = resp
            .json()
            .await
            .map_err(|e| HostError::model(format!("invalid response body: {e}")))?;
        parse_response(data)
    }
}

/// Map turns onto alternating user/assistant messages; consecutive turns of
/// the same role share one message.
fn build_messages(turns: &[Turn]) -> Result<Vec<Value>, HostError> {
    let mut messages: Vec<(&'static str, Vec<Value>)> = Vec::new();

    for turn in turns {
        let (role, block) = match turn {
            Turn::UserText { text } => ("user", json!({"type": "text", "text": text})),
            Turn::AssistantText { text } => ("assistant", json!({"type": "text", "text": text})),
            Turn::ToolInvocation(ToolInvocation {
                id,
                name,
                arguments,
            }) => {
                let id = id.as_deref().ok_or_else(|| {
                    HostError::InvalidTranscript(format!("invocation of '{name}' has no id"))
                })?;
                let input = if arguments.is_null() {
                    json!({})
                } else {
                    arguments.clone()
                };
                (
                    "assistant",
                    json!({"type": "tool_use", "id": id, "name": name, "input": input}),
                )
            }
            Turn::ToolOutcome(outcome) => (
                "user",
                json!({
                    "type": "tool_result",
                    "tool_use_id": outcome.id,
                    "content": outcome.payload.render_for_model(),
                    "is_error": outcome.payload.is_error(),
                }),
            ),
        };

        match messages.last_mut() {
            Some((last_role, blocks)) if *last_role == role => blocks.push(block),
            _ => messages.push((role, vec![block])),
        }
    }

    Ok(messages
        .into_iter()
        .map(|(role, content)| json!({"role": role, "content": content}))
        .collect())
}

fn parse_response(data: AnthropicResponse) -> Result<ModelResponse, HostError> {
    let mut blocks = Vec::with_capacity(data.content.len());
    for block in data.content {
        match block.r#type.as_str() {
            "text" => blocks.push(ResponseBlock::text(block.text.unwrap_or_default())),
            "tool_use" => {
                let name = block
                    .name
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| HostError::model("tool_use block without a name"))?;
                blocks.push(ResponseBlock::ToolUse {
                    id: block.id.filter(|id| !id.is_empty()),
                    name,
                    arguments: block.input.unwrap_or_else(|| json!({})),
                });
            }
            other => {
                return Err(HostError::model(format!(
                    "unsupported content block type '{other}'"
                )))
            }
        }
    }
    Ok(ModelResponse {
        blocks,
        stop_reason: data.stop_reason,
    })
}

// Internal Anthropic response types

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    r#type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<Value>,
}
