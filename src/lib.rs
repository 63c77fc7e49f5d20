//! mcp-host: a chat host that drives a language model across many remote
//! MCP tool servers.
//!
//! The host connects to every configured tool server over HTTP+SSE, merges
//! their tools into one catalog of `<server>_<tool>` names, and runs an
//! orchestration loop per user message: call the model, dispatch any tool
//! invocations it requests to the owning server, append the outcomes, and
//! repeat until the model answers in plain text.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use mcp_host::config::HostConfig;
//! use mcp_host::conversation::Conversation;
//! use mcp_host::host::HostState;
//! use mcp_host::mcp::{SseConnector, SseOptions};
//!
//! # async fn example() -> mcp_host::error::Result<()> {
//! let config = HostConfig::load(None)?;
//! let model = mcp_host::provider::create_endpoint(&config.model)?;
//! let connector = Arc::new(SseConnector::new(SseOptions::default())?);
//! let (state, _report) = HostState::connect(&config, connector, model).await?;
//!
//! let mut conversation = Conversation::new();
//! let report = state.orchestrator.submit(&mut conversation, "What's my plan today?").await?;
//! println!("{}", report.reply_text());
//! # Ok(())
//! # }
//! ```

pub mod agent_loop;
pub mod config;
pub mod conversation;
pub mod error;
pub mod host;
pub mod mcp;
pub mod provider;
pub mod server;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
