//! Per-cycle budget.

use std::time::Duration;

use crate::config::HostConfig;

const DEFAULT_MAX_ROUNDS: usize = 10;
const MAX_ROUNDS_ENV: &str = "MCP_HOST_MAX_ROUNDS";
const CYCLE_TIMEOUT_ENV: &str = "MCP_HOST_CYCLE_TIMEOUT_SECS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopLimits {
    /// Model calls allowed per cycle.
    pub max_rounds: usize,
    /// Wall-clock budget per cycle, checked before every model call.
    pub cycle_timeout: Option<Duration>,
    /// Bound on a single model call.
    pub model_timeout: Duration,
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            cycle_timeout: None,
            model_timeout: Duration::from_secs(120),
        }
    }
}

impl LoopLimits {
    /// Limits from config, with `MCP_HOST_MAX_ROUNDS` / `MCP_HOST_CYCLE_TIMEOUT_SECS` taking precedence.
    pub fn from_config(config: &HostConfig) -> Self {
        Self::resolve(config, |key| std::env::var(key).ok())
    }

    fn resolve(config: &HostConfig, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let max_rounds = lookup(MAX_ROUNDS_ENV)
            .as_deref()
            .and_then(parse_positive_usize)
            .unwrap_or(config.orchestration.max_rounds);
        let cycle_timeout = lookup(CYCLE_TIMEOUT_ENV)
            .as_deref()
            .and_then(parse_positive_usize)
            .map(|secs| Duration::from_secs(secs as u64))
            .or_else(|| config.cycle_timeout());
        Self {
            max_rounds,
            cycle_timeout,
            model_timeout: config.timeouts.model(),
        }
    }
}

fn parse_positive_usize(value: &str) -> Option<usize> {
    let parsed = value.trim().parse::<usize>().ok()?;
    if parsed == 0 {
        None
    } else {
        Some(parsed)
    }
}
