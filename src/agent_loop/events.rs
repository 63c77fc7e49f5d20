//! Progress events emitted while a cycle runs.

use std::sync::Arc;

use serde::Serialize;

use super::types::CycleStatus;
use crate::conversation::OutcomePayload;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CycleEvent {
    RoundStarted {
        round: usize,
    },
    AssistantText {
        text: String,
    },
    ToolInvoked {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },
    ToolCompleted {
        id: String,
        name: String,
        outcome: OutcomePayload,
    },
    Finished {
        status: CycleStatus,
        rounds: usize,
    },
}

/// Callback receiving cycle events.
pub type CycleEventSink = Arc<dyn Fn(CycleEvent) + Send + Sync>;
