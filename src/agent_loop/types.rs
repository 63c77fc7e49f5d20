//! Cycle result types.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::conversation::{ConversationId, Turn};

/// How the tool invocations of one model response are executed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DispatchMode {
    /// One at a time, in response order.
    #[default]
    Sequential,
    /// All at once; results are still appended in response order.
    Concurrent,
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CycleStatus {
    /// The model answered without requesting tools.
    Completed,
    /// The round or time budget ran out before the model finished.
    BudgetExceeded,
}

/// What one `submit` appended to the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub conversation_id: ConversationId,
    /// Turns appended during the cycle, starting with the user's message.
    pub turns: Vec<Turn>,
    /// Model calls made.
    pub rounds: usize,
    pub status: CycleStatus,
}

impl CycleReport {
    /// Concatenated assistant text of this cycle.
    pub fn reply_text(&self) -> String {
        self.turns
            .iter()
            .filter_map(|turn| match turn {
                Turn::AssistantText { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
