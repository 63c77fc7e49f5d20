//! Conversation state: turns, transcripts, and invocation ids.

pub mod ids;
pub mod transcript;
pub mod turn;

pub use ids::{IdGenerator, SequentialIdGenerator, UuidIdGenerator};
pub use transcript::{validate_pairing, with_generated_ids, Transcript};
pub use turn::{OutcomePayload, ToolErrorKind, ToolInvocation, ToolOutcome, Turn};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HostError;

/// Identifier of one independent conversation.
pub type ConversationId = Uuid;

/// A single user's conversation: its id and transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    transcript: Transcript,
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: ConversationId) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            updated_at: now,
            transcript: Transcript::new(),
        }
    }

    pub fn append(&mut self, turn: Turn) -> Result<(), HostError> {
        self.transcript.append(turn)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<Turn> {
        self.transcript.snapshot()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
