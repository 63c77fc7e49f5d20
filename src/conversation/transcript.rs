//! Ordered conversation transcript with invocation/outcome pairing rules.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::HostError;

use super::ids::IdGenerator;
use super::turn::{ToolInvocation, Turn};

/// The ordered turns replayed to the model on every round.
///
/// Appends enforce the pairing rules incrementally: an invocation id is never
/// reused, and an outcome must answer an earlier, still-unanswered invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a transcript from existing turns, applying the same rules as [`Self::append`].
    pub fn from_turns(turns: Vec<Turn>) -> Result<Self, HostError> {
        let mut transcript = Self::new();
        for turn in turns {
            transcript.append(turn)?;
        }
        Ok(transcript)
    }

    pub fn append(&mut self, turn: Turn) -> Result<(), HostError> {
        match &turn {
            Turn::ToolInvocation(ToolInvocation { id: Some(id), .. }) => {
                if self.has_invocation(id) {
                    return Err(HostError::InvalidTranscript(format!(
                        "duplicate tool invocation id '{id}'"
                    )));
                }
            }
            Turn::ToolOutcome(outcome) => {
                if !self.has_invocation(&outcome.id) {
                    return Err(HostError::InvalidTranscript(format!(
                        "outcome '{}' has no earlier invocation",
                        outcome.id
                    )));
                }
                if self.has_outcome(&outcome.id) {
                    return Err(HostError::InvalidTranscript(format!(
                        "invocation '{}' already has an outcome",
                        outcome.id
                    )));
                }
            }
            Turn::ToolInvocation(_) | Turn::UserText { .. } | Turn::AssistantText { .. } => {}
        }
        self.turns.push(turn);
        Ok(())
    }

    /// Copy of the turns in order.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Turns appended at or after `index`.
    pub fn since(&self, index: usize) -> &[Turn] {
        self.turns.get(index..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn has_invocation(&self, id: &str) -> bool {
        self.turns.iter().any(|turn| {
            matches!(turn, Turn::ToolInvocation(ToolInvocation { id: Some(existing), .. }) if existing == id)
        })
    }

    fn has_outcome(&self, id: &str) -> bool {
        self.turns
            .iter()
            .any(|turn| matches!(turn, Turn::ToolOutcome(outcome) if outcome.id == id))
    }

    /// Check the transcript is ready to be sent to the model.
    pub fn validate(&self) -> Result<(), HostError> {
        validate_pairing(&self.turns)
    }
}

/// Assign a fresh id to every invocation lacking one; invocations with ids are untouched.
pub fn with_generated_ids(turns: &[Turn], ids: &dyn IdGenerator) -> Vec<Turn> {
    turns
        .iter()
        .map(|turn| match turn {
            Turn::ToolInvocation(invocation) if invocation.id.is_none() => {
                Turn::ToolInvocation(ToolInvocation {
                    id: Some(ids.next_id()),
                    ..invocation.clone()
                })
            }
            other => other.clone(),
        })
        .collect()
}

/// Verify every outcome answers exactly one earlier invocation and every
/// invocation has been answered.
pub fn validate_pairing(turns: &[Turn]) -> Result<(), HostError> {
    let mut invoked = HashSet::new();
    let mut answered = HashSet::new();

    for (position, turn) in turns.iter().enumerate() {
        match turn {
            Turn::ToolInvocation(ToolInvocation { id: None, name, .. }) => {
                return Err(HostError::InvalidTranscript(format!(
                    "invocation of '{name}' at turn {position} has no id"
                )));
            }
            Turn::ToolInvocation(ToolInvocation { id: Some(id), .. }) => {
                if !invoked.insert(id.as_str()) {
                    return Err(HostError::InvalidTranscript(format!(
                        "duplicate tool invocation id '{id}'"
                    )));
                }
            }
            Turn::ToolOutcome(outcome) => {
                if !invoked.contains(outcome.id.as_str()) {
                    return Err(HostError::InvalidTranscript(format!(
                        "outcome '{}' at turn {position} has no earlier invocation",
                        outcome.id
                    )));
                }
                if !answered.insert(outcome.id.as_str()) {
                    return Err(HostError::InvalidTranscript(format!(
                        "invocation '{}' answered twice",
                        outcome.id
                    )));
                }
            }
            Turn::UserText { .. } | Turn::AssistantText { .. } => {}
        }
    }

    if let Some(pending) = invoked.difference(&answered).next() {
        return Err(HostError::InvalidTranscript(format!(
            "invocation '{pending}' has no outcome"
        )));
    }
    Ok(())
}
