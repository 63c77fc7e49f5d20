//! Tool invocation id generators.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Source of fresh tool invocation ids.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random ids (`tool_<uuid>`); collisions are treated as negligible.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self) -> String {
        format!("tool_{}", Uuid::new_v4().simple())
    }
}

/// Deterministic counter ids (`<prefix>1`, `<prefix>2`, ...).
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new("tool_")
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{}{n}", self.prefix)
    }
}
