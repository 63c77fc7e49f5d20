//! In-memory conversation store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;

use crate::conversation::{Conversation, ConversationId};
use crate::util::sync::{read, write};

/// Shared handle to one conversation. Holding the lock serializes cycles on
/// that conversation; other conversations are unaffected.
pub type ConversationHandle = Arc<Mutex<Conversation>>;

#[derive(Default)]
pub struct ConversationStore {
    conversations: RwLock<HashMap<ConversationId, ConversationHandle>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new, empty conversation.
    pub fn create(&self) -> (ConversationId, ConversationHandle) {
        let conversation = Conversation::new();
        let id = conversation.id;
        let handle = Arc::new(Mutex::new(conversation));
        write(&self.conversations).insert(id, Arc::clone(&handle));
        (id, handle)
    }

    pub fn get(&self, id: &ConversationId) -> Option<ConversationHandle> {
        read(&self.conversations).get(id).cloned()
    }

    pub fn remove(&self, id: &ConversationId) -> Option<ConversationHandle> {
        write(&self.conversations).remove(id)
    }

    pub fn len(&self) -> usize {
        read(&self.conversations).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
