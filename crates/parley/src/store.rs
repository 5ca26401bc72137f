//! Persistence collaborator for conversations. The storage medium is the
//! caller's business; the orchestrator only promises to call `save` after
//! every mutation.
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::conversation::Conversation;

pub trait ConversationStore: Send + Sync {
    fn save(&self, conversation: &Conversation) -> Result<()>;
    fn delete(&self, id: &str) -> Result<()>;
    fn list_all(&self) -> Result<Vec<Conversation>>;
    fn current_id(&self) -> Result<Option<String>>;
    fn set_current_id(&self, id: &str) -> Result<()>;
}

/// In-memory store, for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    conversations: Mutex<HashMap<String, Conversation>>,
    current: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConversationStore for MemoryStore {
    fn save(&self, conversation: &Conversation) -> Result<()> {
        self.conversations
            .lock()
            .unwrap()
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.conversations.lock().unwrap().remove(id);
        let mut current = self.current.lock().unwrap();
        if current.as_deref() == Some(id) {
            *current = None;
        }
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<Conversation>> {
        let mut all: Vec<Conversation> =
            self.conversations.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }

    fn current_id(&self) -> Result<Option<String>> {
        Ok(self.current.lock().unwrap().clone())
    }

    fn set_current_id(&self, id: &str) -> Result<()> {
        *self.current.lock().unwrap() = Some(id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::Message;

    #[test]
    fn test_save_and_list() {
        let store = MemoryStore::new();
        let mut conversation = Conversation::new();
        conversation.add_message(Message::user().with_text("hello"));
        store.save(&conversation).unwrap();

        let all = store.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, conversation.id);
        assert_eq!(all[0].messages.len(), 1);
    }

    #[test]
    fn test_save_overwrites_by_id() {
        let store = MemoryStore::new();
        let mut conversation = Conversation::new();
        store.save(&conversation).unwrap();
        conversation.add_message(Message::user().with_text("again"));
        store.save(&conversation).unwrap();

        let all = store.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].messages.len(), 1);
    }

    #[test]
    fn test_delete_clears_current() {
        let store = MemoryStore::new();
        let conversation = Conversation::new();
        store.save(&conversation).unwrap();
        store.set_current_id(&conversation.id).unwrap();
        assert_eq!(store.current_id().unwrap(), Some(conversation.id.clone()));

        store.delete(&conversation.id).unwrap();
        assert_eq!(store.current_id().unwrap(), None);
        assert!(store.list_all().unwrap().is_empty());
    }
}
