use anyhow::Result;
use std::fs;
use std::path::PathBuf;

use parley::models::conversation::Conversation;
use parley::store::ConversationStore;

/// One JSON file per conversation under the config directory, plus a
/// `current` marker file holding the active conversation id.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(Self { dir })
    }

    /// The default location, `~/.config/parley/conversations`.
    pub fn default_dir() -> Result<PathBuf> {
        let home_dir =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
        Ok(home_dir.join(".config").join("parley").join("conversations"))
    }

    fn conversation_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn current_path(&self) -> PathBuf {
        self.dir.join("current")
    }

    pub fn load(&self, id: &str) -> Result<Option<Conversation>> {
        let path = self.conversation_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}

impl ConversationStore for FileStore {
    fn save(&self, conversation: &Conversation) -> Result<()> {
        let content = serde_json::to_string_pretty(conversation)?;
        fs::write(self.conversation_path(&conversation.id), content)?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        let path = self.conversation_path(id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        if self.current_id()?.as_deref() == Some(id) {
            let _ = fs::remove_file(self.current_path());
        }
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<Conversation>> {
        let mut conversations = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|content| Ok(serde_json::from_str::<Conversation>(&content)?))
            {
                Ok(conversation) => conversations.push(conversation),
                Err(e) => eprintln!("skipping unreadable conversation {path:?}: {e}"),
            }
        }
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    fn current_id(&self) -> Result<Option<String>> {
        let path = self.current_path();
        if !path.exists() {
            return Ok(None);
        }
        let id = fs::read_to_string(path)?;
        let id = id.trim().to_string();
        Ok(if id.is_empty() { None } else { Some(id) })
    }

    fn set_current_id(&self, id: &str) -> Result<()> {
        fs::write(self.current_path(), id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley::models::message::Message;
    use tempfile::tempdir;

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();

        let mut conversation = Conversation::new();
        conversation.add_message(Message::user().with_text("hello"));
        store.save(&conversation).unwrap();

        // Timestamps persist at second precision, so compare the fields
        // that survive the round trip exactly.
        let loaded = store.load(&conversation.id).unwrap().unwrap();
        assert_eq!(loaded.id, conversation.id);
        assert_eq!(loaded.title, conversation.title);
        assert_eq!(loaded.messages, conversation.messages);
        assert_eq!(store.load("missing").unwrap(), None);
    }

    #[test]
    fn test_list_all_sorted_newest_first() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();

        let mut older = Conversation::new();
        older.updated_at = older.updated_at - chrono::Duration::minutes(5);
        let newer = Conversation::new();
        store.save(&older).unwrap();
        store.save(&newer).unwrap();

        let all = store.list_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, newer.id);
    }

    #[test]
    fn test_current_id_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();

        assert_eq!(store.current_id().unwrap(), None);
        store.set_current_id("abc").unwrap();
        assert_eq!(store.current_id().unwrap(), Some("abc".to_string()));
    }

    #[test]
    fn test_delete_removes_file_and_current_marker() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();

        let conversation = Conversation::new();
        store.save(&conversation).unwrap();
        store.set_current_id(&conversation.id).unwrap();

        store.delete(&conversation.id).unwrap();
        assert!(store.list_all().unwrap().is_empty());
        assert_eq!(store.current_id().unwrap(), None);
    }
}
