/// Embedded document store backed by sled.
///
/// Stands in for the hosted backend: named trees hold conversation and
/// user documents as JSON, a broadcast channel carries the change feed,
/// and a store-wide async mutex serializes read-modify-write cycles the
/// way the backend's document-level atomic mutation would.
use crate::error::{ChatError, Result};
use crate::model::{Conversation, Message, UserProfile};
use crate::store::blob::EmbeddedBlobStore;
use crate::store::{ConversationStore, StoreEvent, UserDirectory};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct EmbeddedStore {
    db: sled::Db,
    conversations: sled::Tree,
    users: sled::Tree,
    events: broadcast::Sender<StoreEvent>,
    write_lock: Arc<Mutex<()>>,
}

impl EmbeddedStore {
    /// Open (or create) the store under the given data directory.
    pub fn open(data_dir: &Path, event_capacity: usize) -> Result<Self> {
        let db_path = data_dir.join("neighborly.db");
        debug!("Opening store at {:?}", db_path);

        let db = sled::open(&db_path)
            .map_err(|e| ChatError::Storage(format!("Failed to open store: {}", e)))?;
        let conversations = db
            .open_tree("conversations")
            .map_err(|e| ChatError::Storage(format!("conversations tree: {}", e)))?;
        let users = db
            .open_tree("users")
            .map_err(|e| ChatError::Storage(format!("users tree: {}", e)))?;
        let (events, _) = broadcast::channel(event_capacity);

        info!("Store initialized at {:?}", db_path);
        Ok(Self {
            db,
            conversations,
            users,
            events,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Blob storage sharing the same database.
    pub fn blob_store(&self, chunk_size: usize) -> Result<EmbeddedBlobStore> {
        let tree = self
            .db
            .open_tree("blobs")
            .map_err(|e| ChatError::Storage(format!("blobs tree: {}", e)))?;
        Ok(EmbeddedBlobStore::new(tree, chunk_size))
    }

    fn load(&self, id: &str) -> Result<Option<Conversation>> {
        match self
            .conversations
            .get(id.as_bytes())
            .map_err(|e| ChatError::Storage(format!("get conversation: {}", e)))?
        {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    fn persist(&self, conversation: &Conversation) -> Result<()> {
        let raw = serde_json::to_vec(conversation)?;
        self.conversations
            .insert(conversation.id.as_bytes(), raw)
            .map_err(|e| ChatError::Storage(format!("put conversation: {}", e)))?;
        self.conversations
            .flush()
            .map_err(|e| ChatError::Storage(format!("flush conversations: {}", e)))?;
        Ok(())
    }

    fn emit(&self, conversation_id: &str) {
        let _ = self.events.send(StoreEvent {
            conversation_id: conversation_id.to_string(),
        });
    }
}

#[async_trait]
impl ConversationStore for EmbeddedStore {
    async fn get(&self, id: &str) -> Result<Option<Conversation>> {
        self.load(id)
    }

    async fn conversations_for(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let mut out = Vec::new();
        for entry in self.conversations.iter().flatten() {
            let (key, raw) = entry;
            match serde_json::from_slice::<Conversation>(&raw) {
                Ok(conv) => {
                    if conv.participants.iter().any(|p| p == user_id) {
                        out.push(conv);
                    }
                }
                Err(e) => {
                    // Undecodable documents are skipped, not errors
                    warn!(
                        "Skipping undecodable conversation {}: {}",
                        String::from_utf8_lossy(&key),
                        e
                    );
                }
            }
        }

        // Most recent first; empty conversations sort last
        out.sort_by(|a, b| {
            (b.last_message_time, b.created_at).cmp(&(a.last_message_time, a.created_at))
        });
        Ok(out)
    }

    async fn create(&self, conversation: Conversation) -> Result<String> {
        let _guard = self.write_lock.lock().await;
        let id = conversation.id.clone();
        self.persist(&conversation)?;
        drop(_guard);

        debug!("Created conversation {}", id);
        self.emit(&id);
        Ok(id)
    }

    async fn append_message(&self, id: &str, message: Message) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut conv = self
            .load(id)?
            .ok_or_else(|| ChatError::NotFound(format!("conversation {}", id)))?;

        // Summary fields track the tail of `messages` as one mutation;
        // the previous seen-by set is replaced by just the sender.
        let at = message.timestamp;
        conv.last_message = Some(message.preview());
        conv.last_message_time = Some(at);
        conv.last_message_from = Some(message.sender.clone());
        conv.last_message_seen_by = vec![message.sender.clone()];
        conv.last_read.insert(message.sender.clone(), at);
        conv.messages.push(message);

        self.persist(&conv)?;
        drop(_guard);

        debug!("Appended message to conversation {}", id);
        self.emit(id);
        Ok(())
    }

    async fn mark_seen(&self, id: &str, user_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut conv = self
            .load(id)?
            .ok_or_else(|| ChatError::NotFound(format!("conversation {}", id)))?;

        conv.last_read.insert(user_id.to_string(), self.server_time());
        if !conv.last_message_seen_by.iter().any(|u| u == user_id) {
            conv.last_message_seen_by.push(user_id.to_string());
        }

        // In-thread receipts for everything the counterpart sent
        let mut receipts = 0;
        for msg in conv.messages.iter_mut() {
            if msg.sender != user_id && !msg.read {
                msg.read = true;
                receipts += 1;
            }
        }

        self.persist(&conv)?;
        drop(_guard);

        if receipts > 0 {
            debug!("Marked {} messages read in conversation {}", receipts, id);
        }
        self.emit(id);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn server_time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[async_trait]
impl UserDirectory for EmbeddedStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        match self
            .users
            .get(user_id.as_bytes())
            .map_err(|e| ChatError::Storage(format!("get user: {}", e)))?
        {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    async fn put_user(&self, profile: &UserProfile) -> Result<()> {
        let raw = serde_json::to_vec(profile)?;
        self.users
            .insert(profile.user_id.as_bytes(), raw)
            .map_err(|e| ChatError::Storage(format!("put user: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MessageKind;
    use tempfile::TempDir;

    fn user(id: &str, name: &str) -> UserProfile {
        UserProfile {
            user_id: id.to_string(),
            display_name: name.to_string(),
            photo_url: None,
        }
    }

    fn open_store() -> (TempDir, EmbeddedStore) {
        let dir = TempDir::new().unwrap();
        let store = EmbeddedStore::open(dir.path(), 16).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_dir, store) = open_store();
        let conv = Conversation::new_pair(&user("a", "Ana"), &user("b", "Ben"), store.server_time());
        let id = store.create(conv.clone()).await.unwrap();

        let loaded = store.get(&id).await.unwrap().unwrap();
        assert_eq!(loaded.participants, vec!["a", "b"]);
        assert_eq!(loaded.last_message, None);

        // Not found
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_append_updates_summary_atomically() {
        let (_dir, store) = open_store();
        let ana = user("a", "Ana");
        let conv = Conversation::new_pair(&ana, &user("b", "Ben"), store.server_time());
        let id = store.create(conv).await.unwrap();

        let msg = Message::new(
            MessageKind::Text {
                text: "hello".to_string(),
            },
            &ana,
            store.server_time(),
        );
        let sent_at = msg.timestamp;
        store.append_message(&id, msg).await.unwrap();

        let loaded = store.get(&id).await.unwrap().unwrap();
        assert_eq!(loaded.last_message.as_deref(), Some("hello"));
        assert_eq!(loaded.last_message_from.as_deref(), Some("a"));
        assert_eq!(loaded.last_message_time, Some(sent_at));
        assert_eq!(loaded.last_message_seen_by, vec!["a"]);
        assert_eq!(loaded.last_read.get("a"), Some(&sent_at));

        let tail = loaded.messages.last().unwrap();
        assert_eq!(tail.sender, "a");
        assert_eq!(tail.timestamp, sent_at);
    }

    #[tokio::test]
    async fn test_conversations_for_ordering() {
        let (_dir, store) = open_store();
        let ana = user("a", "Ana");
        let ben = user("b", "Ben");
        let cem = user("c", "Cem");

        let first = store
            .create(Conversation::new_pair(&ana, &ben, store.server_time()))
            .await
            .unwrap();
        let second = store
            .create(Conversation::new_pair(&ana, &cem, store.server_time()))
            .await
            .unwrap();

        // A message in the older conversation moves it to the top
        let msg = Message::new(
            MessageKind::Text {
                text: "ping".to_string(),
            },
            &ben,
            store.server_time(),
        );
        store.append_message(&first, msg).await.unwrap();

        let list = store.conversations_for("a").await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, first);
        assert_eq!(list[1].id, second);

        // Cem only participates in one
        let list = store.conversations_for("c").await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, second);
    }

    #[tokio::test]
    async fn test_mark_seen_reaches_both_representations() {
        let (_dir, store) = open_store();
        let ana = user("a", "Ana");
        let conv = Conversation::new_pair(&ana, &user("b", "Ben"), store.server_time());
        let id = store.create(conv).await.unwrap();

        let msg = Message::new(
            MessageKind::Text {
                text: "hi Ben".to_string(),
            },
            &ana,
            store.server_time(),
        );
        store.append_message(&id, msg).await.unwrap();
        store.mark_seen(&id, "b").await.unwrap();

        let loaded = store.get(&id).await.unwrap().unwrap();
        assert!(!loaded.is_unread("b"));
        assert!(loaded.last_read.contains_key("b"));
        // Receipt flipped on Ana's message, visible to her thread view
        assert!(loaded.messages[0].read);
    }

    #[tokio::test]
    async fn test_change_feed_fires_per_mutation() {
        let (_dir, store) = open_store();
        let mut events = store.subscribe();

        let conv =
            Conversation::new_pair(&user("a", "Ana"), &user("b", "Ben"), store.server_time());
        let id = store.create(conv).await.unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.conversation_id, id);
    }

    #[tokio::test]
    async fn test_user_directory_roundtrip() {
        let (_dir, store) = open_store();
        let ana = user("a", "Ana");
        store.put_user(&ana).await.unwrap();

        assert_eq!(store.get_user("a").await.unwrap(), Some(ana));
        assert_eq!(store.get_user("zz").await.unwrap(), None);
    }
}
