/// Document-store seam: the external collaborator contracts consumed by
/// the messaging components.
///
/// Subscriptions are snapshot-based. The change feed only says that a
/// conversation changed; subscribers re-query and recompute their whole
/// derived output from the current data, so a lagged receiver loses
/// nothing but time. Reconnect/retry for a lost feed is the store's
/// concern, never the components'.
pub mod blob;
pub mod embedded;

use crate::error::Result;
use crate::model::{Conversation, Message, UserProfile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

pub use blob::{BlobStore, EmbeddedBlobStore};
pub use embedded::EmbeddedStore;

/// Change-feed notification, broadcast after every successful mutation.
#[derive(Debug, Clone)]
pub struct StoreEvent {
    pub conversation_id: String,
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Single-document fetch.
    async fn get(&self, id: &str) -> Result<Option<Conversation>>;

    /// All conversations the user participates in, most recent first
    /// (by `last_message_time`; conversations with no messages sort last).
    async fn conversations_for(&self, user_id: &str) -> Result<Vec<Conversation>>;

    /// Persists a new conversation document and returns its id.
    async fn create(&self, conversation: Conversation) -> Result<String>;

    /// Atomic append+merge: pushes `message` and brings the summary
    /// fields (`last_message`, `last_message_time`, `last_message_from`,
    /// `last_message_seen_by` reset to just the sender, the sender's
    /// `last_read`) in line with it as one document mutation. Two
    /// near-simultaneous senders cannot interleave inside it.
    async fn append_message(&self, id: &str, message: Message) -> Result<()>;

    /// Advances the viewer's read markers: `last_read` to server time,
    /// membership in `last_message_seen_by`, and in-thread receipts
    /// (`Message::read`) for messages from the counterpart.
    async fn mark_seen(&self, id: &str, user_id: &str) -> Result<()>;

    /// Change feed; every mutation fires one event.
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;

    /// Store-assigned clock. Every ordering-relevant timestamp comes
    /// from here, never from a client clock.
    fn server_time(&self) -> DateTime<Utc>;
}

/// One-off profile lookups (the `users` collection).
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>>;
    async fn put_user(&self, profile: &UserProfile) -> Result<()>;
}
