/// Messaging components: the reactive projections over the conversation
/// collection plus the open-or-create entry point.
pub mod index;
pub mod timeline;
pub mod unread;

pub use index::{ConversationEntry, ConversationIndex};
pub use timeline::{ConversationTimeline, ImageFile, UploadState};
pub use unread::{badge_content, counts_toward_badge, UnreadBadge, UnreadCounter};

use crate::error::Result;
use crate::model::{Conversation, UserProfile};
use crate::store::ConversationStore;
use tracing::info;

/// Returns the conversation between the two users, creating a fresh one
/// only when no conversation with that exact participant pair exists.
/// Starting a chat with the same person twice always lands in the same
/// thread.
pub async fn open_or_create_conversation(
    store: &dyn ConversationStore,
    me: &UserProfile,
    other: &UserProfile,
) -> Result<String> {
    let existing = store.conversations_for(&me.user_id).await?;
    if let Some(found) = existing
        .iter()
        .find(|c| c.is_between(&me.user_id, &other.user_id))
    {
        return Ok(found.id.clone());
    }

    let conversation = Conversation::new_pair(me, other, store.server_time());
    let id = store.create(conversation).await?;
    info!(
        "Created conversation {} between {} and {}",
        id, me.user_id, other.user_id
    );
    Ok(id)
}
