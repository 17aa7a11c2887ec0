/// ConversationIndex: a live, recency-ordered list of the signed-in
/// user's conversations, each entry tagged with an unread flag.
///
/// Pure projection over the store's snapshots; this component never
/// mutates data. Clearing unread state is the timeline's job when a
/// conversation is opened.
use crate::auth::{AuthState, SessionWatch};
use crate::model::Conversation;
use crate::store::{ConversationStore, StoreEvent};
use crate::utils::Subscription;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

/// One row of the conversation list, projected for a specific viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationEntry {
    pub conversation_id: String,
    pub other_user_id: String,
    pub other_user_name: String,
    pub photo_url: Option<String>,
    pub last_message: Option<String>,
    pub last_message_time: Option<DateTime<Utc>>,
    pub unread: bool,
}

/// Projects one conversation document for `viewer`. Returns None for
/// malformed records (no participants, no paired display name); those
/// are excluded from the list, never surfaced as errors.
pub fn project(conversation: &Conversation, viewer: &str) -> Option<ConversationEntry> {
    if conversation.participants.is_empty() || conversation.user_names.is_empty() {
        return None;
    }
    let (other_id, other_name) = conversation.other_participant(viewer)?;
    Some(ConversationEntry {
        conversation_id: conversation.id.clone(),
        other_user_id: other_id.to_string(),
        other_user_name: other_name.to_string(),
        photo_url: conversation.photo_url.clone(),
        last_message: conversation.last_message.clone(),
        last_message_time: conversation.last_message_time,
        unread: conversation.is_unread(viewer),
    })
}

pub struct ConversationIndex;

impl ConversationIndex {
    /// Spawns the live index for the session. While authentication is
    /// unresolved the feed stays empty and no store subscription exists;
    /// a signed-out session publishes an empty terminal list. A change
    /// of signed-in user re-subscribes. Dropping the handle cancels the
    /// whole thing.
    pub fn spawn(
        store: Arc<dyn ConversationStore>,
        mut session: SessionWatch,
    ) -> Subscription<Vec<ConversationEntry>> {
        let (tx, rx) = watch::channel(Vec::new());
        let task = tokio::spawn(async move {
            loop {
                let state = session.borrow_and_update().clone();
                match state {
                    AuthState::Unresolved => {
                        // Defer until the auth provider reports back
                        if session.changed().await.is_err() {
                            return;
                        }
                    }
                    AuthState::SignedOut => {
                        let _ = tx.send(Vec::new());
                        if session.changed().await.is_err() {
                            return;
                        }
                    }
                    AuthState::SignedIn(profile) => {
                        let mut events = store.subscribe();
                        debug!("Conversation index subscribed for {}", profile.user_id);
                        if !run_for_user(&store, &profile.user_id, &tx, &mut events, &mut session)
                            .await
                        {
                            return;
                        }
                    }
                }
            }
        });
        Subscription::new(rx, task)
    }
}

/// Recomputes on every store event until the session changes. Returns
/// false when the task should shut down for good.
async fn run_for_user(
    store: &Arc<dyn ConversationStore>,
    user_id: &str,
    tx: &watch::Sender<Vec<ConversationEntry>>,
    events: &mut broadcast::Receiver<StoreEvent>,
    session: &mut SessionWatch,
) -> bool {
    publish(store, user_id, tx).await;
    loop {
        tokio::select! {
            changed = session.changed() => return changed.is_ok(),
            event = events.recv() => match event {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    // Full-snapshot recompute; lagging costs nothing
                    publish(store, user_id, tx).await;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Store change feed closed");
                    return false;
                }
            },
        }
    }
}

async fn publish(
    store: &Arc<dyn ConversationStore>,
    user_id: &str,
    tx: &watch::Sender<Vec<ConversationEntry>>,
) {
    match store.conversations_for(user_id).await {
        Ok(conversations) => {
            let entries: Vec<ConversationEntry> = conversations
                .iter()
                .filter_map(|c| project(c, user_id))
                .collect();
            let _ = tx.send(entries);
        }
        Err(e) => warn!("Conversation query failed for {}: {}", user_id, e),
    }
}
