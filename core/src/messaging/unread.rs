/// UnreadCounter: reduces the signed-in user's conversation set to a
/// single badge count for navigation chrome.
///
/// Shares the index's subscription criteria but applies the stricter
/// badge rule, and supports an optimistic local reset when the user
/// enters the message list, ahead of the eventual per-conversation
/// mark-as-seen.
use crate::auth::{AuthState, SessionWatch};
use crate::model::Conversation;
use crate::store::{ConversationStore, StoreEvent};
use crate::utils::Subscription;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, warn};

/// A conversation counts toward the badge only when all three hold:
/// the viewer has not seen the last message, the last message is from
/// the other participant, and a last message exists at all.
pub fn counts_toward_badge(conversation: &Conversation, viewer: &str) -> bool {
    let is_unread = conversation.is_unread(viewer);
    let from_other = conversation.last_message_from.as_deref() != Some(viewer);
    let has_message = conversation
        .last_message
        .as_deref()
        .map_or(false, |m| !m.is_empty());
    is_unread && from_other && has_message
}

/// Zero renders as no badge rather than a literal 0.
pub fn badge_content(count: usize) -> Option<usize> {
    if count == 0 {
        None
    } else {
        Some(count)
    }
}

/// Handle on the live badge count.
pub struct UnreadBadge {
    sub: Subscription<usize>,
    reset_tx: mpsc::Sender<()>,
}

impl UnreadBadge {
    pub fn count(&self) -> usize {
        self.sub.current()
    }

    pub async fn changed(&mut self) -> bool {
        self.sub.changed().await
    }

    pub fn receiver(&self) -> watch::Receiver<usize> {
        self.sub.receiver()
    }

    /// Optimistic local reset on entering the message list: the
    /// displayed count drops to zero immediately, and the next store
    /// event recomputes the authoritative value once the individual
    /// conversations are actually marked seen.
    pub fn reset_display(&self) {
        let _ = self.reset_tx.try_send(());
    }
}

pub struct UnreadCounter;

impl UnreadCounter {
    /// Same deferral and re-subscription rules as the conversation index.
    pub fn spawn(store: Arc<dyn ConversationStore>, mut session: SessionWatch) -> UnreadBadge {
        let (tx, rx) = watch::channel(0usize);
        let (reset_tx, mut reset_rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            loop {
                let state = session.borrow_and_update().clone();
                match state {
                    AuthState::Unresolved => {
                        if session.changed().await.is_err() {
                            return;
                        }
                    }
                    AuthState::SignedOut => {
                        let _ = tx.send(0);
                        if session.changed().await.is_err() {
                            return;
                        }
                    }
                    AuthState::SignedIn(profile) => {
                        let mut events = store.subscribe();
                        debug!("Unread counter subscribed for {}", profile.user_id);
                        if !count_for_user(
                            &store,
                            &profile.user_id,
                            &tx,
                            &mut events,
                            &mut session,
                            &mut reset_rx,
                        )
                        .await
                        {
                            return;
                        }
                    }
                }
            }
        });
        UnreadBadge {
            sub: Subscription::new(rx, task),
            reset_tx,
        }
    }
}

async fn count_for_user(
    store: &Arc<dyn ConversationStore>,
    user_id: &str,
    tx: &watch::Sender<usize>,
    events: &mut broadcast::Receiver<StoreEvent>,
    session: &mut SessionWatch,
    reset_rx: &mut mpsc::Receiver<()>,
) -> bool {
    publish_count(store, user_id, tx).await;
    loop {
        tokio::select! {
            changed = session.changed() => return changed.is_ok(),
            reset = reset_rx.recv() => match reset {
                Some(()) => {
                    // Display-only; no data mutation here
                    let _ = tx.send(0);
                }
                None => return false,
            },
            event = events.recv() => match event {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    publish_count(store, user_id, tx).await;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Store change feed closed");
                    return false;
                }
            },
        }
    }
}

async fn publish_count(
    store: &Arc<dyn ConversationStore>,
    user_id: &str,
    tx: &watch::Sender<usize>,
) {
    match store.conversations_for(user_id).await {
        Ok(conversations) => {
            let count = conversations
                .iter()
                .filter(|c| counts_toward_badge(c, user_id))
                .count();
            let _ = tx.send(count);
        }
        Err(e) => warn!("Unread count query failed for {}: {}", user_id, e),
    }
}
