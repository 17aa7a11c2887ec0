/// ConversationTimeline: the open conversation. Message history feed in
/// stored append order, the composer, image upload with observable
/// progress, and read-marker maintenance on open.
use crate::error::{ChatError, Result};
use crate::model::{Message, MessageKind, UserProfile};
use crate::notify::ToastHub;
use crate::store::{BlobStore, ConversationStore, StoreEvent, UserDirectory};
use crate::utils::Subscription;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

/// A picked file handed to `send_image`.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Uploading,
}

pub struct ConversationTimeline {
    store: Arc<dyn ConversationStore>,
    blobs: Arc<dyn BlobStore>,
    toasts: ToastHub,
    conversation_id: String,
    viewer: UserProfile,
    other_user: Option<UserProfile>,
    draft: String,
    upload_state: UploadState,
    progress_tx: watch::Sender<u8>,
    progress_rx: watch::Receiver<u8>,
    feed: Subscription<Vec<Message>>,
}

impl ConversationTimeline {
    /// Opens the conversation for `viewer`: marks it seen (so the index
    /// computes it read from now on), resolves the counterpart's
    /// profile, and starts the snapshot feed. NotFound comes back as an
    /// error for the caller's fallback state.
    pub async fn open(
        store: Arc<dyn ConversationStore>,
        directory: &dyn UserDirectory,
        blobs: Arc<dyn BlobStore>,
        toasts: ToastHub,
        viewer: UserProfile,
        conversation_id: &str,
    ) -> Result<Self> {
        // Subscribe before the first fetch so mutations racing with open,
        // including our own mark_seen, still reach the feed.
        let events = store.subscribe();

        let conversation = store
            .get(conversation_id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("conversation {}", conversation_id)))?;

        // Opening clears the unread state for this viewer
        store.mark_seen(conversation_id, &viewer.user_id).await?;

        let other_user = match conversation.other_participant(&viewer.user_id) {
            Some((other_id, _)) => match directory.get_user(other_id).await {
                Ok(profile) => profile,
                Err(e) => {
                    // Header falls back to the denormalized name
                    warn!("Profile lookup failed for {}: {}", other_id, e);
                    None
                }
            },
            None => None,
        };

        let feed = spawn_feed(
            store.clone(),
            events,
            conversation_id.to_string(),
            conversation.messages,
        );
        let (progress_tx, progress_rx) = watch::channel(0);

        debug!(
            "Opened conversation {} for {}",
            conversation_id, viewer.user_id
        );
        Ok(Self {
            store,
            blobs,
            toasts,
            conversation_id: conversation_id.to_string(),
            viewer,
            other_user,
            draft: String::new(),
            upload_state: UploadState::Idle,
            progress_tx,
            progress_rx,
            feed,
        })
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn other_user(&self) -> Option<&UserProfile> {
        self.other_user.as_ref()
    }

    /// Current message history, in stored append order. Arrival order of
    /// change notifications never reorders it.
    pub fn messages(&self) -> Vec<Message> {
        self.feed.current()
    }

    /// Waits for the next history snapshot.
    pub async fn next_snapshot(&mut self) -> bool {
        self.feed.changed().await
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Sends the current draft as a text message. Whitespace-only drafts
    /// are silently ignored: no message, no summary mutation. On success
    /// the draft clears; on backend failure it is preserved for retry
    /// and the failure is also surfaced as a toast.
    pub async fn send_text(&mut self) -> Result<()> {
        let text = self.draft.trim().to_string();
        if text.is_empty() {
            return Ok(());
        }

        let message = Message::new(
            MessageKind::Text { text },
            &self.viewer,
            self.store.server_time(),
        );
        let appended = self.store.append_message(&self.conversation_id, message).await;
        match appended {
            Ok(()) => {
                self.draft.clear();
                Ok(())
            }
            Err(e) => {
                warn!("Send failed in {}: {}", self.conversation_id, e);
                self.toasts.error("Failed to send message");
                Err(e)
            }
        }
    }

    pub fn upload_state(&self) -> UploadState {
        self.upload_state
    }

    /// Percent-complete feed for the in-flight upload (0 when idle).
    pub fn upload_progress(&self) -> watch::Receiver<u8> {
        self.progress_rx.clone()
    }

    /// Uploads an image and appends it as a message. Non-image files are
    /// rejected before any upload starts. An upload failure resets the
    /// state to idle and appends nothing; the list summary for a
    /// successful send is the fixed placeholder, never the URL.
    pub async fn send_image(&mut self, file: ImageFile) -> Result<()> {
        if !file.content_type.starts_with("image/") {
            self.toasts.error("Please upload only images");
            return Err(ChatError::Validation(format!(
                "not an image: {}",
                file.content_type
            )));
        }

        self.upload_state = UploadState::Uploading;
        let _ = self.progress_tx.send(0);

        // Per-conversation, time-namespaced path to avoid collisions
        let path = format!(
            "chat-images/{}/{}-{}",
            self.conversation_id,
            self.store.server_time().timestamp_millis(),
            file.name
        );

        let uploaded = self.blobs.upload(&path, file.bytes, &self.progress_tx).await;
        let image_url = match uploaded {
            Ok(url) => url,
            Err(e) => {
                warn!("Upload failed in {}: {}", self.conversation_id, e);
                self.toasts.error("Failed to upload image");
                self.reset_upload();
                return Err(e);
            }
        };

        let message = Message::new(
            MessageKind::Image { image_url },
            &self.viewer,
            self.store.server_time(),
        );
        let appended = self.store.append_message(&self.conversation_id, message).await;
        self.reset_upload();

        match appended {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Image send failed in {}: {}", self.conversation_id, e);
                self.toasts.error("Failed to send message");
                Err(e)
            }
        }
    }

    fn reset_upload(&mut self) {
        self.upload_state = UploadState::Idle;
        let _ = self.progress_tx.send(0);
    }
}

/// Snapshot feed for a single conversation document. Each change event
/// triggers a fresh fetch; the published history is always the stored
/// append order.
fn spawn_feed(
    store: Arc<dyn ConversationStore>,
    mut events: broadcast::Receiver<StoreEvent>,
    conversation_id: String,
    initial: Vec<Message>,
) -> Subscription<Vec<Message>> {
    let (tx, rx) = watch::channel(initial);
    let task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) if event.conversation_id != conversation_id => continue,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    match store.get(&conversation_id).await {
                        Ok(Some(conversation)) => {
                            let _ = tx.send(conversation.messages);
                        }
                        Ok(None) => debug!("Conversation {} disappeared", conversation_id),
                        Err(e) => warn!("Snapshot fetch failed for {}: {}", conversation_id, e),
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    });
    Subscription::new(rx, task)
}
