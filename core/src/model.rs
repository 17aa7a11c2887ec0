/// Conversation and message documents, plus the pure projections the
/// reactive components recompute on every observation.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Fixed list preview for image messages (never the image URL itself).
pub const IMAGE_PREVIEW: &str = "Sent an image";

/// Resolved identity from the auth provider; also the document shape in
/// the user directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub display_name: String,
    pub photo_url: Option<String>,
}

/// Message payload variants. Additional kinds extend here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageKind {
    Text { text: String },
    Image { image_url: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,

    #[serde(flatten)]
    pub kind: MessageKind,

    pub sender: String,

    /// Display fields snapshotted at send time. Deliberately never
    /// live-joined against the current profile: historical messages show
    /// the name the sender had when they sent them.
    pub sender_name: String,
    pub sender_photo: Option<String>,

    /// Store-assigned send time.
    pub timestamp: DateTime<Utc>,

    /// In-thread receipt marker. The list-level unread flag derives from
    /// `Conversation::last_message_seen_by`, not from this.
    pub read: bool,
}

impl Message {
    pub fn new(kind: MessageKind, sender: &UserProfile, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            sender: sender.user_id.clone(),
            sender_name: sender.display_name.clone(),
            sender_photo: sender.photo_url.clone(),
            timestamp,
            read: false,
        }
    }

    /// Short summary text for the conversation list.
    pub fn preview(&self) -> String {
        match &self.kind {
            MessageKind::Text { text } => text.clone(),
            MessageKind::Image { .. } => IMAGE_PREVIEW.to_string(),
        }
    }
}

/// A two-participant thread with denormalized summary fields for list
/// display. The summary fields always describe the tail of `messages`;
/// `ConversationStore::append_message` is the only place that keeps
/// that invariant and it does so atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,

    /// Ordered pair, index-paired with `user_names`.
    pub participants: Vec<String>,
    pub user_names: Vec<String>,

    #[serde(default)]
    pub photo_url: Option<String>,

    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_message_from: Option<String>,

    /// Users who have acknowledged the most recent message. Reset to
    /// just the sender on every append.
    #[serde(default)]
    pub last_message_seen_by: Vec<String>,

    /// Per-user last-read timestamps, advanced on open and on send.
    #[serde(default)]
    pub last_read: HashMap<String, DateTime<Utc>>,

    /// Append-only; insertion order is the display order.
    #[serde(default)]
    pub messages: Vec<Message>,

    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Fresh conversation between two users: empty summary, nothing seen,
    /// display names paired by participant index, counterpart's photo for
    /// list display.
    pub fn new_pair(me: &UserProfile, other: &UserProfile, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            participants: vec![me.user_id.clone(), other.user_id.clone()],
            user_names: vec![me.display_name.clone(), other.display_name.clone()],
            photo_url: other.photo_url.clone(),
            last_message: None,
            last_message_time: None,
            last_message_from: None,
            last_message_seen_by: Vec::new(),
            last_read: HashMap::new(),
            messages: Vec::new(),
            created_at,
        }
    }

    /// The participant who is not `viewer`, with the display name paired
    /// by index. None when the record has no such participant or the
    /// paired name is missing (malformed records are skipped, not errors).
    pub fn other_participant(&self, viewer: &str) -> Option<(&str, &str)> {
        let idx = self.participants.iter().position(|p| p != viewer)?;
        let name = self.user_names.get(idx)?;
        Some((self.participants[idx].as_str(), name.as_str()))
    }

    /// A conversation is unread for `viewer` iff the viewer has not
    /// acknowledged the most recent message.
    pub fn is_unread(&self, viewer: &str) -> bool {
        !self.last_message_seen_by.iter().any(|u| u == viewer)
    }

    /// Exact participant-pair match, membership only (order irrelevant).
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        self.participants.len() == 2
            && self.participants.iter().any(|p| p == a)
            && self.participants.iter().any(|p| p == b)
    }
}
