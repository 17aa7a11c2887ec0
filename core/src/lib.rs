/// NeighborlyNeeds messaging core
///
/// Conversation synchronization for a two-participant chat: a live
/// conversation index, an unread badge counter, and a per-conversation
/// timeline, all running as cancelable snapshot subscriptions over an
/// embedded document store.

pub mod auth;
pub mod config;
pub mod error;
pub mod messaging;
pub mod model;
pub mod notify;
pub mod store;
pub mod utils;

pub use auth::{AuthState, Session, SessionWatch};
pub use config::Config;
pub use error::{ChatError, Result};
pub use model::{Conversation, Message, MessageKind, UserProfile};
pub use notify::{Toast, ToastHub, ToastLevel};
pub use store::{BlobStore, ConversationStore, EmbeddedStore, StoreEvent, UserDirectory};
