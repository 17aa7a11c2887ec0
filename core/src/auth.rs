/// Session state shared with every reactive component.
///
/// "Not yet resolved" is distinct from "resolved, signed out" so that
/// subscriptions never race ahead of authentication: components defer
/// while `Unresolved`, publish an empty terminal result while
/// `SignedOut`, and re-subscribe when the signed-in user changes.
use crate::model::UserProfile;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthState {
    #[default]
    Unresolved,
    SignedOut,
    SignedIn(UserProfile),
}

impl AuthState {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            AuthState::SignedIn(profile) => Some(profile.user_id.as_str()),
            _ => None,
        }
    }
}

/// Receiving side handed to components.
pub type SessionWatch = watch::Receiver<AuthState>;

/// Owning side of the session state, driven by the auth provider.
pub struct Session {
    tx: watch::Sender<AuthState>,
}

impl Session {
    /// Starts in `Unresolved` until the auth provider reports back.
    pub fn new() -> (Self, SessionWatch) {
        let (tx, rx) = watch::channel(AuthState::Unresolved);
        (Self { tx }, rx)
    }

    pub fn sign_in(&self, profile: UserProfile) {
        info!("Session signed in as {}", profile.user_id);
        self.tx.send_replace(AuthState::SignedIn(profile));
    }

    pub fn sign_out(&self) {
        info!("Session signed out");
        self.tx.send_replace(AuthState::SignedOut);
    }

    pub fn watch(&self) -> SessionWatch {
        self.tx.subscribe()
    }
}
