/// Transient user-facing notifications (the toast surface).
///
/// Backend-call failures never propagate past the component that made
/// the call; they land here and render as short-lived banners.
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub level: ToastLevel,
    pub text: String,
}

/// Broadcast hub for toasts. Publishing with no listeners is fine.
#[derive(Clone)]
pub struct ToastHub {
    tx: broadcast::Sender<Toast>,
}

impl ToastHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Toast> {
        self.tx.subscribe()
    }

    pub fn info(&self, text: impl Into<String>) {
        self.publish(ToastLevel::Info, text.into());
    }

    pub fn error(&self, text: impl Into<String>) {
        self.publish(ToastLevel::Error, text.into());
    }

    fn publish(&self, level: ToastLevel, text: String) {
        debug!("Toast ({:?}): {}", level, text);
        let _ = self.tx.send(Toast { level, text });
    }
}
