/// NeighborlyNeeds messaging core - demo entry point
///
/// Drives a short two-user chat session against a local store and logs
/// what each reactive component observes.
use bytes::Bytes;
use neighborly_core::messaging::{
    self, badge_content, ConversationIndex, ConversationTimeline, ImageFile, UnreadCounter,
};
use neighborly_core::store::{BlobStore, ConversationStore, UserDirectory};
use neighborly_core::{Config, EmbeddedStore, Session, ToastHub, UserProfile};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse configuration
    let args: Vec<String> = env::args().collect();
    let config =
        Config::from_args(&args).map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    std::fs::create_dir_all(&config.data_dir)?;

    let store = Arc::new(EmbeddedStore::open(&config.data_dir, config.event_capacity)?);
    let store_dyn: Arc<dyn ConversationStore> = store.clone();
    let blobs: Arc<dyn BlobStore> = Arc::new(store.blob_store(config.upload_chunk_size)?);
    let toasts = ToastHub::new(config.event_capacity);

    // Log toasts the way the UI would show them
    let mut toast_rx = toasts.subscribe();
    tokio::spawn(async move {
        while let Ok(toast) = toast_rx.recv().await {
            info!("[toast] {:?}: {}", toast.level, toast.text);
        }
    });

    let ana = UserProfile {
        user_id: "ana".to_string(),
        display_name: "Ana".to_string(),
        photo_url: None,
    };
    let ben = UserProfile {
        user_id: "ben".to_string(),
        display_name: "Ben".to_string(),
        photo_url: None,
    };
    store.put_user(&ana).await?;
    store.put_user(&ben).await?;

    // Ben's chrome, spawned before his auth resolves: both components
    // defer until the session is signed in
    let (ben_session, ben_watch) = Session::new();
    let index = ConversationIndex::spawn(store_dyn.clone(), ben_watch.clone());
    let badge = UnreadCounter::spawn(store_dyn.clone(), ben_watch);
    info!(
        "Index before sign-in: {} entries (deferred)",
        index.current().len()
    );

    ben_session.sign_in(ben.clone());

    // Ana starts (or reuses) the conversation and says hello
    let conversation_id =
        messaging::open_or_create_conversation(store.as_ref(), &ana, &ben).await?;
    let mut ana_timeline = ConversationTimeline::open(
        store_dyn.clone(),
        store.as_ref() as &dyn UserDirectory,
        blobs.clone(),
        toasts.clone(),
        ana.clone(),
        &conversation_id,
    )
    .await?;
    ana_timeline.set_draft("Anyone have a ladder I could borrow this weekend?");
    ana_timeline.send_text().await?;

    sleep(Duration::from_millis(100)).await;
    info!("Ben's badge: {:?}", badge_content(badge.count()));
    for entry in index.current() {
        info!(
            "  {} - {:?} (unread: {})",
            entry.other_user_name, entry.last_message, entry.unread
        );
    }

    // Ben enters the message list: the displayed badge resets at once
    badge.reset_display();
    sleep(Duration::from_millis(50)).await;
    info!(
        "Badge after entering message list: {:?}",
        badge_content(badge.count())
    );

    // Ben opens the thread (read markers catch up server-side) and replies
    let mut ben_timeline = ConversationTimeline::open(
        store_dyn.clone(),
        store.as_ref() as &dyn UserDirectory,
        blobs.clone(),
        toasts.clone(),
        ben.clone(),
        &conversation_id,
    )
    .await?;
    ben_timeline.set_draft("I do! Come by tomorrow morning.");
    ben_timeline.send_text().await?;

    // Ana replies with a photo
    let photo = ImageFile {
        name: "gutter.png".to_string(),
        content_type: "image/png".to_string(),
        bytes: Bytes::from(vec![0u8; 48 * 1024]),
    };
    ana_timeline.send_image(photo).await?;

    sleep(Duration::from_millis(100)).await;
    info!("Thread as Ben sees it:");
    for message in ben_timeline.messages() {
        info!("  [{}] {}", message.sender_name, message.preview());
    }
    info!("Ben's badge now: {:?}", badge_content(badge.count()));

    Ok(())
}
