/// Blob storage for chat images, with observable upload progress.
///
/// Uploads report 0-100 percent on a watch channel and commit in one
/// final write: a failed upload leaves no partial blob behind.
use crate::error::{ChatError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::watch;
use tracing::debug;

/// URL scheme returned by the embedded blob store.
pub const BLOB_SCHEME: &str = "blob://";

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Uploads `bytes` under `path`, reporting percent-complete on
    /// `progress`, and returns the download URL.
    async fn upload(&self, path: &str, bytes: Bytes, progress: &watch::Sender<u8>)
        -> Result<String>;

    /// Fetches a previously uploaded blob by its download URL.
    async fn download(&self, url: &str) -> Result<Option<Bytes>>;
}

pub struct EmbeddedBlobStore {
    tree: sled::Tree,
    chunk_size: usize,
}

impl EmbeddedBlobStore {
    pub fn new(tree: sled::Tree, chunk_size: usize) -> Self {
        Self {
            tree,
            chunk_size: chunk_size.max(1),
        }
    }
}

#[async_trait]
impl BlobStore for EmbeddedBlobStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        progress: &watch::Sender<u8>,
    ) -> Result<String> {
        if bytes.is_empty() {
            return Err(ChatError::Upload("empty file".to_string()));
        }

        let total = bytes.len();
        let mut staged: Vec<u8> = Vec::with_capacity(total);
        for chunk in bytes.chunks(self.chunk_size) {
            staged.extend_from_slice(chunk);
            let percent = (staged.len() * 100 / total) as u8;
            let _ = progress.send(percent);
            // Yield between chunks so progress is observable mid-upload
            tokio::task::yield_now().await;
        }

        self.tree
            .insert(path.as_bytes(), staged)
            .map_err(|e| ChatError::Upload(format!("store blob: {}", e)))?;
        self.tree
            .flush()
            .map_err(|e| ChatError::Upload(format!("flush blob: {}", e)))?;

        debug!("Uploaded blob {} ({} bytes)", path, total);
        Ok(format!("{}{}", BLOB_SCHEME, path))
    }

    async fn download(&self, url: &str) -> Result<Option<Bytes>> {
        let path = url.strip_prefix(BLOB_SCHEME).unwrap_or(url);
        match self
            .tree
            .get(path.as_bytes())
            .map_err(|e| ChatError::Storage(format!("get blob: {}", e)))?
        {
            Some(raw) => Ok(Some(Bytes::copy_from_slice(&raw))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_blobs(chunk_size: usize) -> (TempDir, EmbeddedBlobStore) {
        let dir = TempDir::new().unwrap();
        let db = sled::open(dir.path().join("blobs.db")).unwrap();
        let tree = db.open_tree("blobs").unwrap();
        (dir, EmbeddedBlobStore::new(tree, chunk_size))
    }

    #[tokio::test]
    async fn test_upload_roundtrip_and_progress() {
        let (_dir, blobs) = open_blobs(4);
        let (tx, rx) = watch::channel(0u8);

        let payload = Bytes::from_static(b"0123456789");
        let url = blobs
            .upload("chat-images/c1/1-pic.png", payload.clone(), &tx)
            .await
            .unwrap();

        assert_eq!(url, "blob://chat-images/c1/1-pic.png");
        assert_eq!(*rx.borrow(), 100);
        assert_eq!(blobs.download(&url).await.unwrap(), Some(payload));
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let (_dir, blobs) = open_blobs(4);
        let (tx, _rx) = watch::channel(0u8);

        let err = blobs.upload("p", Bytes::new(), &tx).await.unwrap_err();
        assert!(matches!(err, ChatError::Upload(_)));
        assert_eq!(blobs.download("blob://p").await.unwrap(), None);
    }
}
