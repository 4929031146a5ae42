use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use crate::error::StorageResult;
use crate::store::Store;

/// Filesystem-backed [`Store`] for single-node/dev use. Keys map
/// directly to file paths under a root directory; `public_url` points
/// at a `file://` path rather than an HTTP URL, which is fine since
/// local mode is never fronted by a CDN.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl Store for LocalStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> StorageResult<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(fs::try_exists(self.path_for(key)).await?)
    }

    fn public_url(&self, key: &str) -> String {
        format!("file://{}", self.path_for(key).display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn put_then_exists() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        assert!(!store.exists("a/b.ktx2").await.unwrap());
        store.put("a/b.ktx2", vec![1, 2, 3], "image/ktx2").await.unwrap();
        assert!(store.exists("a/b.ktx2").await.unwrap());
    }
}
