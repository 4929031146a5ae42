use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;

use crate::error::KvResult;
use crate::kv::Kv;

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    value: String,
    /// Unix seconds after which this entry should be treated as absent.
    /// `None` means no expiry.
    expires_at: Option<u64>,
}

/// Filesystem-backed [`Kv`] for single-node/dev use: one JSON file per
/// key under a root directory. Not suitable for concurrent multi-process
/// use beyond what the OS's atomic rename gives us.
pub struct LocalKv {
    root: PathBuf,
}

impl LocalKv {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.root.join(hex::encode(digest))
    }

    async fn read_entry(&self, key: &str) -> KvResult<Option<Entry>> {
        let path = self.path_for(key);
        let raw = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: Entry = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(_) => return Ok(None),
        };
        if let Some(expires_at) = entry.expires_at {
            if now_secs() >= expires_at {
                let _ = fs::remove_file(&path).await;
                return Ok(None);
            }
        }
        Ok(Some(entry))
    }

    async fn write_entry(&self, key: &str, entry: &Entry) -> KvResult<()> {
        fs::create_dir_all(&self.root).await?;
        let path = self.path_for(key);
        let tmp = tmp_path(&path);
        fs::write(&tmp, serde_json::to_vec(entry).unwrap_or_default()).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    path.with_extension("tmp")
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[async_trait]
impl Kv for LocalKv {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        Ok(self.read_entry(key).await?.map(|e| e.value))
    }

    async fn mget(&self, keys: &[String]) -> KvResult<Vec<Option<String>>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.get(key).await?);
        }
        Ok(out)
    }

    async fn set(&self, key: &str, value: &str) -> KvResult<()> {
        self.write_entry(
            key,
            &Entry {
                value: value.to_string(),
                expires_at: None,
            },
        )
        .await
    }

    async fn mset(&self, pairs: &[(String, String)]) -> KvResult<()> {
        for (key, value) in pairs {
            self.set(key, value).await?;
        }
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> KvResult<()> {
        self.write_entry(
            key,
            &Entry {
                value: value.to_string(),
                expires_at: Some(now_secs() + ttl_secs),
            },
        )
        .await
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> KvResult<bool> {
        if self.read_entry(key).await?.is_some() {
            return Ok(false);
        }
        self.set_ex(key, value, ttl_secs).await?;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> KvResult<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
