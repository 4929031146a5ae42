//! Filesystem helpers for moving worker scratch files across possibly
//! different filesystems (temp dir vs. work dir).

use std::path::Path;
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Move a file from `src` to `dst`, falling back to copy-and-delete on a
/// cross-device rename (`EXDEV`).
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => copy_and_delete(src, dst).await,
        Err(e) => Err(MediaError::from(e)),
    }
}

fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    let tmp_dst = dst.with_extension("tmp");
    fs::copy(src, &tmp_dst).await?;
    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        let _ = fs::remove_file(&tmp_dst).await;
        return Err(MediaError::from(e));
    }
    let _ = fs::remove_file(src).await;
    Ok(())
}

/// Best-effort recursive delete; logs on failure instead of propagating,
/// since it runs on every exit path of a conversion job, including failure
/// ones, and cleanup should never be what fails the job.
pub async fn remove_dir_best_effort(path: impl AsRef<Path>) {
    let path = path.as_ref();
    if let Err(e) = fs::remove_dir_all(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to clean up scratch directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn move_file_same_filesystem() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.txt");
        let dst = dir.path().join("dest.txt");
        fs::write(&src, b"hello").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn move_file_creates_destination_subdirectory() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.txt");
        let dst = dir.path().join("nested").join("dest.txt");
        fs::write(&src, b"hi").await.unwrap();

        move_file(&src, &dst).await.unwrap();
        assert!(dst.exists());
    }

    #[tokio::test]
    async fn remove_dir_best_effort_on_missing_path_does_not_panic() {
        remove_dir_best_effort("/nonexistent/scratch/dir").await;
    }
}
