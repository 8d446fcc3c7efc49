//! LocalStore: the canonical on-disk layout for this worker's snapshot
//! filesystem, rooted at `storage_base_path` (spec.md §3, §4.6).
//!
//! Layout: `{base}/tenants/{tenant_id}/sources/{source_id}/snapshots/{snapshot_id}/`
//! holding `backup.tar.zst.enc`, `manifest.json`, `meta.json`.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use xvault_core::error::StorageOpError;
use xvault_core::ids::validate_path_segment;

pub struct LocalStore {
    base: PathBuf,
}

impl LocalStore {
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// The directory a snapshot's artifact and metadata files live in.
    /// Validates every id as a single safe path segment before joining;
    /// never trusts `tenant_id`/`source_id`/`snapshot_id` to already be safe.
    ///
    /// # Errors
    ///
    /// Returns [`StorageOpError::PathConfinement`] if any id contains path
    /// separators or traversal segments.
    pub fn snapshot_dir(&self, tenant_id: &str, source_id: &str, snapshot_id: &str) -> Result<PathBuf, StorageOpError> {
        for (label, segment) in [("tenant_id", tenant_id), ("source_id", source_id), ("snapshot_id", snapshot_id)] {
            validate_path_segment(segment)
                .map_err(|reason| StorageOpError::PathConfinement { path: format!("{label}={segment}: {reason}") })?;
        }
        Ok(self.base.join("tenants").join(tenant_id).join("sources").join(source_id).join("snapshots").join(snapshot_id))
    }

    /// The tenant's root directory, below which a `DeleteSnapshot` job may
    /// prune upward-empty parents, but never above.
    #[must_use]
    pub fn tenant_root(&self, tenant_id: &str) -> PathBuf {
        self.base.join("tenants").join(tenant_id)
    }

    /// Write `data` to `dir/filename`, `fsync`-ing the file and its parent
    /// directory on success. On any failure, the partial file is removed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageOpError::Io`] on filesystem failure, or
    /// [`StorageOpError::StorageFull`] if the write fails with `ENOSPC`.
    pub async fn write_file(&self, dir: &Path, filename: &str, data: &[u8]) -> Result<PathBuf, StorageOpError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| StorageOpError::Io { reason: format!("create_dir_all {}: {e}", dir.display()) })?;

        let path = dir.join(filename);
        let result = write_and_fsync(&path, data).await;

        if let Err(err) = &result {
            let _ = tokio::fs::remove_file(&path).await;
            if err.raw_os_error() == Some(libc_enospc()) {
                return Err(StorageOpError::StorageFull { reason: format!("{}: {err}", path.display()) });
            }
            return Err(StorageOpError::Io { reason: format!("{}: {err}", path.display()) });
        }

        fsync_dir(dir).await.map_err(|e| StorageOpError::Io { reason: format!("fsync parent {}: {e}", dir.display()) })?;

        Ok(path)
    }

    /// Remove `snapshots/{snapshot_id}/` entirely, then prune empty parent
    /// directories upward, stopping at (and never deleting) `tenants/{tenant_id}/`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageOpError::Io`] if the subtree cannot be removed.
    pub async fn delete_snapshot(&self, tenant_id: &str, source_id: &str, snapshot_id: &str) -> Result<(), StorageOpError> {
        let dir = self.snapshot_dir(tenant_id, source_id, snapshot_id)?;
        if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&dir)
                .await
                .map_err(|e| StorageOpError::Io { reason: format!("remove_dir_all {}: {e}", dir.display()) })?;
        }

        let tenant_root = self.tenant_root(tenant_id);
        let mut cursor = dir.parent().map(Path::to_path_buf);
        while let Some(parent) = cursor {
            if parent == tenant_root || !parent.starts_with(&tenant_root) {
                break;
            }
            match tokio::fs::read_dir(&parent).await {
                Ok(mut entries) if entries.next_entry().await.ok().flatten().is_none() => {
                    if tokio::fs::remove_dir(&parent).await.is_err() {
                        break;
                    }
                    cursor = parent.parent().map(Path::to_path_buf);
                }
                _ => break,
            }
        }
        Ok(())
    }
}

async fn write_and_fsync(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}

#[cfg(unix)]
async fn fsync_dir(dir: &Path) -> std::io::Result<()> {
    let file = tokio::fs::File::open(dir).await?;
    file.sync_all().await
}

#[cfg(not(unix))]
async fn fsync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn libc_enospc() -> i32 {
    libc::ENOSPC
}

#[cfg(not(unix))]
fn libc_enospc() -> i32 {
    28
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_file_roundtrips_and_fsyncs() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalStore::new(tmp.path());
        let dir = store.snapshot_dir("t1", "s1", "sn1").unwrap();
        let path = store.write_file(&dir, "manifest.json", b"{}").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"{}");
    }

    #[tokio::test]
    async fn snapshot_dir_rejects_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalStore::new(tmp.path());
        assert!(store.snapshot_dir("../escape", "s1", "sn1").is_err());
    }

    #[tokio::test]
    async fn delete_snapshot_prunes_empty_parents_but_not_tenant_root() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalStore::new(tmp.path());
        let dir = store.snapshot_dir("t1", "s1", "sn1").unwrap();
        store.write_file(&dir, "backup.tar.zst.enc", b"x").await.unwrap();

        store.delete_snapshot("t1", "s1", "sn1").await.unwrap();

        assert!(!dir.exists());
        assert!(store.tenant_root("t1").exists());
    }
}
