//! Manuscript storage abstraction
//!
//! Provides a unified interface for manuscript backends:
//! - Local filesystem, content-addressed by SHA-256
//! - In-memory, for tests and throwaway deployments
//!
//! References handed out here are opaque to the lifecycle engine; it stores
//! them on the submission and never interprets them.

use crate::config::{ManuscriptBackend, ManuscriptConfig};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

const REFERENCE_PREFIX: &str = "sha256:";

/// Trait for manuscript storage
#[async_trait]
pub trait ManuscriptStore: Send + Sync {
    /// Store manuscript bytes, returning an opaque reference
    async fn store(&self, bytes: &[u8]) -> Result<String>;

    /// Fetch the bytes behind a reference
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>>;

    /// Get the backend name
    fn backend_name(&self) -> &str;
}

/// Content-address the given bytes
pub fn content_reference(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{}{}", REFERENCE_PREFIX, hex::encode(hasher.finalize()))
}

/// Pull the hex digest out of a reference, rejecting anything malformed
fn digest_of(reference: &str) -> Result<&str> {
    reference
        .strip_prefix(REFERENCE_PREFIX)
        .filter(|digest| digest.len() == 64 && digest.bytes().all(|b| b.is_ascii_hexdigit()))
        .ok_or_else(|| AppError::not_found("manuscript", reference))
}

fn check_size(bytes: &[u8], max_bytes: usize) -> Result<()> {
    if bytes.is_empty() {
        return Err(AppError::Validation {
            message: "Manuscript upload is empty".to_string(),
            field: Some("manuscript".to_string()),
        });
    }
    if bytes.len() > max_bytes {
        return Err(AppError::PayloadTooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }
    Ok(())
}

/// Manuscripts stored as files named by their digest
pub struct LocalManuscriptStore {
    root: PathBuf,
    max_bytes: usize,
}

impl LocalManuscriptStore {
    /// Create a store rooted at `root`, creating the directory if needed
    pub async fn new(root: PathBuf, max_bytes: usize) -> Result<Self> {
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root, max_bytes })
    }

    fn path_for(&self, digest: &str) -> PathBuf {
        self.root.join(format!("{}.pdf", digest))
    }
}

#[async_trait]
impl ManuscriptStore for LocalManuscriptStore {
    async fn store(&self, bytes: &[u8]) -> Result<String> {
        check_size(bytes, self.max_bytes)?;

        let reference = content_reference(bytes);
        let path = self.path_for(digest_of(&reference)?);

        // identical content is already on disk
        if tokio::fs::try_exists(&path).await? {
            debug!(reference = %reference, "Manuscript already stored");
            return Ok(reference);
        }

        // readers only ever see complete files
        let tmp = path.with_extension("part");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(reference = %reference, size = bytes.len(), "Manuscript stored");
        Ok(reference)
    }

    async fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
        let path = self.path_for(digest_of(reference)?);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::not_found("manuscript", reference))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn backend_name(&self) -> &str {
        "local"
    }
}

/// In-memory manuscript store for testing
pub struct InMemoryManuscriptStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    max_bytes: usize,
}

impl InMemoryManuscriptStore {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            max_bytes,
        }
    }
}

impl Default for InMemoryManuscriptStore {
    fn default() -> Self {
        Self::new(ManuscriptConfig::default().max_bytes)
    }
}

#[async_trait]
impl ManuscriptStore for InMemoryManuscriptStore {
    async fn store(&self, bytes: &[u8]) -> Result<String> {
        check_size(bytes, self.max_bytes)?;
        let reference = content_reference(bytes);
        self.blobs
            .write()
            .await
            .entry(reference.clone())
            .or_insert_with(|| bytes.to_vec());
        Ok(reference)
    }

    async fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(reference)
            .cloned()
            .ok_or_else(|| AppError::not_found("manuscript", reference))
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

/// Create a manuscript store based on configuration
pub async fn create_manuscript_store(config: &ManuscriptConfig) -> Result<Arc<dyn ManuscriptStore>> {
    match config.backend {
        ManuscriptBackend::Local => Ok(Arc::new(
            LocalManuscriptStore::new(config.root_dir.clone(), config.max_bytes).await?,
        )),
        ManuscriptBackend::Memory => {
            tracing::warn!("Using in-memory manuscript store; uploads are lost on restart");
            Ok(Arc::new(InMemoryManuscriptStore::new(config.max_bytes)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_err;

    #[test]
    fn test_content_reference_is_stable() {
        let a = content_reference(b"%PDF-1.7 paper");
        let b = content_reference(b"%PDF-1.7 paper");
        let c = content_reference(b"%PDF-1.7 other paper");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("sha256:"));
        assert!(digest_of(&a).is_ok());
    }

    #[test]
    fn test_malformed_reference_rejected() {
        assert_err!(digest_of("sha256:../../etc/passwd"));
        assert_err!(digest_of("https://example.org/paper.pdf"));
    }

    #[tokio::test]
    async fn test_local_store_and_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalManuscriptStore::new(dir.path().join("blobs"), 1024)
            .await
            .unwrap();

        let reference = store.store(b"%PDF-1.7 body").await.unwrap();
        let again = store.store(b"%PDF-1.7 body").await.unwrap();
        assert_eq!(reference, again);
        assert_eq!(store.fetch(&reference).await.unwrap(), b"%PDF-1.7 body");

        let missing = content_reference(b"never stored");
        assert!(matches!(
            store.fetch(&missing).await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_size_limits() {
        let store = InMemoryManuscriptStore::new(8);
        assert!(matches!(
            store.store(b"").await,
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            store.store(b"far too many bytes").await,
            Err(AppError::PayloadTooLarge { size: 18, limit: 8 })
        ));
        let reference = store.store(b"tiny").await.unwrap();
        assert_eq!(store.fetch(&reference).await.unwrap(), b"tiny");
    }
}
