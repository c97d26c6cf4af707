//! Blob storage for uploaded evidence and task template files.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("invalid blob path '{0}'")]
    InvalidPath(String),
    #[error("blob store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("blob store unavailable: {0}")]
    Unavailable(String),
}

/// Stores bytes under a relative path and returns a URL for them.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String, BlobError>;
}

/// Split a relative blob path into segments, rejecting anything that could
/// escape the store root.
fn segments(path: &str) -> Result<Vec<&str>, BlobError> {
    let parts: Vec<&str> = path.split('/').collect();
    let bad = path.starts_with('/')
        || parts
            .iter()
            .any(|p| p.is_empty() || *p == "." || *p == ".." || p.contains('\\'));
    if bad {
        return Err(BlobError::InvalidPath(path.to_string()));
    }
    Ok(parts)
}

/// Make an uploaded file name safe to use as a single path segment.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.trim_start_matches('.') {
        "" => "file".to_string(),
        rest => rest.to_string(),
    }
}

/// Top-level directory holding task template files.
pub const TEMPLATES_DIR: &str = "templates";

/// Who a stored blob belongs to, going by its first path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobOwner<'a> {
    /// Shared reference documents on global tasks.
    Templates,
    Customer(&'a str),
}

pub fn blob_owner(path: &str) -> BlobOwner<'_> {
    match path.split('/').next().unwrap_or_default() {
        TEMPLATES_DIR => BlobOwner::Templates,
        customer_id => BlobOwner::Customer(customer_id),
    }
}

/// Evidence path for a customer's upload on one task.
pub fn evidence_path(customer_id: &str, task_id: &str, now_ms: i64, name: &str) -> String {
    format!("{}/{}/{}-{}", customer_id, task_id, now_ms, sanitize_file_name(name))
}

/// Template path for a reference document on a task definition.
pub fn template_path(task_id: &str, now_ms: i64, name: &str) -> String {
    format!(
        "{}/{}/{}-{}",
        TEMPLATES_DIR,
        task_id,
        now_ms,
        sanitize_file_name(name)
    )
}

/// Blob store on the local filesystem.
///
/// URLs are `public_base_url` followed by the percent-encoded path segments.
pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve a relative blob path to a file under the root.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, BlobError> {
        let mut full = self.root.clone();
        for segment in segments(path)? {
            full.push(segment);
        }
        Ok(full)
    }

    fn url_for(&self, path: &str) -> Result<String, BlobError> {
        let encoded: Vec<String> = segments(path)?
            .into_iter()
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        Ok(format!("{}/{}", self.public_base_url, encoded.join("/")))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String, BlobError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        tracing::debug!(path = %target.display(), "Stored blob");
        self.url_for(path)
    }
}

/// In-memory blob store for tests. Can be switched into a failing mode.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
    fail: bool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every upload fails.
    pub fn failing() -> Self {
        Self {
            blobs: Mutex::new(BTreeMap::new()),
            fail: true,
        }
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs.lock().ok()?.get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.blobs
            .lock()
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String, BlobError> {
        if self.fail {
            return Err(BlobError::Unavailable("memory store set to fail".into()));
        }
        segments(path)?;
        self.blobs
            .lock()
            .map_err(|_| BlobError::Unavailable("lock poisoned".into()))?
            .insert(path.to_string(), bytes);
        Ok(format!("memory://{}", path))
    }
}
