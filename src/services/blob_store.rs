//! src/services/blob_store.rs
//!
//! Retrieval client for the backing blob store. The local implementation keeps
//! one directory per bucket beneath `base_path` and one file per object key,
//! so `base_path/{bucket}/{key}`.

use async_trait::async_trait;
use std::{
    io::{self, ErrorKind},
    path::PathBuf,
};
use tokio::fs;
use tracing::debug;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

/// Outcome of one fetch.
///
/// `NotFound` and `TransientError` answer the client the same way but are
/// logged differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalResult {
    Content(String),
    NotFound,
    TransientError(String),
}

/// Narrow read interface over the blob store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read the whole object as text. Single attempt, no retry.
    async fn fetch(&self, bucket: &str, key: &str) -> RetrievalResult;

    /// Cheap reachability probe used by the readiness endpoint.
    async fn ping(&self) -> Result<(), String>;
}

/// Blob store backed by a local directory tree.
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    base_path: PathBuf,
}

impl FsBlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        let mut path = self.base_path.clone();
        path.push(bucket);
        path.push(key);
        path
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn fetch(&self, bucket: &str, key: &str) -> RetrievalResult {
        if let Err(reason) = ensure_bucket_name_safe(bucket) {
            debug!(bucket, reason, "rejecting bucket name");
            return RetrievalResult::NotFound;
        }
        if !is_key_safe(key) {
            debug!(bucket, key, "rejecting object key");
            return RetrievalResult::NotFound;
        }

        let path = self.object_path(bucket, key);
        match fs::read_to_string(&path).await {
            Ok(content) => RetrievalResult::Content(content),
            Err(err) => classify_read_error(err),
        }
    }

    async fn ping(&self) -> Result<(), String> {
        match fs::metadata(&self.base_path).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(format!("{} is not a directory", self.base_path.display())),
            Err(e) => Err(format!("{}: {}", self.base_path.display(), e)),
        }
    }
}

fn classify_read_error(err: io::Error) -> RetrievalResult {
    match err.kind() {
        // NotADirectory covers a key that walks through a regular file.
        ErrorKind::NotFound | ErrorKind::NotADirectory => RetrievalResult::NotFound,
        _ => RetrievalResult::TransientError(err.to_string()),
    }
}

/// Basic key validation to avoid trivial path traversal vectors.
fn is_key_safe(key: &str) -> bool {
    if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
        return false;
    }
    if key.starts_with('/') || key.split('/').any(|seg| seg == "..") {
        return false;
    }
    !key
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
}

/// Bucket naming rules (GCS flavour):
/// - 3–63 characters
/// - lowercase letters, digits, dots, hyphens, underscores only
/// - must start and end with a letter or digit
/// - cannot contain consecutive dots or dot-hyphen patterns
/// - cannot look like an IPv4 address
fn ensure_bucket_name_safe(name: &str) -> Result<(), &'static str> {
    let len = name.len();
    if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
        return Err("must be between 3 and 63 characters");
    }

    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-' | '_'))
    {
        return Err("allowed characters are lowercase letters, digits, dots, hyphens, underscores");
    }

    if name.starts_with(['.', '-', '_']) || name.ends_with(['.', '-', '_']) {
        return Err("must start and end with a lowercase letter or digit");
    }

    if name.contains("..") || name.contains("-.") || name.contains(".-") {
        return Err("cannot contain consecutive dots or dot-hyphen combinations");
    }

    if is_ipv4_like(name) {
        return Err("must not be formatted like an IP address");
    }

    Ok(())
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}
