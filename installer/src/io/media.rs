//! Media storage boundary and fallback handles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("upload rejected: {0}")]
    Rejected(String),
}

/// Stored media reference the platform accepts in file fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaHandle(pub String);

impl MediaHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload_from_url(&self, url: &str) -> Result<MediaHandle, MediaError>;
}

/// Keeps every URL as its own handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughMedia;

#[async_trait]
impl MediaStore for PassthroughMedia {
    async fn upload_from_url(&self, url: &str) -> Result<MediaHandle, MediaError> {
        Ok(MediaHandle(url.to_string()))
    }
}

/// Round-robin substitutes for failed uploads, local to one run.
#[derive(Debug, Clone, Default)]
pub struct FallbackRotation {
    handles: Vec<String>,
    next: usize,
}

impl FallbackRotation {
    pub fn new(handles: Vec<String>) -> Self {
        Self { handles, next: 0 }
    }

    /// Next handle in the rotation, or `None` when the rotation is empty.
    pub fn next_handle(&mut self) -> Option<MediaHandle> {
        if self.handles.is_empty() {
            return None;
        }
        let handle = self.handles[self.next % self.handles.len()].clone();
        self.next += 1;
        Some(MediaHandle(handle))
    }
}

/// Values the media store should ingest.
pub fn is_remote_url(value: &str) -> bool {
    let value = value.trim_start();
    value.starts_with("http://") || value.starts_with("https://")
}
