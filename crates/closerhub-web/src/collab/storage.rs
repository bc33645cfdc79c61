//! Object storage for uploaded profile photos.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;

use super::Result;
use crate::UploadConfig;

/// Stores an uploaded file and returns the URL it will be served from.
/// Only that URL is persisted.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
  async fn put(
    &self,
    field: &str,
    filename: &str,
    content_type: Option<&str>,
    bytes: Bytes,
  ) -> Result<String>;
}

/// Writes objects into a local directory that is served statically.
#[derive(Debug, Clone)]
pub struct DiskObjectStorage {
  dir:             PathBuf,
  public_base_url: String,
}

impl DiskObjectStorage {
  pub fn new(config: &UploadConfig) -> Self {
    Self {
      dir:             config.dir.clone(),
      public_base_url: config.public_base_url.trim_end_matches('/').to_owned(),
    }
  }
}

#[async_trait]
impl ObjectStorage for DiskObjectStorage {
  async fn put(
    &self,
    field: &str,
    filename: &str,
    content_type: Option<&str>,
    bytes: Bytes,
  ) -> Result<String> {
    let key = object_key(Utc::now().timestamp_millis(), filename);
    tokio::fs::create_dir_all(&self.dir).await?;
    tokio::fs::write(self.dir.join(&key), &bytes).await?;
    tracing::debug!(field, content_type, %key, size = bytes.len(), "stored upload");
    Ok(format!("{}/{key}", self.public_base_url))
  }
}

/// `<millis>-<name>`, with the client-supplied name reduced to a safe
/// single path component.
fn object_key(millis: i64, filename: &str) -> String {
  let cleaned: String = filename
    .rsplit(['/', '\\'])
    .next()
    .unwrap_or_default()
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
    .collect();
  let cleaned = cleaned.trim_start_matches('.');
  let name = if cleaned.is_empty() { "upload" } else { cleaned };
  format!("{millis}-{name}")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn key_keeps_plain_names() {
    assert_eq!(object_key(42, "me.png"), "42-me.png");
  }

  #[test]
  fn key_strips_paths_and_odd_characters() {
    assert_eq!(object_key(1, "../../etc/passwd"), "1-passwd");
    assert_eq!(object_key(1, "C:\\Users\\me\\photo 1.jpg"), "1-photo_1.jpg");
    assert_eq!(object_key(1, ".hidden"), "1-hidden");
    assert_eq!(object_key(1, ""), "1-upload");
  }

  #[tokio::test]
  async fn put_writes_file_and_returns_public_url() {
    let dir = tempfile::tempdir().unwrap();
    let storage = DiskObjectStorage::new(&UploadConfig {
      dir:             dir.path().join("photos"),
      public_base_url: "https://cdn.test/uploads/".into(),
      ..UploadConfig::default()
    });

    let url = storage
      .put("photo", "me.png", Some("image/png"), Bytes::from_static(b"\x89PNG"))
      .await
      .unwrap();

    let key = url.strip_prefix("https://cdn.test/uploads/").unwrap();
    assert!(key.ends_with("-me.png"), "key: {key}");
    let written = std::fs::read(dir.path().join("photos").join(key)).unwrap();
    assert_eq!(written, b"\x89PNG");
  }
}
