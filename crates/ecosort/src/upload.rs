//! Hand captured stills to object storage and get back a fetchable URL.

use std::sync::Arc;

use async_trait::async_trait;

use crate::capture::EncodedFrame;
use crate::types::{EcoError, EcoResult};

/// Owner segment used when nobody is signed in.
pub const ANONYMOUS_OWNER: &str = "anonymous";

/// External object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Persist `bytes` at `path` and return the object's public reference.
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        overwrite: bool,
    ) -> EcoResult<String>;
}

/// Uploads stills for one owner.
#[derive(Clone)]
pub struct Uploader {
    store: Arc<dyn ObjectStore>,
    owner: String,
}

impl Uploader {
    pub fn new(store: Arc<dyn ObjectStore>, owner: Option<&str>) -> Self {
        let owner = owner
            .map(sanitize_segment)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| ANONYMOUS_OWNER.to_string());
        Self { store, owner }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Upload one still. Creates exactly one object; no dedup, no retry.
    pub async fn upload(&self, frame: &EncodedFrame) -> EcoResult<String> {
        let path = self.object_path();
        tracing::debug!(
            "Uploading {}x{} still ({} bytes) to {path}",
            frame.width,
            frame.height,
            frame.bytes.len()
        );

        let reference = self
            .store
            .put(&path, frame.bytes.clone(), frame.mime, true)
            .await
            .map_err(|e| match e {
                EcoError::Upload(_) => e,
                other => EcoError::Upload(other.to_string()),
            })?;

        validate_https(&reference)?;
        Ok(reference)
    }

    fn object_path(&self) -> String {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        format!("captures/{}/{millis}-{}.jpg", self.owner, uuid::Uuid::new_v4())
    }
}

/// Accept only absolute `https://` references with a host.
pub fn validate_https(reference: &str) -> EcoResult<()> {
    let has_prefix = reference
        .get(..8)
        .is_some_and(|p| p.eq_ignore_ascii_case("https://"));
    if !has_prefix {
        return Err(EcoError::InsecureUrl(reference.to_string()));
    }
    match url::Url::parse(reference) {
        Ok(u) if u.scheme() == "https" && u.host_str().is_some_and(|h| !h.is_empty()) => Ok(()),
        _ => Err(EcoError::InsecureUrl(reference.to_string())),
    }
}

fn sanitize_segment(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeStore {
        reply: EcoResult<String>,
        calls: Mutex<Vec<(String, bool)>>,
    }

    impl FakeStore {
        fn replying(reply: EcoResult<String>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ObjectStore for FakeStore {
        async fn put(
            &self,
            path: &str,
            _bytes: Vec<u8>,
            _content_type: &str,
            overwrite: bool,
        ) -> EcoResult<String> {
            self.calls.lock().unwrap().push((path.to_string(), overwrite));
            match &self.reply {
                Ok(url) => Ok(url.clone()),
                Err(e) => Err(EcoError::Model(e.to_string())),
            }
        }
    }

    fn frame() -> EncodedFrame {
        EncodedFrame {
            bytes: vec![0xFF, 0xD8, 0xFF],
            width: 4,
            height: 4,
            mime: "image/jpeg",
            label: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upload_returns_https_reference() {
        let store = FakeStore::replying(Ok("https://cdn.example.com/a.jpg".to_string()));
        let uploader = Uploader::new(store.clone(), Some("ada"));
        let url = uploader.upload(&frame()).await.unwrap();
        assert_eq!(url, "https://cdn.example.com/a.jpg");

        let calls = store.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.starts_with("captures/ada/"));
        assert!(calls[0].0.ends_with(".jpg"));
        assert!(calls[0].1, "uploads overwrite");
    }

    #[tokio::test]
    async fn test_upload_rejects_http_reference() {
        let store = FakeStore::replying(Ok("http://cdn.example.com/a.jpg".to_string()));
        let uploader = Uploader::new(store, None);
        let err = uploader.upload(&frame()).await.unwrap_err();
        assert!(matches!(err, EcoError::InsecureUrl(_)));
    }

    #[tokio::test]
    async fn test_store_failure_becomes_upload_error() {
        let store = FakeStore::replying(Err(EcoError::Model("boom".to_string())));
        let uploader = Uploader::new(store, None);
        let err = uploader.upload(&frame()).await.unwrap_err();
        assert!(matches!(err, EcoError::Upload(_)));
    }

    #[test]
    fn test_validate_https() {
        assert!(validate_https("https://x.example/o.jpg").is_ok());
        assert!(validate_https("HTTPS://x.example/o.jpg").is_ok());
        assert!(validate_https("http://x.example/o.jpg").is_err());
        assert!(validate_https("ftp://x.example/o.jpg").is_err());
        assert!(validate_https("https://").is_err());
        assert!(validate_https("gs://bucket/o.jpg").is_err());
        assert!(validate_https("").is_err());
    }

    #[test]
    fn test_owner_sanitized() {
        let store = FakeStore::replying(Ok(String::new()));
        assert_eq!(Uploader::new(store.clone(), Some("../evil")).owner(), "evil");
        assert_eq!(Uploader::new(store.clone(), Some("///")).owner(), "anonymous");
        assert_eq!(Uploader::new(store, None).owner(), "anonymous");
    }
}
