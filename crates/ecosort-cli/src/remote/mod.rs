//! HTTP clients for the external collaborators: object storage and the vision model.

pub mod storage;
pub mod vision;

use std::sync::Arc;
use std::time::Duration;

use ecosort::{Classifier, ObjectStore};

pub use storage::HttpObjectStore;
pub use vision::HttpVisionModel;

use crate::config::Settings;
use crate::types::AppResult;

/// Build the shared reqwest client.
pub fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("ecosort/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

/// Build the storage and model collaborators described by `settings`.
pub fn connect(settings: &Settings) -> AppResult<(Arc<dyn ObjectStore>, Classifier)> {
    let client = build_client(settings.timeout);
    let store: Arc<dyn ObjectStore> = Arc::new(HttpObjectStore::new(
        client.clone(),
        settings.require_storage_url()?,
        settings.storage_token.clone(),
    ));
    if settings.ai_key.is_none() {
        tracing::warn!("No AI key configured; requests to {} are unauthenticated", settings.ai_url);
    }
    let model = HttpVisionModel::new(
        client,
        &settings.ai_url,
        settings.ai_key.clone(),
        &settings.ai_model,
    );
    Ok((store, Classifier::new(Arc::new(model))))
}

/// Join a base URL and a path with exactly one slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://a.example/", "/objects/x"), "https://a.example/objects/x");
        assert_eq!(join_url("https://a.example", "objects/x"), "https://a.example/objects/x");
    }
}
