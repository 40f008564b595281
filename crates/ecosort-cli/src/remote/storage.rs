//! Object storage over HTTP.
//!
//! `PUT {base}/objects/{path}?overwrite=true|false` with the raw bytes as the
//! body. The service answers `{"url": "<public reference>"}`.

use async_trait::async_trait;
use serde::Deserialize;

use ecosort::{EcoError, EcoResult, ObjectStore};

use super::join_url;

#[derive(Debug, Deserialize)]
struct PutResponse {
    #[serde(default)]
    url: Option<String>,
}

/// [`ObjectStore`] backed by an HTTP endpoint.
#[derive(Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(client: reqwest::Client, base_url: &str, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            token,
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        overwrite: bool,
    ) -> EcoResult<String> {
        let url = join_url(&self.base_url, &format!("objects/{path}"));
        let mut req = self
            .client
            .put(&url)
            .query(&[("overwrite", overwrite)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| EcoError::Upload(format!("request to {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EcoError::Upload(format!("storage answered HTTP {status}")));
        }

        let body: PutResponse = resp
            .json()
            .await
            .map_err(|e| EcoError::Upload(format!("unreadable storage reply: {e}")))?;

        body.url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| EcoError::Upload("storage reply has no url".to_string()))
    }
}
