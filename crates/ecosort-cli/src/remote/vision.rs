//! Vision model over an OpenAI-compatible chat completions endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use ecosort::{EcoError, EcoResult, VisionModel, VisionRequest};

use super::join_url;

/// Upper bound on reply length; the expected JSON is short.
const MAX_REPLY_TOKENS: u32 = 400;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// [`VisionModel`] that posts a text + image_url message.
#[derive(Clone)]
pub struct HttpVisionModel {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpVisionModel {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: Option<String>,
        model: &str,
    ) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            api_key,
            model: model.to_string(),
        }
    }

    fn body(&self, request: &VisionRequest) -> serde_json::Value {
        json!({
            "model": self.model,
            "max_tokens": MAX_REPLY_TOKENS,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": request.instruction },
                    { "type": "image_url", "image_url": { "url": request.image_url } }
                ]
            }]
        })
    }
}

#[async_trait]
impl VisionModel for HttpVisionModel {
    async fn generate(&self, request: VisionRequest) -> EcoResult<String> {
        let url = join_url(&self.base_url, "chat/completions");
        let mut req = self.client.post(&url).json(&self.body(&request));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| EcoError::Model(format!("request to {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EcoError::Model(format!("model answered HTTP {status}")));
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| EcoError::Model(format!("unreadable model reply: {e}")))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| EcoError::Model("model reply has no content".to_string()))
    }
}
