//! Recycle-or-trash classification through an external vision model.
//!
//! The model returns free text. It is decoded strictly into an
//! [`AnalysisResult`]; anything that fails to decode is replaced by
//! [`AnalysisResult::fallback`] so the caller always has a playable answer.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::types::{AnalysisResult, Classification, EcoResult, MAX_CONFIDENCE, MIN_CONFIDENCE};
use crate::upload::validate_https;

/// Instruction sent with every image.
pub const CLASSIFY_PROMPT: &str = "You are a recycling expert. Look at the object in this image \
and decide whether it belongs in the recycling bin or the trash. Respond with JSON only, no \
markdown, using exactly this schema:\n\
{\"classification\": \"recycle\" or \"trash\", \"confidence\": an integer from 70 to 99, \
\"explanation\": \"one or two sentences on why\", \"tips\": [\"tip\", \"tip\", \"tip\"]}";

/// A multi-part message: text instruction plus an image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionRequest {
    pub instruction: String,
    pub image_url: String,
}

/// External text-generation model that can look at an image URL.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn generate(&self, request: VisionRequest) -> EcoResult<String>;
}

/// Why a model reply could not become an [`AnalysisResult`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty reply")]
    Empty,

    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("reply is not a JSON object")]
    NotAnObject,

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("invalid classification: {0}")]
    InvalidClassification(String),

    #[error("invalid confidence: {0}")]
    InvalidConfidence(String),

    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Why the classifier answered with the fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    InsecureUrl(String),
    Transport(String),
    Decode(DecodeError),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::InsecureUrl(url) => write!(f, "refused non-https image URL {url}"),
            FallbackReason::Transport(e) => write!(f, "model request failed: {e}"),
            FallbackReason::Decode(e) => write!(f, "model reply rejected: {e}"),
        }
    }
}

/// Outcome of one classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Model(AnalysisResult),
    Fallback {
        result: AnalysisResult,
        reason: FallbackReason,
    },
}

impl Classified {
    fn fallback(reason: FallbackReason) -> Self {
        Classified::Fallback {
            result: AnalysisResult::fallback(),
            reason,
        }
    }

    pub fn result(&self) -> &AnalysisResult {
        match self {
            Classified::Model(r) => r,
            Classified::Fallback { result, .. } => result,
        }
    }

    pub fn into_result(self) -> AnalysisResult {
        match self {
            Classified::Model(r) => r,
            Classified::Fallback { result, .. } => result,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Classified::Fallback { .. })
    }
}

/// Sends images to a [`VisionModel`] and decodes the replies.
#[derive(Clone)]
pub struct Classifier {
    model: Arc<dyn VisionModel>,
}

impl Classifier {
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self { model }
    }

    /// Classify the image at `image_url`. Never fails; no retries.
    pub async fn classify(&self, image_url: &str) -> Classified {
        if validate_https(image_url).is_err() {
            let reason = FallbackReason::InsecureUrl(image_url.to_string());
            tracing::warn!("Using fallback analysis: {reason}");
            return Classified::fallback(reason);
        }

        let request = VisionRequest {
            instruction: CLASSIFY_PROMPT.to_string(),
            image_url: image_url.to_string(),
        };

        let raw = match self.model.generate(request).await {
            Ok(raw) => raw,
            Err(e) => {
                let reason = FallbackReason::Transport(e.to_string());
                tracing::warn!("Using fallback analysis: {reason}");
                return Classified::fallback(reason);
            }
        };

        match decode_analysis(&raw) {
            Ok(result) => {
                tracing::debug!(
                    "Model says {} ({}%)",
                    result.classification,
                    result.confidence
                );
                Classified::Model(result)
            }
            Err(e) => {
                let reason = FallbackReason::Decode(e);
                tracing::warn!("Using fallback analysis: {reason}");
                Classified::fallback(reason)
            }
        }
    }
}

/// Remove a surrounding Markdown code fence, with or without a language tag.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Strictly decode a model reply into an [`AnalysisResult`].
///
/// Confidence outside 70..=99 is clamped into range.
pub fn decode_analysis(raw: &str) -> Result<AnalysisResult, DecodeError> {
    let body = strip_code_fences(raw);
    if body.is_empty() {
        return Err(DecodeError::Empty);
    }

    let value: Value = serde_json::from_str(body).map_err(|e| DecodeError::Json(e.to_string()))?;
    let obj = value.as_object().ok_or(DecodeError::NotAnObject)?;

    let classification = match obj.get("classification") {
        None | Some(Value::Null) => return Err(DecodeError::MissingField("classification")),
        Some(Value::String(s)) => match s.as_str() {
            "recycle" => Classification::Recycle,
            "trash" => Classification::Trash,
            other => return Err(DecodeError::InvalidClassification(other.to_string())),
        },
        Some(other) => return Err(DecodeError::InvalidClassification(other.to_string())),
    };

    let confidence = match obj.get("confidence") {
        None | Some(Value::Null) => return Err(DecodeError::MissingField("confidence")),
        Some(Value::Number(n)) => {
            let v = n
                .as_f64()
                .filter(|v| v.is_finite())
                .ok_or_else(|| DecodeError::InvalidConfidence(n.to_string()))?;
            v.round()
                .clamp(MIN_CONFIDENCE as f64, MAX_CONFIDENCE as f64) as u8
        }
        Some(other) => return Err(DecodeError::InvalidConfidence(other.to_string())),
    };

    let explanation = match obj.get("explanation") {
        None | Some(Value::Null) => return Err(DecodeError::MissingField("explanation")),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(_) => {
            return Err(DecodeError::InvalidField {
                field: "explanation",
                reason: "expected a string".to_string(),
            })
        }
    };

    let tips = match obj.get("tips") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|t| {
                t.as_str()
                    .map(|s| s.trim().to_string())
                    .ok_or_else(|| DecodeError::InvalidField {
                        field: "tips",
                        reason: format!("expected strings, got {t}"),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(DecodeError::InvalidField {
                field: "tips",
                reason: "expected an array".to_string(),
            })
        }
    };

    Ok(AnalysisResult {
        classification,
        confidence,
        explanation,
        tips,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EcoError;
    use std::sync::Mutex;

    struct ScriptedModel {
        reply: Result<String, String>,
        seen: Mutex<Vec<VisionRequest>>,
    }

    impl ScriptedModel {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(msg: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(msg.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl VisionModel for ScriptedModel {
        async fn generate(&self, request: VisionRequest) -> EcoResult<String> {
            self.seen.lock().unwrap().push(request);
            self.reply.clone().map_err(EcoError::Model)
        }
    }

    const GOOD: &str = r#"{"classification":"recycle","confidence":92,
        "explanation":"Clean aluminum can.","tips":["Rinse it","Do not crush","Remove the tab"]}"#;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```  "), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_fences("```"), "");
    }

    #[test]
    fn test_decode_valid_reply() {
        let r = decode_analysis(&format!("```json\n{GOOD}\n```")).unwrap();
        assert_eq!(r.classification, Classification::Recycle);
        assert_eq!(r.confidence, 92);
        assert_eq!(r.explanation, "Clean aluminum can.");
        assert_eq!(r.tips.len(), 3);
    }

    #[test]
    fn test_decode_clamps_confidence() {
        let low = decode_analysis(r#"{"classification":"trash","confidence":12,"explanation":"x"}"#)
            .unwrap();
        assert_eq!(low.confidence, 70);
        assert!(low.tips.is_empty());

        let high =
            decode_analysis(r#"{"classification":"trash","confidence":100.0,"explanation":"x"}"#)
                .unwrap();
        assert_eq!(high.confidence, 99);
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        assert_eq!(decode_analysis("   "), Err(DecodeError::Empty));
        assert!(matches!(decode_analysis("not json"), Err(DecodeError::Json(_))));
        assert_eq!(decode_analysis("[1,2]"), Err(DecodeError::NotAnObject));
        assert_eq!(
            decode_analysis(r#"{"classification":"compost","confidence":80,"explanation":"x"}"#),
            Err(DecodeError::InvalidClassification("compost".to_string()))
        );
        assert_eq!(
            decode_analysis(r#"{"classification":"Recycle","confidence":80,"explanation":"x"}"#),
            Err(DecodeError::InvalidClassification("Recycle".to_string()))
        );
        assert_eq!(
            decode_analysis(r#"{"confidence":80,"explanation":"x"}"#),
            Err(DecodeError::MissingField("classification"))
        );
        assert!(matches!(
            decode_analysis(r#"{"classification":"trash","confidence":"high","explanation":"x"}"#),
            Err(DecodeError::InvalidConfidence(_))
        ));
        assert!(matches!(
            decode_analysis(
                r#"{"classification":"trash","confidence":80,"explanation":"x","tips":[1]}"#
            ),
            Err(DecodeError::InvalidField { field: "tips", .. })
        ));
    }

    #[tokio::test]
    async fn test_classify_sends_prompt_and_url() {
        let model = ScriptedModel::ok(GOOD);
        let classifier = Classifier::new(model.clone());
        let out = classifier.classify("https://cdn.example.com/x.jpg").await;
        assert!(!out.is_fallback());
        assert_eq!(out.result().confidence, 92);

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].instruction, CLASSIFY_PROMPT);
        assert_eq!(seen[0].image_url, "https://cdn.example.com/x.jpg");
    }

    #[tokio::test]
    async fn test_classify_invalid_json_falls_back() {
        let classifier = Classifier::new(ScriptedModel::ok("```json\nI think it's a can\n```"));
        let out = classifier.classify("https://cdn.example.com/x.jpg").await;
        assert!(matches!(
            out,
            Classified::Fallback {
                reason: FallbackReason::Decode(DecodeError::Json(_)),
                ..
            }
        ));
        assert_eq!(out.into_result(), AnalysisResult::fallback());
    }

    #[tokio::test]
    async fn test_classify_transport_error_falls_back() {
        let classifier = Classifier::new(ScriptedModel::failing("connection reset"));
        let out = classifier.classify("https://cdn.example.com/x.jpg").await;
        assert!(matches!(
            out,
            Classified::Fallback {
                reason: FallbackReason::Transport(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_classify_refuses_insecure_url() {
        let model = ScriptedModel::ok(GOOD);
        let classifier = Classifier::new(model.clone());
        let out = classifier.classify("http://cdn.example.com/x.jpg").await;
        assert!(out.is_fallback());
        assert!(model.seen.lock().unwrap().is_empty());
    }
}
