//! Core data types for analysis results, game stats, and achievements.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lowest confidence a stored analysis may carry.
pub const MIN_CONFIDENCE: u8 = 70;

/// Highest confidence a stored analysis may carry.
pub const MAX_CONFIDENCE: u8 = 99;

/// Points needed to advance one level.
pub const POINTS_PER_LEVEL: u32 = 500;

/// Confidence reported by the fallback result.
pub const FALLBACK_CONFIDENCE: u8 = 75;

const FALLBACK_EXPLANATION: &str = "Unable to analyze the item clearly. When in doubt, \
     throw it out: a wrong item in the recycling bin can contaminate a whole batch.";

const FALLBACK_TIPS: [&str; 3] = [
    "Make sure the item is well lit and fills most of the frame",
    "Check your local recycling guidelines for this material",
    "Rinse food residue off containers before recycling them",
];

/// Which bin an item belongs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Recycle,
    Trash,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Recycle => "recycle",
            Classification::Trash => "trash",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classification {
    type Err = EcoError;

    /// Exact match only; the model contract uses lowercase names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recycle" => Ok(Classification::Recycle),
            "trash" => Ok(Classification::Trash),
            other => Err(EcoError::InvalidInput(format!(
                "Unknown classification '{other}'. Use 'recycle' or 'trash'."
            ))),
        }
    }
}

/// A single verdict on the item in front of the camera.
///
/// Replaced wholesale on every new analysis; never merged with a previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub classification: Classification,
    pub confidence: u8,
    pub explanation: String,
    pub tips: Vec<String>,
}

impl AnalysisResult {
    /// The fixed safe answer used whenever analysis fails.
    ///
    /// Biased toward trash so a failed analysis never recommends
    /// contaminating recyclables.
    pub fn fallback() -> Self {
        Self {
            classification: Classification::Trash,
            confidence: FALLBACK_CONFIDENCE,
            explanation: FALLBACK_EXPLANATION.to_string(),
            tips: FALLBACK_TIPS.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        *self == Self::fallback()
    }
}

/// Cumulative score state for one play session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStats {
    pub score: u32,
    pub streak: u32,
    pub total_answers: u32,
    pub correct_answers: u32,
    pub level: u32,
}

impl Default for GameStats {
    fn default() -> Self {
        Self {
            score: 0,
            streak: 0,
            total_answers: 0,
            correct_answers: 0,
            level: 1,
        }
    }
}

impl GameStats {
    /// Level reached at a given cumulative score.
    pub fn level_for(score: u32) -> u32 {
        score / POINTS_PER_LEVEL + 1
    }

    /// Percentage of correct answers, rounded; 0 before any answer.
    pub fn accuracy(&self) -> u32 {
        if self.total_answers == 0 {
            return 0;
        }
        let pct = self.correct_answers as f64 / self.total_answers as f64 * 100.0;
        pct.round() as u32
    }
}

/// A badge shown to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub title: String,
    pub description: String,
    pub unlocked: bool,
}

/// Errors that can occur in the EcoSort library.
#[derive(thiserror::Error, Debug)]
pub enum EcoError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Insecure image URL (https required): {0}")]
    InsecureUrl(String),

    #[error("Decode error: {0}")]
    Decode(#[from] crate::classify::DecodeError),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience result type.
pub type EcoResult<T> = Result<T, EcoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_is_trash_75() {
        let fb = AnalysisResult::fallback();
        assert_eq!(fb.classification, Classification::Trash);
        assert_eq!(fb.confidence, 75);
        assert_eq!(fb.tips.len(), 3);
        assert!(fb.is_fallback());
    }

    #[test]
    fn test_classification_wire_form() {
        let json = serde_json::to_string(&Classification::Recycle).unwrap();
        assert_eq!(json, "\"recycle\"");
        assert_eq!("trash".parse::<Classification>().unwrap(), Classification::Trash);
        assert!("Trash".parse::<Classification>().is_err());
        assert!("compost".parse::<Classification>().is_err());
    }

    #[test]
    fn test_accuracy_zero_answers() {
        assert_eq!(GameStats::default().accuracy(), 0);
    }

    #[test]
    fn test_accuracy_rounds() {
        let stats = GameStats {
            score: 0,
            streak: 0,
            total_answers: 3,
            correct_answers: 2,
            level: 1,
        };
        assert_eq!(stats.accuracy(), 67);
    }

    #[test]
    fn test_level_for() {
        assert_eq!(GameStats::level_for(0), 1);
        assert_eq!(GameStats::level_for(499), 1);
        assert_eq!(GameStats::level_for(500), 2);
        assert_eq!(GameStats::level_for(1499), 3);
    }
}
