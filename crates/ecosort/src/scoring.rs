//! Score the player's guess against the current analysis.

use crate::types::{AnalysisResult, Classification, GameStats};

/// Outcome of scoring one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scored {
    pub stats: GameStats,
    pub correct: bool,
    pub points: u32,
}

/// Pure transition: previous stats + answer + verdict → new stats.
///
/// A correct answer earns the model's confidence in points and extends the
/// streak; a wrong one earns nothing and resets the streak.
pub fn score_answer(prev: &GameStats, answer: Classification, result: &AnalysisResult) -> Scored {
    let correct = answer == result.classification;
    let points = if correct { result.confidence as u32 } else { 0 };

    let score = prev.score.saturating_add(points);
    let stats = GameStats {
        score,
        streak: if correct {
            prev.streak.saturating_add(1)
        } else {
            0
        },
        total_answers: prev.total_answers.saturating_add(1),
        correct_answers: if correct {
            prev.correct_answers.saturating_add(1)
        } else {
            prev.correct_answers
        },
        level: GameStats::level_for(score),
    };

    Scored {
        stats,
        correct,
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(classification: Classification, confidence: u8) -> AnalysisResult {
        AnalysisResult {
            classification,
            confidence,
            explanation: "test".to_string(),
            tips: Vec::new(),
        }
    }

    #[test]
    fn test_incorrect_answer_resets_streak() {
        let prev = GameStats {
            score: 100,
            streak: 2,
            total_answers: 5,
            correct_answers: 3,
            level: 1,
        };
        let out = score_answer(&prev, Classification::Recycle, &verdict(Classification::Trash, 88));
        assert!(!out.correct);
        assert_eq!(out.points, 0);
        assert_eq!(
            out.stats,
            GameStats {
                score: 100,
                streak: 0,
                total_answers: 6,
                correct_answers: 3,
                level: 1,
            }
        );
    }

    #[test]
    fn test_correct_answer_levels_up() {
        let prev = GameStats {
            score: 410,
            streak: 1,
            total_answers: 4,
            correct_answers: 4,
            level: 1,
        };
        let out = score_answer(
            &prev,
            Classification::Recycle,
            &verdict(Classification::Recycle, 90),
        );
        assert!(out.correct);
        assert_eq!(out.points, 90);
        assert_eq!(out.stats.score, 500);
        assert_eq!(out.stats.level, 2);
        assert_eq!(out.stats.streak, 2);
        assert_eq!(out.stats.correct_answers, 5);
        assert_eq!(out.stats.total_answers, 5);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let prev = GameStats::default();
        let v = verdict(Classification::Trash, 75);
        assert_eq!(
            score_answer(&prev, Classification::Trash, &v),
            score_answer(&prev, Classification::Trash, &v)
        );
    }

    #[test]
    fn test_counters_saturate() {
        let prev = GameStats {
            score: u32::MAX - 10,
            streak: u32::MAX,
            total_answers: u32::MAX,
            correct_answers: u32::MAX,
            level: 1,
        };
        let out = score_answer(&prev, Classification::Trash, &verdict(Classification::Trash, 99));
        assert_eq!(out.stats.score, u32::MAX);
        assert_eq!(out.stats.total_answers, u32::MAX);
    }
}
