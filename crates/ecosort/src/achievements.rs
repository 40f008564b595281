//! Achievement badges.
//!
//! The list is declared data only: nothing in the game unlocks a badge.

use crate::types::Achievement;

const ACHIEVEMENTS: [(&str, &str, &str); 4] = [
    ("first-sort", "First Sort", "Answer your first item"),
    ("streak-5", "On a Roll", "Get five answers right in a row"),
    ("level-5", "Eco Expert", "Reach level five"),
    ("hundred", "Centurion", "Answer one hundred items"),
];

/// The fixed badge list, all locked.
pub fn default_achievements() -> Vec<Achievement> {
    ACHIEVEMENTS
        .iter()
        .map(|(id, title, description)| Achievement {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            unlocked: false,
        })
        .collect()
}
