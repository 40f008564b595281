//! Error types for the EcoSort application.

use crate::session::GamePhase;

/// All errors that can occur in the application layer.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Cannot {action} while {phase}")]
    InvalidState {
        action: &'static str,
        phase: GamePhase,
    },

    /// Camera permission denied or no camera available. Not retried.
    #[error("Camera access denied: {0}")]
    CameraDenied(String),

    #[error("No analysis to answer yet")]
    NoResult,

    #[error("This item has already been answered")]
    AlreadyAnswered,

    #[error("No async runtime available: {0}")]
    Runtime(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Eco(#[from] ecosort::EcoError),
}

pub type AppResult<T> = Result<T, AppError>;
