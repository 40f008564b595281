//! EcoSort — terminal recycling game: live camera analysis, scoring, and REPL.

pub mod config;
pub mod remote;
pub mod repl;
pub mod session;
pub mod types;

pub use config::{LoopTiming, Overrides, Settings};
pub use session::{GameController, GamePhase, LocalAuth};
pub use types::{AppError, AppResult};
