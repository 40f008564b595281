//! Game session: controller state machine, live analysis loop, and sign-in.

pub mod auth;
pub mod controller;
mod live;
pub mod pipeline;

pub use auth::{AuthService, LocalAuth, User};
pub use controller::{Answered, GameController, GamePhase};
pub use live::Verdict;
pub use pipeline::Pipeline;
