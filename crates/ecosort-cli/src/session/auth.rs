//! Sign-in state.
//!
//! The game only needs to know who is signed in, to name the owner of
//! uploaded captures. Login and logout return nothing the game consumes.

use std::sync::Mutex;

/// A signed-in player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub display_name: String,
}

/// External authentication service.
pub trait AuthService: Send + Sync {
    fn current_user(&self) -> Option<User>;

    /// True while a sign-in is being resolved.
    fn is_loading(&self) -> bool;

    fn login(&self, name: &str);

    fn logout(&self);
}

/// In-process [`AuthService`] for the terminal game.
#[derive(Default)]
pub struct LocalAuth {
    user: Mutex<Option<User>>,
}

impl LocalAuth {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<User>> {
        self.user.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl AuthService for LocalAuth {
    fn current_user(&self) -> Option<User> {
        self.slot().clone()
    }

    fn is_loading(&self) -> bool {
        false
    }

    fn login(&self, name: &str) {
        let display_name = name.trim().to_string();
        if display_name.is_empty() {
            tracing::warn!("Ignoring login with an empty name");
            return;
        }
        let id = display_name
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");
        tracing::info!("Signed in as {display_name}");
        *self.slot() = Some(User { id, display_name });
    }

    fn logout(&self) {
        if let Some(user) = self.slot().take() {
            tracing::info!("Signed out {}", user.display_name);
        }
    }
}
