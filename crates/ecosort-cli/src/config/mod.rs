//! Configuration loading and resolution.
//!
//! Every setting resolves in the same order: explicit value (CLI flag),
//! then environment variable, then built-in default.

use std::path::PathBuf;
use std::time::Duration;

use crate::types::{AppError, AppResult};

pub const DEFAULT_AI_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_AI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_CAMERA_DIR: &str = "./camera";
pub const DEFAULT_TICK_MS: u64 = 500;
pub const DEFAULT_THROTTLE_MS: u64 = 2000;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Timing of the live analysis loop.
///
/// The tick is always non-zero and never longer than the throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTiming {
    tick: Duration,
    throttle: Duration,
}

impl LoopTiming {
    pub fn new(tick: Duration, throttle: Duration) -> AppResult<Self> {
        if tick.is_zero() {
            return Err(AppError::Config("tick interval must be positive".to_string()));
        }
        if throttle < tick {
            return Err(AppError::Config(format!(
                "throttle ({} ms) must not be shorter than the tick ({} ms)",
                throttle.as_millis(),
                tick.as_millis()
            )));
        }
        Ok(Self { tick, throttle })
    }

    /// How often the timer checks whether to work.
    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Minimum gap between two analysis attempts.
    pub fn throttle(&self) -> Duration {
        self.throttle
    }
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(DEFAULT_TICK_MS),
            throttle: Duration::from_millis(DEFAULT_THROTTLE_MS),
        }
    }
}

/// Fully resolved settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub storage_url: Option<String>,
    pub storage_token: Option<String>,
    pub ai_url: String,
    pub ai_key: Option<String>,
    pub ai_model: String,
    pub camera_dir: PathBuf,
    pub timing: LoopTiming,
    pub timeout: Duration,
}

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub storage_url: Option<String>,
    pub storage_token: Option<String>,
    pub ai_url: Option<String>,
    pub ai_key: Option<String>,
    pub ai_model: Option<String>,
    pub camera_dir: Option<String>,
    pub tick_ms: Option<u64>,
    pub throttle_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
}

impl Settings {
    /// Resolve settings from overrides and the process environment.
    pub fn resolve(overrides: Overrides) -> AppResult<Self> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve settings with a custom environment lookup.
    pub fn resolve_with<F>(o: Overrides, env: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |explicit: Option<String>, key: &str| {
            explicit
                .or_else(|| env(key))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let timing = LoopTiming::new(
            Duration::from_millis(o.tick_ms.unwrap_or(DEFAULT_TICK_MS)),
            Duration::from_millis(o.throttle_ms.unwrap_or(DEFAULT_THROTTLE_MS)),
        )?;

        Ok(Self {
            storage_url: pick(o.storage_url, "ECOSORT_STORAGE_URL"),
            storage_token: pick(o.storage_token, "ECOSORT_STORAGE_TOKEN"),
            ai_url: pick(o.ai_url, "ECOSORT_AI_URL").unwrap_or_else(|| DEFAULT_AI_URL.to_string()),
            ai_key: pick(o.ai_key, "ECOSORT_AI_KEY"),
            ai_model: pick(o.ai_model, "ECOSORT_AI_MODEL")
                .unwrap_or_else(|| DEFAULT_AI_MODEL.to_string()),
            camera_dir: PathBuf::from(
                pick(o.camera_dir, "ECOSORT_CAMERA")
                    .unwrap_or_else(|| DEFAULT_CAMERA_DIR.to_string()),
            ),
            timing,
            timeout: Duration::from_millis(o.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)),
        })
    }

    /// Storage URL, required for anything that uploads.
    pub fn require_storage_url(&self) -> AppResult<&str> {
        self.storage_url.as_deref().ok_or_else(|| {
            AppError::Config(
                "no storage endpoint; pass --storage-url or set ECOSORT_STORAGE_URL".to_string(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let s = Settings::resolve_with(Overrides::default(), env_of(&[])).unwrap();
        assert_eq!(s.ai_url, DEFAULT_AI_URL);
        assert_eq!(s.ai_model, DEFAULT_AI_MODEL);
        assert_eq!(s.timing, LoopTiming::default());
        assert!(s.storage_url.is_none());
        assert!(s.require_storage_url().is_err());
    }

    #[test]
    fn test_flag_beats_env() {
        let o = Overrides {
            ai_model: Some("flag-model".to_string()),
            ..Default::default()
        };
        let s = Settings::resolve_with(
            o,
            env_of(&[
                ("ECOSORT_AI_MODEL", "env-model"),
                ("ECOSORT_STORAGE_URL", "https://store.example"),
            ]),
        )
        .unwrap();
        assert_eq!(s.ai_model, "flag-model");
        assert_eq!(s.require_storage_url().unwrap(), "https://store.example");
    }

    #[test]
    fn test_blank_env_ignored() {
        let s = Settings::resolve_with(Overrides::default(), env_of(&[("ECOSORT_AI_URL", "  ")]))
            .unwrap();
        assert_eq!(s.ai_url, DEFAULT_AI_URL);
    }

    #[test]
    fn test_rejects_bad_timing() {
        let o = Overrides {
            tick_ms: Some(1000),
            throttle_ms: Some(10),
            ..Default::default()
        };
        assert!(Settings::resolve_with(o, env_of(&[])).is_err());
    }

    #[test]
    fn test_loop_timing_rejects_zero_tick() {
        assert!(matches!(
            LoopTiming::new(Duration::ZERO, Duration::from_secs(2)),
            Err(AppError::Config(_))
        ));
        assert!(LoopTiming::new(Duration::from_millis(10), Duration::from_millis(5)).is_err());

        let timing = LoopTiming::new(Duration::from_millis(10), Duration::from_millis(10)).unwrap();
        assert_eq!(timing.tick(), Duration::from_millis(10));
        assert_eq!(timing.throttle(), Duration::from_millis(10));
    }
}
