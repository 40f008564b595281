//! Game controller — the single owner of all mutable game state.
//!
//! Phases:
//!
//! ```text
//!   Idle ──attach_camera──▶ Armed ──start_analysis──▶ Streaming
//!    ▲                        │  ◀──stop_analysis────────┘
//!    └──────stop_camera───────┴──────────────────────────┘
//! ```

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use ecosort::{
    default_achievements, score_answer, Achievement, AnalysisResult, CameraSession,
    Classification, Classifier, DirectoryCamera, FrameSource, GameStats, ObjectStore, Scored,
    Uploader,
};

use super::auth::AuthService;
use super::live::{spawn_loop, LoopContext, SharedLive, Verdict};
use super::pipeline::Pipeline;
use crate::config::LoopTiming;
use crate::types::{AppError, AppResult};

/// Where the game is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// No camera.
    Idle,
    /// Camera live, not analyzing.
    Armed,
    /// Camera live and the analysis loop running.
    Streaming,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GamePhase::Idle => "idle",
            GamePhase::Armed => "armed",
            GamePhase::Streaming => "streaming",
        })
    }
}

/// The player's answer, the verdict it was scored against, and the outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Answered {
    pub choice: Classification,
    pub verdict: Verdict,
    pub scored: Scored,
}

/// Drives one game: camera, live analysis, and scoring.
pub struct GameController {
    phase: GamePhase,
    stats: GameStats,
    achievements: Vec<Achievement>,
    camera: Option<Arc<Mutex<CameraSession>>>,
    analysis: Option<JoinHandle<()>>,
    live: SharedLive,
    results: Arc<watch::Sender<Option<Verdict>>>,
    store: Arc<dyn ObjectStore>,
    classifier: Classifier,
    auth: Arc<dyn AuthService>,
    timing: LoopTiming,
}

impl GameController {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        classifier: Classifier,
        auth: Arc<dyn AuthService>,
        timing: LoopTiming,
    ) -> Self {
        let (results, _) = watch::channel(None);
        Self {
            phase: GamePhase::Idle,
            stats: GameStats::default(),
            achievements: default_achievements(),
            camera: None,
            analysis: None,
            live: SharedLive::default(),
            results: Arc::new(results),
            store,
            classifier,
            auth,
            timing,
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn stats(&self) -> GameStats {
        self.stats
    }

    pub fn achievements(&self) -> &[Achievement] {
        &self.achievements
    }

    /// The result currently on screen, if any.
    pub fn current_result(&self) -> Option<AnalysisResult> {
        self.live.lock().current.as_ref().map(|v| v.result.clone())
    }

    /// The latest verdict with the frame it came from.
    pub fn current_verdict(&self) -> Option<Verdict> {
        self.live.lock().current.clone()
    }

    /// The player's answer this round, if given.
    pub fn last_answer(&self) -> Option<Classification> {
        self.live.lock().answer.as_ref().map(|a| a.choice)
    }

    /// This round's answer together with the verdict it was scored against.
    ///
    /// Verdicts published after the answer replace [`Self::current_verdict`]
    /// but not this one.
    pub fn answered(&self) -> Option<Answered> {
        self.live.lock().answer.clone()
    }

    /// Number of analysis attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.live.lock().next_generation
    }

    /// Number of finished attempts dropped because they were superseded.
    pub fn stale_discards(&self) -> u64 {
        self.live.lock().discarded
    }

    /// Watch for new results. `None` is sent whenever the result is cleared.
    pub fn subscribe(&self) -> watch::Receiver<Option<Verdict>> {
        self.results.subscribe()
    }

    /// Idle → Armed. Any camera already attached is released first.
    pub fn attach_camera(&mut self, source: Box<dyn FrameSource>) -> AppResult<()> {
        if self.camera.is_some() {
            self.stop_camera();
        }
        let session =
            CameraSession::attach(source).map_err(|e| AppError::CameraDenied(e.to_string()))?;
        self.camera = Some(Arc::new(Mutex::new(session)));
        self.phase = GamePhase::Armed;
        Ok(())
    }

    /// Open a directory of images as the camera and attach it.
    ///
    /// Returns the number of frames found. A missing, unreadable or empty
    /// directory is [`AppError::CameraDenied`].
    pub fn attach_directory(&mut self, dir: &Path) -> AppResult<usize> {
        let camera =
            DirectoryCamera::open(dir).map_err(|e| AppError::CameraDenied(e.to_string()))?;
        let frames = camera.frame_count();
        self.attach_camera(Box::new(camera))?;
        Ok(frames)
    }

    /// Armed → Streaming. Clears the previous result and answer.
    pub fn start_analysis(&mut self) -> AppResult<()> {
        if self.phase != GamePhase::Armed {
            return Err(AppError::InvalidState {
                action: "start analysis",
                phase: self.phase,
            });
        }
        let Some(camera) = &self.camera else {
            return Err(AppError::InvalidState {
                action: "start analysis",
                phase: self.phase,
            });
        };
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| AppError::Runtime(e.to_string()))?;

        let owner = self.auth.current_user().map(|u| u.id);
        let pipeline = Pipeline::new(
            Uploader::new(self.store.clone(), owner.as_deref()),
            self.classifier.clone(),
        );

        let epoch = {
            let mut live = self.live.lock();
            live.epoch += 1;
            live.current = None;
            live.answer = None;
            live.epoch
        };
        self.results.send_replace(None);

        let ctx = LoopContext {
            pipeline,
            camera: Arc::downgrade(camera),
            live: self.live.clone(),
            results: self.results.clone(),
            timing: self.timing,
            epoch,
        };
        self.analysis = Some(spawn_loop(&handle, ctx));
        self.phase = GamePhase::Streaming;
        Ok(())
    }

    /// Streaming → Armed. Cancels the timer; results still in flight are dropped.
    pub fn stop_analysis(&mut self) -> AppResult<()> {
        if self.phase != GamePhase::Streaming {
            return Err(AppError::InvalidState {
                action: "stop analysis",
                phase: self.phase,
            });
        }
        self.cancel_loop();
        self.phase = GamePhase::Armed;
        tracing::info!("Live analysis stopped");
        Ok(())
    }

    /// Any phase → Idle. Stops analysis and releases every camera track.
    pub fn stop_camera(&mut self) {
        self.cancel_loop();
        if let Some(camera) = self.camera.take() {
            camera.lock().unwrap_or_else(|e| e.into_inner()).stop();
        }
        self.phase = GamePhase::Idle;
    }

    /// Score the player's guess against the current result.
    ///
    /// One answer per round; further guesses fail until [`Self::next_round`].
    pub fn submit_answer(&mut self, choice: Classification) -> AppResult<Answered> {
        let answered = {
            let mut live = self.live.lock();
            if live.answer.is_some() {
                return Err(AppError::AlreadyAnswered);
            }
            let verdict = live.current.clone().ok_or(AppError::NoResult)?;
            let scored = score_answer(&self.stats, choice, &verdict.result);
            let answered = Answered {
                choice,
                verdict,
                scored,
            };
            live.answer = Some(answered.clone());
            answered
        };
        let scored = answered.scored;
        self.stats = scored.stats;
        tracing::info!(
            "Answered {choice}: {} (+{} points, score {}, level {})",
            if scored.correct { "correct" } else { "wrong" },
            scored.points,
            scored.stats.score,
            scored.stats.level
        );
        Ok(answered)
    }

    /// Clear the current result and answer to judge the next item.
    pub fn next_round(&mut self) {
        {
            let mut live = self.live.lock();
            live.current = None;
            live.answer = None;
        }
        self.results.send_replace(None);
    }

    /// Tear everything down.
    pub fn shutdown(&mut self) {
        self.stop_camera();
    }

    fn cancel_loop(&mut self) {
        if let Some(task) = self.analysis.take() {
            task.abort();
            self.live.lock().epoch += 1;
        }
    }
}

impl Drop for GameController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
