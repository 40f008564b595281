//! The live analysis loop.
//!
//! A timer ticks at a fixed cadence; real work starts at most once per
//! throttle window. Every attempt carries a generation number, and the
//! loop as a whole carries an epoch. A finished attempt is stored only if
//! its epoch is still current and no newer attempt has already been stored,
//! so late results from a stopped loop or a slow earlier attempt are dropped.
//!
//! Publishing a verdict never touches the answered round: once the player
//! has answered, the verdict they were scored against is kept aside until
//! the next round.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use ecosort::{AnalysisResult, CameraSession};

use super::controller::Answered;
use super::pipeline::Pipeline;
use crate::config::LoopTiming;

/// One published analysis and the frame it was made from.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub result: AnalysisResult,
    pub frame: String,
    pub generation: u64,
}

/// State written by analysis attempts and read by the controller.
#[derive(Debug, Default)]
pub(crate) struct LiveState {
    pub current: Option<Verdict>,
    pub answer: Option<Answered>,
    pub epoch: u64,
    pub next_generation: u64,
    pub applied_generation: u64,
    pub discarded: u64,
}

/// Shared handle to [`LiveState`].
#[derive(Clone, Default)]
pub(crate) struct SharedLive(Arc<Mutex<LiveState>>);

impl SharedLive {
    pub fn lock(&self) -> MutexGuard<'_, LiveState> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Identifies one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket {
    pub epoch: u64,
    pub generation: u64,
}

/// Everything a running loop needs.
#[derive(Clone)]
pub(crate) struct LoopContext {
    pub pipeline: Pipeline,
    pub camera: Weak<Mutex<CameraSession>>,
    pub live: SharedLive,
    pub results: Arc<watch::Sender<Option<Verdict>>>,
    pub timing: LoopTiming,
    pub epoch: u64,
}

impl LoopContext {
    fn issue_ticket(&self) -> Ticket {
        let mut live = self.live.lock();
        live.next_generation += 1;
        Ticket {
            epoch: self.epoch,
            generation: live.next_generation,
        }
    }

    /// Store `verdict` unless the attempt has been superseded.
    fn publish(&self, ticket: Ticket, verdict: Verdict) -> bool {
        let mut live = self.live.lock();
        if ticket.epoch != live.epoch || ticket.generation <= live.applied_generation {
            live.discarded += 1;
            tracing::debug!(
                "Discarding stale result (epoch {}, generation {})",
                ticket.epoch,
                ticket.generation
            );
            return false;
        }
        live.applied_generation = ticket.generation;
        live.current = Some(verdict.clone());
        drop(live);
        self.results.send_replace(Some(verdict));
        true
    }
}

/// Spawn the ticking loop on `handle`. Abort the returned handle to stop it.
pub(crate) fn spawn_loop(handle: &tokio::runtime::Handle, ctx: LoopContext) -> JoinHandle<()> {
    let spawner = handle.clone();
    handle.spawn(async move {
        let mut ticker = tokio::time::interval(ctx.timing.tick());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_attempt: Option<Instant> = None;

        tracing::info!(
            "Live analysis started (tick {:?}, throttle {:?})",
            ctx.timing.tick(),
            ctx.timing.throttle()
        );

        loop {
            ticker.tick().await;
            let now = Instant::now();
            if last_attempt.is_some_and(|t| now.duration_since(t) < ctx.timing.throttle()) {
                continue;
            }
            last_attempt = Some(now);

            let ticket = ctx.issue_ticket();
            tracing::debug!("Analysis attempt {}", ticket.generation);
            spawner.spawn(run_attempt(ctx.clone(), ticket));
        }
    })
}

async fn run_attempt(ctx: LoopContext, ticket: Ticket) {
    let Some(still) = ctx.pipeline.capture(&ctx.camera).await else {
        return;
    };
    let result = match ctx.pipeline.analyze_frame(&still).await {
        Ok(classified) => classified.into_result(),
        Err(e) => {
            tracing::warn!("Analysis attempt {} failed, using fallback: {e}", ticket.generation);
            AnalysisResult::fallback()
        }
    };
    let verdict = Verdict {
        result,
        frame: still.label,
        generation: ticket.generation,
    };
    ctx.publish(ticket, verdict);
}
