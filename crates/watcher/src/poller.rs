//! The long-running poll loop and its control surface.
//!
//! [`start_polling`] spawns a loop that drives a [`PollCycle`] until its
//! [`PollHandle`] is stopped or dropped. Failed cycles are logged and retried
//! after the backoff delay; nothing a cycle does can end the loop.
//!
//! Cancellation is cooperative. It is observed before each cycle and while
//! sleeping, never in the middle of a request or a handler call.

use std::sync::Arc;
use std::time::Duration;

use colab::{ColabError, Interests, ItemFeed, ItemVoter, PollerId, RetryPolicy};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{ActivityHandler, Backoff, PollConfig, PollCycle};

/// Observable state of a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Spawned, first cycle not yet started.
    Idle,
    Running,
    /// Waiting out the interval after a successful cycle.
    Sleeping,
    /// Waiting out the backoff delay after a failed cycle.
    ErrorSleeping,
    Stopped,
}

/// Totals reported when a loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub cycles: u64,
    pub failures: u64,
    pub dispatched: u64,
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

struct Poller {
    id: PollerId,
    cycle: PollCycle,
    interval: Duration,
    backoff: Backoff,
    state: watch::Sender<LoopState>,
    interests: watch::Receiver<Interests>,
}

impl Poller {
    async fn run(mut self, cancel: CancellationToken) -> PollSummary {
        let mut summary = PollSummary::default();
        let mut consecutive_failures: u32 = 0;

        info!(
            interval_secs = self.interval.as_secs(),
            interests = %self.cycle.interests(),
            "poll loop started"
        );

        while !cancel.is_cancelled() {
            self.apply_interest_update();
            self.state.send_replace(LoopState::Running);

            let delay = match self.cycle.run().await {
                Ok(report) => {
                    consecutive_failures = 0;
                    summary.dispatched += report.dispatched as u64;
                    self.state.send_replace(LoopState::Sleeping);
                    self.interval
                }
                Err(err) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    summary.failures += 1;
                    let delay = failure_delay(self.backoff, self.interval, consecutive_failures, &err);
                    match err.retry_policy() {
                        RetryPolicy::Retryable { .. } => warn!(
                            error = %err,
                            consecutive_failures,
                            retry_in_secs = delay.as_secs(),
                            "poll cycle failed"
                        ),
                        RetryPolicy::NonRetryable => error!(
                            error = %err,
                            consecutive_failures,
                            retry_in_secs = delay.as_secs(),
                            "poll cycle failed; will keep retrying"
                        ),
                    }
                    self.state.send_replace(LoopState::ErrorSleeping);
                    delay
                }
            };
            summary.cycles += 1;

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.state.send_replace(LoopState::Stopped);
        info!(
            cycles = summary.cycles,
            failures = summary.failures,
            dispatched = summary.dispatched,
            "poll loop stopped"
        );
        summary
    }

    fn apply_interest_update(&mut self) {
        if !self.interests.has_changed().unwrap_or(false) {
            return;
        }
        let interests = self.interests.borrow_and_update().clone();
        debug!(interests = %interests, "interests updated");
        self.cycle.set_interests(interests);
    }
}

/// Delay after a failed cycle: the backoff schedule, stretched to honour any
/// server-provided `Retry-After`.
fn failure_delay(
    backoff: Backoff,
    interval: Duration,
    consecutive_failures: u32,
    err: &ColabError,
) -> Duration {
    let scheduled = backoff.delay(interval, consecutive_failures);
    match err.retry_policy() {
        RetryPolicy::Retryable { after: Some(after) } => scheduled.max(after),
        _ => scheduled,
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Control handle for a running poll loop. Dropping it cancels the loop.
pub struct PollHandle {
    id: PollerId,
    cancel: CancellationToken,
    state: watch::Receiver<LoopState>,
    interests: watch::Sender<Interests>,
    task: Option<JoinHandle<PollSummary>>,
}

impl PollHandle {
    pub fn id(&self) -> PollerId {
        self.id
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// A receiver that observes every state transition.
    pub fn state_changes(&self) -> watch::Receiver<LoopState> {
        self.state.clone()
    }

    /// Replaces the interest set, effective from the next cycle.
    pub fn set_interests(&self, interests: Interests) {
        self.interests.send_replace(interests);
    }

    /// Requests cancellation and waits for the loop to finish its current
    /// cycle, if any.
    pub async fn stop(mut self) -> PollSummary {
        self.cancel.cancel();
        let Some(task) = self.task.take() else {
            return PollSummary::default();
        };
        match task.await {
            Ok(summary) => summary,
            Err(err) => {
                error!(poller_id = %self.id, error = %err, "poll loop task failed");
                PollSummary::default()
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for PollHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

/// Spawns a poll loop for `cycle` on the current Tokio runtime.
///
/// Fails with [`ColabError::Configuration`] when called outside a runtime or
/// when the cycle's auto-actions cannot be carried out.
pub fn start_polling(cycle: PollCycle, config: &PollConfig) -> Result<PollHandle, ColabError> {
    if !cycle.auto_actions_ready() {
        return Err(ColabError::configuration(
            "auto-upvote requires a voter to be supplied",
        ));
    }
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|_| ColabError::configuration("polling must be started inside a Tokio runtime"))?;

    let id = PollerId::new_random();
    let cancel = CancellationToken::new();
    let (state_tx, state_rx) = watch::channel(LoopState::Idle);
    let (interests_tx, interests_rx) = watch::channel(cycle.interests().clone());

    let poller = Poller {
        id,
        cycle,
        interval: config.interval(),
        backoff: config.backoff(),
        state: state_tx,
        interests: interests_rx,
    };
    let span = info_span!("poller", poller_id = %id);
    let task = runtime.spawn(poller.run(cancel.clone()).instrument(span));

    Ok(PollHandle {
        id,
        cancel,
        state: state_rx,
        interests: interests_tx,
        task: Some(task),
    })
}

// ---------------------------------------------------------------------------
// Facade
// ---------------------------------------------------------------------------

/// Owns at most one poll loop over a feed.
///
/// Each [`Watcher::start_polling`] begins with an empty Seen-Set.
pub struct Watcher {
    feed: Arc<dyn ItemFeed>,
    voter: Option<Arc<dyn ItemVoter>>,
    config: PollConfig,
    active: Option<PollHandle>,
}

impl Watcher {
    pub fn new(feed: Arc<dyn ItemFeed>, config: PollConfig) -> Self {
        Self {
            feed,
            voter: None,
            config,
            active: None,
        }
    }

    pub fn with_voter(mut self, voter: Arc<dyn ItemVoter>) -> Self {
        self.voter = Some(voter);
        self
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub fn is_polling(&self) -> bool {
        self.active.is_some()
    }

    /// State of the active loop, or [`LoopState::Idle`] when none is running.
    pub fn state(&self) -> LoopState {
        self.active
            .as_ref()
            .map_or(LoopState::Idle, PollHandle::state)
    }

    /// Starts polling with `handler`. Fails if a loop is already running.
    pub fn start_polling(
        &mut self,
        handler: Arc<dyn ActivityHandler>,
    ) -> Result<PollerId, ColabError> {
        if let Some(active) = &self.active {
            return Err(ColabError::configuration(format!(
                "already polling (poller {})",
                active.id()
            )));
        }
        let mut cycle = PollCycle::new(self.feed.clone(), handler, &self.config);
        if let Some(voter) = &self.voter {
            cycle = cycle.with_voter(voter.clone());
        }
        let handle = start_polling(cycle, &self.config)?;
        let id = handle.id();
        self.active = Some(handle);
        Ok(id)
    }

    /// Replaces the interest set for the running loop and any later one.
    pub fn set_interests(&mut self, interests: Interests) {
        if let Some(active) = &self.active {
            active.set_interests(interests.clone());
        }
        self.config.replace_interests(interests);
    }

    /// Stops the running loop. Returns `None` when nothing was running.
    pub async fn stop_polling(&mut self) -> Option<PollSummary> {
        let handle = self.active.take()?;
        Some(handle.stop().await)
    }
}
