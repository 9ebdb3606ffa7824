//! GenerationPoller - cancellable readiness polling loop
//!
//! Drives a [`PollState`] from independent timers (progress animation, status
//! checks, advisory rotation) and at most one in-flight status check. Every
//! state mutation is preceded by a cancellation check so a torn-down screen
//! never sees late updates or a stray navigation.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, OptionFuture};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::advisory::{ADVISORY_MESSAGES, Rotation, TIPS};
use super::error::PollError;
use super::state::{PollEffect, PollEvent, PollPhase, PollState};
use super::status::{JobId, JobStatus, JobStatusSource, StatusError};
use crate::config::PollerConfig;

/// Everything needed to poll one job
#[derive(Debug, Clone)]
pub struct PollRequest {
    job_id: JobId,
    auth_token: Option<String>,
}

impl PollRequest {
    pub fn new(job_id: JobId, auth_token: Option<String>) -> Self {
        Self { job_id, auth_token }
    }

    /// Build a request from previously stored client state
    ///
    /// A missing or blank job id is a precondition failure.
    pub fn from_stored(job_id: Option<&str>, auth_token: Option<&str>) -> Result<Self, PollError> {
        debug!(has_job = job_id.is_some(), has_token = auth_token.is_some(), "PollRequest::from_stored: called");
        let job_id = job_id.and_then(JobId::parse).ok_or(PollError::MissingJob)?;
        let auth_token = auth_token.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string);
        Ok(Self::new(job_id, auth_token))
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }
}

/// Forward-navigation side effect fired once the campaign is ready
pub trait Navigator: Send + Sync {
    fn navigate(&self, job_id: &JobId, result: Option<&serde_json::Value>);
}

/// Latest view of a poller run, for rendering
#[derive(Debug, Clone, Serialize)]
pub struct PollSnapshot {
    pub job_id: Option<String>,
    pub phase: PollPhase,
    pub progress: f64,
    pub attempts: u32,
    pub max_attempts: u32,
    pub result_ready: bool,
    pub status_text: String,
    pub advisory: String,
    pub tip: String,
    pub revision: u64,
    pub transitions: Vec<PollPhase>,
}

impl PollSnapshot {
    fn idle() -> Self {
        Self {
            job_id: None,
            phase: PollPhase::Polling,
            progress: 0.0,
            attempts: 0,
            max_attempts: 0,
            result_ready: false,
            status_text: String::new(),
            advisory: String::new(),
            tip: String::new(),
            revision: 0,
            transitions: Vec::new(),
        }
    }

    fn capture(job_id: &JobId, state: &PollState, advisory: &Rotation, tips: &Rotation) -> Self {
        Self {
            job_id: Some(job_id.to_string()),
            phase: state.phase(),
            progress: state.simulated_progress(),
            attempts: state.attempts(),
            max_attempts: state.max_attempts(),
            result_ready: state.result_ready(),
            status_text: state.phase().status_text().to_string(),
            advisory: advisory.current().to_string(),
            tip: tips.current().to_string(),
            revision: state.revision(),
            transitions: state.transitions().to_vec(),
        }
    }
}

/// How a run ended when it did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Both signals agreed and navigation fired
    Navigated {
        job_id: JobId,
        attempts: u32,
        result: Option<serde_json::Value>,
    },
    /// The consumer tore the run down first
    Cancelled,
}

/// What woke the loop up
enum Wake {
    Cancelled,
    Timer(PollEvent),
    Status(Result<JobStatus, StatusError>),
    Advisory,
    Tip,
}

type StatusFuture = BoxFuture<'static, Result<JobStatus, StatusError>>;

/// Polls a generation job until its result is ready and the progress
/// animation has finished, then navigates exactly once.
pub struct GenerationPoller {
    source: Arc<dyn JobStatusSource>,
    navigator: Arc<dyn Navigator>,
    config: PollerConfig,
    snapshot_tx: watch::Sender<PollSnapshot>,
}

impl GenerationPoller {
    pub fn new(source: Arc<dyn JobStatusSource>, navigator: Arc<dyn Navigator>, config: PollerConfig) -> Self {
        debug!(max_attempts = config.max_attempts, "GenerationPoller::new: called");
        let (snapshot_tx, _) = watch::channel(PollSnapshot::idle());
        Self {
            source,
            navigator,
            config,
            snapshot_tx,
        }
    }

    /// Watch the latest snapshot of the current run
    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Latest snapshot of the current run
    pub fn snapshot(&self) -> PollSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Start polling from stored client state
    ///
    /// Fails with [`PollError::MissingJob`] before any status check when no
    /// job id was stored.
    pub async fn start_stored(
        &self,
        job_id: Option<&str>,
        auth_token: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<PollOutcome, PollError> {
        let request = PollRequest::from_stored(job_id, auth_token)?;
        self.start(&request, cancel).await
    }

    /// Run one poll session to completion, timeout, rejection or cancellation
    ///
    /// Each call starts from a fresh state, so calling it again after a
    /// timeout is a full retry with the attempt counter reset.
    pub async fn start(&self, request: &PollRequest, cancel: CancellationToken) -> Result<PollOutcome, PollError> {
        let job_id = request.job_id.clone();
        info!(%job_id, max_attempts = self.config.max_attempts, "Poller started");

        let mut state = PollState::new(self.config.max_attempts);
        let mut advisory = Rotation::new(ADVISORY_MESSAGES);
        let mut tips = Rotation::shuffled(TIPS);
        let mut result: Option<serde_json::Value> = None;
        self.publish(&job_id, &state, &advisory, &tips);

        let mut progress_tick = ticker(self.config.progress_interval(), false);
        let mut poll_tick = ticker(self.config.poll_interval(), false);
        let mut advisory_tick = ticker(self.config.advisory_interval(), true);
        let mut tip_tick = ticker(self.config.tip_interval(), true);

        let mut in_flight: Option<StatusFuture> = None;
        let mut settle: Option<Pin<Box<Sleep>>> = None;

        loop {
            let wake = tokio::select! {
                biased;
                _ = cancel.cancelled() => Wake::Cancelled,
                Some(status) = OptionFuture::from(in_flight.as_mut()), if in_flight.is_some() => {
                    Wake::Status(status)
                }
                Some(()) = OptionFuture::from(settle.as_mut()), if settle.is_some() => {
                    Wake::Timer(PollEvent::SettleElapsed)
                }
                _ = progress_tick.tick(), if state.animating() => Wake::Timer(PollEvent::ProgressTick),
                _ = poll_tick.tick(), if in_flight.is_none() && state.wants_status() => {
                    Wake::Timer(PollEvent::PollTick)
                }
                _ = advisory_tick.tick() => Wake::Advisory,
                _ = tip_tick.tick() => Wake::Tip,
            };

            // Teardown guard: nothing below may run once the consumer is gone
            let wake = if cancel.is_cancelled() { Wake::Cancelled } else { wake };

            let mut rejection = None;
            let event = match wake {
                Wake::Cancelled => {
                    info!(%job_id, attempts = state.attempts(), phase = %state.phase(), "Poller torn down");
                    return Ok(PollOutcome::Cancelled);
                }
                Wake::Timer(event) => event,
                Wake::Status(outcome) => {
                    in_flight = None;
                    match outcome {
                        Ok(status) => {
                            debug!(%job_id, result_ready = status.result_ready, "Status check returned");
                            if status.result_ready && result.is_none() {
                                result = status.result;
                            }
                            PollEvent::StatusReported {
                                result_ready: status.result_ready,
                            }
                        }
                        Err(e) if e.is_fatal() => {
                            error!(%job_id, error = %e, "Status endpoint rejected the job");
                            rejection = Some(e);
                            PollEvent::Rejected
                        }
                        Err(e) => {
                            warn!(%job_id, attempt = state.attempts(), error = %e, "Status check failed, will retry");
                            PollEvent::CheckFailed
                        }
                    }
                }
                Wake::Advisory => {
                    advisory.advance();
                    self.publish(&job_id, &state, &advisory, &tips);
                    continue;
                }
                Wake::Tip => {
                    tips.advance();
                    self.publish(&job_id, &state, &advisory, &tips);
                    continue;
                }
            };

            if matches!(event, PollEvent::SettleElapsed) {
                settle = None;
            }

            let effects = state.apply(event);
            self.publish(&job_id, &state, &advisory, &tips);

            if let Some(e) = rejection {
                return Err(PollError::Rejected(e));
            }

            for effect in effects {
                match effect {
                    PollEffect::IssueCheck { attempt } => {
                        debug!(%job_id, attempt, "Issuing status check");
                        in_flight = Some(self.issue_check(request));
                    }
                    PollEffect::ArmSettle => {
                        debug!(%job_id, settle_ms = self.config.settle_delay_ms, "Both signals ready, settling");
                        settle = Some(Box::pin(tokio::time::sleep(self.config.settle_delay())));
                    }
                    PollEffect::Navigate => {
                        info!(%job_id, attempts = state.attempts(), "Campaign ready, navigating");
                        self.navigator.navigate(&job_id, result.as_ref());
                        return Ok(PollOutcome::Navigated {
                            job_id,
                            attempts: state.attempts(),
                            result,
                        });
                    }
                    PollEffect::TimedOut => {
                        warn!(%job_id, attempts = state.attempts(), "Poller timed out");
                        return Err(PollError::TimedOut {
                            attempts: state.attempts(),
                        });
                    }
                }
            }
        }
    }

    fn issue_check(&self, request: &PollRequest) -> StatusFuture {
        let source = Arc::clone(&self.source);
        let job_id = request.job_id.clone();
        let auth_token = request.auth_token.clone();
        async move { source.check(&job_id, auth_token.as_deref()).await }.boxed()
    }

    fn publish(&self, job_id: &JobId, state: &PollState, advisory: &Rotation, tips: &Rotation) {
        self.snapshot_tx
            .send_replace(PollSnapshot::capture(job_id, state, advisory, tips));
    }
}

/// Interval that never bursts to catch up; cosmetic timers skip the
/// immediate first tick
fn ticker(period: Duration, delay_first: bool) -> tokio::time::Interval {
    let period = period.max(Duration::from_millis(1));
    let mut interval = if delay_first {
        tokio::time::interval_at(Instant::now() + period, period)
    } else {
        tokio::time::interval(period)
    };
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
