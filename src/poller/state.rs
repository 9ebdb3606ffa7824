//! Poll state machine
//!
//! Pure transition function for one poller run. The async engine feeds timer
//! and network events in and executes the effects that come back out.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

/// Simulated progress never goes past this value
pub const PROGRESS_CEILING: f64 = 100.0;

/// Decelerating step for the simulated progress animation
pub fn progress_step(progress: f64) -> f64 {
    if progress < 70.0 {
        3.0
    } else if progress < 85.0 {
        2.0
    } else if progress < 95.0 {
        1.0
    } else if progress < PROGRESS_CEILING {
        0.5
    } else {
        0.0
    }
}

/// Lifecycle phase of a poller run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    /// Animating progress and checking job status
    Polling,
    /// Animation finished, still waiting on the backend result
    ReadyPendingAnimation,
    /// Both signals agree; navigation follows after the settle delay
    Complete,
    /// Attempt budget exhausted before the result was ready
    TimedOut,
    /// The backend rejected the job or the credentials
    Errored,
}

impl PollPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, PollPhase::Complete | PollPhase::TimedOut | PollPhase::Errored)
    }

    /// Transition table; only `Polling` may loop on itself
    pub fn can_transition_to(self, next: PollPhase) -> bool {
        use PollPhase::*;
        match self {
            Polling => true,
            ReadyPendingAnimation => matches!(next, Complete | TimedOut | Errored),
            Complete | TimedOut | Errored => false,
        }
    }

    /// User-facing status line for this phase
    pub fn status_text(self) -> &'static str {
        match self {
            PollPhase::Polling => "Generating your campaign...",
            PollPhase::ReadyPendingAnimation => "Finalizing your campaign...",
            PollPhase::Complete => "Your campaign is ready!",
            PollPhase::TimedOut => "This is taking longer than expected. Please try again.",
            PollPhase::Errored => "We couldn't load this campaign. Please start a new generation.",
        }
    }
}

impl fmt::Display for PollPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PollPhase::Polling => "polling",
            PollPhase::ReadyPendingAnimation => "ready_pending_animation",
            PollPhase::Complete => "complete",
            PollPhase::TimedOut => "timed_out",
            PollPhase::Errored => "errored",
        };
        write!(f, "{}", name)
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// The progress animation timer fired
    ProgressTick,
    /// The status-check timer fired
    PollTick,
    /// A status check came back
    StatusReported { result_ready: bool },
    /// A status check failed in transit
    CheckFailed,
    /// The backend refused the job (unknown job, bad credentials)
    Rejected,
    /// The settle delay after completion ran out
    SettleElapsed,
}

/// Work the engine must perform after an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEffect {
    /// Send status check number `attempt`
    IssueCheck { attempt: u32 },
    /// Start the settle timer
    ArmSettle,
    /// Fire the forward navigation
    Navigate,
    /// Give up; attempt budget exhausted
    TimedOut,
}

/// State of one poller run
#[derive(Debug, Clone, Serialize)]
pub struct PollState {
    attempts: u32,
    max_attempts: u32,
    simulated_progress: f64,
    result_ready: bool,
    phase: PollPhase,
    navigated: bool,
    revision: u64,
    transitions: Vec<PollPhase>,
}

impl PollState {
    pub fn new(max_attempts: u32) -> Self {
        debug!(%max_attempts, "PollState::new: called");
        Self {
            attempts: 0,
            max_attempts,
            simulated_progress: 0.0,
            result_ready: false,
            phase: PollPhase::Polling,
            navigated: false,
            revision: 0,
            transitions: vec![PollPhase::Polling],
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn simulated_progress(&self) -> f64 {
        self.simulated_progress
    }

    pub fn result_ready(&self) -> bool {
        self.result_ready
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    pub fn navigated(&self) -> bool {
        self.navigated
    }

    /// Incremented on every mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Phases entered so far, starting with `Polling`
    pub fn transitions(&self) -> &[PollPhase] {
        &self.transitions
    }

    /// Whether another status check is useful
    pub fn wants_status(&self) -> bool {
        matches!(self.phase, PollPhase::Polling | PollPhase::ReadyPendingAnimation) && !self.result_ready
    }

    /// Whether the progress animation still has steps left
    pub fn animating(&self) -> bool {
        !self.phase.is_terminal() && self.simulated_progress < PROGRESS_CEILING
    }

    /// Apply one event and return the effects the engine must run
    pub fn apply(&mut self, event: PollEvent) -> Vec<PollEffect> {
        debug!(?event, phase = %self.phase, attempts = self.attempts, "PollState::apply: called");
        match event {
            PollEvent::ProgressTick => {
                if !self.animating() {
                    return Vec::new();
                }
                let step = progress_step(self.simulated_progress);
                self.simulated_progress = (self.simulated_progress + step).min(PROGRESS_CEILING);
                self.revision += 1;
                self.evaluate_gate()
            }
            PollEvent::PollTick => {
                if !self.wants_status() {
                    return Vec::new();
                }
                if self.attempts >= self.max_attempts {
                    warn!(attempts = self.attempts, "PollState::apply: attempt budget exhausted");
                    self.enter(PollPhase::TimedOut);
                    return vec![PollEffect::TimedOut];
                }
                self.attempts += 1;
                self.revision += 1;
                vec![PollEffect::IssueCheck { attempt: self.attempts }]
            }
            PollEvent::StatusReported { result_ready } => {
                if self.phase.is_terminal() {
                    return Vec::new();
                }
                // Readiness is sticky: a stale `false` never clears it
                if result_ready && !self.result_ready {
                    self.result_ready = true;
                    self.revision += 1;
                }
                self.evaluate_gate()
            }
            // The attempt was already counted when the check was issued
            PollEvent::CheckFailed => Vec::new(),
            PollEvent::Rejected => {
                self.enter(PollPhase::Errored);
                Vec::new()
            }
            PollEvent::SettleElapsed => {
                if self.phase != PollPhase::Complete || self.navigated {
                    return Vec::new();
                }
                self.navigated = true;
                self.revision += 1;
                vec![PollEffect::Navigate]
            }
        }
    }

    fn evaluate_gate(&mut self) -> Vec<PollEffect> {
        let animation_done = self.simulated_progress >= PROGRESS_CEILING;
        if animation_done && self.result_ready {
            if self.enter(PollPhase::Complete) {
                return vec![PollEffect::ArmSettle];
            }
        } else if animation_done && self.phase == PollPhase::Polling {
            self.enter(PollPhase::ReadyPendingAnimation);
        }
        Vec::new()
    }

    fn enter(&mut self, next: PollPhase) -> bool {
        if self.phase == next {
            return false;
        }
        if !self.phase.can_transition_to(next) {
            warn!(from = %self.phase, to = %next, "PollState::enter: refusing illegal transition");
            return false;
        }
        info!(from = %self.phase, to = %next, attempts = self.attempts, "Poll phase changed");
        self.phase = next;
        self.transitions.push(next);
        self.revision += 1;
        true
    }
}
