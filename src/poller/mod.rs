//! Generation readiness poller
//!
//! Tracks an asynchronously produced campaign-generation result and decides
//! when to move the user forward: only once the simulated progress animation
//! has finished *and* the backend reports the result ready.

mod advisory;
pub mod client_state;
mod engine;
mod error;
mod state;
mod status;

pub use advisory::{ADVISORY_MESSAGES, Rotation, TIPS};
pub use client_state::ClientState;
pub use engine::{GenerationPoller, Navigator, PollOutcome, PollRequest, PollSnapshot};
pub use error::PollError;
pub use state::{PROGRESS_CEILING, PollEffect, PollEvent, PollPhase, PollState, progress_step};
pub use status::{HttpJobStatusSource, JobId, JobStatus, JobStatusSource, StatusError};
