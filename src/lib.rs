//! campaignd - AI workflow coordination for a brand and creator marketplace
//!
//! Two independent components that talk to a slow, fallible generation
//! service and degrade gracefully:
//!
//! - **Generation readiness poller**: polls a job-status endpoint while a
//!   simulated progress animation runs, and navigates forward exactly once
//!   when both agree the campaign is ready.
//! - **Conversational memory window manager**: keeps one message log per
//!   session under a token budget and answers each turn through an LLM.
//!
//! # Modules
//!
//! - [`poller`] - Readiness state machine and cancellable polling loop
//! - [`assistant`] - Token-budgeted session memory and the turn manager
//! - [`llm`] - LLM client trait and Anthropic implementation
//! - [`server`] - HTTP surface for the assistant
//! - [`repl`] - Terminal chat over the same manager
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod assistant;
pub mod cli;
pub mod config;
pub mod llm;
pub mod poller;
pub mod repl;
pub mod server;

// Re-export commonly used types
pub use assistant::{AssistantError, MemoryManager, MessageWindow, SessionStore};
pub use config::{AssistantConfig, Config, LlmConfig, PollerConfig};
pub use llm::{AnthropicClient, CompletionRequest, CompletionResponse, LlmClient, LlmError};
pub use poller::{
    GenerationPoller, JobId, JobStatus, JobStatusSource, Navigator, PollError, PollOutcome, PollPhase, PollRequest,
};
