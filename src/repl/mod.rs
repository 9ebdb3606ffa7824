//! Interactive terminal chat for campaignd
//!
//! Runs the same memory manager the HTTP server uses, one session per run.

mod session;

pub use session::ReplSession;

use std::sync::Arc;

use eyre::Result;

use crate::assistant::MemoryManager;
use crate::config::Config;
use crate::llm::create_client;

/// Run the interactive chat
///
/// This is the main entry point for `campaignd chat`.
pub async fn run_interactive(config: &Config, initial_message: Option<String>) -> Result<()> {
    config.validate()?;

    let llm = create_client(&config.llm).map_err(|e| eyre::eyre!("Failed to create LLM client: {}", e))?;
    let manager = Arc::new(MemoryManager::new(llm, config.assistant.clone()));

    let mut session = ReplSession::new(manager);
    session.run(initial_message).await
}
