//! MemoryManager - bounded conversational memory in front of the LLM
//!
//! One turn: append the user message, trim the window to the token budget,
//! forward the window to the model, append the reply. The turn works on a
//! copy of the window and commits only when the model answered, so a failed
//! turn leaves the session exactly as it was.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::error::AssistantError;
use super::session::{SessionSeed, SessionStore};
use crate::config::AssistantConfig;
use crate::llm::{CompletionRequest, LlmClient, Message};

pub struct MemoryManager {
    llm: Arc<dyn LlmClient>,
    sessions: Arc<SessionStore>,
    config: AssistantConfig,
}

impl MemoryManager {
    pub fn new(llm: Arc<dyn LlmClient>, config: AssistantConfig) -> Self {
        debug!(token_budget = config.token_budget, "MemoryManager::new: called");
        let sessions = Arc::new(SessionStore::new(SessionSeed::from(&config)));
        Self { llm, sessions, config }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// Run one conversation turn for `session_id`
    ///
    /// Blank input fails with [`AssistantError::EmptyInput`] before the
    /// session is touched or the model contacted.
    pub async fn append_and_respond(&self, session_id: &str, user_message: &str) -> Result<String, AssistantError> {
        debug!(%session_id, len = user_message.len(), "append_and_respond: called");
        if user_message.trim().is_empty() {
            return Err(AssistantError::EmptyInput);
        }

        // Held until the reply is stored: same-session turns run one at a time
        let mut guard = self.sessions.lock(session_id).await;

        let mut window = guard.window().clone();
        let report = window.append_and_enforce_budget(Message::user(user_message));
        if report.removed > 0 {
            debug!(%session_id, removed = report.removed, total = report.total_tokens, "Trimmed conversation window");
        }
        if report.over_budget {
            warn!(
                %session_id,
                total = report.total_tokens,
                budget = window.budget(),
                "Window still over budget after trimming"
            );
        }

        let request = CompletionRequest {
            system_prompt: self.config.system_prompt.clone(),
            messages: window.to_vec(),
            max_tokens: self.config.reply_max_tokens,
        };

        let timeout = self.config.reply_timeout();
        let response = tokio::time::timeout(timeout, self.llm.complete(request))
            .await
            .map_err(|_| AssistantError::Timeout(timeout))??;

        let reply = response
            .content
            .filter(|text| !text.trim().is_empty())
            .ok_or(AssistantError::EmptyReply)?;

        window.push_reply(Message::assistant(reply.clone()));
        guard.commit(window);
        debug!(%session_id, turns = guard.turns(), total = guard.window().total_tokens(), "Turn committed");
        Ok(reply)
    }

    /// Request-boundary variant: always produces a reply
    pub async fn respond(&self, session_id: &str, user_message: &str) -> String {
        match self.append_and_respond(session_id, user_message).await {
            Ok(reply) => reply,
            Err(e) if !e.is_model_failure() => {
                info!(%session_id, error = %e, "Rejected message, sending prompt reply");
                e.fallback_reply().to_string()
            }
            Err(e) => {
                error!(%session_id, error = %e, "Assistant turn failed");
                e.fallback_reply().to_string()
            }
        }
    }
}
