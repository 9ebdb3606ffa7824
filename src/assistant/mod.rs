//! Conversational memory window manager
//!
//! Keeps one message log per session under a token budget and answers each
//! turn through the configured LLM client.

mod error;
mod manager;
mod session;
mod window;

pub use error::{APOLOGY_REPLY, AssistantError, EMPTY_INPUT_REPLY};
pub use manager::MemoryManager;
pub use session::{ConversationSession, SessionSeed, SessionStore, SessionView, SharedSession};
pub use window::{MessageWindow, PROTECTED_HEAD, TrimReport, estimated_tokens};
