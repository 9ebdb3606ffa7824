//! REPL session management

use std::sync::Arc;

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use crate::assistant::MemoryManager;
use crate::llm::Role;

/// Interactive chat session against a local memory manager
pub struct ReplSession {
    manager: Arc<MemoryManager>,
    session_id: String,
}

impl ReplSession {
    /// Create a new REPL session with a fresh session id
    pub fn new(manager: Arc<MemoryManager>) -> Self {
        let session_id = uuid::Uuid::now_v7().to_string();
        debug!(%session_id, "ReplSession::new: called");
        Self { manager, session_id }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Run the REPL main loop
    pub async fn run(&mut self, initial_message: Option<String>) -> Result<()> {
        self.print_welcome();

        if let Some(message) = initial_message {
            println!("{} {}", ">".bright_green(), message);
            self.process_user_input(&message).await;
        }

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let readline = rl.readline(&format!("{} ", ">".bright_green()));

            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }

                    let _ = rl.add_history_entry(input);

                    if input.starts_with('/') {
                        match self.handle_slash_command(input).await {
                            SlashResult::Continue => continue,
                            SlashResult::Quit => break,
                        }
                    } else {
                        self.process_user_input(input).await;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C - just show new prompt
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D - exit
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "Campaign Assistant".bright_cyan().bold());
        println!("Session: {}", self.session_id.dimmed());
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    async fn handle_slash_command(&mut self, input: &str) -> SlashResult {
        match SlashCommand::parse(input) {
            SlashCommand::Help => self.print_help(),
            SlashCommand::Quit => return SlashResult::Quit,
            SlashCommand::Clear => {
                self.manager.sessions().reset(&self.session_id).await;
                self.session_id = uuid::Uuid::now_v7().to_string();
                println!("{}", "Conversation cleared.".dimmed());
            }
            SlashCommand::History => self.print_history().await,
            SlashCommand::Budget => self.print_budget().await,
            SlashCommand::Unknown(cmd) => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
            }
        }
        SlashResult::Continue
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:14} Show this help", "/help".yellow());
        println!("  {:14} Exit the chat", "/quit".yellow());
        println!("  {:14} Start a new conversation", "/clear".yellow());
        println!("  {:14} Show the retained conversation", "/history".yellow());
        println!("  {:14} Show token usage against the budget", "/budget".yellow());
        println!();
    }

    async fn print_history(&self) {
        let Some(view) = self.manager.sessions().history(&self.session_id).await else {
            println!("{}", "No conversation history.".dimmed());
            return;
        };

        println!();
        println!("{}", "Conversation History:".bright_cyan());
        for (i, msg) in view.messages.iter().enumerate() {
            let role = match msg.role {
                Role::User => "User".bright_green(),
                Role::Assistant => "Assistant".bright_blue(),
            };
            let preview: String = msg.content.chars().take(60).collect();
            let preview = if msg.content.chars().count() > 60 {
                format!("{}...", preview)
            } else {
                preview
            };
            println!("  {}. {}: {}", i + 1, role, preview);
        }
        println!();
    }

    async fn print_budget(&self) {
        match self.manager.sessions().history(&self.session_id).await {
            Some(view) => println!(
                "{} {} / {} estimated tokens, {} messages, {} turns",
                "Budget:".bright_cyan(),
                view.total_tokens,
                view.token_budget,
                view.messages.len(),
                view.turns
            ),
            None => println!(
                "{} 0 / {} estimated tokens (no messages yet)",
                "Budget:".bright_cyan(),
                self.manager.config().token_budget
            ),
        }
    }

    async fn process_user_input(&self, input: &str) {
        let reply = self.manager.respond(&self.session_id, input).await;
        println!();
        println!("{}", reply);
        println!();
    }
}

enum SlashResult {
    Continue,
    Quit,
}

#[derive(Debug, PartialEq, Eq)]
enum SlashCommand {
    Help,
    Quit,
    Clear,
    History,
    Budget,
    Unknown(String),
}

impl SlashCommand {
    fn parse(input: &str) -> Self {
        let cmd = input.split_whitespace().next().unwrap_or("");
        match cmd {
            "/help" | "/h" => Self::Help,
            "/quit" | "/q" | "/exit" => Self::Quit,
            "/clear" | "/c" => Self::Clear,
            "/history" => Self::History,
            "/budget" | "/b" => Self::Budget,
            other => Self::Unknown(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssistantConfig;
    use crate::llm::client::mock::MockLlmClient;

    #[test]
    fn test_slash_command_parse() {
        assert_eq!(SlashCommand::parse("/help"), SlashCommand::Help);
        assert_eq!(SlashCommand::parse("/q"), SlashCommand::Quit);
        assert_eq!(SlashCommand::parse("/clear now"), SlashCommand::Clear);
        assert_eq!(SlashCommand::parse("/budget"), SlashCommand::Budget);
        assert_eq!(SlashCommand::parse("/nope"), SlashCommand::Unknown("/nope".to_string()));
    }

    #[tokio::test]
    async fn test_clear_starts_new_session() {
        let manager = Arc::new(MemoryManager::new(
            Arc::new(MockLlmClient::replies(&["hi"])),
            AssistantConfig::default(),
        ));
        let mut repl = ReplSession::new(Arc::clone(&manager));
        let first = repl.session_id().to_string();

        repl.process_user_input("hello").await;
        assert_eq!(manager.sessions().len().await, 1);

        repl.handle_slash_command("/clear").await;
        assert_ne!(repl.session_id(), first);
        assert!(manager.sessions().is_empty().await);
    }
}
