//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// campaignd - campaign generation poller and assistant service
#[derive(Parser)]
#[command(
    name = "campaignd",
    about = "Campaign generation readiness poller and conversational assistant",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Logs are written to: ~/.local/share/campaignd/logs/campaignd.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run the assistant HTTP service
    Serve {
        /// Socket address to bind (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Chat with the assistant in the terminal
    Chat {
        /// First message to send
        message: Option<String>,
    },

    /// Wait for a generation job to become ready
    Poll {
        /// Job to poll (defaults to the stored job id)
        #[arg(short, long)]
        job_id: Option<String>,

        /// Bearer token (defaults to the stored token)
        #[arg(short, long)]
        token: Option<String>,

        /// Generation backend base URL (overrides config)
        #[arg(short, long)]
        base_url: Option<String>,

        /// Client state file
        #[arg(long)]
        state_file: Option<PathBuf>,
    },

    /// Manage the stored job id and auth token
    State {
        /// Client state file
        #[arg(long, global = true)]
        state_file: Option<PathBuf>,

        #[command(subcommand)]
        command: StateCommand,
    },

    /// Show campaignd logs
    Logs {
        /// Follow log output (like tail -f)
        #[arg(short, long)]
        follow: bool,

        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

/// Client state subcommands
#[derive(Subcommand)]
pub enum StateCommand {
    /// Store the job id (and optionally the auth token) for the next poll
    Set {
        /// Generation job id
        job_id: String,

        /// Bearer token from sign-in
        #[arg(short, long)]
        token: Option<String>,
    },

    /// Print the stored state
    Show,

    /// Remove the stored state
    Clear,
}

/// Path of the log file written by `setup_logging`
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("campaignd")
        .join("logs")
        .join("campaignd.log")
}

/// Open the log file for appending, creating it and its directory
///
/// Every CLI invocation logs here, including `logs` itself, so earlier runs
/// must survive.
pub fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["campaignd"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_serve() {
        let cli = Cli::parse_from(["campaignd", "serve", "--bind", "127.0.0.1:4000"]);
        if let Some(Command::Serve { bind }) = cli.command {
            assert_eq!(bind.as_deref(), Some("127.0.0.1:4000"));
        } else {
            panic!("Expected Serve command");
        }
    }

    #[test]
    fn test_cli_parse_chat() {
        let cli = Cli::parse_from(["campaignd", "chat", "How do I brief a creator?"]);
        assert!(matches!(cli.command, Some(Command::Chat { message: Some(_) })));
    }

    #[test]
    fn test_cli_parse_poll() {
        let cli = Cli::parse_from(["campaignd", "poll", "--job-id", "job-1", "--token", "abc"]);
        if let Some(Command::Poll { job_id, token, base_url, state_file }) = cli.command {
            assert_eq!(job_id.as_deref(), Some("job-1"));
            assert_eq!(token.as_deref(), Some("abc"));
            assert!(base_url.is_none());
            assert!(state_file.is_none());
        } else {
            panic!("Expected Poll command");
        }
    }

    #[test]
    fn test_cli_parse_state_set() {
        let cli = Cli::parse_from(["campaignd", "state", "set", "job-9", "--token", "t"]);
        match cli.command {
            Some(Command::State {
                command: StateCommand::Set { job_id, token },
                ..
            }) => {
                assert_eq!(job_id, "job-9");
                assert_eq!(token.as_deref(), Some("t"));
            }
            _ => panic!("Expected State Set command"),
        }
    }

    #[test]
    fn test_cli_parse_state_file_after_subcommand() {
        let cli = Cli::parse_from(["campaignd", "state", "show", "--state-file", "/tmp/s.json"]);
        match cli.command {
            Some(Command::State {
                state_file,
                command: StateCommand::Show,
            }) => assert_eq!(state_file, Some(PathBuf::from("/tmp/s.json"))),
            _ => panic!("Expected State Show command"),
        }
    }

    #[test]
    fn test_cli_with_config() {
        let cli = Cli::parse_from(["campaignd", "-c", "/path/to/config.yml", "serve"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.yml")));
    }

    #[test]
    fn test_cli_parse_logs_short_flags() {
        let cli = Cli::parse_from(["campaignd", "logs", "-f", "-n", "200"]);
        assert!(matches!(cli.command, Some(Command::Logs { follow: true, lines: 200 })));
    }

    #[test]
    fn test_open_log_file_appends_across_runs() {
        use std::io::Write;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs").join("campaignd.log");

        writeln!(open_log_file(&path).unwrap(), "first run").unwrap();
        writeln!(open_log_file(&path).unwrap(), "second run").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "first run\nsecond run\n");
    }

    #[test]
    fn test_log_path() {
        assert!(get_log_path().ends_with("campaignd/logs/campaignd.log"));
    }
}
