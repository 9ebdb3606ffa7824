//! campaignd - campaign generation poller and assistant service
//!
//! CLI entry point for the assistant server, terminal chat and job poller.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use campaignd::assistant::MemoryManager;
use campaignd::cli::{Cli, Command, StateCommand, get_log_path, open_log_file};
use campaignd::config::Config;
use campaignd::llm::create_client;
use campaignd::poller::{
    ClientState, GenerationPoller, HttpJobStatusSource, JobId, Navigator, PollError, PollOutcome, PollRequest,
    PollSnapshot, client_state,
};

fn setup_logging(verbose: bool) -> Result<()> {
    // Write to log file, not stdout/stderr
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = open_log_file(&get_log_path()).context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!(
        "campaignd loaded config: provider={}, model={}",
        config.llm.provider, config.llm.model
    );

    match cli.command {
        Some(Command::Serve { bind }) => cmd_serve(config, bind).await,
        Some(Command::Chat { message }) => campaignd::repl::run_interactive(&config, message).await,
        Some(Command::Poll {
            job_id,
            token,
            base_url,
            state_file,
        }) => cmd_poll(&config, job_id, token, base_url, state_file).await,
        Some(Command::State { state_file, command }) => cmd_state(command, state_file),
        Some(Command::Logs { follow, lines }) => cmd_logs(follow, lines),
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Run the assistant HTTP service
async fn cmd_serve(mut config: Config, bind: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    config.validate()?;

    let llm = create_client(&config.llm).map_err(|e| eyre::eyre!("Failed to create LLM client: {}", e))?;
    let manager = Arc::new(MemoryManager::new(llm, config.assistant.clone()));

    println!("Assistant listening on {}", config.server.bind.bright_cyan());
    campaignd::server::serve(&config, manager).await
}

/// Prints the finished campaign instead of switching screens
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, job_id: &JobId, result: Option<&serde_json::Value>) {
        println!();
        println!("{} {}", "Campaign ready:".bright_green().bold(), job_id);
        if let Some(result) = result {
            match serde_json::to_string_pretty(result) {
                Ok(pretty) => println!("{}", pretty),
                Err(e) => warn!(error = %e, "Failed to format campaign result"),
            }
        }
    }
}

/// Poll a generation job until it is ready, times out or is rejected
async fn cmd_poll(
    config: &Config,
    job_id: Option<String>,
    token: Option<String>,
    base_url: Option<String>,
    state_file: Option<PathBuf>,
) -> Result<()> {
    let state_path = state_file.unwrap_or_else(client_state::default_path);
    let stored = ClientState::load(&state_path)?;

    let request = match job_id {
        Some(job_id) => PollRequest::from_stored(Some(&job_id), token.as_deref().or(stored.auth_token.as_deref())),
        None => stored.poll_request(),
    };
    let request = match request {
        Ok(request) => request,
        Err(e) => {
            println!("{}", e.user_message().red());
            return Err(e.into());
        }
    };

    let mut poller_config = config.poller.clone();
    if let Some(base_url) = base_url {
        poller_config.base_url = base_url;
    }
    let source = HttpJobStatusSource::new(poller_config.base_url.clone(), poller_config.request_timeout())
        .map_err(|e| PollError::Setup(e.to_string()))?;
    let poller = GenerationPoller::new(Arc::new(source), Arc::new(TerminalNavigator), poller_config);

    loop {
        let cancel = CancellationToken::new();
        let ctrl_c = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };
        let render = tokio::spawn(render_progress(poller.subscribe(), cancel.clone()));

        let result = poller.start(&request, cancel.clone()).await;
        cancel.cancel();
        ctrl_c.abort();
        if let Err(e) = render.await {
            warn!(error = %e, "Progress renderer failed");
        }

        match result {
            Ok(PollOutcome::Navigated { attempts, .. }) => {
                info!(attempts, "Poll finished");
                return Ok(());
            }
            Ok(PollOutcome::Cancelled) => {
                println!();
                println!("{}", "Cancelled.".dimmed());
                return Ok(());
            }
            Err(e) if e.is_retryable() => {
                println!();
                println!("{}", e.user_message().yellow());
                if !confirm("Retry? [y/N] ")? {
                    return Err(e.into());
                }
            }
            Err(e) => {
                println!();
                println!("{}", e.user_message().red());
                return Err(e.into());
            }
        }
    }
}

/// Redraw a single progress line whenever the snapshot changes
async fn render_progress(mut rx: tokio::sync::watch::Receiver<PollSnapshot>, cancel: CancellationToken) {
    loop {
        {
            let snapshot = rx.borrow_and_update();
            if snapshot.job_id.is_some() {
                print!("\r\x1b[2K{}", progress_line(&snapshot));
                let _ = std::io::stdout().flush();
            }
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}

fn progress_line(snapshot: &PollSnapshot) -> String {
    const WIDTH: usize = 30;
    let filled = ((snapshot.progress / 100.0) * WIDTH as f64).round() as usize;
    let filled = filled.min(WIDTH);
    format!(
        "[{}{}] {:>5.1}%  {}  {}",
        "#".repeat(filled).bright_cyan(),
        "-".repeat(WIDTH - filled).dimmed(),
        snapshot.progress,
        snapshot.status_text,
        snapshot.advisory.dimmed()
    )
}

fn confirm(prompt: &str) -> Result<bool> {
    let mut rl =
        rustyline::DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;
    match rl.readline(prompt) {
        Ok(answer) => Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")),
        Err(_) => Ok(false),
    }
}

/// Manage the persisted client state
fn cmd_state(command: StateCommand, state_file: Option<PathBuf>) -> Result<()> {
    let path = state_file.unwrap_or_else(client_state::default_path);
    match command {
        StateCommand::Set { job_id, token } => {
            if JobId::parse(&job_id).is_none() {
                return Err(eyre::eyre!("Job id must not be blank"));
            }
            let mut state = ClientState::load(&path)?;
            state.job_id = Some(job_id.trim().to_string());
            if token.is_some() {
                state.auth_token = token;
            }
            state.save(&path)?;
            println!("Saved client state to {}", path.display());
        }
        StateCommand::Show => {
            let state = ClientState::load(&path)?;
            println!("{} {}", "State file:".bright_cyan(), path.display());
            println!("  job id:     {}", state.job_id.as_deref().unwrap_or("(none)"));
            println!(
                "  auth token: {}",
                if state.auth_token.is_some() { "(set)" } else { "(none)" }
            );
        }
        StateCommand::Clear => {
            ClientState::clear(&path)?;
            println!("Cleared client state");
        }
    }
    Ok(())
}

/// Show campaignd logs
fn cmd_logs(follow: bool, lines: usize) -> Result<()> {
    let log_path = get_log_path();

    if !log_path.exists() {
        println!("No log file found at: {}", log_path.display());
        return Ok(());
    }

    if follow {
        println!("Following log file: {} (Ctrl+C to stop)", log_path.display());
        println!();

        let mut child = std::process::Command::new("tail")
            .args(["-f", "-n", &lines.to_string()])
            .arg(&log_path)
            .spawn()
            .context("Failed to run tail -f")?;

        child.wait()?;
    } else {
        let file = fs::File::open(&log_path).context("Failed to open log file")?;
        let reader = BufReader::new(file);
        let all_lines: Vec<String> = reader.lines().map_while(Result::ok).collect();

        let start = all_lines.len().saturating_sub(lines);
        for line in &all_lines[start..] {
            println!("{}", line);
        }
    }

    Ok(())
}
