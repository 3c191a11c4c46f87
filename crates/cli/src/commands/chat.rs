//! `forgeloop chat`: Interactive or single-message chat mode.

use anyhow::{Context, bail};
use forgeloop_agent::{AgentError, AgentLoop, LoopSettings, StopReason, TurnOutcome};
use forgeloop_config::AppConfig;
use forgeloop_memory::FileBackend;
use forgeloop_providers::{FileRawLog, OpenAiCompatProvider};
use forgeloop_security::WorkspaceSandbox;
use forgeloop_tools::{ChangeLog, GitCli, LocalWorkspace, ToolDispatcher};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::terminal::TerminalObserver;

const CHANGE_LOG_CAPACITY: usize = 500;

struct Session {
    agent: Arc<AgentLoop>,
    dispatcher: Arc<ToolDispatcher>,
}

async fn build_session(config: &AppConfig) -> anyhow::Result<Session> {
    let Some(api_key) = config.api_key.clone() else {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set FORGELOOP_API_KEY (or OPENAI_API_KEY), or add api_key to:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        bail!("no API key found");
    };

    let root = config.workspace_root();
    let root = root
        .canonicalize()
        .with_context(|| format!("workspace root {} is not accessible", root.display()))?;
    let sandbox = WorkspaceSandbox::new(&root, &config.workspace.forbidden_paths);
    let observer = Arc::new(TerminalObserver::new());

    let memory = FileBackend::open(FileBackend::default_path(&AppConfig::config_dir())).await;
    let mut dispatcher =
        ToolDispatcher::new(Arc::new(LocalWorkspace::new(sandbox.clone())), sandbox)
            .with_memory(Arc::new(memory))
            .with_change_recorder(Arc::new(ChangeLog::new(CHANGE_LOG_CAPACITY)))
            .with_observer(observer.clone())
            .with_max_error_chars(config.tools.max_error_chars);
    if config.tools.git_enabled {
        dispatcher = dispatcher.with_vcs(Arc::new(GitCli::new(&root)));
    }
    let dispatcher = Arc::new(dispatcher);

    let provider = OpenAiCompatProvider::new(
        &config.provider.name,
        &config.provider.api_url,
        api_key,
        Duration::from_secs(config.provider.request_timeout_secs),
    )?;

    let mut agent = AgentLoop::new(
        Arc::new(provider),
        dispatcher.clone(),
        LoopSettings::from_config(config),
    )
    .with_observer(observer);
    if let Some(path) = &config.diagnostics.raw_log_path {
        match FileRawLog::open(path) {
            Ok(log) => agent = agent.with_raw_sink(Arc::new(log)),
            Err(e) => warn!(path = %path.display(), error = %e, "Raw frame log disabled"),
        }
    }
    info!(workspace = %root.display(), model = %config.provider.model, "Session ready");

    Ok(Session {
        agent: Arc::new(agent),
        dispatcher,
    })
}

pub async fn run(message: Option<String>, workspace: Option<PathBuf>) -> anyhow::Result<()> {
    let mut config = AppConfig::load().context("failed to load config")?;
    if workspace.is_some() {
        config.workspace.root = workspace;
    }
    let session = build_session(&config).await?;

    // Ctrl+C stops the running turn; with nothing running it quits.
    let quit = CancellationToken::new();
    {
        let agent = session.agent.clone();
        let quit = quit.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if !agent.cancel() {
                    quit.cancel();
                    break;
                }
            }
        });
    }

    let result = match message {
        Some(text) => {
            let outcome = session.agent.run_turn(&text).await?;
            report(&outcome);
            Ok(())
        }
        None => interactive(&session, &config, &quit).await,
    };
    session.agent.shutdown().await;
    result
}

async fn interactive(
    session: &Session,
    config: &AppConfig,
    quit: &CancellationToken,
) -> anyhow::Result<()> {
    println!();
    println!("  Forgeloop — interactive mode");
    println!();
    println!("  Model:      {}", config.provider.model);
    println!("  Workspace:  {}", config.workspace_root().display());
    println!(
        "  Tools:      {}",
        session.dispatcher.definitions().len()
    );
    println!();
    println!("  Commands: /reset, /todos, exit. Ctrl+C stops a running turn.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you > ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            _ = quit.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };

        match line.trim() {
            "" => continue,
            "exit" | "quit" => break,
            "/reset" => {
                session.agent.reset().await?;
                println!("Conversation cleared.");
            }
            "/todos" => {
                let todos = session.dispatcher.todos().snapshot();
                println!("{}", forgeloop_tools::todo::render(&todos));
            }
            text => {
                println!();
                match session.agent.run_turn(text).await {
                    Ok(outcome) => report(&outcome),
                    Err(AgentError::Busy) => eprintln!("  A turn is still running."),
                    Err(e) => eprintln!("  [Error] {e}"),
                }
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}

/// A line after the turn for outcomes the message itself does not explain.
fn report(outcome: &TurnOutcome) {
    match (&outcome.reason, &outcome.message) {
        (StopReason::Cancelled, None) => eprintln!("  (cancelled)"),
        (StopReason::AwaitingUser, _) => eprintln!("  (the agent is waiting for your answer)"),
        _ => {}
    }
}
