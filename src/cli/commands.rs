use std::io::Write;
use std::time::{Duration, UNIX_EPOCH};

use chrono::{DateTime, Local, Utc};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::info;

use crate::cli::args::{
    ConfigAction, ConfigArgs, DemoArgs, HistoryAction, HistoryArgs, InitArgs, OutputFormat, RunArgs,
};
use crate::config::loader::{get_config_path, get_data_dir};
use crate::config::types::AgentpadConfig;
use crate::demos;
use crate::error::Result;
use crate::output::{OutputKind, OutputLine, SessionEvent, TabStore};
use crate::sandbox::{ExecutionRequest, SourceLanguage};
use crate::session::{PlaygroundSession, RunOutcome};

// ============================================================================
// Run Command
// ============================================================================

/// Execute a script file (or stdin) in the playground.
pub async fn run(args: RunArgs, config: AgentpadConfig, format: OutputFormat) -> Result<()> {
    let from_stdin = args.file.as_os_str() == "-";
    let source = if from_stdin {
        let mut buf = String::new();
        use tokio::io::AsyncReadExt;
        tokio::io::stdin().read_to_string(&mut buf).await?;
        buf
    } else {
        tokio::fs::read_to_string(&args.file).await?
    };

    info!(file = %args.file.display(), "running script");
    // Stdin is the script, so it cannot also feed input().
    run_source(source, args.language, args.no_save, !from_stdin, config, format).await
}

/// Run a bundled demo, or list them when no name is given.
pub async fn demo(args: DemoArgs, config: AgentpadConfig, format: OutputFormat) -> Result<()> {
    let name = match args.name {
        Some(name) => name,
        None => {
            match format {
                OutputFormat::Text => {
                    println!("{:<16} DESCRIPTION", "NAME");
                    println!("{}", "-".repeat(50));
                    for (name, description, _) in demos::DEMOS {
                        println!("{:<16} {}", name, description);
                    }
                }
                OutputFormat::Json => {
                    let listing: Vec<_> = demos::DEMOS
                        .iter()
                        .map(|(name, description, _)| {
                            serde_json::json!({ "name": name, "description": description })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&listing)?);
                }
            }
            return Ok(());
        }
    };

    let source = demos::find(&name).ok_or_else(|| {
        crate::error::AgentpadError::Config(format!(
            "unknown demo '{name}'; run `agentpad demo` to list them"
        ))
    })?;

    info!(demo = %name, "running demo");
    run_source(
        source.to_string(),
        SourceLanguage::JavaScript,
        args.no_save,
        true,
        config,
        format,
    )
    .await
}

/// The shared run pipeline: execute, chat if an agent appeared, snapshot.
async fn run_source(
    source: String,
    language: SourceLanguage,
    no_save: bool,
    interactive: bool,
    config: AgentpadConfig,
    format: OutputFormat,
) -> Result<()> {
    let text_mode = matches!(format, OutputFormat::Text);
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let renderer = if text_mode {
        Some(tokio::spawn(render_events(event_rx)))
    } else {
        drop(event_rx);
        None
    };
    let events = if text_mode { Some(event_tx) } else { None };

    let mut session = PlaygroundSession::new(config.clone(), events).await?;

    let (mut line_rx, stdin_task) = if interactive {
        let (rx, task) = spawn_stdin_reader();
        (rx, Some(task))
    } else {
        // Closed channel: input() resolves with the stop sentinel at once.
        let (tx, rx) = mpsc::unbounded_channel();
        drop(tx);
        (rx, None)
    };

    let request = ExecutionRequest { source, language };
    let outcome = session.execute(&request, &mut line_rx).await?;

    if matches!(outcome, RunOutcome::AgentReady { .. }) && interactive {
        chat_loop(&mut session, &mut line_rx).await?;
    }

    let lines: Vec<OutputLine> = session.sink().borrow().lines().to_vec();
    if config.output.save_history && !no_save && !lines.is_empty() {
        let store = TabStore::new(get_data_dir(), config.output.max_tabs);
        let tab = store.push(lines.clone()).await?;
        info!(tab = %tab.name, "saved run output");
    }

    if let Some(task) = stdin_task {
        task.abort();
    }
    drop(session);
    if let Some(renderer) = renderer {
        let _ = renderer.await;
    }

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&lines)?);
    }

    if outcome == RunOutcome::Failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Read operator messages until a blank line or EOF ends the chat.
async fn chat_loop(
    session: &mut PlaygroundSession,
    lines: &mut UnboundedReceiver<String>,
) -> Result<()> {
    loop {
        let Some(line) = lines.recv().await else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            break;
        }
        session.chat(message, lines).await?;
    }
    Ok(())
}

/// Forward stdin lines into a channel the session can select on.
fn spawn_stdin_reader() -> (UnboundedReceiver<String>, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    (rx, task)
}

/// Render session events to the terminal as they arrive.
async fn render_events(mut events: UnboundedReceiver<SessionEvent>) {
    let mut chat_hint_shown = false;
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Line(line) => render_line(&line),
            SessionEvent::InputRequested { prompt } => {
                print!("{}", prompt.as_deref().unwrap_or("input: "));
                let _ = std::io::stdout().flush();
            }
            SessionEvent::Status(status) => {
                if status == crate::output::SessionStatus::ChatReady && !chat_hint_shown {
                    chat_hint_shown = true;
                    println!("(type a message to chat; a blank line ends the session)");
                }
            }
        }
    }
}

fn render_line(line: &OutputLine) {
    match line.kind {
        OutputKind::Log => println!("{}", line.text),
        OutputKind::Info => println!("-- {}", line.text),
        OutputKind::Success => println!("ok: {}", line.text),
        OutputKind::Error => eprintln!("error: {}", line.text),
        OutputKind::User => println!("you> {}", line.text),
        OutputKind::Agent => println!("agent> {}", line.text),
    }
}

// ============================================================================
// History Commands
// ============================================================================

pub async fn history(args: HistoryArgs, config: AgentpadConfig, format: OutputFormat) -> Result<()> {
    let store = TabStore::new(get_data_dir(), config.output.max_tabs);

    match args.action {
        HistoryAction::List => {
            let tabs = store.list().await?;
            match format {
                OutputFormat::Text => {
                    if tabs.is_empty() {
                        println!("No saved output");
                    } else {
                        println!("{:<10} {:<12} {:<18} LINES", "ID", "NAME", "CREATED");
                        println!("{}", "-".repeat(50));
                        for tab in tabs {
                            println!(
                                "{:<10} {:<12} {:<18} {}",
                                tab.id,
                                tab.name,
                                format_timestamp(tab.created_at),
                                tab.lines.len()
                            );
                        }
                    }
                }
                OutputFormat::Json => {
                    let listing: Vec<_> = tabs
                        .iter()
                        .map(|t| {
                            serde_json::json!({
                                "id": t.id,
                                "name": t.name,
                                "created_at": t.created_at,
                                "lines": t.lines.len(),
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&listing)?);
                }
            }
        }
        HistoryAction::Show { id } => {
            let tab = store.get(&id).await?;
            match format {
                OutputFormat::Text => {
                    println!("{} ({})", tab.name, format_timestamp(tab.created_at));
                    println!("{}", "-".repeat(50));
                    for line in &tab.lines {
                        render_line(line);
                    }
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&tab)?);
                }
            }
        }
        HistoryAction::Clear => {
            let count = store.clear().await?;
            match format {
                OutputFormat::Text => println!("Removed {} saved tab(s)", count),
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({ "removed": count }));
                }
            }
        }
    }

    Ok(())
}

// ============================================================================
// Config Commands
// ============================================================================

pub async fn init(args: InitArgs) -> Result<()> {
    let config_path = get_config_path();

    if config_path.exists() && !args.force {
        println!("Configuration already exists at: {}", config_path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let default_config = AgentpadConfig::default();
    let toml_str = toml::to_string_pretty(&default_config)
        .map_err(|e| crate::error::AgentpadError::Config(e.to_string()))?;

    std::fs::write(&config_path, toml_str)?;

    println!("Created configuration at: {}", config_path.display());
    println!("\nQuick start:");
    println!("  # Try the bundled demos");
    println!("  agentpad demo hello");
    println!("  agentpad demo input-loop");
    println!();
    println!("  # Run your own script");
    println!("  agentpad run playground.js");
    println!();
    println!("  # Browse saved output");
    println!("  agentpad history list");
    println!();
    println!("Set credentials in the config file or via AGENTPAD_ACCOUNT_ID,");
    println!("AGENTPAD_PRIVATE_KEY and AGENTPAD_API_KEY.");

    Ok(())
}

pub async fn config(args: ConfigArgs, config: AgentpadConfig) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let mut shown = config;
            shown.credentials.private_key = mask_secret(&shown.credentials.private_key);
            shown.credentials.api_key = mask_secret(&shown.credentials.api_key);
            let toml_str = toml::to_string_pretty(&shown)
                .map_err(|e| crate::error::AgentpadError::Config(e.to_string()))?;
            println!("{}", toml_str);
        }
        ConfigAction::Path => {
            println!("{}", get_config_path().display());
        }
    }
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Unset secrets stay visibly unset; set ones never print.
fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        "********".to_string()
    }
}

fn format_timestamp(timestamp: u64) -> String {
    let datetime = DateTime::<Utc>::from(UNIX_EPOCH + Duration::from_secs(timestamp));
    let local: DateTime<Local> = datetime.into();
    local.format("%Y-%m-%d %H:%M").to_string()
}
