use anyhow::{bail, Context, Result};
use markpilot::api::{ApiClient, DocumentBackend, FsDocumentBackend};
use markpilot::config::Config;
use markpilot::edit_diff::render_hunks;
use markpilot::state::{ConversationManager, SessionUpdate, TurnState};
use markpilot::types::ApprovalChoice;
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const LOG_PATH_ENV: &str = "MARKPILOT_LOG_PATH";
const DEFAULT_LOG_PATH: &str = "/tmp/markpilot.log";
const USAGE: &str = "usage: markpilot [--open PATH]... MESSAGE";

#[derive(Debug, Default)]
struct CliArgs {
    open: Vec<String>,
    message: String,
}

enum Decision {
    Choose(ApprovalChoice),
    Cancel,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_cli_args(std::env::args().skip(1))?;
    let config = Config::load()?;
    config.validate()?;
    init_file_logging()?;

    let client = ApiClient::new(&config)?;
    let documents: Arc<dyn DocumentBackend> = match &config.document_root {
        Some(root) => Arc::new(FsDocumentBackend::new(root.clone())),
        None => Arc::new(client.clone()),
    };
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let mut manager = ConversationManager::new(client, documents, &config).with_updates(updates_tx);
    let printer = tokio::spawn(print_updates(updates_rx));

    for path in &args.open {
        manager.open_document(path).await?;
    }
    tracing::info!(thread_id = manager.thread_id(), "starting turn");

    let cancel = manager.cancel_handle();
    let mut result = cancel_on_ctrl_c(manager.send_user_message(args.message), cancel).await;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    while result.is_ok() && manager.state() == TurnState::PausedForApproval {
        print_interrupt(&manager);
        let cancel = manager.cancel_handle();
        result = match ask_approval(&mut stdin, config.auto_approve_after).await? {
            Decision::Choose(choice) => {
                cancel_on_ctrl_c(manager.resolve_interrupt(choice, None), cancel).await
            }
            Decision::Cancel => {
                manager.cancel_turn();
                Ok(())
            }
        };
    }

    for path in &args.open {
        if manager.is_dirty(path) {
            println!("\n{path} has unsaved changes");
        }
    }

    drop(manager);
    let _ = printer.await;
    result
}

fn parse_cli_args(mut args: impl Iterator<Item = String>) -> Result<CliArgs> {
    let mut parsed = CliArgs::default();
    let mut message_parts = Vec::new();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--open" | "-o" => {
                let path = args.next().context(USAGE)?;
                parsed.open.push(path);
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            _ => message_parts.push(arg),
        }
    }
    parsed.message = message_parts.join(" ");
    if parsed.message.trim().is_empty() {
        bail!(USAGE);
    }
    Ok(parsed)
}

fn init_file_logging() -> Result<()> {
    let log_path = std::env::var(LOG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_PATH));
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory {}", parent.display()))?;
        }
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .init();
    Ok(())
}

/// Runs one leg of the turn; Ctrl-C cancels it and waits for the session to
/// settle.
async fn cancel_on_ctrl_c<F>(turn: F, cancel: CancellationToken) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    tokio::pin!(turn);
    tokio::select! {
        result = &mut turn => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n[cancelled]");
            cancel.cancel();
            turn.await
        }
    }
}

async fn print_updates(mut updates: mpsc::UnboundedReceiver<SessionUpdate>) {
    let mut stdout = std::io::stdout();
    while let Some(update) = updates.recv().await {
        match update {
            SessionUpdate::MessageUpdated { delta, .. } => {
                print!("{delta}");
                let _ = stdout.flush();
            }
            SessionUpdate::MessageFinished { .. } => println!(),
            SessionUpdate::PreviewCleared {
                document_id,
                committed,
            } => {
                let verb = if committed { "applied" } else { "discarded" };
                println!("[{verb} change to {document_id}]");
            }
            SessionUpdate::RefreshFileTree => tracing::debug!("file tree refresh requested"),
            SessionUpdate::Warning(message) => eprintln!("[warning] {message}"),
            SessionUpdate::Error(message) => eprintln!("[error] {message}"),
            SessionUpdate::ToolCallUpdated { .. }
            | SessionUpdate::PreviewStaged { .. }
            | SessionUpdate::InterruptRaised(_)
            | SessionUpdate::InterruptResolved { .. }
            | SessionUpdate::TurnComplete => {}
        }
    }
}

fn print_interrupt(manager: &ConversationManager) {
    let Some(interrupt) = manager.interrupt() else {
        return;
    };
    println!("\n{} ({})", interrupt.description, interrupt.tool_name);
    let Some(document_id) = interrupt.target_document_id.as_deref() else {
        return;
    };
    match manager.diff_view(document_id) {
        Some(view) if view.modified.is_none() => println!("  delete {document_id}"),
        Some(view) => {
            println!("  {document_id}");
            print!("{}", render_hunks(&view.hunks, "  "));
        }
        None => println!("  {document_id} (no preview)"),
    }
}

async fn ask_approval(
    stdin: &mut Lines<BufReader<Stdin>>,
    auto_approve_after: Option<Duration>,
) -> Result<Decision> {
    print!("approve? [y/N] ");
    let _ = std::io::stdout().flush();

    let answer = async {
        match auto_approve_after {
            Some(limit) => match tokio::time::timeout(limit, stdin.next_line()).await {
                Ok(line) => line,
                Err(_) => {
                    println!("(auto-approved after {}s)", limit.as_secs());
                    Ok(Some("y".to_string()))
                }
            },
            None => stdin.next_line().await,
        }
    };

    tokio::select! {
        answer = answer => {
            let line = answer.context("failed to read approval")?;
            let approved = line
                .map(|line| matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
                .unwrap_or(false);
            Ok(Decision::Choose(if approved {
                ApprovalChoice::Approve
            } else {
                ApprovalChoice::Reject
            }))
        }
        _ = tokio::signal::ctrl_c() => Ok(Decision::Cancel),
    }
}
