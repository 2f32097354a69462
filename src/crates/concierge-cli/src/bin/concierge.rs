//! Concierge CLI - multi-assistant customer support from the terminal
//!
//! Main entry point for the concierge command-line tool.

use anyhow::Context;
use clap::{Parser, Subcommand};
use concierge_cli::{app, logging, ConfigLoader};
use concierge_core::{ApprovalDecision, GraphEngine, PendingApproval, Role, TurnOutcome};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "concierge")]
#[command(about = "Concierge - multi-assistant customer support with human approval", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Explicit config file, applied after user and project configs
    #[arg(short, long, global = true, env = "CONCIERGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Target path (default: ~/.concierge/concierge.toml)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Chat with the travel support assistants
    ///
    /// Conversations are checkpointed and `--thread` picks one up where it stopped, but the
    /// demo travel inventory (tickets, flights, hotels, car rentals, excursions) is rebuilt
    /// on every start. Bookings and cancellations from earlier runs are not kept, and flight
    /// details remembered by a resumed conversation may no longer match the inventory.
    Chat {
        /// Conversation thread to continue (default: a new thread)
        #[arg(short, long)]
        thread: Option<String>,
    },

    /// Print the dialog graph as a Mermaid diagram
    Graph,

    /// Show the checkpoint history of a thread
    History {
        /// Conversation thread
        thread: String,

        /// Maximum checkpoints to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Output format: text (default), json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let loader = ConfigLoader::new().with_explicit_path(cli.config.clone());

    if let Commands::Init { path } = &cli.command {
        let written = loader.init(path.as_deref()).await?;
        println!("✓ Wrote default configuration to {}", written.display());
        return Ok(());
    }

    let config = loader.load().await.context("failed to load configuration")?;
    logging::init(&config.logging)?;
    let engine = app::travel_engine(&config)?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Graph => {
            println!("{}", engine.graph().to_mermaid());
            Ok(())
        }
        Commands::History { thread, limit, format } => show_history(&engine, &thread, limit, &format).await,
        Commands::Chat { thread } => {
            let thread = thread.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            chat(&engine, &thread).await
        }
    }
}

async fn show_history(engine: &GraphEngine, thread: &str, limit: usize, format: &str) -> anyhow::Result<()> {
    let snapshots = engine.history(thread, Some(limit)).await?;
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
        return Ok(());
    }

    if snapshots.is_empty() {
        println!("No checkpoints for thread {thread}");
        return Ok(());
    }

    println!("{:<6} {:<26} {:<34} {:<12} {}", "Step", "Written", "Next", "Interrupted", "Messages");
    println!("{}", "-".repeat(90));
    for snapshot in &snapshots {
        println!(
            "{:<6} {:<26} {:<34} {:<12} {}",
            snapshot.step,
            snapshot.created_at.format("%Y-%m-%d %H:%M:%S%.3f"),
            snapshot.next.as_deref().unwrap_or("-"),
            if snapshot.interrupted { "yes" } else { "no" },
            snapshot.state.messages.len()
        );
    }
    Ok(())
}

fn prompt(label: &str) -> anyhow::Result<Option<String>> {
    print!("{label}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn ask_decision(pending: &PendingApproval) -> anyhow::Result<Option<ApprovalDecision>> {
    println!("\nThe {} assistant wants to run:", pending.scope);
    for call in &pending.tool_calls {
        println!("  [{}] {}({})", call.id, call.name, call.args);
    }

    loop {
        let Some(answer) = prompt("Approve? [y]es / [n]o (reason) / [e]dit <call_id> <json>: ")? else {
            return Ok(None);
        };
        let (verb, rest) = answer.split_once(' ').unwrap_or((answer.as_str(), ""));
        match verb {
            "y" | "yes" => return Ok(Some(ApprovalDecision::Approve)),
            "n" | "no" => {
                let reason = (!rest.trim().is_empty()).then(|| rest.trim().to_string());
                return Ok(Some(ApprovalDecision::Deny { reason }));
            }
            "e" | "edit" => {
                let Some((call_id, args)) = rest.trim().split_once(' ') else {
                    println!("Usage: edit <call_id> <json arguments>");
                    continue;
                };
                match serde_json::from_str(args) {
                    Ok(args) => return Ok(Some(ApprovalDecision::edit(call_id, args))),
                    Err(e) => println!("Invalid JSON: {e}"),
                }
            }
            _ => println!("Please answer y, n or e."),
        }
    }
}

fn print_outcome(outcome: &TurnOutcome) {
    if let TurnOutcome::Completed {
        reply, active_scope, ..
    } = outcome
    {
        let speaker = active_scope.as_deref().unwrap_or("assistant");
        println!("{speaker}> {}", reply.as_deref().unwrap_or(""));
    }
}

async fn chat(engine: &GraphEngine, thread: &str) -> anyhow::Result<()> {
    println!("Thread: {thread}  (type 'exit' to quit)");
    info!(thread_id = thread, "Chat session started");

    if let Some(snapshot) = engine.get_state(thread).await? {
        if let Some(last) = snapshot.state.messages.iter().rev().find(|m| m.role == Role::Assistant) {
            println!("assistant> {}", last.content);
        }
    }

    let mut outcome = match engine.pending_approval(thread).await? {
        Some(pending) => Some(TurnOutcome::Interrupted(pending)),
        None => None,
    };

    loop {
        if let Some(TurnOutcome::Interrupted(pending)) = &outcome {
            let Some(decision) = ask_decision(pending)? else {
                break;
            };
            match engine.resume(thread, decision).await {
                Ok(next) => {
                    print_outcome(&next);
                    outcome = Some(next);
                }
                Err(e) => {
                    error!(error = %e, "Resume failed");
                    println!("✗ {e}");
                }
            }
            continue;
        }

        let Some(line) = prompt("you> ")? else {
            break;
        };
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        match engine.send(thread, &line).await {
            Ok(next) => {
                print_outcome(&next);
                outcome = Some(next);
            }
            Err(e) => {
                error!(error = %e, "Turn failed");
                println!("✗ {e}");
                outcome = None;
            }
        }
    }

    println!("Conversation saved. Resume with: concierge chat --thread {thread}");
    Ok(())
}
