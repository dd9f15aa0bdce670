use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use case_client::{
    workflow::{IntentOutcome, RejectReason},
    notification::Notification,
    CaseWorkflow, HttpCaseBackend, WorkflowEvent, WorkflowPhase,
};
use clap::Parser;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{ConsoleCommand, HELP};
use config::load_settings;

#[derive(Parser, Debug)]
#[command(about = "Operator console for submitting cases to the diagnostic service")]
struct Args {
    /// Settings file; defaults to ./operator.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    backend_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(url) = args.backend_url {
        settings.backend_url = url;
    }
    let workflow_config = settings.workflow_config();
    let backend =
        HttpCaseBackend::with_timeout(&settings.backend_url, workflow_config.request_timeout)
            .context("failed to build backend client")?;
    info!(backend_url = %backend.base_url(), "operator console ready");

    let workflow = CaseWorkflow::new(Arc::new(backend), workflow_config);
    let renderer = tokio::spawn(render_events(workflow.subscribe_events()));

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match ConsoleCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("! {err}");
                continue;
            }
        };

        match command {
            ConsoleCommand::Status => {
                println!("phase: {}", workflow.phase().await);
                if let Some(notification) = workflow.notification().await {
                    print_notification(&notification);
                }
            }
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Quit => break,
            command => {
                let wait = (
                    settings.result_wait_attempts,
                    settings.result_wait_interval(),
                );
                tokio::spawn(run_intent(Arc::clone(&workflow), command, wait));
            }
        }
    }

    renderer.abort();
    Ok(())
}

async fn run_intent(workflow: Arc<CaseWorkflow>, command: ConsoleCommand, wait: (u32, Duration)) {
    let outcome = match command {
        ConsoleCommand::Submit {
            age,
            gender,
            symptoms,
        } => workflow.submit(age, &gender, &symptoms).await,
        ConsoleCommand::Check => workflow.check_result().await,
        ConsoleCommand::Wait => workflow.wait_for_result(wait.0, wait.1).await,
        ConsoleCommand::Select { disease } => workflow.select_candidate(&disease).await,
        ConsoleCommand::Feedback { accepted } => workflow.give_feedback(accepted).await,
        ConsoleCommand::Stats => {
            if let Some(stats) = workflow.fetch_stats().await {
                println!(
                    "feedback: {} accepted, {} rejected, {} total ({:.0}% rejected)",
                    stats.accepted,
                    stats.rejected,
                    stats.total,
                    stats.rejection_rate * 100.0
                );
            }
            return;
        }
        ConsoleCommand::Status | ConsoleCommand::Help | ConsoleCommand::Quit => return,
    };
    if let Some(hint) = rejection_hint(&outcome) {
        println!("! {hint}");
    }
}

fn rejection_hint(outcome: &IntentOutcome) -> Option<&'static str> {
    match outcome {
        IntentOutcome::Rejected(RejectReason::Busy) => Some("busy; wait for the pending step"),
        IntentOutcome::Rejected(RejectReason::NotDiagnosed) => Some("no diagnosis yet"),
        IntentOutcome::Rejected(RejectReason::UnknownCandidate) => {
            Some("no such candidate; use a disease name from the list")
        }
        IntentOutcome::Rejected(RejectReason::FeedbackAlreadySent) => {
            Some("feedback already sent for this case")
        }
        _ => None,
    }
}

async fn render_events(mut events: tokio::sync::broadcast::Receiver<WorkflowEvent>) {
    loop {
        match events.recv().await {
            Ok(WorkflowEvent::PhaseChanged(phase)) => render_phase(&phase),
            Ok(WorkflowEvent::Notification(Some(notification))) => {
                print_notification(&notification);
            }
            Ok(WorkflowEvent::Notification(None)) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "console fell behind workflow events");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_notification(notification: &Notification) {
    println!(
        "[{} {}] {}",
        notification.raised_at.format("%H:%M:%S"),
        notification.kind,
        notification.text
    );
}

fn render_phase(phase: &WorkflowPhase) {
    println!("-- {phase}");
    if let WorkflowPhase::Diagnosed {
        candidates,
        selected,
        ..
    } = phase
    {
        for (rank, candidate) in candidates.iter().enumerate() {
            let marker = if selected.as_deref() == Some(candidate.disease.as_str()) {
                '*'
            } else {
                ' '
            };
            println!(
                " {marker} {}. {} {}% [{}]",
                rank + 1,
                candidate.disease,
                candidate.confidence_percent(),
                candidate.decision
            );
        }
    }
}
