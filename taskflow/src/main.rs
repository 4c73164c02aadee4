//! `TaskFlow` — local-first task tracker with optional hub sync.
//!
//! Every command works against the local cache; when a hub URL and
//! account are configured the task list is additionally synced through a
//! `TaskFlow` hub, migrating local tasks on first contact.
//!
//! ```bash
//! # Local-only
//! cargo run --bin taskflow -- add "water the plants" --due 2025-03-15 --recurrence weekly
//! cargo run --bin taskflow -- list --sort priority
//!
//! # Synced through a hub
//! cargo run --bin taskflow -- --hub-url ws://127.0.0.1:9100/ws --account alice list
//!
//! # Or via environment variables
//! TASKFLOW_HUB_URL=ws://127.0.0.1:9100/ws TASKFLOW_ACCOUNT=alice cargo run --bin taskflow
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;

use taskflow::cache::LocalCache;
use taskflow::config::{CliArgs, ClientConfig, Command};
use taskflow::identity::{AccountId, IdentityProvider, LocalIdentity};
use taskflow::remote::ws::WsRemote;
use taskflow::sync::{SyncCoordinator, SyncEvent, run_identity};
use taskflow_proto::task::{Task, TaskDraft};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Logs go to stderr; stdout is for command output.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cache = LocalCache::open(&config.cache_dir);
    let (event_tx, event_rx) = mpsc::channel(64);
    let coordinator: Arc<SyncCoordinator<WsRemote>> = Arc::new(
        SyncCoordinator::with_undo_window(cache, event_tx, config.undo_window),
    );

    let command = cli.command.unwrap_or(Command::List { sort: None });

    // The config-supplied account plays the signed-in identity; the
    // identity seam maps presence to link/unlink.
    let identity = Arc::new(LocalIdentity::new());
    let mut identity_driver = None;
    if let Some((hub_url, account)) = config.sync_target() {
        if let Err(e) = identity.sign_in(&account, "") {
            eprintln!("Error: invalid account: {e}");
            return ExitCode::FAILURE;
        }
        if matches!(command, Command::Watch) {
            // Resident mode keeps following sign-in/out transitions.
            let connect = move |account: AccountId| {
                let hub_url = hub_url.clone();
                async move { WsRemote::connect(&hub_url, account).await.map(Arc::new) }
            };
            identity_driver = Some(tokio::spawn(run_identity(
                Arc::clone(&coordinator),
                Arc::clone(&identity),
                connect,
            )));
        } else if let Some(account_id) = identity.current() {
            link_hub(&coordinator, &hub_url, account_id).await;
        }
    } else if matches!(command, Command::Watch) {
        eprintln!("Error: watch requires --hub-url and --account");
        return ExitCode::FAILURE;
    }

    let code = run_command(&coordinator, command, event_rx).await;
    if let Some(driver) = identity_driver {
        driver.abort();
    }
    code
}

/// Connect to the hub and link the coordinator, staying local-only on
/// failure.
async fn link_hub(coordinator: &SyncCoordinator<WsRemote>, hub_url: &str, account: AccountId) {
    match WsRemote::connect(hub_url, account).await {
        Ok(remote) => {
            coordinator.link_account(Arc::new(remote)).await;
        }
        Err(e) => {
            tracing::warn!(url = hub_url, err = %e, "hub unreachable, continuing local-only");
        }
    }
}

async fn run_command(
    coordinator: &SyncCoordinator<WsRemote>,
    command: Command,
    mut events: mpsc::Receiver<SyncEvent>,
) -> ExitCode {
    match command {
        Command::Add {
            title,
            description,
            due,
            priority,
            category,
            recurrence,
        } => {
            let mut draft = TaskDraft::new(title)
                .with_priority(priority)
                .with_category(category)
                .with_recurrence(recurrence);
            if let Some(description) = description {
                draft = draft.with_description(description);
            }
            if let Some(due) = due {
                draft = draft.with_due_date(due);
            }
            match coordinator.add(draft).await {
                Ok(task) => {
                    println!("added {} ({})", task.title, task.id);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    ExitCode::FAILURE
                }
            }
        }

        Command::List { sort } => {
            if let Some(order) = sort {
                coordinator.set_sort_order(order);
            }
            let tasks = coordinator.tasks_sorted().await;
            if tasks.is_empty() {
                println!("no tasks");
            }
            for task in &tasks {
                println!("{}", format_task(task));
            }
            ExitCode::SUCCESS
        }

        Command::Done { id } => match coordinator.toggle(&id).await {
            Some(outcome) => {
                let state = if outcome.task.completed {
                    "completed"
                } else {
                    "reopened"
                };
                println!("{state} {} ({})", outcome.task.title, outcome.task.id);
                if let Some(next) = outcome.next {
                    let due = next
                        .due_date
                        .map_or_else(String::new, |d| format!(" due {d}"));
                    println!("next occurrence{due} ({})", next.id);
                }
                ExitCode::SUCCESS
            }
            None => {
                eprintln!("Error: no task with id {id}");
                ExitCode::FAILURE
            }
        },

        Command::Rm { id } => match coordinator.delete(&id).await {
            Some(ticket) => {
                println!("deleted {} ({})", ticket.task().title, ticket.task().id);
                ExitCode::SUCCESS
            }
            None => {
                eprintln!("Error: no task with id {id}");
                ExitCode::FAILURE
            }
        },

        Command::Watch => {
            println!("watching for changes (ctrl-c to stop)");
            while let Some(event) = events.recv().await {
                match event {
                    SyncEvent::Refreshed { count } => {
                        println!("refreshed: {count} tasks");
                        for task in coordinator.tasks_sorted().await {
                            println!("  {}", format_task(&task));
                        }
                    }
                    SyncEvent::ListChanged => {}
                }
            }
            ExitCode::SUCCESS
        }
    }
}

/// One-line rendering of a task for terminal output.
fn format_task(task: &Task) -> String {
    let mark = if task.completed { "x" } else { " " };
    let due = task
        .due_date
        .map_or_else(String::new, |d| format!(" due:{d}"));
    let recur = if task.recurrence == taskflow_proto::task::Recurrence::None {
        String::new()
    } else {
        format!(" repeats:{}", task.recurrence)
    };
    format!(
        "[{mark}] {} ({}, {}{due}{recur}) {}",
        task.title, task.priority, task.category, task.id
    )
}
