use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use crate::config::{self, AppConfig};
use crate::providers::{self, TicketService};
use crate::sync::log::ActivityLog;
use crate::sync::store::LinkStore;
use crate::sync::Syncer;

const DEFAULT_LOG_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run,
    Create,
    Status,
    Fields(String),
    Log(usize),
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub config_path: Option<PathBuf>,
    pub command: Command,
}

/// Parse the arguments after the program name.
///
/// Supported forms:
///   tasksync [--config <path>] [run|create|status]
///   tasksync [--config <path>] fields <ticket-id>
///   tasksync [--config <path>] log [-n <count>]
pub fn parse_args(args: &[String]) -> Result<Invocation> {
    let mut config_path = None;
    let mut rest = args;

    while let Some(first) = rest.first() {
        match first.as_str() {
            "--config" | "-c" => {
                let path = rest.get(1).context("Missing value for --config flag")?;
                config_path = Some(PathBuf::from(path));
                rest = &rest[2..];
            }
            _ => break,
        }
    }

    let command = match rest.first().map(String::as_str) {
        None | Some("run") => Command::Run,
        Some("create") => Command::Create,
        Some("status") => Command::Status,
        Some("help" | "-h" | "--help") => Command::Help,
        Some("fields") => {
            let id = rest
                .get(1)
                .context("Usage: tasksync fields <ticket-id>")?;
            Command::Fields(id.clone())
        }
        Some("log") => Command::Log(parse_log_args(&rest[1..])?),
        Some(other) => bail!("Unknown command '{other}'. Run `tasksync help` for usage."),
    };

    // Only `fields` takes a positional argument; `log` checked its own.
    let max_len = match command {
        Command::Fields(_) => 2,
        Command::Log(_) => usize::MAX,
        _ => 1,
    };
    if rest.len() > max_len {
        bail!("Unexpected argument '{}'", rest[max_len]);
    }

    Ok(Invocation {
        config_path,
        command,
    })
}

fn parse_log_args(args: &[String]) -> Result<usize> {
    match args {
        [] => Ok(DEFAULT_LOG_LIMIT),
        [flag, count] if flag == "-n" || flag == "--limit" => count
            .parse()
            .with_context(|| format!("Invalid count '{count}' for {flag}")),
        [flag] if flag == "-n" || flag == "--limit" => bail!("Missing value for {flag} flag"),
        [other, ..] => bail!("Unexpected argument '{other}'"),
    }
}

pub async fn run(invocation: Invocation) -> Result<()> {
    match invocation.command {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Log(limit) => {
            let config = config::load_config(invocation.config_path.as_deref())?;
            handle_log(&config, limit);
            Ok(())
        }
        Command::Fields(ticket_id) => {
            let config = config::load_config(invocation.config_path.as_deref())?;
            handle_fields(&config, &ticket_id).await
        }
        command => {
            let config = config::load_config(invocation.config_path.as_deref())?;
            handle_sync(&config, &command).await
        }
    }
}

async fn handle_sync(config: &AppConfig, command: &Command) -> Result<()> {
    let tickets = providers::create_ticket_service(config)?;
    let work_items = providers::create_work_item_service(config)?;
    let mut store = LinkStore::open(config.sync.state_path())?;
    let activity = ActivityLog::new(config.sync.activity_path());
    tracing::debug!("{} known links", store.len());

    let mut syncer = Syncer::new(
        &tickets,
        &work_items,
        &config.sync,
        &mut store,
        &activity,
    );

    if matches!(command, Command::Run | Command::Create) {
        match syncer.create_missing_work_items().await {
            Ok(report) => tracing::info!("Task creation: {report}"),
            Err(e) => tracing::error!("Task creation aborted: {e:#}"),
        }
    }
    if matches!(command, Command::Run | Command::Status) {
        match syncer.sync_statuses().await {
            Ok(report) => tracing::info!("Status sync: {report}"),
            Err(e) => tracing::error!("Status sync aborted: {e:#}"),
        }
    }

    Ok(())
}

async fn handle_fields(config: &AppConfig, ticket_id: &str) -> Result<()> {
    let tickets = providers::create_ticket_service(config)?;
    let fields = tickets
        .get_custom_fields(ticket_id)
        .await
        .with_context(|| format!("Failed to retrieve task details for {ticket_id}"))?;

    if fields.is_empty() {
        println!("Task {ticket_id} has no custom fields");
    }
    for field in &fields {
        let value = field.linked_value().unwrap_or_else(|| "-".into());
        println!("ID: {}, Name: {}, Value: {value}", field.id, field.name);
    }
    Ok(())
}

fn handle_log(config: &AppConfig, limit: usize) {
    let activity = ActivityLog::new(config.sync.activity_path());
    let events = activity.read_events(Some(limit));
    if events.is_empty() {
        println!("No sync activity recorded yet");
    }
    for event in events {
        let mut line = format!("{} {:<9}", event.timestamp, event.event);
        if let Some(ticket) = &event.ticket_id {
            line.push_str(&format!(" task={ticket}"));
        }
        if let Some(work_item) = &event.work_item_id {
            line.push_str(&format!(" work_item={work_item}"));
        }
        if let Some(message) = &event.message {
            line.push_str(&format!(" {message}"));
        }
        println!("{line}");
    }
}

pub fn print_help() {
    print!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "\
tasksync: keep ClickUp tasks and Azure DevOps work items in step

USAGE:
  tasksync [--config <path>] [command]

COMMANDS:
  run                 Create missing work items, then sync statuses (default)
  create              Create work items for unlinked ClickUp tasks
  status              Complete ClickUp tasks whose work item reached the trigger state
  fields <task-id>    List a ClickUp task's custom fields
  log [-n <count>]    Show recent sync activity
  help                Show this message

CONFIG:
  --config <path>, ${}, or ~/.tasksync/config.toml
",
        config::CONFIG_ENV
    )
}
