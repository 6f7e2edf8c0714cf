use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEvent {
    pub timestamp: String,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Append-only JSONL record of what the sync did.
pub struct ActivityLog {
    path: Option<PathBuf>,
}

impl ActivityLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn append(&self, event: &SyncEvent) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let line = serde_json::to_string(event)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Best effort: a failed write is logged, never fatal.
    pub fn record(
        &self,
        event_type: &str,
        ticket_id: Option<&str>,
        work_item_id: Option<&str>,
        message: Option<&str>,
    ) {
        let event = new_event(event_type, ticket_id, work_item_id, message);
        if let Err(e) = self.append(&event) {
            tracing::warn!("Failed to write activity log: {e:#}");
        }
    }

    pub fn read_events(&self, limit: Option<usize>) -> Vec<SyncEvent> {
        let Some(path) = &self.path else {
            return Vec::new();
        };
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        let mut events: Vec<SyncEvent> = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();

        if let Some(limit) = limit {
            let len = events.len();
            if len > limit {
                events = events.split_off(len - limit);
            }
        }

        events
    }
}

pub fn new_event(
    event_type: &str,
    ticket_id: Option<&str>,
    work_item_id: Option<&str>,
    message: Option<&str>,
) -> SyncEvent {
    SyncEvent {
        timestamp: chrono::Utc::now().to_rfc3339(),
        event: event_type.to_string(),
        ticket_id: ticket_id.map(String::from),
        work_item_id: work_item_id.map(String::from),
        message: message.map(String::from),
    }
}
