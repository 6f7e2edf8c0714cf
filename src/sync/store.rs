use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::model::work_item::WorkItemId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub work_item_id: WorkItemId,
    pub linked_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    links: BTreeMap<String, LinkRecord>,
}

/// Ticket id to work item id links that survive between runs.
///
/// Without a path the store only lives for the current process.
pub struct LinkStore {
    path: Option<PathBuf>,
    data: StoreData,
}

impl LinkStore {
    pub fn open(path: Option<PathBuf>) -> Result<Self> {
        let data = match &path {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse link store {}", path.display()))?
            }
            _ => StoreData::default(),
        };
        Ok(Self { path, data })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: StoreData::default(),
        }
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn work_item_for(&self, ticket_id: &str) -> Option<WorkItemId> {
        self.data.links.get(ticket_id).map(|r| r.work_item_id)
    }

    #[cfg(test)]
    pub fn ticket_for(&self, work_item_id: WorkItemId) -> Option<&str> {
        self.data
            .links
            .iter()
            .find(|(_, r)| r.work_item_id == work_item_id)
            .map(|(ticket_id, _)| ticket_id.as_str())
    }

    pub fn links(&self) -> impl Iterator<Item = (&str, WorkItemId)> {
        self.data
            .links
            .iter()
            .map(|(ticket_id, r)| (ticket_id.as_str(), r.work_item_id))
    }

    pub fn len(&self) -> usize {
        self.data.links.len()
    }

    /// Record a link and persist it. Re-linking a ticket to the same work
    /// item keeps the original timestamp.
    pub fn link(&mut self, ticket_id: &str, work_item_id: WorkItemId) -> Result<()> {
        if self.work_item_for(ticket_id) == Some(work_item_id) {
            return Ok(());
        }
        self.data.links.insert(
            ticket_id.to_string(),
            LinkRecord {
                work_item_id,
                linked_at: chrono::Utc::now().to_rfc3339(),
            },
        );
        self.save()
    }
}
