pub mod create;
pub mod log;
pub mod status;
pub mod store;

use std::fmt;

use crate::config::SyncConfig;
use crate::model::work_item::WorkItemId;
use crate::providers::{TicketService, WorkItemService};
use self::log::ActivityLog;
use self::store::LinkStore;

/// Counts for one pass of a sync flow.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub examined: usize,
    pub created: usize,
    pub completed: usize,
    pub linked: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} examined, {} created, {} completed, {} linked, {} skipped, {} failed",
            self.examined, self.created, self.completed, self.linked, self.skipped, self.failed
        )
    }
}

/// Runs the sync flows against a ticket service and a work-item service.
pub struct Syncer<'a> {
    tickets: &'a dyn TicketService,
    work_items: &'a dyn WorkItemService,
    settings: &'a SyncConfig,
    store: &'a mut LinkStore,
    activity: &'a ActivityLog,
}

impl<'a> Syncer<'a> {
    pub fn new(
        tickets: &'a dyn TicketService,
        work_items: &'a dyn WorkItemService,
        settings: &'a SyncConfig,
        store: &'a mut LinkStore,
        activity: &'a ActivityLog,
    ) -> Self {
        Self {
            tickets,
            work_items,
            settings,
            store,
            activity,
        }
    }

    /// Record a link, logging instead of failing when the store can't be written.
    fn remember_link(&mut self, ticket_id: &str, work_item_id: WorkItemId) {
        if let Err(e) = self.store.link(ticket_id, work_item_id) {
            tracing::warn!("Failed to save link {ticket_id} -> {work_item_id}: {e:#}");
        }
    }
}
