use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};

use super::{SyncReport, Syncer};
use crate::config::LinkMode;
use crate::model::ticket::find_field;
use crate::model::work_item::WorkItemId;

impl Syncer<'_> {
    /// Complete the linked ticket of every work item whose state matches the
    /// trigger state. Each ticket is completed at most once per pass.
    pub async fn sync_statuses(&mut self) -> Result<SyncReport> {
        let ids = self
            .work_items
            .query_work_items()
            .await
            .with_context(|| format!("Failed to get data from {}", self.work_items.name()))?;

        let index = match self.settings.link_mode {
            LinkMode::CustomField => Some(self.ticket_index().await?),
            LinkMode::SharedId => None,
        };

        let mut report = SyncReport::default();
        let mut completed: HashSet<String> = HashSet::new();

        for id in ids {
            report.examined += 1;

            let state = match self.work_items.work_item_state(id).await {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!("Failed to get Azure task status for {id}: {e}");
                    report.failed += 1;
                    continue;
                }
            };
            tracing::info!("Azure work item {id} state: {state}");

            if state != self.settings.trigger_state {
                continue;
            }

            let ticket_id = match &index {
                Some(index) => match index.get(&id) {
                    Some(ticket_id) => ticket_id.clone(),
                    None => {
                        tracing::warn!("No ClickUp task is linked to work item {id}. Skipping...");
                        report.skipped += 1;
                        continue;
                    }
                },
                None => id.to_string(),
            };

            if !completed.insert(ticket_id.clone()) {
                report.skipped += 1;
                continue;
            }

            let work_item_id = id.to_string();
            match self.tickets.complete_ticket(&ticket_id).await {
                Ok(()) => {
                    tracing::info!("ClickUp task {ticket_id} updated to completed");
                    self.activity.record(
                        "completed",
                        Some(&ticket_id),
                        Some(&work_item_id),
                        Some(&state),
                    );
                    report.completed += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to update ClickUp task {ticket_id}: {e}");
                    self.activity.record(
                        "failed",
                        Some(&ticket_id),
                        Some(&work_item_id),
                        Some(&e.to_string()),
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Work item id to ticket id, from the link store and the link field
    /// values of the listed tickets. A link field value wins over the store.
    async fn ticket_index(&mut self) -> Result<HashMap<WorkItemId, String>> {
        let mut index: HashMap<WorkItemId, String> = self
            .store
            .links()
            .map(|(ticket_id, work_item_id)| (work_item_id, ticket_id.to_string()))
            .collect();

        let tickets = self
            .tickets
            .list_tickets()
            .await
            .with_context(|| format!("Failed to fetch {} tasks", self.tickets.name()))?;

        let settings = self.settings;
        for ticket in &tickets {
            let Some(value) = find_field(&ticket.custom_fields, &settings.link_field)
                .and_then(|f| f.linked_value())
            else {
                continue;
            };
            match value.parse::<WorkItemId>() {
                Ok(id) => {
                    index.insert(id, ticket.id.clone());
                    self.remember_link(&ticket.id, id);
                }
                Err(_) => tracing::debug!(
                    "Ignoring non-numeric {} value '{value}' on task {}",
                    settings.link_field,
                    ticket.id
                ),
            }
        }

        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::config::{LinkMode, SyncConfig};
    use crate::model::work_item::WorkItemId;
    use crate::providers::tests::{link_field, make_ticket, MockTicketService, MockWorkItemService};
    use crate::sync::log::ActivityLog;
    use crate::sync::store::LinkStore;
    use crate::sync::{SyncReport, Syncer};

    fn settings(mode: LinkMode) -> SyncConfig {
        SyncConfig {
            link_mode: mode,
            ..SyncConfig::default()
        }
    }

    async fn run(
        tickets: &MockTicketService,
        work_items: &MockWorkItemService,
        settings: &SyncConfig,
        store: &mut LinkStore,
    ) -> SyncReport {
        let activity = ActivityLog::disabled();
        Syncer::new(tickets, work_items, settings, store, &activity)
            .sync_statuses()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn shared_id_mode_completes_ticket_with_work_item_id() {
        let tickets = MockTicketService::new(vec![]);
        let work_items = MockWorkItemService::new().with_item(42, "Doing");

        let report = run(
            &tickets,
            &work_items,
            &settings(LinkMode::SharedId),
            &mut LinkStore::in_memory(),
        )
        .await;

        assert_eq!(tickets.completed(), vec!["42"]);
        assert_eq!(report.completed, 1);
    }

    #[tokio::test]
    async fn only_exact_trigger_state_completes() {
        let tickets = MockTicketService::new(vec![]);
        let work_items = MockWorkItemService::new()
            .with_item(1, "Doing")
            .with_item(2, "doing")
            .with_item(3, "Done")
            .with_item(4, "Doing ")
            .with_item(5, "Completed");

        let report = run(
            &tickets,
            &work_items,
            &settings(LinkMode::SharedId),
            &mut LinkStore::in_memory(),
        )
        .await;

        assert_eq!(tickets.completed(), vec!["1"]);
        assert_eq!(report.examined, 5);
    }

    #[tokio::test]
    async fn repeated_ids_complete_once_per_run() {
        let tickets = MockTicketService::new(vec![]);
        let mut work_items = MockWorkItemService::new().with_item(42, "Doing");
        work_items.ids.push(WorkItemId(42));

        run(
            &tickets,
            &work_items,
            &settings(LinkMode::SharedId),
            &mut LinkStore::in_memory(),
        )
        .await;

        assert_eq!(tickets.completed(), vec!["42"]);
    }

    #[tokio::test]
    async fn custom_field_mode_resolves_ticket_through_link_field() {
        let tickets = MockTicketService::new(vec![
            make_ticket("86abc", "Linked", vec![link_field("f-1", Some(json!("42")))]),
            make_ticket("86def", "Other", vec![link_field("f-1", Some(json!("7")))]),
        ]);
        let work_items = MockWorkItemService::new()
            .with_item(42, "Doing")
            .with_item(7, "To Do");
        let mut store = LinkStore::in_memory();

        let report = run(
            &tickets,
            &work_items,
            &settings(LinkMode::CustomField),
            &mut store,
        )
        .await;

        assert_eq!(tickets.completed(), vec!["86abc"]);
        assert_eq!(report.completed, 1);
        assert_eq!(store.ticket_for(WorkItemId(42)), Some("86abc"));
    }

    #[tokio::test]
    async fn custom_field_mode_uses_link_store() {
        let tickets = MockTicketService::new(vec![make_ticket("86abc", "No field", vec![])]);
        let work_items = MockWorkItemService::new().with_item(42, "Doing");
        let mut store = LinkStore::in_memory();
        store.link("86abc", WorkItemId(42)).unwrap();

        run(
            &tickets,
            &work_items,
            &settings(LinkMode::CustomField),
            &mut store,
        )
        .await;

        assert_eq!(tickets.completed(), vec!["86abc"]);
    }

    #[tokio::test]
    async fn custom_field_mode_skips_unlinked_work_items() {
        let tickets = MockTicketService::new(vec![make_ticket("42", "Same id", vec![])]);
        let work_items = MockWorkItemService::new().with_item(42, "Doing");

        let report = run(
            &tickets,
            &work_items,
            &settings(LinkMode::CustomField),
            &mut LinkStore::in_memory(),
        )
        .await;

        assert!(tickets.completed().is_empty());
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn state_failure_skips_that_item() {
        let tickets = MockTicketService::new(vec![]);
        let work_items = MockWorkItemService::new()
            .with_item(1, "Doing")
            .with_item(2, "Doing")
            .with_state_failure(1);

        let report = run(
            &tickets,
            &work_items,
            &settings(LinkMode::SharedId),
            &mut LinkStore::in_memory(),
        )
        .await;

        assert_eq!(tickets.completed(), vec!["2"]);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn completion_failure_is_counted() {
        let tickets = MockTicketService::new(vec![]).with_complete_failure();
        let work_items = MockWorkItemService::new().with_item(1, "Doing");

        let report = run(
            &tickets,
            &work_items,
            &settings(LinkMode::SharedId),
            &mut LinkStore::in_memory(),
        )
        .await;

        assert_eq!(report.completed, 0);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn query_failure_aborts_the_pass() {
        let tickets = MockTicketService::new(vec![]);
        let work_items = MockWorkItemService::new()
            .with_item(1, "Doing")
            .with_query_failure();
        let settings = settings(LinkMode::SharedId);
        let mut store = LinkStore::in_memory();
        let activity = ActivityLog::disabled();

        let result = Syncer::new(&tickets, &work_items, &settings, &mut store, &activity)
            .sync_statuses()
            .await;

        assert!(result.is_err());
        assert!(tickets.completed().is_empty());
    }

    #[tokio::test]
    async fn custom_trigger_state() {
        let tickets = MockTicketService::new(vec![]);
        let work_items = MockWorkItemService::new()
            .with_item(1, "Doing")
            .with_item(2, "Done");
        let settings = SyncConfig {
            trigger_state: "Done".into(),
            ..settings(LinkMode::SharedId)
        };

        run(&tickets, &work_items, &settings, &mut LinkStore::in_memory()).await;

        assert_eq!(tickets.completed(), vec!["2"]);
    }

    #[tokio::test]
    async fn default_settings_complete_ticket_sharing_the_work_item_id() {
        let tickets = MockTicketService::new(vec![]);
        let work_items = MockWorkItemService::new().with_item(42, "Doing");

        let report = run(
            &tickets,
            &work_items,
            &SyncConfig::default(),
            &mut LinkStore::in_memory(),
        )
        .await;

        assert_eq!(tickets.completed(), vec!["42"]);
        assert_eq!(report.completed, 1);
        assert_eq!(report.skipped, 0);
    }
}
