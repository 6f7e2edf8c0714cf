use anyhow::{Context, Result};

use super::{SyncReport, Syncer};
use crate::model::ticket::{find_field, Ticket};
use crate::model::work_item::WorkItemId;

impl Syncer<'_> {
    /// Create a work item for every ticket in the list that has no link yet
    /// and write the new id back into the ticket's link field.
    pub async fn create_missing_work_items(&mut self) -> Result<SyncReport> {
        let tickets = self
            .tickets
            .list_tickets()
            .await
            .with_context(|| format!("Failed to fetch {} tasks", self.tickets.name()))?;

        let mut report = SyncReport::default();
        for ticket in &tickets {
            report.examined += 1;
            self.create_for_ticket(ticket, &mut report).await;
        }
        Ok(report)
    }

    async fn create_for_ticket(&mut self, ticket: &Ticket, report: &mut SyncReport) {
        let settings = self.settings;
        let link_field_name = settings.link_field.as_str();

        let fields = match self.tickets.get_custom_fields(&ticket.id).await {
            Ok(fields) => fields,
            Err(e) => {
                tracing::warn!("Failed to retrieve task details for {}: {e}", ticket.id);
                self.activity
                    .record("failed", Some(&ticket.id), None, Some(&e.to_string()));
                report.failed += 1;
                return;
            }
        };

        let link_field = find_field(&fields, link_field_name);
        let field_value = link_field.and_then(|f| f.linked_value());

        if let Some(existing) = self.store.work_item_for(&ticket.id) {
            let existing_text = existing.to_string();
            match (link_field, field_value.as_deref()) {
                (Some(field), None) => {
                    // Created earlier but the write-back never landed.
                    tracing::info!(
                        "Task {} already linked to work item {existing}, retrying {link_field_name} update",
                        ticket.id
                    );
                    if self.write_link(ticket, &field.id, &existing_text, report).await {
                        report.linked += 1;
                    }
                }
                (Some(_), Some(value)) if value != existing_text => {
                    tracing::warn!(
                        "Task {} has {link_field_name} '{value}' but was linked to work item {existing}; leaving it alone",
                        ticket.id
                    );
                    report.skipped += 1;
                }
                _ => {
                    tracing::debug!("Task {} already linked to work item {existing}", ticket.id);
                    report.skipped += 1;
                }
            }
            return;
        }

        if settings.skip_linked {
            if let Some(value) = field_value {
                match value.parse::<WorkItemId>() {
                    Ok(id) => {
                        self.remember_link(&ticket.id, id);
                        report.linked += 1;
                    }
                    Err(_) => {
                        tracing::warn!(
                            "Task {} has non-numeric {link_field_name} value '{value}', leaving it alone",
                            ticket.id
                        );
                        report.skipped += 1;
                    }
                }
                return;
            }
        }

        let work_item = match self
            .work_items
            .create_work_item(&ticket.title, ticket.description.as_deref())
            .await
        {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!("Failed to create work item for task {}: {e}", ticket.id);
                self.activity
                    .record("failed", Some(&ticket.id), None, Some(&e.to_string()));
                report.failed += 1;
                return;
            }
        };

        let work_item_id = work_item.id.to_string();
        tracing::info!(
            "Azure task created with ID: {work_item_id} ({})",
            work_item.title
        );
        tracing::debug!(description = ?work_item.description, "work item {work_item_id} body");
        report.created += 1;
        self.remember_link(&ticket.id, work_item.id);
        self.activity
            .record("created", Some(&ticket.id), Some(&work_item_id), None);

        let Some(field) = link_field else {
            tracing::warn!(
                "Custom field '{link_field_name}' not found for task {}. Skipping...",
                ticket.id
            );
            return;
        };

        self.write_link(ticket, &field.id, &work_item_id, report).await;
    }

    /// Write the work item id into the ticket's link field. A failure leaves
    /// the stored link in place so the next pass retries the write.
    async fn write_link(
        &mut self,
        ticket: &Ticket,
        field_id: &str,
        work_item_id: &str,
        report: &mut SyncReport,
    ) -> bool {
        match self
            .tickets
            .set_custom_field(&ticket.id, field_id, work_item_id)
            .await
        {
            Ok(()) => {
                tracing::info!(
                    "Updated ClickUp task {} with Azure ID {work_item_id}",
                    ticket.id
                );
                true
            }
            Err(e) => {
                tracing::warn!("Failed to update ClickUp custom field: {e}");
                self.activity.record(
                    "failed",
                    Some(&ticket.id),
                    Some(work_item_id),
                    Some(&e.to_string()),
                );
                report.failed += 1;
                false
            }
        }
    }
}
