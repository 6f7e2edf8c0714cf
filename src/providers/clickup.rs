use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use urlencoding::encode;

use super::{send, send_json, ApiResult, TicketService};
use crate::config::ClickUpConfig;
use crate::model::ticket::{CustomField, Ticket};

const SERVICE: &str = "ClickUp";

pub struct ClickUpClient {
    base_url: String,
    api_key: String,
    list_id: String,
    completed_status: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct TaskList {
    #[serde(default)]
    tasks: Vec<Ticket>,
}

impl ClickUpClient {
    pub fn new(config: &ClickUpConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            list_id: config.list_id.clone(),
            completed_status: config.completed_status.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn task_url(&self, ticket_id: &str) -> String {
        format!("{}/task/{}", self.base_url, encode(ticket_id))
    }

    pub async fn get_ticket(&self, ticket_id: &str) -> ApiResult<Ticket> {
        send_json(
            SERVICE,
            self.client
                .get(self.task_url(ticket_id))
                .header("Authorization", &self.api_key),
        )
        .await
    }

    /// Write `value` into a custom field. Whatever the input type, ClickUp
    /// receives its `Display` form as a JSON string.
    pub async fn update_custom_field<V: fmt::Display>(
        &self,
        ticket_id: &str,
        field_id: &str,
        value: V,
    ) -> ApiResult<()> {
        let url = format!("{}/field/{}", self.task_url(ticket_id), encode(field_id));
        let resp = send(
            SERVICE,
            self.client
                .post(url)
                .header("Authorization", &self.api_key)
                .json(&json!({ "value": value.to_string() })),
        )
        .await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        tracing::debug!(%status, %body, "ClickUp custom field updated");
        Ok(())
    }
}

#[async_trait]
impl TicketService for ClickUpClient {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn list_tickets(&self) -> ApiResult<Vec<Ticket>> {
        let list: TaskList = send_json(
            SERVICE,
            self.client
                .get(format!("{}/list/{}/task", self.base_url, encode(&self.list_id)))
                .header("Authorization", &self.api_key),
        )
        .await?;
        Ok(list.tasks)
    }

    async fn get_custom_fields(&self, ticket_id: &str) -> ApiResult<Vec<CustomField>> {
        let ticket = self.get_ticket(ticket_id).await?;
        for field in &ticket.custom_fields {
            tracing::debug!("ID: {}, Name: {}", field.id, field.name);
        }
        Ok(ticket.custom_fields)
    }

    async fn set_custom_field(
        &self,
        ticket_id: &str,
        field_id: &str,
        value: &str,
    ) -> ApiResult<()> {
        self.update_custom_field(ticket_id, field_id, value).await
    }

    async fn complete_ticket(&self, ticket_id: &str) -> ApiResult<()> {
        send(
            SERVICE,
            self.client
                .put(self.task_url(ticket_id))
                .header("Authorization", &self.api_key)
                .json(&json!({ "status": self.completed_status })),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::work_item::WorkItemId;
    use crate::providers::ApiError;
    use mockito::{Matcher, Server};

    fn client(server: &Server) -> ClickUpClient {
        ClickUpClient::new(&ClickUpConfig {
            api_key: "pk_test".into(),
            list_id: "900".into(),
            base_url: server.url(),
            completed_status: "COMPLETED".into(),
        })
    }

    #[tokio::test]
    async fn list_tickets_reads_tasks_with_api_key() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/list/900/task")
            .match_header("authorization", "pk_test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "tasks": [
                        { "id": "1", "name": "Fix bug", "description": "desc", "custom_fields": [] },
                        { "id": "2", "name": "Ship it" }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let tickets = client(&server).list_tickets().await.unwrap();

        m.assert_async().await;
        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets[0].title, "Fix bug");
        assert_eq!(tickets[1].description, None);
    }

    #[tokio::test]
    async fn get_custom_fields_returns_task_fields() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/task/abc")
            .with_status(200)
            .with_body(
                json!({
                    "id": "abc",
                    "name": "t",
                    "custom_fields": [
                        { "id": "f-1", "name": "AZ_ID", "value": "7" },
                        { "id": "f-2", "name": "Estimate" }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let fields = client(&server).get_custom_fields("abc").await.unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].id, "f-1");
        assert_eq!(fields[0].linked_value().as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn update_custom_field_sends_integer_as_string() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/task/abc/field/f-1")
            .match_header("authorization", "pk_test")
            .match_body(Matcher::Json(json!({ "value": "42" })))
            .with_status(200)
            .with_body("{}")
            .expect(2)
            .create_async()
            .await;

        let client = client(&server);
        client.update_custom_field("abc", "f-1", 42).await.unwrap();
        client
            .update_custom_field("abc", "f-1", WorkItemId(42))
            .await
            .unwrap();

        m.assert_async().await;
    }

    #[tokio::test]
    async fn update_custom_field_reads_response_body() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/task/abc/field/f-1")
            .with_status(200)
            .with_body("field updated")
            .expect(1)
            .create_async()
            .await;

        client(&server)
            .set_custom_field("abc", "f-1", "7")
            .await
            .unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn complete_ticket_puts_completed_status() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("PUT", "/task/42")
            .match_body(Matcher::Json(json!({ "status": "COMPLETED" })))
            .with_status(200)
            .with_body(json!({ "id": "42", "name": "t" }).to_string())
            .expect(1)
            .create_async()
            .await;

        client(&server).complete_ticket("42").await.unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn ticket_ids_are_path_encoded() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("PUT", "/task/a%2Fb")
            .with_status(200)
            .create_async()
            .await;

        client(&server).complete_ticket("a/b").await.unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn http_failures_surface_as_status_errors() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/list/900/task")
            .with_status(401)
            .with_body(r#"{"err":"Token invalid"}"#)
            .create_async()
            .await;
        server
            .mock("PUT", "/task/1")
            .with_status(500)
            .create_async()
            .await;
        server
            .mock("POST", "/task/1/field/f")
            .with_status(400)
            .create_async()
            .await;
        server
            .mock("GET", "/task/1")
            .with_status(404)
            .create_async()
            .await;

        let client = client(&server);
        match client.list_tickets().await {
            Err(ApiError::Status { status, body, .. }) => {
                assert_eq!(status.as_u16(), 401);
                assert!(body.contains("Token invalid"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
        assert!(client.complete_ticket("1").await.is_err());
        assert!(client.set_custom_field("1", "f", "9").await.is_err());
        assert!(client.get_custom_fields("1").await.is_err());
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/task/1")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = client(&server).get_ticket("1").await.unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }
}
