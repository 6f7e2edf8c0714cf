pub mod azure;
pub mod clickup;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::AppConfig;
use crate::model::ticket::{CustomField, Ticket};
use crate::model::work_item::{WorkItem, WorkItemId};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("{service} response could not be decoded: {source}")]
    Decode {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// The ticketing side of the sync.
#[async_trait]
pub trait TicketService: Send + Sync {
    fn name(&self) -> &str;
    async fn list_tickets(&self) -> ApiResult<Vec<Ticket>>;
    async fn get_custom_fields(&self, ticket_id: &str) -> ApiResult<Vec<CustomField>>;
    async fn set_custom_field(&self, ticket_id: &str, field_id: &str, value: &str)
        -> ApiResult<()>;
    async fn complete_ticket(&self, ticket_id: &str) -> ApiResult<()>;
}

/// The work-item tracking side of the sync.
#[async_trait]
pub trait WorkItemService: Send + Sync {
    fn name(&self) -> &str;
    async fn create_work_item(&self, title: &str, description: Option<&str>)
        -> ApiResult<WorkItem>;
    async fn work_item_state(&self, id: WorkItemId) -> ApiResult<String>;
    async fn query_work_items(&self) -> ApiResult<Vec<WorkItemId>>;
}


pub(crate) async fn send(
    service: &'static str,
    request: reqwest::RequestBuilder,
) -> ApiResult<reqwest::Response> {
    let resp = request
        .send()
        .await
        .map_err(|source| ApiError::Transport { service, source })?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            service,
            status,
            body,
        });
    }
    Ok(resp)
}

pub(crate) async fn send_json<T: DeserializeOwned>(
    service: &'static str,
    request: reqwest::RequestBuilder,
) -> ApiResult<T> {
    send(service, request)
        .await?
        .json()
        .await
        .map_err(|source| ApiError::Decode { service, source })
}

pub fn create_ticket_service(config: &AppConfig) -> Result<clickup::ClickUpClient> {
    let cfg = config
        .clickup
        .as_ref()
        .context("No [clickup] section configured. Add api_key and list_id to the config file")?;
    Ok(clickup::ClickUpClient::new(cfg))
}

pub fn create_work_item_service(config: &AppConfig) -> Result<azure::AzureDevOpsClient> {
    let cfg = config.azure.as_ref().context(
        "No [azure] section configured. Add organization, project and personal_access_token to the config file",
    )?;
    Ok(azure::AzureDevOpsClient::new(cfg))
}
