use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use urlencoding::encode;

use super::{send_json, ApiResult, WorkItemService};
use crate::config::AzureConfig;
use crate::model::work_item::{WorkItem, WorkItemId};

const SERVICE: &str = "Azure DevOps";

const PROJECT_QUERY: &str = "Select [System.Id], [System.Title], [System.State] From WorkItems Where [System.TeamProject] = @project";

pub struct AzureDevOpsClient {
    base_url: String,
    api_version: String,
    work_item_type: String,
    auth_header: String,
    client: reqwest::Client,
}

impl AzureDevOpsClient {
    pub fn new(config: &AzureConfig) -> Self {
        // Personal access tokens go in the password slot with an empty user.
        let creds = format!(":{}", config.personal_access_token);
        let encoded = base64::engine::general_purpose::STANDARD.encode(creds);
        Self {
            base_url: format!(
                "{}/{}/{}",
                config.base_url.trim_end_matches('/'),
                encode(&config.organization),
                encode(&config.project)
            ),
            api_version: config.api_version.clone(),
            work_item_type: config.work_item_type.clone(),
            auth_header: format!("Basic {encoded}"),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/_apis/wit/{path}", self.base_url)
    }

    pub async fn get_work_item(&self, id: WorkItemId) -> ApiResult<WorkItem> {
        let raw: RawWorkItem = send_json(
            SERVICE,
            self.client
                .get(self.api_url(&format!("workitems/{id}")))
                .query(&[("api-version", &self.api_version)])
                .header("Authorization", &self.auth_header),
        )
        .await?;
        Ok(raw.into_work_item())
    }
}

#[derive(Deserialize)]
struct RawWorkItem {
    id: u64,
    #[serde(default)]
    fields: HashMap<String, Value>,
}

impl RawWorkItem {
    fn text_field(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .and_then(Value::as_str)
            .map(String::from)
    }

    fn into_work_item(self) -> WorkItem {
        WorkItem {
            id: WorkItemId(self.id),
            title: self.text_field("System.Title").unwrap_or_default(),
            description: self.text_field("System.Description"),
            state: self.text_field("System.State"),
        }
    }
}

#[derive(Deserialize)]
struct WiqlResponse {
    #[serde(rename = "workItems", default)]
    work_items: Vec<WorkItemRef>,
}

#[derive(Deserialize)]
struct WorkItemRef {
    id: u64,
}

#[async_trait]
impl WorkItemService for AzureDevOpsClient {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn create_work_item(
        &self,
        title: &str,
        description: Option<&str>,
    ) -> ApiResult<WorkItem> {
        let patch = json!([
            { "op": "add", "path": "/fields/System.Title", "value": title },
            { "op": "add", "path": "/fields/System.Description", "value": description.unwrap_or_default() }
        ]);
        let raw: RawWorkItem = send_json(
            SERVICE,
            self.client
                .post(self.api_url(&format!("workitems/${}", self.work_item_type)))
                .query(&[("api-version", &self.api_version)])
                .header("Authorization", &self.auth_header)
                .header("Content-Type", "application/json-patch+json")
                .body(patch.to_string()),
        )
        .await?;
        Ok(raw.into_work_item())
    }

    async fn work_item_state(&self, id: WorkItemId) -> ApiResult<String> {
        let item = self.get_work_item(id).await?;
        Ok(item.state.unwrap_or_else(|| "Unknown".to_string()))
    }

    async fn query_work_items(&self) -> ApiResult<Vec<WorkItemId>> {
        let resp: WiqlResponse = send_json(
            SERVICE,
            self.client
                .post(self.api_url("wiql"))
                .query(&[("api-version", &self.api_version)])
                .header("Authorization", &self.auth_header)
                .json(&json!({ "query": PROJECT_QUERY })),
        )
        .await?;
        Ok(resp
            .work_items
            .into_iter()
            .map(|r| WorkItemId(r.id))
            .collect())
    }
}
