use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "TASKSYNC_CONFIG";

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub clickup: Option<ClickUpConfig>,
    pub azure: Option<AzureConfig>,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize)]
pub struct ClickUpConfig {
    pub api_key: String,
    pub list_id: String,
    #[serde(default = "default_clickup_url")]
    pub base_url: String,
    #[serde(default = "default_completed_status")]
    pub completed_status: String,
}

#[derive(Debug, Deserialize)]
pub struct AzureConfig {
    pub organization: String,
    pub project: String,
    pub personal_access_token: String,
    #[serde(default = "default_azure_url")]
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_work_item_type")]
    pub work_item_type: String,
}

/// How the status flow finds the ticket that belongs to a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkMode {
    /// Treat the work item id as the ticket id.
    #[default]
    SharedId,
    /// Look the work item up in the link field values and the link store.
    CustomField,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_link_field")]
    pub link_field: String,
    #[serde(default = "default_trigger_state")]
    pub trigger_state: String,
    #[serde(default)]
    pub link_mode: LinkMode,
    /// Leave tickets whose link field already holds a value alone instead of
    /// creating another work item for them.
    #[serde(default)]
    pub skip_linked: bool,
    pub state_file: Option<PathBuf>,
    #[serde(default)]
    pub persist_links: bool,
    #[serde(default = "default_true")]
    pub activity_log: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            link_field: default_link_field(),
            trigger_state: default_trigger_state(),
            link_mode: LinkMode::default(),
            skip_linked: false,
            state_file: None,
            persist_links: false,
            activity_log: true,
        }
    }
}

impl SyncConfig {
    /// Where the link store lives, or `None` when links are kept in memory only.
    pub fn state_path(&self) -> Option<PathBuf> {
        if !self.persist_links {
            return None;
        }
        Some(
            self.state_file
                .clone()
                .unwrap_or_else(|| data_dir().join("links.json")),
        )
    }

    pub fn activity_path(&self) -> Option<PathBuf> {
        self.activity_log
            .then(|| data_dir().join("sync-activity.jsonl"))
    }
}

fn default_clickup_url() -> String {
    "https://api.clickup.com/api/v2".into()
}

fn default_completed_status() -> String {
    "COMPLETED".into()
}

fn default_azure_url() -> String {
    "https://dev.azure.com".into()
}

fn default_api_version() -> String {
    "6.0".into()
}

fn default_work_item_type() -> String {
    "Task".into()
}

fn default_link_field() -> String {
    "AZ_ID".into()
}

fn default_trigger_state() -> String {
    "Doing".into()
}

fn default_true() -> bool {
    true
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tasksync")
}

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir().join("config.toml"))
}

/// Load the config from `path`, falling back to `$TASKSYNC_CONFIG` and then
/// `~/.tasksync/config.toml`. A missing file yields an empty config.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents)?;
    Ok(config)
}
