use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::Path;

use crate::action::ActionPair;

/// Post-acknowledgement snapshots that may disagree before the snapshot wins.
pub const DEFAULT_STALE_SNAPSHOT_TOLERANCE: u32 = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub widget: WidgetConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub chart: ChartConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetConfig {
    #[serde(default = "default_action_name")]
    pub action_name: String,
    #[serde(default = "default_action_undo_name")]
    pub action_undo_name: String,
    /// Index slot the primary mutation is written to and snapshots are
    /// read from. Unset means the slot follows `action_name`.
    #[serde(default)]
    pub index_key: Option<String>,
    #[serde(default)]
    pub notify_account_id: Option<String>,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            action_name: default_action_name(),
            action_undo_name: default_action_undo_name(),
            index_key: None,
            notify_account_id: None,
        }
    }
}

impl WidgetConfig {
    #[must_use]
    pub fn pair(&self) -> ActionPair {
        ActionPair::new(&self.action_name, &self.action_undo_name)
    }

    /// The index slot writes land in and reads come from.
    #[must_use]
    pub fn index_slot(&self) -> &str {
        self.index_key.as_deref().unwrap_or(&self.action_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_stale_snapshot_tolerance")]
    pub stale_snapshot_tolerance: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            stale_snapshot_tolerance: default_stale_snapshot_tolerance(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartConfig {
    #[serde(default = "default_top_limit")]
    pub top_limit: usize,
    #[serde(default)]
    pub category_filter: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_width")]
    pub width: String,
    #[serde(default = "default_height")]
    pub height: String,
    #[serde(default = "default_bar_color")]
    pub bar_color: String,
    #[serde(default = "default_series_name")]
    pub series_name: String,
    /// Prefix joined with an app's widget name to form its link.
    #[serde(default)]
    pub details_url: String,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            top_limit: default_top_limit(),
            category_filter: None,
            title: None,
            width: default_width(),
            height: default_height(),
            bar_color: default_bar_color(),
            series_name: default_series_name(),
            details_url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(".tally/config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("tally/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(
        cli_json,
        user.output.as_deref(),
        env_format.as_deref(),
        std::io::stdout().is_terminal(),
    );

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn resolve_output(
    cli_json: bool,
    user_output: Option<&str>,
    env_format: Option<&str>,
    is_tty: bool,
) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if is_tty { "pretty" } else { "text" }.to_string()
}

fn default_action_name() -> String {
    "star".to_string()
}

fn default_action_undo_name() -> String {
    "unstar".to_string()
}

const fn default_stale_snapshot_tolerance() -> u32 {
    DEFAULT_STALE_SNAPSHOT_TOLERANCE
}

const fn default_top_limit() -> usize {
    10
}

fn default_width() -> String {
    "100vh".to_string()
}

fn default_height() -> String {
    "400px".to_string()
}

fn default_bar_color() -> String {
    "#59e691".to_string()
}

fn default_series_name() -> String {
    "Votes".to_string()
}
