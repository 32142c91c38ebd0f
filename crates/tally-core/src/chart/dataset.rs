//! Vote dataset ingestion.
//!
//! The dataset is `{"data": ["<app json>", ...]}`: every element of `data` is
//! itself a JSON-encoded app record.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// One app on the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRecord {
    pub name: String,
    pub widget_name: String,
    pub votes: u64,
    pub tags: Vec<String>,
    pub recent_tag: Option<String>,
    pub app_url: String,
}

#[derive(Debug, Deserialize)]
struct RawDataset {
    data: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawApp {
    #[serde(default)]
    name: Option<String>,
    widget_name: String,
    #[serde(default)]
    num_votes: u64,
    #[serde(default)]
    lastest_tag: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

/// Reason the dataset envelope could not be read.
#[derive(Debug, thiserror::Error)]
#[error("chart dataset is malformed: {0}")]
pub struct DatasetError(#[from] serde_json::Error);

/// Parse the dataset, joining `details_url` with each widget name.
///
/// Records that fail to decode are skipped with a warning. Votes come from
/// each record's own `num_votes`.
///
/// # Errors
///
/// Returns [`DatasetError`] if the envelope is not `{"data": [string, ...]}`.
pub fn parse_app_dataset(input: &str, details_url: &str) -> Result<Vec<AppRecord>, DatasetError> {
    let raw: RawDataset = serde_json::from_str(input)?;
    let mut apps = Vec::with_capacity(raw.data.len());
    for (index, encoded) in raw.data.iter().enumerate() {
        match serde_json::from_str::<RawApp>(encoded) {
            Ok(app) => apps.push(app.into_record(details_url)),
            Err(err) => warn!(index, error = %err, "skipping malformed app record"),
        }
    }
    Ok(apps)
}

impl RawApp {
    fn into_record(self, details_url: &str) -> AppRecord {
        let mut tags: Vec<String> = Vec::with_capacity(self.tags.len());
        for tag in self.tags {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        AppRecord {
            name: self.name.unwrap_or_else(|| self.widget_name.clone()),
            app_url: format!("{details_url}{}", self.widget_name),
            widget_name: self.widget_name,
            votes: self.num_votes,
            tags,
            recent_tag: self.lastest_tag,
        }
    }
}
