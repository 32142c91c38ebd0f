//! Leaderboard chart: ranks apps by vote count and emits a declarative
//! bar-chart document for a generic chart renderer.
//!
//! This is a pure transform. Fetching the dataset, styling the page, and
//! drawing the chart all happen elsewhere.

pub mod dataset;

use serde::Serialize;

use crate::config::ChartConfig;

pub use dataset::{AppRecord, DatasetError, parse_app_dataset};

/// Keep apps with at least one vote (and `category` among their tags, when
/// given), take the `top_limit` most voted, and return them in ascending
/// vote order so a horizontal bar chart draws the leader at the top.
///
/// Ties keep dataset order.
#[must_use]
pub fn rank_apps<'a>(
    apps: &'a [AppRecord],
    category: Option<&str>,
    top_limit: usize,
) -> Vec<&'a AppRecord> {
    let mut ranked: Vec<&AppRecord> = apps
        .iter()
        .filter(|app| app.votes > 0)
        .filter(|app| category.is_none_or(|tag| app.tags.iter().any(|t| t == tag)))
        .collect();
    ranked.sort_by(|a, b| b.votes.cmp(&a.votes));
    ranked.truncate(top_limit);
    ranked.sort_by_key(|app| app.votes);
    ranked
}

// ---------------------------------------------------------------------------
// Chart document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Toggle {
    pub show: bool,
}

const HIDDEN: Toggle = Toggle { show: false };

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tooltip {
    pub trigger: &'static str,
    pub confine: bool,
    pub axis_pointer: AxisPointer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisPointer {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grid {
    pub left: &'static str,
    pub right: &'static str,
    pub contain_label: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryLabel {
    pub show: bool,
    pub name_text_style: TextStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextStyle {
    pub overflow: &'static str,
}

/// Vertical axis listing app names.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAxis {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: Vec<String>,
    pub axis_line: Toggle,
    pub axis_tick: Toggle,
    pub axis_label: CategoryLabel,
    pub boundary_gap: bool,
}

/// Horizontal axis carrying vote counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueAxis {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub boundary_gap: [u8; 2],
    pub split_line: Toggle,
    pub axis_line: Toggle,
    pub axis_tick: Toggle,
    pub axis_label: Toggle,
    pub max: &'static str,
    pub min_interval: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: Vec<u64>,
    pub color: String,
}

/// The declarative document handed to the chart renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    pub tooltip: Tooltip,
    pub grid: Grid,
    pub y_axis: CategoryAxis,
    pub x_axis: ValueAxis,
    pub series: Vec<BarSeries>,
}

/// Build the bar chart for already ranked apps.
#[must_use]
pub fn chart_spec(ranked: &[&AppRecord], config: &ChartConfig) -> ChartSpec {
    ChartSpec {
        tooltip: Tooltip {
            trigger: "axis",
            confine: true,
            axis_pointer: AxisPointer { kind: "shadow" },
        },
        grid: Grid {
            left: "3%",
            right: "4%",
            contain_label: true,
        },
        y_axis: CategoryAxis {
            kind: "category",
            data: ranked.iter().map(|app| app.name.clone()).collect(),
            axis_line: HIDDEN,
            axis_tick: HIDDEN,
            axis_label: CategoryLabel {
                show: true,
                name_text_style: TextStyle { overflow: "break" },
            },
            boundary_gap: true,
        },
        x_axis: ValueAxis {
            kind: "value",
            boundary_gap: [0, 1],
            split_line: HIDDEN,
            axis_line: HIDDEN,
            axis_tick: HIDDEN,
            axis_label: Toggle { show: true },
            max: "dataMax",
            min_interval: 1,
        },
        series: vec![BarSeries {
            name: config.series_name.clone(),
            kind: "bar",
            data: ranked.iter().map(|app| app.votes).collect(),
            color: config.bar_color.clone(),
        }],
    }
}

/// Props for the generic chart widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRender {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub definition: ChartSpec,
    pub width: String,
    pub height: String,
}

/// What the leaderboard shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChartView {
    Loading,
    /// Nothing passed the filters.
    NoData,
    Ready(ChartRender),
}

impl ChartView {
    /// Rank `apps` and build the view. `None` means the dataset has not
    /// arrived yet.
    #[must_use]
    pub fn build(apps: Option<&[AppRecord]>, config: &ChartConfig) -> Self {
        let Some(apps) = apps else {
            return Self::Loading;
        };
        let ranked = rank_apps(apps, config.category_filter.as_deref(), config.top_limit);
        if ranked.is_empty() {
            tracing::debug!(apps = apps.len(), "no app passed the chart filters");
            return Self::NoData;
        }
        Self::Ready(ChartRender {
            title: config.title.clone(),
            definition: chart_spec(&ranked, config),
            width: config.width.clone(),
            height: config.height.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn app(name: &str, votes: u64, tags: &[&str]) -> AppRecord {
        AppRecord {
            name: name.to_string(),
            widget_name: name.to_string(),
            votes,
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            recent_tag: None,
            app_url: String::new(),
        }
    }

    fn names(ranked: &[&AppRecord]) -> Vec<String> {
        ranked.iter().map(|a| a.name.clone()).collect()
    }

    #[test]
    fn keeps_top_n_in_ascending_order() {
        let apps = [app("a", 5, &[]), app("b", 50, &[]), app("c", 1, &[]), app("d", 20, &[])];
        let ranked = rank_apps(&apps, None, 3);
        assert_eq!(names(&ranked), ["a", "d", "b"]);
    }

    #[test]
    fn ties_keep_dataset_order() {
        let apps = [app("first", 5, &[]), app("second", 5, &[]), app("third", 5, &[])];
        assert_eq!(names(&rank_apps(&apps, None, 10)), ["first", "second", "third"]);

        let apps = [app("a", 9, &[]), app("b", 3, &[]), app("c", 9, &[]), app("d", 3, &[])];
        assert_eq!(names(&rank_apps(&apps, None, 3)), ["b", "a", "c"]);
    }

    #[test]
    fn zero_vote_apps_are_dropped() {
        let apps = [app("a", 0, &[]), app("b", 2, &[])];
        assert_eq!(names(&rank_apps(&apps, None, 10)), ["b"]);
    }

    #[test]
    fn category_filter_matches_tags() {
        let apps = [app("a", 3, &["defi"]), app("b", 9, &["games"]), app("c", 4, &["defi", "nft"])];
        assert_eq!(names(&rank_apps(&apps, Some("defi"), 10)), ["a", "c"]);
    }

    #[test]
    fn zero_limit_yields_nothing() {
        let apps = [app("a", 3, &[])];
        assert!(rank_apps(&apps, None, 0).is_empty());
    }

    #[test]
    fn view_states() {
        let config = ChartConfig::default();
        assert_eq!(ChartView::build(None, &config), ChartView::Loading);
        assert_eq!(ChartView::build(Some(&[app("a", 0, &[])]), &config), ChartView::NoData);
        assert!(matches!(
            ChartView::build(Some(&[app("a", 1, &[])]), &config),
            ChartView::Ready(_)
        ));
    }

    #[test]
    fn spec_serializes_to_chart_document() {
        let apps = [app("a", 2, &[]), app("b", 7, &[])];
        let ranked = rank_apps(&apps, None, 10);
        let spec = serde_json::to_value(chart_spec(&ranked, &ChartConfig::default())).expect("serialize");

        assert_eq!(spec["yAxis"]["type"], "category");
        assert_eq!(spec["yAxis"]["data"], json!(["a", "b"]));
        assert_eq!(spec["yAxis"]["axisLabel"]["nameTextStyle"]["overflow"], "break");
        assert_eq!(spec["xAxis"]["boundaryGap"], json!([0, 1]));
        assert_eq!(spec["xAxis"]["max"], "dataMax");
        assert_eq!(spec["xAxis"]["minInterval"], 1);
        assert_eq!(spec["tooltip"]["axisPointer"]["type"], "shadow");
        assert_eq!(spec["grid"]["containLabel"], true);
        assert_eq!(
            spec["series"],
            json!([{"name": "Votes", "type": "bar", "data": [2, 7], "color": "#59e691"}])
        );
    }
}
