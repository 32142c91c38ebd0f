//! `tally chart`: rank a vote dataset for the leaderboard.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tally_core::chart::{ChartView, parse_app_dataset};
use tally_core::config::ChartConfig;
use tally_core::error::ErrorCode;

use crate::output::{OutputMode, coded, pretty_section, render_mode};

/// Shown when no app passes the filters.
const NO_DATA: &str = "This category does not have data to show yet.";

const BAR_WIDTH: u64 = 40;

#[derive(Args, Debug)]
pub struct ChartArgs {
    /// Dataset file: `{"data": ["<app json>", ...]}` (`-` for stdin).
    #[arg(long)]
    pub apps: PathBuf,

    /// Only rank apps carrying this tag (overrides `[chart] category_filter`).
    #[arg(long)]
    pub category: Option<String>,

    /// How many apps to keep (overrides `[chart] top_limit`).
    #[arg(long)]
    pub top: Option<usize>,

    /// Chart title (overrides `[chart] title`).
    #[arg(long)]
    pub title: Option<String>,
}

pub fn run_chart(args: &ChartArgs, chart: &ChartConfig, output: OutputMode) -> Result<()> {
    let mut config = chart.clone();
    if let Some(category) = &args.category {
        config.category_filter = Some(category.clone());
    }
    if let Some(top) = args.top {
        config.top_limit = top;
    }
    if let Some(title) = &args.title {
        config.title = Some(title.clone());
    }

    let raw = super::read_input(&args.apps)?;
    let apps = parse_app_dataset(&raw, &config.details_url)
        .map_err(|err| coded(ErrorCode::DatasetParseError, err))?;
    let view = ChartView::build(Some(&apps), &config);

    render_mode(
        output,
        &view,
        |v, w| match v {
            ChartView::Ready(render) => {
                let spec = &render.definition;
                let votes = spec.series.first().map(|s| s.data.as_slice()).unwrap_or_default();
                for (name, votes) in spec.y_axis.data.iter().zip(votes).rev() {
                    writeln!(w, "{name}\t{votes}")?;
                }
                Ok(())
            }
            ChartView::NoData => writeln!(w, "{NO_DATA}"),
            ChartView::Loading => writeln!(w, "Loading ..."),
        },
        |v, w| match v {
            ChartView::Ready(render) => {
                pretty_section(w, render.title.as_deref().unwrap_or("Top apps by votes"))?;
                let spec = &render.definition;
                let votes = spec.series.first().map(|s| s.data.as_slice()).unwrap_or_default();
                let max = votes.iter().copied().max().unwrap_or(1).max(1);
                let width = spec.y_axis.data.iter().map(String::len).max().unwrap_or(0);
                for (name, votes) in spec.y_axis.data.iter().zip(votes).rev() {
                    let bar = "#".repeat(bar_len(*votes, max));
                    writeln!(w, "{name:<width$}  {bar:<40} {votes}")?;
                }
                Ok(())
            }
            ChartView::NoData => writeln!(w, "{NO_DATA}"),
            ChartView::Loading => writeln!(w, "Loading ..."),
        },
    )
}

/// Filled cells for `votes` on a bar scaled so `max` spans [`BAR_WIDTH`].
/// Always at least one cell.
fn bar_len(votes: u64, max: u64) -> usize {
    let cells = u128::from(votes) * u128::from(BAR_WIDTH) / u128::from(max.max(1));
    usize::try_from(cells.clamp(1, u128::from(BAR_WIDTH))).unwrap_or(1)
}
