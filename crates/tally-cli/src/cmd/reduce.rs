//! `tally reduce`: fold a snapshot into the active set.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tally_core::config::WidgetConfig;
use tally_core::overlay::Overlay;
use tally_core::reduce;

use crate::output::{OutputMode, active_label, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ReduceArgs {
    /// Snapshot file: `null` or a JSON array of index entries (`-` for stdin).
    #[arg(long)]
    pub snapshot: PathBuf,

    /// Account whose membership to report.
    #[arg(long)]
    pub actor: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReduceOutput {
    action: String,
    loaded: bool,
    count: usize,
    is_active: Option<bool>,
    members: Vec<String>,
}

pub fn run_reduce(args: &ReduceArgs, widget: &WidgetConfig, output: OutputMode) -> Result<()> {
    let snapshot = super::load_snapshot(&args.snapshot)?;
    let observation = reduce(snapshot.as_deref(), &widget.pair());
    // The view with no click in flight.
    let view = Overlay::default().view(&observation, args.actor.as_deref());

    let report = ReduceOutput {
        action: widget.action_name.clone(),
        loaded: !observation.is_loading(),
        count: view.count,
        is_active: view.is_active,
        members: observation
            .active_set()
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default(),
    };

    render_mode(
        output,
        &report,
        |r, w| {
            if !r.loaded {
                return writeln!(w, "state=loading");
            }
            writeln!(
                w,
                "state=loaded count={} active={}",
                r.count,
                active_label(r.is_active)
            )?;
            writeln!(w, "members={}", r.members.join(","))
        },
        |r, w| {
            pretty_section(w, &format!("Action log: {}", r.action))?;
            if !r.loaded {
                return pretty_kv(w, "State", "loading");
            }
            pretty_kv(w, "Count", r.count.to_string())?;
            pretty_kv(w, "Active", active_label(r.is_active))?;
            for member in &r.members {
                writeln!(w, "  - {member}")?;
            }
            Ok(())
        },
    )
}
