//! `tally payload`: build the write for one toggle.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use tally_core::Subject;
use tally_core::command::{ToggleRequest, build_payload, graph_mutation};
use tally_core::config::WidgetConfig;
use tally_core::error::ErrorCode;

use crate::output::{OutputMode, coded, render_mode};

#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// Subject key as JSON, e.g. '{"type":"social","path":"a.near/widget/Foo"}'.
    #[arg(long)]
    pub item: String,

    /// Account performing the toggle.
    #[arg(long)]
    pub actor: String,

    /// Build the undo write instead of the do write.
    #[arg(long)]
    pub deactivate: bool,

    /// Account to notify on activation (overrides `[widget] notify_account_id`).
    #[arg(long)]
    pub notify: Option<String>,
}

pub fn run_payload(args: &PayloadArgs, widget: &WidgetConfig, output: OutputMode) -> Result<()> {
    let subject: Subject = args
        .item
        .parse()
        .map_err(|err| coded(ErrorCode::SubjectParseError, err))?;
    let pair = widget.pair();
    let desired_active = !args.deactivate;

    let payload = build_payload(&ToggleRequest {
        subject: &subject,
        pair: &pair,
        index_slot: widget.index_slot(),
        desired_active,
        actor: &args.actor,
        notify_account_id: args.notify.as_deref().or(widget.notify_account_id.as_deref()),
    });

    let skipped = graph_mutation(&subject, &pair.action_name, desired_active).err();
    if let Some(skip) = skipped.filter(|_| !output.is_json()) {
        eprintln!("note[{}]: {skip}; graph mutation omitted", ErrorCode::MalformedSubjectPath);
    }

    render_mode(
        output,
        &payload,
        |p, w| writeln!(w, "{}", serde_json::to_string(p)?),
        |p, w| writeln!(w, "{}", serde_json::to_string_pretty(p)?),
    )
}
