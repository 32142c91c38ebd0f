//! `tally session`: replay a scripted toggle session.
//!
//! The script is a comma-separated list of steps run against one
//! [`ToggleWidget`] backed by an in-memory log seeded from the snapshot:
//!
//! | Step | Effect |
//! |---|---|
//! | `click` | click the toggle; the write is held until completed |
//! | `ok`, `ok:N` | commit the oldest held write, or that of the `N`th submitted click |
//! | `fail`, `fail:N` | reject the oldest held write, or that of the `N`th submitted click |
//! | `observe` | refresh from the log |
//! | `load` | mark a `null` snapshot as loaded (empty log) |

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use clap::Args;
use serde::Serialize;
use tally_core::config::ProjectConfig;
use tally_core::error::ErrorCode;
use tally_core::store::MemoryStore;
use tally_core::widget::IgnoreReason;
use tally_core::{
    ClickOutcome, IntentId, RenderState, Resolution, Subject, ToggleCommand, ToggleWidget,
    WriteOutcome,
};
use tracing::debug;

use crate::output::{OutputMode, active_label, coded, pretty_kv, pretty_section, render_mode};

const DEFAULT_ITEM: &str = r#"{"type":"social","path":"demo.near/widget/Demo"}"#;

#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Snapshot seeding the log: `null` or a JSON array of index entries (`-` for stdin).
    #[arg(long)]
    pub snapshot: PathBuf,

    /// Viewing account. Without it every click is ignored.
    #[arg(long)]
    pub actor: Option<String>,

    /// Steps to replay, e.g. `click,fail,click,ok,observe`.
    #[arg(long, value_parser = parse_script)]
    pub script: Script,

    /// Subject key as JSON.
    #[arg(long, default_value = DEFAULT_ITEM)]
    pub item: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Click,
    Complete {
        outcome: WriteOutcome,
        click: Option<usize>,
    },
    Observe,
    Load,
}

impl FromStr for Step {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (name, click) = match raw.split_once(':') {
            Some((name, n)) => {
                let n = n
                    .parse::<usize>()
                    .map_err(|_| format!("step `{raw}`: `{n}` is not a click number"))?;
                (name, Some(n))
            }
            None => (raw, None),
        };
        match (name, click) {
            ("click", None) => Ok(Self::Click),
            ("observe", None) => Ok(Self::Observe),
            ("load", None) => Ok(Self::Load),
            ("ok", click) => Ok(Self::Complete {
                outcome: WriteOutcome::Committed,
                click,
            }),
            ("fail", click) => Ok(Self::Complete {
                outcome: WriteOutcome::Rejected,
                click,
            }),
            _ => Err(format!(
                "unknown step `{raw}` (expected click, ok[:N], fail[:N], observe, load)"
            )),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Click => write!(f, "click"),
            Self::Observe => write!(f, "observe"),
            Self::Load => write!(f, "load"),
            Self::Complete { outcome, click } => {
                let name = match outcome {
                    WriteOutcome::Committed => "ok",
                    WriteOutcome::Rejected => "fail",
                };
                match click {
                    Some(n) => write!(f, "{name}:{n}"),
                    None => write!(f, "{name}"),
                }
            }
        }
    }
}

/// Parsed `--script`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script(pub Vec<Step>);

fn parse_script(raw: &str) -> Result<Script, String> {
    let steps = raw
        .split(',')
        .map(str::trim)
        .filter(|step| !step.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<Step>, _>>()?;
    if steps.is_empty() {
        return Err("script has no steps".to_string());
    }
    Ok(Script(steps))
}

#[derive(Debug, Serialize)]
struct StepRecord {
    step: String,
    count: usize,
    is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    intent: Option<IntentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolution: Option<Resolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ignored: Option<IgnoreReason>,
}

impl StepRecord {
    fn new(step: impl Into<String>, render: RenderState) -> Self {
        Self {
            step: step.into(),
            count: render.count,
            is_active: render.is_active,
            intent: None,
            resolution: None,
            ignored: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct SessionOutput {
    action: String,
    actor: Option<String>,
    steps: Vec<StepRecord>,
    /// Writes still held when the script ended.
    unresolved_writes: usize,
    log_entries: usize,
    notifications: usize,
}

pub fn run_session(args: &SessionArgs, config: &ProjectConfig, output: OutputMode) -> Result<()> {
    let snapshot = super::load_snapshot(&args.snapshot)?;
    let subject: Subject = args
        .item
        .parse()
        .map_err(|err| coded(ErrorCode::SubjectParseError, err))?;
    let slot = config.widget.index_slot();

    let mut store = MemoryStore::new();
    match snapshot {
        Some(entries) => store.extend(slot, &subject, entries),
        None => store = store.unloaded(),
    }

    let mut widget = ToggleWidget::new(
        &config.widget,
        &config.reconcile,
        subject.clone(),
        args.actor.clone(),
    );
    widget.refresh(&store);

    let mut held: Vec<(usize, ToggleCommand)> = Vec::new();
    let mut clicks = 0_usize;
    let mut steps = vec![StepRecord::new("init", widget.render())];

    for step in &args.script.0 {
        let mut record = StepRecord::new(step.to_string(), widget.render());
        match *step {
            Step::Observe => widget.refresh(&store),
            Step::Load => store.set_loaded(true),
            Step::Click => match widget.click() {
                ClickOutcome::Submitted(command) => {
                    clicks += 1;
                    record.intent = Some(command.intent);
                    held.push((clicks, command));
                }
                ClickOutcome::Ignored(reason) => record.ignored = Some(reason),
            },
            Step::Complete { outcome, click } => {
                let index = match click {
                    Some(n) => held.iter().position(|(c, _)| *c == n),
                    None => (!held.is_empty()).then_some(0),
                }
                .ok_or_else(|| anyhow!("step `{step}` has no held write to complete"))?;
                let (_, command) = held.remove(index);
                let outcome = match outcome {
                    WriteOutcome::Committed => command.submit(&mut store),
                    WriteOutcome::Rejected => WriteOutcome::Rejected,
                };
                record.intent = Some(command.intent);
                record.resolution = Some(widget.complete(command.intent, outcome));
            }
        }
        let render = widget.render();
        record.count = render.count;
        record.is_active = render.is_active;
        debug!(step = %step, count = render.count, "session step");
        steps.push(record);
    }

    let report = SessionOutput {
        action: config.widget.action_name.clone(),
        actor: args.actor.clone(),
        steps,
        unresolved_writes: held.len(),
        log_entries: store.index_at(slot, &subject, u64::MAX).len(),
        notifications: store.notifications().len(),
    };

    render_mode(
        output,
        &report,
        |r, w| {
            for s in &r.steps {
                write!(w, "{} count={} active={}", s.step, s.count, active_label(s.is_active))?;
                if let Some(intent) = s.intent {
                    write!(w, " intent={intent}")?;
                }
                if let Some(resolution) = s.resolution {
                    write!(w, " resolution={}", resolution_label(resolution))?;
                }
                if let Some(reason) = s.ignored {
                    write!(w, " ignored={}", ignore_label(reason))?;
                }
                writeln!(w)?;
            }
            Ok(())
        },
        |r, w| {
            pretty_section(w, &format!("Session: {}", r.action))?;
            pretty_kv(w, "Actor", r.actor.as_deref().unwrap_or("(signed out)"))?;
            for s in &r.steps {
                let mut note = String::new();
                if let Some(resolution) = s.resolution {
                    note = format!("  [{}]", resolution_label(resolution));
                }
                if let Some(reason) = s.ignored {
                    note = format!("  [ignored: {}]", ignore_label(reason));
                }
                writeln!(
                    w,
                    "{:<10} {:>5}  {:<8}{note}",
                    s.step,
                    s.count,
                    active_label(s.is_active)
                )?;
            }
            pretty_kv(w, "Log entries", r.log_entries.to_string())?;
            pretty_kv(w, "Unresolved", r.unresolved_writes.to_string())
        },
    )
}

const fn resolution_label(resolution: Resolution) -> &'static str {
    match resolution {
        Resolution::Cleared => "cleared",
        Resolution::Acknowledged => "acknowledged",
        Resolution::Reverted => "reverted",
        Resolution::Stale => "stale",
    }
}

const fn ignore_label(reason: IgnoreReason) -> &'static str {
    match reason {
        IgnoreReason::Unauthenticated => "unauthenticated",
        IgnoreReason::Loading => "loading",
    }
}
