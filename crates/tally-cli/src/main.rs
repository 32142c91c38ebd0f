#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, coded, render_error};
use std::env;
use tally_core::config::{WidgetConfig, resolve_config};
use tally_core::error::ErrorCode;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "tally: optimistic social action toggles over a multi-writer log",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Action name to count and write (overrides `[widget] action_name`
    /// and `index_key`).
    #[arg(long, global = true)]
    action: Option<String>,

    /// Undo action name (overrides `[widget] action_undo_name`).
    #[arg(long, global = true)]
    undo: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn apply_overrides(&self, widget: &mut WidgetConfig) {
        if let Some(action) = &self.action {
            widget.action_name.clone_from(action);
            widget.index_key = None;
        }
        if let Some(undo) = &self.undo {
            widget.action_undo_name.clone_from(undo);
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Log",
        about = "Reduce an action log snapshot",
        long_about = "Fold a snapshot of index entries into the set of accounts with the action active.",
        after_help = "EXAMPLES:\n    # Count likes in a snapshot\n    tally --action like --undo unlike reduce --snapshot likes.json\n\n    # Report one account's membership\n    tally reduce --snapshot stars.json --actor alice.near\n\n    # Read the snapshot from stdin\n    cat stars.json | tally reduce --snapshot -"
    )]
    Reduce(cmd::reduce::ReduceArgs),

    #[command(
        next_help_heading = "Write",
        about = "Build a toggle write payload",
        long_about = "Build the index, notification, and graph mutations recording one toggle.",
        after_help = "EXAMPLES:\n    # Star a widget\n    tally payload --item '{\"type\":\"social\",\"path\":\"a.near/widget/Foo\"}' --actor me.near\n\n    # Unstar it\n    tally payload --item '{\"type\":\"social\",\"path\":\"a.near/widget/Foo\"}' --actor me.near --deactivate\n\n    # Notify the author\n    tally payload --item '{\"type\":\"social\",\"path\":\"a.near/widget/Foo\"}' --actor me.near --notify a.near"
    )]
    Payload(cmd::payload::PayloadArgs),

    #[command(
        next_help_heading = "Write",
        about = "Replay a toggle session",
        long_about = "Replay clicks, write completions, and snapshot refreshes through one toggle widget\nand print what the viewer sees after each step.",
        after_help = "EXAMPLES:\n    # Click, have the write rejected, click again, succeed, refresh\n    tally session --snapshot stars.json --actor me.near --script click,fail,click,ok,observe\n\n    # Complete the first click's write after the second one\n    tally session --snapshot stars.json --actor me.near --script click,click,ok:2,ok:1,observe"
    )]
    Session(cmd::session::SessionArgs),

    #[command(
        next_help_heading = "Chart",
        about = "Rank apps by votes",
        long_about = "Rank a vote dataset and emit the bar-chart document for the leaderboard.",
        after_help = "EXAMPLES:\n    # Top 10 apps\n    tally chart --apps apps.json\n\n    # Top 5 DeFi apps as JSON\n    tally chart --apps apps.json --category defi --top 5 --json"
    )]
    Chart(cmd::chart::ChartArgs),

    #[command(
        next_help_heading = "Testing",
        about = "Run a deterministic simulation campaign",
        long_about = "Simulate viewers toggling against a store that delays, rejects, and lags,\nchecking the overlay invariants across a range of seeds.",
        after_help = "EXAMPLES:\n    # Run 100 seeds with defaults\n    tally sim\n\n    # Harsher faults\n    tally sim --seeds 0..500 --viewers 5 --reject-rate 40 --max-delay 6\n\n    # Replay one seed with its trace\n    tally sim --replay 42 --json"
    )]
    Sim(cmd::sim::SimArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("TALLY_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "tally=debug,info"
        } else {
            "tally=info,warn"
        })
    });

    let format = env::var("TALLY_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn exit_with(mode: OutputMode, err: &anyhow::Error) -> anyhow::Result<()> {
    render_error(mode, &CliError::from(err))?;
    std::process::exit(1);
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let fallback = if cli.json { OutputMode::Json } else { OutputMode::Text };
    let effective = match resolve_config(&project_root, cli.json) {
        Ok(effective) => effective,
        Err(err) => {
            return exit_with(fallback, &coded(ErrorCode::ConfigParseError, format!("{err:#}")));
        }
    };
    let output = OutputMode::from_resolved(&effective.resolved_output);
    let mut project = effective.project;
    cli.apply_overrides(&mut project.widget);

    let command_result = match &cli.command {
        Commands::Reduce(args) => cmd::reduce::run_reduce(args, &project.widget, output),
        Commands::Payload(args) => cmd::payload::run_payload(args, &project.widget, output),
        Commands::Session(args) => cmd::session::run_session(args, &project, output),
        Commands::Chart(args) => cmd::chart::run_chart(args, &project.chart, output),
        Commands::Sim(args) => cmd::sim::run_sim(args, &project.reconcile, output),
    };

    match command_result {
        Ok(()) => Ok(()),
        Err(err) => exit_with(output, &err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_parses_after_subcommand() {
        let cli = Cli::parse_from(["tally", "reduce", "--snapshot", "s.json", "--json"]);
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Reduce(_)));
    }

    #[test]
    fn action_override_moves_index_slot() {
        let cli = Cli::parse_from(["tally", "--action", "like", "--undo", "unlike", "sim"]);
        let mut widget = WidgetConfig {
            index_key: Some("star".into()),
            ..WidgetConfig::default()
        };
        cli.apply_overrides(&mut widget);
        assert_eq!(widget.action_name, "like");
        assert_eq!(widget.index_slot(), "like");
        assert_eq!(widget.action_undo_name, "unlike");
    }

    #[test]
    fn no_overrides_keep_config() {
        let cli = Cli::parse_from(["tally", "sim"]);
        let mut widget = WidgetConfig::default();
        cli.apply_overrides(&mut widget);
        assert_eq!(widget, WidgetConfig::default());
    }

    #[test]
    fn clap_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
