//! `tally sim`: deterministic simulation campaigns.
//!
//! Runs a range of seeds and reports the first failing one, or replays a
//! single seed with its full trace.

use std::io::Write;
use std::ops::Range;
use std::process;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tally_core::config::ReconcileConfig;
use tally_sim::campaign::{CampaignConfig, SeedFailure, replay_seed, run_campaign};
use tally_sim::store::FaultConfig;

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct SimArgs {
    /// Seed range `A..B` (end exclusive).
    #[arg(long, default_value = "0..100", value_parser = parse_seed_range)]
    pub seeds: Range<u64>,

    /// Viewers toggling the same subject.
    #[arg(long, default_value = "3")]
    pub viewers: usize,

    /// Rounds per seed.
    #[arg(long, default_value = "32")]
    pub rounds: u64,

    /// Percentage of writes the store rejects.
    #[arg(long, default_value = "10")]
    pub reject_rate: u8,

    /// Maximum rounds before a write completes.
    #[arg(long, default_value = "3")]
    pub max_delay: u8,

    /// Maximum rounds a snapshot may lag.
    #[arg(long, default_value = "2")]
    pub max_lag: u8,

    /// Replay this seed and print its trace instead of running a campaign.
    #[arg(long)]
    pub replay: Option<u64>,
}

fn parse_seed_range(raw: &str) -> Result<Range<u64>, String> {
    let (start, end) = raw
        .split_once("..")
        .ok_or_else(|| format!("expected A..B, got `{raw}`"))?;
    let start: u64 = start.trim().parse().map_err(|e| format!("bad range start: {e}"))?;
    let end: u64 = end.trim().parse().map_err(|e| format!("bad range end: {e}"))?;
    if start >= end {
        return Err(format!("range `{raw}` is empty"));
    }
    Ok(start..end)
}

#[derive(Debug, Serialize)]
struct RunOutput {
    seeds_run: usize,
    seeds_passed: usize,
    seeds_failed: usize,
    first_failure: Option<u64>,
    interesting_states_reached: usize,
    clicks: usize,
    stale_completions: usize,
    rejected: usize,
    all_passed: bool,
    failures: Vec<SeedFailure>,
}

fn campaign_config(args: &SimArgs, reconcile: &ReconcileConfig) -> CampaignConfig {
    CampaignConfig {
        seed_range: args.seeds.clone(),
        viewers: args.viewers,
        rounds: args.rounds,
        fault: FaultConfig {
            max_completion_delay_rounds: args.max_delay,
            reject_rate_percent: args.reject_rate.min(100),
            max_snapshot_lag_rounds: args.max_lag,
            ..FaultConfig::default()
        },
        stale_snapshot_tolerance: reconcile.stale_snapshot_tolerance,
        ..CampaignConfig::default()
    }
}

pub fn run_sim(args: &SimArgs, reconcile: &ReconcileConfig, output: OutputMode) -> Result<()> {
    let config = campaign_config(args, reconcile);
    if let Some(seed) = args.replay {
        return run_replay(seed, &config, output);
    }

    let report = run_campaign(&config)?;
    let out = RunOutput {
        seeds_run: report.seeds_run,
        seeds_passed: report.seeds_passed,
        seeds_failed: report.failures.len(),
        first_failure: report.first_failure,
        interesting_states_reached: report.interesting_states_reached,
        clicks: report.clicks,
        stale_completions: report.stale_completions,
        rejected: report.rejected,
        all_passed: report.all_passed(),
        failures: report.failures,
    };

    render_mode(
        output,
        &out,
        |o, w| {
            writeln!(
                w,
                "campaign seeds_run={} viewers={} rounds={}",
                o.seeds_run, args.viewers, args.rounds
            )?;
            writeln!(
                w,
                "results passed={} failed={} interesting_states={} all_passed={}",
                o.seeds_passed, o.seeds_failed, o.interesting_states_reached, o.all_passed
            )?;
            for failure in o.failures.iter().take(5) {
                writeln!(w, "failure seed={} violations={}", failure.seed, failure.violations.len())?;
            }
            if let Some(seed) = o.first_failure {
                writeln!(w, "hint replay_seed={seed}")?;
            }
            Ok(())
        },
        |o, w| {
            pretty_section(w, "Simulation Campaign")?;
            pretty_kv(w, "Seeds", o.seeds_run.to_string())?;
            pretty_kv(w, "Viewers", args.viewers.to_string())?;
            pretty_kv(w, "Rounds", args.rounds.to_string())?;
            pretty_kv(
                w,
                "Results",
                format!(
                    "{} passed / {} failed ({} interesting states)",
                    o.seeds_passed, o.seeds_failed, o.interesting_states_reached
                ),
            )?;
            pretty_kv(
                w,
                "Writes",
                format!(
                    "{} clicks, {} rejected, {} superseded completions",
                    o.clicks, o.rejected, o.stale_completions
                ),
            )?;
            match o.first_failure {
                None => pretty_kv(w, "Status", "all seeds passed")?,
                Some(seed) => {
                    pretty_kv(w, "Status", format!("first failure at seed {seed}"))?;
                    for failure in o.failures.iter().take(5) {
                        writeln!(w, "seed {:<8}", failure.seed)?;
                        for violation in &failure.violations {
                            writeln!(w, "  - {violation}")?;
                        }
                    }
                    pretty_kv(w, "Replay", format!("tally sim --replay {seed}"))?;
                }
            }
            Ok(())
        },
    )?;

    // Exit code 1 on any failure for CI integration
    if !out.all_passed {
        process::exit(1);
    }
    Ok(())
}

fn run_replay(seed: u64, config: &CampaignConfig, output: OutputMode) -> Result<()> {
    let result = replay_seed(seed, config)?;
    let passed = result.passed();

    render_mode(
        output,
        &result,
        |r, w| {
            writeln!(
                w,
                "replay seed={} events={} violations={} interesting={}",
                r.seed,
                r.trace.len(),
                r.violations.len(),
                r.interesting_state_reached
            )?;
            for violation in &r.violations {
                writeln!(w, "violation {violation}")?;
            }
            Ok(())
        },
        |r, w| {
            pretty_section(w, &format!("Replay seed {}", r.seed))?;
            for event in &r.trace {
                writeln!(w, "{:>4}  {}", event.round, serde_json::to_string(&event.kind)?)?;
            }
            pretty_kv(w, "Violations", r.violations.len().to_string())?;
            for violation in &r.violations {
                writeln!(w, "  - {violation}")?;
            }
            Ok(())
        },
    )?;

    if !passed {
        process::exit(1);
    }
    Ok(())
}
