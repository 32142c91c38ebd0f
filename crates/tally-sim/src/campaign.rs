//! Campaign runner: executes many seeds and reports the first failure for
//! replay.

use std::ops::Range;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::FaultConfig;
use crate::{SimulationConfig, SimulationResult, Simulator};

/// Seed range plus the parameters shared by every seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignConfig {
    pub seed_range: Range<u64>,
    pub viewers: usize,
    pub rounds: u64,
    pub click_rate_percent: u8,
    pub background_actors: usize,
    pub fault: FaultConfig,
    pub stale_snapshot_tolerance: u32,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        let sim = SimulationConfig::default();
        Self {
            seed_range: 0..100,
            viewers: sim.viewers,
            rounds: sim.rounds,
            click_rate_percent: sim.click_rate_percent,
            background_actors: sim.background_actors,
            fault: sim.fault,
            stale_snapshot_tolerance: sim.stale_snapshot_tolerance,
        }
    }
}

impl CampaignConfig {
    #[must_use]
    pub fn sim_config_for_seed(&self, seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            viewers: self.viewers,
            rounds: self.rounds,
            click_rate_percent: self.click_rate_percent,
            background_actors: self.background_actors,
            fault: self.fault,
            stale_snapshot_tolerance: self.stale_snapshot_tolerance,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the seed range is empty or a run would have no
    /// viewers or rounds.
    pub fn validate(&self) -> Result<()> {
        if self.seed_range.is_empty() {
            bail!("seed_range must not be empty");
        }
        if self.viewers == 0 {
            bail!("viewers must be > 0");
        }
        if self.rounds == 0 {
            bail!("rounds must be > 0");
        }
        Ok(())
    }
}

/// Failure details for a single seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFailure {
    pub seed: u64,
    pub violations: Vec<String>,
}

/// Aggregate report produced by [`run_campaign`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignReport {
    pub seeds_run: usize,
    pub seeds_passed: usize,
    /// First failing seed, for replay.
    pub first_failure: Option<u64>,
    pub failures: Vec<SeedFailure>,
    /// Seeds that delivered at least one superseded completion.
    pub interesting_states_reached: usize,
    pub clicks: usize,
    pub stale_completions: usize,
    pub rejected: usize,
}

impl CampaignReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run every seed in `config.seed_range`.
///
/// # Errors
///
/// Returns an error if the config is invalid.
pub fn run_campaign(config: &CampaignConfig) -> Result<CampaignReport> {
    config.validate()?;

    let mut report = CampaignReport {
        seeds_run: 0,
        seeds_passed: 0,
        first_failure: None,
        failures: Vec::new(),
        interesting_states_reached: 0,
        clicks: 0,
        stale_completions: 0,
        rejected: 0,
    };

    for seed in config.seed_range.clone() {
        let result = replay_seed(seed, config)?;
        report.seeds_run += 1;
        report.clicks += result.stats.clicks;
        report.stale_completions += result.stats.stale_completions;
        report.rejected += result.stats.rejected;
        if result.interesting_state_reached {
            report.interesting_states_reached += 1;
        }

        if result.passed() {
            report.seeds_passed += 1;
        } else {
            warn!(seed, violations = result.violations.len(), "seed failed");
            report.first_failure.get_or_insert(seed);
            report.failures.push(SeedFailure {
                seed,
                violations: result.violations.iter().map(ToString::to_string).collect(),
            });
        }
    }

    Ok(report)
}

/// Run one seed with full trace details.
///
/// # Errors
///
/// Returns an error if the derived simulation config is invalid.
pub fn replay_seed(seed: u64, config: &CampaignConfig) -> Result<SimulationResult> {
    Simulator::new(config.sim_config_for_seed(seed))?.run()
}
