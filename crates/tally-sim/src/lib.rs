#![forbid(unsafe_code)]
//! tally-sim library.
//!
//! Deterministic simulation of several viewers toggling the same subject
//! against a store that delays, rejects, and lags. Each run is driven by a
//! single seed and checked by the invariants in [`oracle`].
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod campaign;
pub mod oracle;
pub mod rng;
pub mod store;
pub mod viewer;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tally_core::config::{ReconcileConfig, WidgetConfig};
use tally_core::reducer::reduce_entries;
use tally_core::{ClickOutcome, IntentId, Resolution, Subject, WriteOutcome};
use tracing::{debug, info};

use crate::oracle::{CompletionCheck, InvariantViolation};
use crate::rng::SimRng;
use crate::store::{Completion, FaultConfig, SimulatedStore};
use crate::viewer::{SimulatedViewer, ViewerId, ViewerState};

/// Parameters for one simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub seed: u64,
    pub viewers: usize,
    pub rounds: u64,
    /// Percentage chance per round that each viewer clicks.
    pub click_rate_percent: u8,
    /// Number of accounts writing directly to the log.
    pub background_actors: usize,
    pub fault: FaultConfig,
    pub stale_snapshot_tolerance: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            viewers: 3,
            rounds: 32,
            click_rate_percent: 35,
            background_actors: 4,
            fault: FaultConfig::default(),
            stale_snapshot_tolerance: tally_core::config::DEFAULT_STALE_SNAPSHOT_TOLERANCE,
        }
    }
}

/// One step of a simulation trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub round: u64,
    #[serde(flatten)]
    pub kind: TraceEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEventKind {
    Click {
        viewer: ViewerId,
        intent: IntentId,
        desired_active: bool,
        delay: u64,
    },
    ClickIgnored {
        viewer: ViewerId,
    },
    Complete {
        viewer: ViewerId,
        intent: IntentId,
        outcome: WriteOutcome,
        resolution: Resolution,
    },
    Observe {
        viewer: ViewerId,
        lag: u64,
        members: Option<usize>,
    },
    BackgroundWrite {
        actor: String,
        tag: String,
    },
    Quiesce,
}

/// Counters summarizing what a run exercised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationStats {
    pub clicks: usize,
    pub ignored_clicks: usize,
    pub committed: usize,
    pub rejected: usize,
    pub stale_completions: usize,
    pub acknowledged: usize,
    pub lagged_snapshots: usize,
    pub background_writes: usize,
}

/// Output of [`Simulator::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub seed: u64,
    pub trace: Vec<TraceEvent>,
    pub violations: Vec<InvariantViolation>,
    pub final_states: Vec<ViewerState>,
    pub stats: SimulationStats,
    /// True when the run hit a superseded completion, the race the overlay
    /// exists to survive.
    pub interesting_state_reached: bool,
}

impl SimulationResult {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Drives viewers and the store round by round.
#[derive(Debug)]
pub struct Simulator {
    config: SimulationConfig,
    widget: WidgetConfig,
    subject: Subject,
    store: SimulatedStore,
    viewers: Vec<SimulatedViewer>,
    rng: SimRng,
    /// One click stream per viewer, so a viewer's clicks do not shift when
    /// viewers are added.
    click_rngs: Vec<SimRng>,
    round: u64,
    trace: Vec<TraceEvent>,
    violations: Vec<InvariantViolation>,
    stats: SimulationStats,
}

impl Simulator {
    /// Build a simulator for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no viewers or no rounds.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        if config.viewers == 0 {
            bail!("simulation needs at least one viewer");
        }
        if config.rounds == 0 {
            bail!("simulation needs at least one round");
        }

        let widget = WidgetConfig {
            notify_account_id: Some("owner.near".into()),
            ..WidgetConfig::default()
        };
        let reconcile = ReconcileConfig {
            stale_snapshot_tolerance: config.stale_snapshot_tolerance,
        };
        let subject = Subject::social("owner.near/widget/Gallery");
        let viewers = (0..config.viewers)
            .map(|id| SimulatedViewer::new(id, &widget, &reconcile, subject.clone()))
            .collect();

        let rng = SimRng::from_seed(config.seed);
        let click_rngs = (0..config.viewers)
            .map(|id| rng.fork(u64::try_from(id).unwrap_or(u64::MAX)))
            .collect();

        Ok(Self {
            store: SimulatedStore::new(config.fault),
            rng,
            click_rngs,
            config,
            widget,
            subject,
            viewers,
            round: 0,
            trace: Vec::new(),
            violations: Vec::new(),
            stats: SimulationStats::default(),
        })
    }

    /// Run every round, then quiesce and check convergence.
    ///
    /// # Errors
    ///
    /// Does not fail once constructed.
    pub fn run(&mut self) -> Result<SimulationResult> {
        info!(seed = self.config.seed, viewers = self.viewers.len(), "simulation start");
        for id in 0..self.viewers.len() {
            self.observe(id, 0);
        }
        while self.round < self.config.rounds {
            self.step();
            self.round += 1;
        }
        self.quiesce();

        let result = SimulationResult {
            seed: self.config.seed,
            trace: std::mem::take(&mut self.trace),
            violations: std::mem::take(&mut self.violations),
            final_states: self.viewers.iter().map(SimulatedViewer::state).collect(),
            stats: self.stats,
            interesting_state_reached: self.stats.stale_completions > 0,
        };
        info!(
            seed = result.seed,
            violations = result.violations.len(),
            clicks = result.stats.clicks,
            "simulation complete"
        );
        Ok(result)
    }

    fn step(&mut self) {
        if self.rng.chance(self.config.fault.background_write_percent) {
            self.background_write();
        }

        for completion in self.store.complete_due(self.round) {
            self.deliver(completion);
        }

        for id in 0..self.viewers.len() {
            let rate = self.config.click_rate_percent;
            if self.click_rngs.get_mut(id).is_some_and(|rng| rng.chance(rate)) {
                self.click(id);
            }
            let lag = self.store.draw_lag(&mut self.rng);
            self.observe(id, lag);
        }

        self.store.seal_round();
    }

    fn background_write(&mut self) {
        let actors = u64::try_from(self.config.background_actors).unwrap_or(0);
        if actors == 0 {
            return;
        }
        let index = self.rng.below(actors);
        let actor = format!("bg-{index}.near");
        let pair = self.widget.pair();
        let tags = [
            pair.action_name.as_str(),
            pair.action_undo_name.as_str(),
            "repost",
        ];
        let tag = self.rng.pick(&tags).copied().unwrap_or("repost");
        self.store
            .background_write(self.widget.index_slot(), &self.subject, &actor, tag);
        self.stats.background_writes += 1;
        self.trace.push(TraceEvent {
            round: self.round,
            kind: TraceEventKind::BackgroundWrite {
                actor,
                tag: tag.to_string(),
            },
        });
    }

    fn click(&mut self, id: ViewerId) {
        let Some(viewer) = self.viewers.get_mut(id) else {
            return;
        };
        match viewer.click() {
            ClickOutcome::Submitted(command) => {
                let intent = command.intent;
                let desired_active = command.desired_active;
                let delay = self.store.submit(self.round, id, command, &mut self.rng);
                self.stats.clicks += 1;
                self.trace.push(TraceEvent {
                    round: self.round,
                    kind: TraceEventKind::Click {
                        viewer: id,
                        intent,
                        desired_active,
                        delay,
                    },
                });
            }
            ClickOutcome::Ignored(reason) => {
                debug!(viewer = id, ?reason, "click ignored");
                self.stats.ignored_clicks += 1;
                self.trace.push(TraceEvent {
                    round: self.round,
                    kind: TraceEventKind::ClickIgnored { viewer: id },
                });
            }
        }
        self.check_formula(id);
    }

    fn observe(&mut self, id: ViewerId, lag: u64) {
        let snapshot = self
            .store
            .snapshot(self.widget.index_slot(), &self.subject, lag);
        let Some(viewer) = self.viewers.get_mut(id) else {
            return;
        };
        viewer.observe(snapshot);
        if lag > 0 {
            self.stats.lagged_snapshots += 1;
        }
        self.trace.push(TraceEvent {
            round: self.round,
            kind: TraceEventKind::Observe {
                viewer: id,
                lag,
                members: viewer.last_observed().map(|set| set.len()),
            },
        });
        self.check_formula(id);
    }

    fn deliver(&mut self, completion: Completion) {
        let Completion {
            viewer: id,
            command,
            outcome,
        } = completion;
        let Some(viewer) = self.viewers.get_mut(id) else {
            return;
        };
        let before = viewer.state();
        let resolution = viewer.widget_mut().complete(command.intent, outcome);
        let after = viewer.state();

        match (outcome, resolution) {
            (_, Resolution::Stale) => self.stats.stale_completions += 1,
            (WriteOutcome::Committed, Resolution::Acknowledged) => self.stats.acknowledged += 1,
            _ => {}
        }
        match outcome {
            WriteOutcome::Committed => self.stats.committed += 1,
            WriteOutcome::Rejected => self.stats.rejected += 1,
        }

        let violation = oracle::check_completion(&CompletionCheck {
            round: self.round,
            completed: command.intent,
            outcome,
            resolution,
            before: &before,
            after: &after,
            observed: viewer.last_observed(),
        });
        self.violations.extend(violation);
        self.trace.push(TraceEvent {
            round: self.round,
            kind: TraceEventKind::Complete {
                viewer: id,
                intent: command.intent,
                outcome,
                resolution,
            },
        });
        self.check_formula(id);
    }

    /// Deliver every outstanding write, then feed each viewer enough fresh
    /// snapshots to exhaust the stale tolerance.
    fn quiesce(&mut self) {
        self.trace.push(TraceEvent {
            round: self.round,
            kind: TraceEventKind::Quiesce,
        });
        for completion in self.store.drain() {
            self.deliver(completion);
        }
        for _ in 0..=self.config.stale_snapshot_tolerance {
            for id in 0..self.viewers.len() {
                self.observe(id, 0);
            }
        }

        let log = self
            .store
            .log()
            .index_at(self.widget.index_slot(), &self.subject, u64::MAX);
        let reduced = reduce_entries(&log, &self.widget.pair());
        let divergent: Vec<_> = self
            .viewers
            .iter()
            .filter_map(|viewer| oracle::check_convergence(&viewer.state(), &reduced))
            .collect();
        self.violations.extend(divergent);
    }

    fn check_formula(&mut self, id: ViewerId) {
        let Some(viewer) = self.viewers.get(id) else {
            return;
        };
        let violation =
            oracle::check_count_formula(self.round, &viewer.state(), viewer.last_observed());
        self.violations.extend(violation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_config() {
        assert!(
            Simulator::new(SimulationConfig {
                viewers: 0,
                ..SimulationConfig::default()
            })
            .is_err()
        );
        assert!(
            Simulator::new(SimulationConfig {
                rounds: 0,
                ..SimulationConfig::default()
            })
            .is_err()
        );
    }

    #[test]
    fn default_run_passes() {
        let result = Simulator::new(SimulationConfig::default())
            .expect("valid config")
            .run()
            .expect("run");
        assert!(result.passed(), "violations: {:?}", result.violations);
        assert!(result.stats.clicks > 0);
    }

    #[test]
    fn same_seed_same_trace() {
        let config = SimulationConfig {
            seed: 11,
            ..SimulationConfig::default()
        };
        let a = Simulator::new(config.clone()).expect("config").run().expect("run");
        let b = Simulator::new(config).expect("config").run().expect("run");
        assert_eq!(a, b);
    }

    fn click_rounds(result: &SimulationResult, viewer: ViewerId) -> Vec<u64> {
        result
            .trace
            .iter()
            .filter(|event| match event.kind {
                TraceEventKind::Click { viewer: v, .. } | TraceEventKind::ClickIgnored { viewer: v } => {
                    v == viewer
                }
                _ => false,
            })
            .map(|event| event.round)
            .collect()
    }

    #[test]
    fn viewer_clicks_do_not_depend_on_viewer_count() {
        let run = |viewers| {
            Simulator::new(SimulationConfig {
                seed: 5,
                viewers,
                ..SimulationConfig::default()
            })
            .expect("config")
            .run()
            .expect("run")
        };
        let alone = run(1);
        let crowded = run(4);
        assert!(!click_rounds(&alone, 0).is_empty());
        assert_eq!(click_rounds(&alone, 0), click_rounds(&crowded, 0));
        assert_ne!(click_rounds(&crowded, 0), click_rounds(&crowded, 1));
    }

    #[test]
    fn without_faults_every_write_commits() {
        let config = SimulationConfig {
            seed: 5,
            fault: FaultConfig {
                max_completion_delay_rounds: 0,
                reject_rate_percent: 0,
                max_snapshot_lag_rounds: 0,
                background_write_percent: 0,
            },
            ..SimulationConfig::default()
        };
        let result = Simulator::new(config).expect("config").run().expect("run");
        assert!(result.passed(), "violations: {:?}", result.violations);
        assert_eq!(result.stats.rejected, 0);
        assert_eq!(result.stats.lagged_snapshots, 0);
        assert_eq!(result.stats.committed, result.stats.clicks);
    }
}
