use serde::{Deserialize, Serialize};
use tally_core::store::{ActionStore, MemoryStore};
use tally_core::{ActionEntry, Snapshot, Subject, ToggleCommand, WriteOutcome};
use tracing::trace;

use crate::rng::SimRng;
use crate::viewer::ViewerId;

/// Fault injection for the simulated store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultConfig {
    /// Maximum rounds between a submit and its completion.
    pub max_completion_delay_rounds: u8,
    /// Percentage of writes the store rejects.
    pub reject_rate_percent: u8,
    /// Maximum rounds a snapshot may lag behind the log.
    pub max_snapshot_lag_rounds: u8,
    /// Percentage chance per round that a background account writes.
    pub background_write_percent: u8,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            max_completion_delay_rounds: 3,
            reject_rate_percent: 10,
            max_snapshot_lag_rounds: 2,
            background_write_percent: 30,
        }
    }
}

/// A write that has been submitted but not yet answered.
#[derive(Debug, Clone, PartialEq)]
struct InFlight {
    complete_at_round: u64,
    viewer: ViewerId,
    command: ToggleCommand,
    reject: bool,
}

/// A store answer ready for delivery to a viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub viewer: ViewerId,
    pub command: ToggleCommand,
    pub outcome: WriteOutcome,
}

/// Action log with delayed write completions and lagging reads.
///
/// Committed writes land in the log at completion time, so a snapshot read
/// between submit and completion does not yet contain them. Rejected writes
/// never reach the log.
#[derive(Debug, Clone)]
pub struct SimulatedStore {
    log: MemoryStore,
    in_flight: Vec<InFlight>,
    /// Log height at the end of each sealed round.
    round_heights: Vec<u64>,
    fault: FaultConfig,
}

impl SimulatedStore {
    #[must_use]
    pub fn new(fault: FaultConfig) -> Self {
        Self {
            log: MemoryStore::new(),
            in_flight: Vec::new(),
            round_heights: Vec::new(),
            fault,
        }
    }

    #[must_use]
    pub const fn fault_config(&self) -> FaultConfig {
        self.fault
    }

    /// The committed log.
    #[must_use]
    pub const fn log(&self) -> &MemoryStore {
        &self.log
    }

    /// Number of writes awaiting completion.
    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Queue `command` for completion. Returns the assigned delay.
    pub fn submit(
        &mut self,
        round: u64,
        viewer: ViewerId,
        command: ToggleCommand,
        rng: &mut SimRng,
    ) -> u64 {
        let delay = rng.below(u64::from(self.fault.max_completion_delay_rounds) + 1);
        let reject = rng.chance(self.fault.reject_rate_percent);
        trace!(viewer, intent = %command.intent, delay, reject, "write queued");
        self.in_flight.push(InFlight {
            complete_at_round: round + delay,
            viewer,
            command,
            reject,
        });
        delay
    }

    /// Resolve every write due at or before `round`, in submission order.
    pub fn complete_due(&mut self, round: u64) -> Vec<Completion> {
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.in_flight)
            .into_iter()
            .partition(|write| write.complete_at_round <= round);
        self.in_flight = pending;
        due.into_iter().map(|write| self.resolve(write)).collect()
    }

    /// Resolve everything still in flight.
    pub fn drain(&mut self) -> Vec<Completion> {
        std::mem::take(&mut self.in_flight)
            .into_iter()
            .map(|write| self.resolve(write))
            .collect()
    }

    fn resolve(&mut self, write: InFlight) -> Completion {
        let outcome = if write.reject {
            WriteOutcome::Rejected
        } else {
            write.command.submit(&mut self.log)
        };
        Completion {
            viewer: write.viewer,
            command: write.command,
            outcome,
        }
    }

    /// Another account writes straight into the log.
    pub fn background_write(&mut self, action: &str, subject: &Subject, actor: &str, tag: &str) {
        self.log.append(action, subject, ActionEntry::new(actor, tag));
    }

    /// Record the log height reached by the end of a round.
    pub fn seal_round(&mut self) {
        self.round_heights.push(self.log.height());
    }

    /// The log as it stood `lag` sealed rounds ago. A lag of 0 is the
    /// current log.
    #[must_use]
    pub fn snapshot(&self, action: &str, subject: &Subject, lag: u64) -> Snapshot {
        if lag == 0 {
            return self.log.index(action, subject);
        }
        let lag = usize::try_from(lag).unwrap_or(usize::MAX);
        let height = self
            .round_heights
            .len()
            .checked_sub(lag)
            .and_then(|i| self.round_heights.get(i))
            .copied()
            .unwrap_or(0);
        Some(self.log.index_at(action, subject, height))
    }

    /// Pick a lag for the next read.
    pub fn draw_lag(&self, rng: &mut SimRng) -> u64 {
        rng.below(u64::from(self.fault.max_snapshot_lag_rounds) + 1)
    }
}
