//! Optimistic overlay for the viewer's own toggle.
//!
//! The reduced [`Observation`] is never mutated by a click. Instead the
//! overlay holds at most one [`PendingIntent`] and the effective view is
//! computed by overriding only the viewer's own membership:
//!
//! ```text
//! count = |ActiveSet \ {viewer}| + (1 if desired_active else 0)
//! ```
//!
//! Reverting is therefore just dropping the intent: the next render falls
//! back to the untouched observation.
//!
//! # Lifecycle
//!
//! | From | Event | To |
//! |---|---|---|
//! | none | click | `Pending` |
//! | any | click | `Pending` (new id, supersedes) |
//! | `Pending` | write rejected | none (revert) |
//! | `Pending` | write committed, snapshot already agrees | none |
//! | `Pending` | write committed, snapshot disagrees | `Acknowledged` |
//! | `Acknowledged` | snapshot agrees | none |
//! | `Acknowledged` | `stale_snapshot_tolerance` disagreeing snapshots | none |
//!
//! Completions carry the [`IntentId`] they were issued for. A completion for
//! a superseded intent is a no-op, so a slow write can never erase a newer
//! optimistic state. There is no timer: an intent whose write never resolves
//! stays pending.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::reducer::Observation;

/// Identity of one click. Monotonic per overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentId(u64);

impl IntentId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "intent-{}", self.0)
    }
}

/// Where an intent is in its confirmation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum IntentPhase {
    /// Write submitted, outcome unknown.
    Pending,
    /// Write committed; waiting for a snapshot that reflects it.
    Acknowledged { stale_snapshots: u32 },
}

/// The viewer's in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingIntent {
    pub id: IntentId,
    pub desired_active: bool,
    pub phase: IntentPhase,
}

/// How the store answered a submitted write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    Committed,
    /// Rejected or cancelled by the store.
    Rejected,
}

/// Effect of delivering a completion to the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Committed and the current snapshot already agrees; override dropped.
    Cleared,
    /// Committed; override held until a snapshot agrees.
    Acknowledged,
    /// Rejected; override dropped and the view reverts.
    Reverted,
    /// The intent was superseded or already resolved; nothing changed.
    Stale,
}

/// Membership and count as shown to the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveView {
    pub count: usize,
    /// `None` while the log is loading and no intent overrides it.
    pub is_active: Option<bool>,
}

/// Holds at most one [`PendingIntent`] for one viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlay {
    intent: Option<PendingIntent>,
    next_id: u64,
    stale_snapshot_tolerance: u32,
}

impl Default for Overlay {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_STALE_SNAPSHOT_TOLERANCE)
    }
}

impl Overlay {
    #[must_use]
    pub const fn new(stale_snapshot_tolerance: u32) -> Self {
        Self {
            intent: None,
            next_id: 0,
            stale_snapshot_tolerance,
        }
    }

    #[must_use]
    pub const fn intent(&self) -> Option<&PendingIntent> {
        self.intent.as_ref()
    }

    /// Record a new click, replacing any existing intent.
    pub fn begin(&mut self, desired_active: bool) -> IntentId {
        let id = IntentId(self.next_id);
        self.next_id += 1;
        if let Some(prior) = self.intent.replace(PendingIntent {
            id,
            desired_active,
            phase: IntentPhase::Pending,
        }) {
            debug!(superseded = %prior.id, %id, "new click supersedes in-flight intent");
        }
        id
    }

    /// Drop any intent without resolving it.
    pub fn clear(&mut self) {
        self.intent = None;
    }

    /// Deliver the outcome of the write issued for `id`.
    ///
    /// `base` is the latest observation and `actor` the viewer; together
    /// they decide whether a committed write can be cleared immediately.
    pub fn resolve(
        &mut self,
        id: IntentId,
        outcome: WriteOutcome,
        base: &Observation,
        actor: Option<&str>,
    ) -> Resolution {
        let Some(intent) = self.intent.as_mut().filter(|intent| intent.id == id) else {
            debug!(%id, ?outcome, "completion for superseded intent ignored");
            return Resolution::Stale;
        };
        if intent.phase != IntentPhase::Pending {
            return Resolution::Stale;
        }

        match outcome {
            WriteOutcome::Rejected => {
                warn!(%id, "write rejected; reverting optimistic toggle");
                self.intent = None;
                Resolution::Reverted
            }
            WriteOutcome::Committed => {
                let agrees = actor.and_then(|a| base.membership(a)) == Some(intent.desired_active);
                if agrees {
                    info!(%id, "write committed and already observed");
                    self.intent = None;
                    Resolution::Cleared
                } else {
                    info!(%id, "write committed; awaiting snapshot");
                    intent.phase = IntentPhase::Acknowledged { stale_snapshots: 0 };
                    Resolution::Acknowledged
                }
            }
        }
    }

    /// Reconcile against a freshly reduced observation.
    ///
    /// Pending intents are untouched. An acknowledged intent is dropped once
    /// the observation agrees with it, or once it has disagreed more than
    /// `stale_snapshot_tolerance` times. Returns `true` if the intent was
    /// dropped.
    pub fn reconcile(&mut self, base: &Observation, actor: Option<&str>) -> bool {
        let Some(intent) = self.intent.as_mut() else {
            return false;
        };
        let IntentPhase::Acknowledged { stale_snapshots } = &mut intent.phase else {
            return false;
        };
        let Some(observed) = actor.and_then(|a| base.membership(a)) else {
            return false;
        };

        if observed == intent.desired_active {
            debug!(id = %intent.id, "snapshot confirms acknowledged intent");
            self.intent = None;
            return true;
        }

        *stale_snapshots += 1;
        if *stale_snapshots > self.stale_snapshot_tolerance {
            warn!(
                id = %intent.id,
                stale = *stale_snapshots,
                "snapshot still disagrees with committed intent; trusting snapshot"
            );
            self.intent = None;
            return true;
        }
        false
    }

    /// The effective view for `actor` over `base`.
    #[must_use]
    pub fn view(&self, base: &Observation, actor: Option<&str>) -> EffectiveView {
        let set = base.active_set();
        match (self.intent, actor) {
            (Some(intent), Some(actor)) => EffectiveView {
                count: set.map_or(0, |s| s.len_without(actor)) + usize::from(intent.desired_active),
                is_active: Some(intent.desired_active),
            },
            _ => EffectiveView {
                count: set.map_or(0, |s| s.len()),
                is_active: set.map(|s| actor.is_some_and(|a| s.contains(a))),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
