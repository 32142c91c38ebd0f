//! Action log reducer.
//!
//! Folds a snapshot of [`ActionEntry`] values for one subject into the set of
//! actors whose action is currently active. Each actor is tracked by a
//! last-writer-wins register holding the kind of their decisive entry; the
//! actor is a member iff that kind is [`ActionKind::Do`].
//!
//! # Decisive-entry ordering
//!
//! Given two recognised entries for the same actor, the later one wins:
//!
//! 1. **Block height**: higher `blockHeight` wins. Entries without a height
//!    sort as height 0.
//! 2. **Snapshot position**: if heights are equal, the entry that appears
//!    later in the snapshot wins. Positions are unique, so there are no ties.
//!
//! Without heights this is exactly a left-to-right fold in snapshot order.
//! With heights the result does not depend on the order the store returned
//! the entries in. Entries whose tag is neither the "do" nor the "undo" tag
//! never become decisive.
//!
//! Membership is presence-based: repeating the "do" tag for an actor who is
//! already active changes nothing, so replaying a snapshot is idempotent.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument, trace};

use crate::action::{AccountId, ActionEntry, ActionKind, ActionPair};

// ---------------------------------------------------------------------------
// ActiveSet
// ---------------------------------------------------------------------------

/// Actors whose action is active. Presence means active.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ActiveSet {
    members: BTreeSet<AccountId>,
}

impl ActiveSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, actor: &str) -> bool {
        self.members.contains(actor)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of members other than `actor`.
    #[must_use]
    pub fn len_without(&self, actor: &str) -> usize {
        self.len() - usize::from(self.contains(actor))
    }

    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = &AccountId> {
        self.members.iter()
    }

    /// Mark `actor` active. Returns `false` if they already were.
    pub fn insert(&mut self, actor: impl Into<AccountId>) -> bool {
        self.members.insert(actor.into())
    }

    /// Mark `actor` inactive. Returns `false` if they already were.
    pub fn remove(&mut self, actor: &str) -> bool {
        self.members.remove(actor)
    }
}

impl FromIterator<AccountId> for ActiveSet {
    fn from_iter<I: IntoIterator<Item = AccountId>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// Result of reducing a snapshot.
///
/// `Loading` is distinct from an empty [`ActiveSet`]: a log that has not
/// loaded yet says nothing about how many actors are active.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Observation {
    #[default]
    Loading,
    Loaded(ActiveSet),
}

impl Observation {
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    #[must_use]
    pub const fn active_set(&self) -> Option<&ActiveSet> {
        match self {
            Self::Loading => None,
            Self::Loaded(set) => Some(set),
        }
    }

    /// Whether `actor` is active, or `None` while loading.
    #[must_use]
    pub fn membership(&self, actor: &str) -> Option<bool> {
        self.active_set().map(|set| set.contains(actor))
    }

    /// Number of active actors, or `None` while loading.
    #[must_use]
    pub fn count(&self) -> Option<usize> {
        self.active_set().map(ActiveSet::len)
    }
}

// ---------------------------------------------------------------------------
// Fold
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct FoldKey {
    height: u64,
    position: usize,
}

/// Last-writer-wins register for one actor's decisive entry.
#[derive(Debug, Clone, Copy)]
struct Decisive {
    key: FoldKey,
    kind: ActionKind,
}

impl Decisive {
    fn merge(&mut self, other: Self) {
        if other.key > self.key {
            *self = other;
        }
    }
}

/// Reduce a snapshot, reporting [`Observation::Loading`] when the log has
/// not been loaded.
#[must_use]
#[instrument(skip_all, fields(action = %pair.action_name))]
pub fn reduce(snapshot: Option<&[ActionEntry]>, pair: &ActionPair) -> Observation {
    match snapshot {
        None => {
            debug!("action log not loaded yet");
            Observation::Loading
        }
        Some(entries) => Observation::Loaded(reduce_entries(entries, pair)),
    }
}

/// Reduce a loaded snapshot into its [`ActiveSet`].
#[must_use]
pub fn reduce_entries(entries: &[ActionEntry], pair: &ActionPair) -> ActiveSet {
    let mut registers: BTreeMap<&str, Decisive> = BTreeMap::new();
    let mut ignored = 0_usize;

    for (position, entry) in entries.iter().enumerate() {
        let Some(kind) = pair.classify(entry.tag()) else {
            trace!(actor = %entry.actor, tag = entry.tag(), "ignoring unrecognised tag");
            ignored += 1;
            continue;
        };
        let candidate = Decisive {
            key: FoldKey {
                height: entry.block_height.unwrap_or(0),
                position,
            },
            kind,
        };
        trace!(actor = %entry.actor, %kind, height = candidate.key.height, "fold entry");
        registers
            .entry(entry.actor.as_str())
            .and_modify(|current| current.merge(candidate))
            .or_insert(candidate);
    }

    let set: ActiveSet = registers
        .into_iter()
        .filter(|(_, decisive)| decisive.kind.is_active())
        .map(|(actor, _)| actor.to_string())
        .collect();

    debug!(
        entries = entries.len(),
        ignored,
        active = set.len(),
        "reduced action log"
    );
    set
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
