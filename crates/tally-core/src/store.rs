//! Action log store boundary.
//!
//! The real store (a remote social index) is an external collaborator. The
//! [`ActionStore`] trait is the seam; [`MemoryStore`] is an in-process log
//! used by the CLI session replayer, the simulator, and tests.

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, trace};

use crate::action::{AccountId, ActionEntry, Snapshot};
use crate::command::{Notification, WritePayload};
use crate::subject::Subject;

/// Why the store refused a write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("write rejected by store: {0}")]
    Rejected(String),
    #[error("write cancelled")]
    Cancelled,
}

/// Read and write access to the action log.
pub trait ActionStore {
    /// Entries recorded under `action` for `subject`, or `None` while the
    /// log has not loaded.
    fn index(&self, action: &str, subject: &Subject) -> Snapshot;

    /// Submit a toggle payload written by `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store rejects or cancels the write.
    fn set(&mut self, actor: &str, payload: &WritePayload) -> Result<(), StoreError>;
}

/// In-memory action log.
///
/// Index writes are appended under `(slot, subject)` with a monotonically
/// increasing block height. Graph mutations are merged into a single tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    logs: BTreeMap<(String, String), Vec<ActionEntry>>,
    notifications: Vec<(AccountId, Notification)>,
    graph: Value,
    height: u64,
    unloaded: bool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every read report "not loaded" until [`Self::set_loaded`] is called.
    #[must_use]
    pub const fn unloaded(mut self) -> Self {
        self.unloaded = true;
        self
    }

    pub const fn set_loaded(&mut self, loaded: bool) {
        self.unloaded = !loaded;
    }

    /// Append an entry directly, as another writer would. A missing block
    /// height is assigned from the store's clock; an explicit one advances
    /// the clock so later writes still sort after it.
    pub fn append(&mut self, action: &str, subject: &Subject, mut entry: ActionEntry) {
        match entry.block_height {
            Some(height) => self.height = self.height.max(height),
            None => {
                self.height += 1;
                entry.block_height = Some(self.height);
            }
        }
        trace!(action, actor = %entry.actor, tag = entry.tag(), "append entry");
        self.logs
            .entry((action.to_string(), subject.canonical_key()))
            .or_default()
            .push(entry);
    }

    /// Seed a log with a snapshot's entries, preserving their order.
    pub fn extend(
        &mut self,
        action: &str,
        subject: &Subject,
        entries: impl IntoIterator<Item = ActionEntry>,
    ) {
        for entry in entries {
            self.append(action, subject, entry);
        }
    }

    /// Current block height.
    #[must_use]
    pub const fn height(&self) -> u64 {
        self.height
    }

    /// Notifications delivered so far, with the account that triggered each.
    #[must_use]
    pub fn notifications(&self) -> &[(AccountId, Notification)] {
        &self.notifications
    }

    /// The merged social graph.
    #[must_use]
    pub const fn graph(&self) -> &Value {
        &self.graph
    }

    /// Entries under `action` for `subject` accepted at or below `height`.
    #[must_use]
    pub fn index_at(&self, action: &str, subject: &Subject, height: u64) -> Vec<ActionEntry> {
        self.logs
            .get(&(action.to_string(), subject.canonical_key()))
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.block_height.unwrap_or(0) <= height)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl ActionStore for MemoryStore {
    fn index(&self, action: &str, subject: &Subject) -> Snapshot {
        if self.unloaded {
            return None;
        }
        Some(
            self.logs
                .get(&(action.to_string(), subject.canonical_key()))
                .cloned()
                .unwrap_or_default(),
        )
    }

    fn set(&mut self, actor: &str, payload: &WritePayload) -> Result<(), StoreError> {
        let entry = ActionEntry::new(actor, payload.tag());
        self.append(&payload.index.slot, payload.subject(), entry);
        if let Some(notify) = &payload.index.notify {
            self.notifications.push((actor.to_string(), notify.clone()));
        }
        if let Some(graph) = &payload.graph {
            merge_graph(&mut self.graph, graph);
        }
        debug!(actor, tag = payload.tag(), height = self.height, "payload stored");
        Ok(())
    }
}

/// Deep-merge `patch` into `target`. Non-object values replace.
pub fn merge_graph(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                merge_graph(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}
