//! Toggle write payloads.
//!
//! A toggle is recorded by writing the tag of the action just taken (never
//! the resulting boolean), which is what the reducer folds. The payload has
//! up to three parts, each built by its own function:
//!
//! - **Index mutation** (always): `{key: subject, value: {type: tag}}`,
//!   JSON-encoded under the configured index slot (`star` by default).
//! - **Graph mutation** (path-addressed subjects only): a nested mapping
//!   `{action: {seg1: {seg2: {leaf: ""}}}}` on activation, leaf `null` on
//!   deactivation. A path with fewer than three `/`-separated segments skips
//!   this part; the index mutation still goes out.
//! - **Notification** (activation only, when a notify account is set and it
//!   is not the actor): `{key: notify_account, value: {type: tag, item: subject}}`.

use serde::ser::{Error as _, SerializeMap};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::action::{ActionKind, ActionPair};
use crate::overlay::{IntentId, WriteOutcome};
use crate::store::ActionStore;
use crate::subject::Subject;

/// Minimum number of path segments for a graph mutation.
pub const MIN_GRAPH_PATH_SEGMENTS: usize = 3;

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

/// `value` of the primary index record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagValue {
    #[serde(rename = "type")]
    pub tag: String,
}

/// Primary index record: which action was taken on which subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexRecord {
    pub key: Subject,
    pub value: TagValue,
}

/// `value` of a notification record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotifyValue {
    #[serde(rename = "type")]
    pub tag: String,
    pub item: Subject,
}

/// Secondary index record addressed to the notified account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub key: String,
    pub value: NotifyValue,
}

/// The `index` section of a payload.
///
/// Serializes as `{"<slot>": "<json>", "notify": "<json>"}`: each record is
/// JSON-encoded to a string, as the store expects.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMutation {
    pub slot: String,
    pub record: IndexRecord,
    pub notify: Option<Notification>,
}

impl Serialize for IndexMutation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = 1 + usize::from(self.notify.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        let record = serde_json::to_string(&self.record).map_err(S::Error::custom)?;
        map.serialize_entry(&self.slot, &record)?;
        if let Some(notify) = &self.notify {
            let notify = serde_json::to_string(notify).map_err(S::Error::custom)?;
            map.serialize_entry("notify", &notify)?;
        }
        map.end()
    }
}

/// Everything one toggle writes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WritePayload {
    pub index: IndexMutation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<Value>,
}

impl WritePayload {
    /// The tag recorded by the primary index mutation.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.index.record.value.tag
    }

    #[must_use]
    pub const fn subject(&self) -> &Subject {
        &self.index.record.key
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Inputs for one toggle.
#[derive(Debug, Clone, Copy)]
pub struct ToggleRequest<'a> {
    pub subject: &'a Subject,
    pub pair: &'a ActionPair,
    pub index_slot: &'a str,
    pub desired_active: bool,
    pub actor: &'a str,
    pub notify_account_id: Option<&'a str>,
}

/// A subject path that cannot address a graph location.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "subject path '{path}' has {segments} segments, need at least {min}",
    min = MIN_GRAPH_PATH_SEGMENTS
)]
pub struct MalformedSubjectPath {
    pub path: String,
    pub segments: usize,
}

/// Primary index record for the action just taken.
#[must_use]
pub fn index_record(subject: &Subject, pair: &ActionPair, desired_active: bool) -> IndexRecord {
    IndexRecord {
        key: subject.clone(),
        value: TagValue {
            tag: pair
                .tag_for(ActionKind::for_transition(desired_active))
                .to_string(),
        },
    }
}

/// Graph mutation for path-addressed subjects.
///
/// Returns `Ok(None)` for subjects that are not path-addressed.
///
/// # Errors
///
/// Returns [`MalformedSubjectPath`] when the path has fewer than
/// [`MIN_GRAPH_PATH_SEGMENTS`] segments. Empty segments count and become
/// empty keys.
pub fn graph_mutation(
    subject: &Subject,
    action_name: &str,
    desired_active: bool,
) -> Result<Option<Value>, MalformedSubjectPath> {
    let Some(path) = subject.social_path() else {
        return Ok(None);
    };
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < MIN_GRAPH_PATH_SEGMENTS {
        return Err(MalformedSubjectPath {
            path: path.to_string(),
            segments: segments.len(),
        });
    }

    let leaf = if desired_active {
        Value::String(String::new())
    } else {
        Value::Null
    };
    let nested = segments.iter().rev().fold(leaf, |inner, segment| {
        let mut level = Map::new();
        level.insert((*segment).to_string(), inner);
        Value::Object(level)
    });

    let mut root = Map::new();
    root.insert(action_name.to_string(), nested);
    Ok(Some(Value::Object(root)))
}

/// Notification for the configured account, if one is due.
#[must_use]
pub fn notification(
    subject: &Subject,
    pair: &ActionPair,
    desired_active: bool,
    actor: &str,
    notify_account_id: Option<&str>,
) -> Option<Notification> {
    if !desired_active {
        return None;
    }
    let target = notify_account_id.filter(|target| *target != actor)?;
    Some(Notification {
        key: target.to_string(),
        value: NotifyValue {
            tag: pair.tag_for(ActionKind::Do).to_string(),
            item: subject.clone(),
        },
    })
}

/// Assemble the full payload for a toggle.
#[must_use]
pub fn build_payload(request: &ToggleRequest<'_>) -> WritePayload {
    let graph = match graph_mutation(
        request.subject,
        &request.pair.action_name,
        request.desired_active,
    ) {
        Ok(graph) => graph,
        Err(err) => {
            warn!(error = %err, "skipping graph mutation");
            None
        }
    };

    WritePayload {
        index: IndexMutation {
            slot: request.index_slot.to_string(),
            record: index_record(request.subject, request.pair, request.desired_active),
            notify: notification(
                request.subject,
                request.pair,
                request.desired_active,
                request.actor,
                request.notify_account_id,
            ),
        },
        graph,
    }
}

// ---------------------------------------------------------------------------
// ToggleCommand
// ---------------------------------------------------------------------------

/// A built toggle, tagged with the intent it was issued for.
#[derive(Debug, Clone, PartialEq)]
pub struct ToggleCommand {
    pub intent: IntentId,
    pub actor: String,
    pub desired_active: bool,
    pub payload: WritePayload,
}

impl ToggleCommand {
    /// Hand the payload to `store` and translate the result into a
    /// [`WriteOutcome`]. Store failures never propagate.
    pub fn submit<S: ActionStore + ?Sized>(&self, store: &mut S) -> WriteOutcome {
        match store.set(&self.actor, &self.payload) {
            Ok(()) => {
                debug!(intent = %self.intent, tag = self.payload.tag(), "write committed");
                WriteOutcome::Committed
            }
            Err(err) => {
                warn!(intent = %self.intent, error = %err, "write rejected by store");
                WriteOutcome::Rejected
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
