//! Action log entries as observed from the social index.
//!
//! An entry records that an account wrote a tagged action against a
//! subject. Tags are opaque strings configured per widget through an
//! [`ActionPair`]: one tag means "do", a second means "undo", and every
//! other tag is ignored so that newer writers never break older readers.

pub mod parser;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use parser::{Snapshot, SnapshotError, parse_snapshot};

/// Identifier of an account that wrote an entry or is viewing a widget.
pub type AccountId = String;

/// Payload of an index entry. Only the tag is significant to the reducer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionValue {
    #[serde(rename = "type")]
    pub tag: String,
}

/// One record read from the action log.
///
/// Wire form: `{"accountId": "...", "blockHeight": 123, "value": {"type": "like"}}`.
/// `blockHeight` is optional; fields the reducer does not use are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEntry {
    /// Account that wrote the entry.
    #[serde(rename = "accountId")]
    pub actor: AccountId,
    /// Height at which the store accepted the write, when the store reports it.
    #[serde(
        rename = "blockHeight",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub block_height: Option<u64>,
    pub value: ActionValue,
}

impl ActionEntry {
    /// Create an entry without a block height.
    #[must_use]
    pub fn new(actor: impl Into<AccountId>, tag: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            block_height: None,
            value: ActionValue { tag: tag.into() },
        }
    }

    /// Attach the height at which the store accepted this entry.
    #[must_use]
    pub const fn at_height(mut self, height: u64) -> Self {
        self.block_height = Some(height);
        self
    }

    /// The action tag carried by this entry.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.value.tag
    }
}

/// Meaning of a recognised tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// The actor turned the action on.
    Do,
    /// The actor turned the action off.
    Undo,
}

impl ActionKind {
    /// Kind that moves an actor into the requested membership.
    #[must_use]
    pub const fn for_transition(desired_active: bool) -> Self {
        if desired_active { Self::Do } else { Self::Undo }
    }

    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Do)
    }

    #[must_use]
    pub const fn inverse(self) -> Self {
        match self {
            Self::Do => Self::Undo,
            Self::Undo => Self::Do,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Do => f.write_str("do"),
            Self::Undo => f.write_str("undo"),
        }
    }
}

/// The pair of tags a widget instance toggles between.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionPair {
    pub action_name: String,
    pub action_undo_name: String,
}

impl ActionPair {
    #[must_use]
    pub fn new(action_name: impl Into<String>, action_undo_name: impl Into<String>) -> Self {
        Self {
            action_name: action_name.into(),
            action_undo_name: action_undo_name.into(),
        }
    }

    /// Classify a tag. Unknown tags yield `None`.
    ///
    /// If both names are configured to the same string the "do" meaning wins.
    #[must_use]
    pub fn classify(&self, tag: &str) -> Option<ActionKind> {
        if tag == self.action_name {
            Some(ActionKind::Do)
        } else if tag == self.action_undo_name {
            Some(ActionKind::Undo)
        } else {
            None
        }
    }

    /// The tag that records `kind`.
    #[must_use]
    pub fn tag_for(&self, kind: ActionKind) -> &str {
        match kind {
            ActionKind::Do => &self.action_name,
            ActionKind::Undo => &self.action_undo_name,
        }
    }
}
