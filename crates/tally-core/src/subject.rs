//! The subject an action is taken against.
//!
//! Most subjects are opaque JSON keys. A subject of the form
//! `{"type": "social", "path": "owner/kind/name", ...}` is path-addressed:
//! toggling it also writes a denormalised flag into the social graph at that
//! path (see [`crate::command::graph_mutation`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Subject key carried in index entries and payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Subject {
    /// Path-addressed social resource.
    Social(SocialRef),
    /// Any other key, written back verbatim.
    Opaque(Value),
}

/// A `{"type": "social", "path": ...}` subject. Fields beyond `type` and
/// `path` (for example `blockHeight`) are preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialRef {
    #[serde(rename = "type")]
    kind: SocialKind,
    pub path: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum SocialKind {
    #[serde(rename = "social")]
    Social,
}

impl Subject {
    /// A path-addressed social subject with no extra fields.
    #[must_use]
    pub fn social(path: impl Into<String>) -> Self {
        Self::Social(SocialRef {
            kind: SocialKind::Social,
            path: path.into(),
            extra: BTreeMap::new(),
        })
    }

    /// An opaque subject.
    #[must_use]
    pub const fn opaque(key: Value) -> Self {
        Self::Opaque(key)
    }

    /// The slash-delimited path when this subject is path-addressed.
    #[must_use]
    pub fn social_path(&self) -> Option<&str> {
        match self {
            Self::Social(social) => Some(&social.path),
            Self::Opaque(_) => None,
        }
    }

    /// Canonical JSON text of the key, used to address the subject in stores.
    ///
    /// Object keys serialize in sorted order, so equal subjects produce equal
    /// text.
    #[must_use]
    pub fn canonical_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Round-trip through `Value` so object keys come out sorted.
        let value = serde_json::to_value(self).map_err(|_| fmt::Error)?;
        write!(f, "{value}")
    }
}

impl FromStr for Subject {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn social_subject_parses() {
        let subject: Subject = r#"{"type":"social","path":"a.near/widget/Foo","blockHeight":7}"#
            .parse()
            .expect("parse");
        assert_eq!(subject.social_path(), Some("a.near/widget/Foo"));
        let Subject::Social(social) = &subject else {
            panic!("expected social subject");
        };
        assert_eq!(social.extra.get("blockHeight"), Some(&json!(7)));
    }

    #[test]
    fn other_type_is_opaque() {
        let subject: Subject = r#"{"type":"post","path":"a.near/post/main"}"#
            .parse()
            .expect("parse");
        assert_eq!(subject.social_path(), None);
    }

    #[test]
    fn non_string_path_is_opaque() {
        let subject: Subject = r#"{"type":"social","path":5}"#.parse().expect("parse");
        assert!(matches!(subject, Subject::Opaque(_)));
    }

    #[test]
    fn plain_string_key_is_opaque() {
        let subject: Subject = r#""bob.near""#.parse().expect("parse");
        assert_eq!(subject, Subject::opaque(json!("bob.near")));
    }

    #[test]
    fn social_serializes_with_type_and_extra_fields() {
        let subject: Subject = r#"{"path":"a/b/c","type":"social","blockHeight":9}"#
            .parse()
            .expect("parse");
        assert_eq!(
            subject.canonical_key(),
            r#"{"blockHeight":9,"path":"a/b/c","type":"social"}"#
        );
    }

    #[test]
    fn canonical_key_ignores_field_order() {
        let a: Subject = r#"{"x":1,"y":2}"#.parse().expect("parse");
        let b: Subject = r#"{"y":2,"x":1}"#.parse().expect("parse");
        assert_eq!(a.canonical_key(), b.canonical_key());
    }
}
