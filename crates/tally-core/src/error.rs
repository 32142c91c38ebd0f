use std::fmt;

/// Machine-readable error codes for CLI output and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    SnapshotParseError,
    SubjectParseError,
    LoadPending,
    UnauthenticatedToggle,
    MalformedSubjectPath,
    WriteRejected,
    DatasetParseError,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::SnapshotParseError => "E1002",
            Self::SubjectParseError => "E1003",
            Self::LoadPending => "E2001",
            Self::UnauthenticatedToggle => "E2002",
            Self::MalformedSubjectPath => "E2003",
            Self::WriteRejected => "E3001",
            Self::DatasetParseError => "E4001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::SnapshotParseError => "Action log snapshot could not be parsed",
            Self::SubjectParseError => "Subject key is not valid JSON",
            Self::LoadPending => "Action log not loaded yet",
            Self::UnauthenticatedToggle => "Toggle requires a signed-in account",
            Self::MalformedSubjectPath => "Subject path cannot address the graph",
            Self::WriteRejected => "Write rejected by store",
            Self::DatasetParseError => "Chart dataset could not be parsed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .tally/config.toml and retry."),
            Self::SnapshotParseError => {
                Some("A snapshot must be `null` or a JSON array of index entries.")
            }
            Self::SubjectParseError => {
                Some("Pass the item as JSON, e.g. '{\"type\":\"social\",\"path\":\"a.near/widget/Foo\"}'.")
            }
            Self::LoadPending => Some("Wait for the log to load before toggling."),
            Self::UnauthenticatedToggle => Some("Pass --actor to act as an account."),
            Self::MalformedSubjectPath => {
                Some("Use a path with at least three `/`-separated segments; the index write still proceeds.")
            }
            Self::WriteRejected => None,
            Self::DatasetParseError => {
                Some("The dataset must be {\"data\": [\"<app json>\", ...]}.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
