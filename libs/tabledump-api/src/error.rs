use std::fmt;

/// What part of a source failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The source was opened with unusable settings.
    Config,
    /// The database could not be reached or queried.
    Io,
    /// Table metadata (create statement, columns) could not be obtained.
    Schema,
    /// A row could not be fetched or decoded.
    Scan,
}

/// Driver-neutral failure reported by a [`TableSource`](crate::TableSource)
/// or one of its handles and cursors: a kind plus the driver's message.
#[derive(Debug, Clone)]
pub struct SourceError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SourceError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, message: msg.into() }
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Schema, message: msg.into() }
    }

    pub fn scan(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Scan, message: msg.into() }
    }

    /// Prefix the message with `ctx: `; the kind is unchanged.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for SourceError {}

impl From<std::io::Error> for SourceError {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}
