use tabledump_api::SourceError;

#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    /// Create statement missing, or reported for a different table.
    #[error("schema error for table '{table}': {detail}")]
    Schema { table: String, detail: String },

    #[error("no columns in table '{0}'")]
    NoColumns(String),

    /// Advancing or scanning the cursor failed mid-stream.
    #[error("cursor error on table '{table}': {source}")]
    Cursor { table: String, source: SourceError },

    #[error("table '{0}' cannot be initialized twice")]
    Reinitialization(String),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dump is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("producer for table '{table}' failed: {detail}")]
    Producer { table: String, detail: String },
}

impl DumpError {
    pub(crate) fn cursor(table: &str, source: SourceError) -> Self {
        DumpError::Cursor {
            table: table.to_string(),
            source,
        }
    }

    /// Add context to the error.
    ///
    /// For `Source` variant, context is added to the inner `SourceError`.
    /// For `Config`, context is prepended to the message.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            DumpError::Source(e) => DumpError::Source(e.with_context(ctx)),
            DumpError::Config(msg) => DumpError::Config(format!("{ctx}: {msg}")),
            other => other,
        }
    }
}
