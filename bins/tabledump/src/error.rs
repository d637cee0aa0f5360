#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("source: {0}")]
    Source(#[from] tabledump_api::SourceError),

    #[error("{0}")]
    Dump(#[from] tabledump_engine::DumpError),

    #[error("output: {0}")]
    Io(#[from] std::io::Error),
}
