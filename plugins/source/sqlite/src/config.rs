use std::path::PathBuf;

fn default_page_size() -> usize {
    1000
}

/// `[source]` section of a dump config.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct SqliteSourceConfig {
    /// Database file. Opened read-only.
    pub path: PathBuf,
    /// Rows fetched from the database per cursor round-trip.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl SqliteSourceConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            page_size: default_page_size(),
        }
    }
}
