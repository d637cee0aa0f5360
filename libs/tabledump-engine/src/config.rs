use serde::Deserialize;

use crate::error::DumpError;

pub const DEFAULT_MAX_ALLOWED_PACKET: usize = 4_194_304;
pub const DEFAULT_CHARSET: &str = "utf8";

/// Dump behaviour. Deserialized from the `[dump]` table of a config file or
/// built in code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DumpConfig {
    /// Byte budget for one `INSERT` statement. `0` means the default.
    #[serde(default = "default_max_allowed_packet")]
    pub max_allowed_packet: usize,

    /// Character set stamped into the header and table sections.
    #[serde(default = "default_charset")]
    pub charset: String,

    /// Tables skipped entirely.
    #[serde(default)]
    pub ignore_tables: Vec<String>,

    /// Capacity of the statement channel between producer and writer.
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

fn default_max_allowed_packet() -> usize {
    DEFAULT_MAX_ALLOWED_PACKET
}

fn default_charset() -> String {
    DEFAULT_CHARSET.to_string()
}

fn default_stream_buffer() -> usize {
    1
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            max_allowed_packet: default_max_allowed_packet(),
            charset: default_charset(),
            ignore_tables: Vec::new(),
            stream_buffer: default_stream_buffer(),
        }
    }
}

impl DumpConfig {
    /// Replace unset values with defaults and reject unusable ones.
    pub fn normalized(mut self) -> Result<Self, DumpError> {
        if self.max_allowed_packet == 0 {
            self.max_allowed_packet = DEFAULT_MAX_ALLOWED_PACKET;
        }
        if self.charset.is_empty() {
            self.charset = default_charset();
        }
        if self.stream_buffer == 0 {
            return Err(DumpError::Config("stream_buffer must be at least 1".into()));
        }
        if !self
            .charset
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(DumpError::Config(format!(
                "invalid charset name '{}'",
                self.charset
            )));
        }
        Ok(self)
    }

    pub fn is_ignored(&self, table: &str) -> bool {
        self.ignore_tables.iter().any(|t| t == table)
    }
}
