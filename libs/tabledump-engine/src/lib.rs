pub mod batch;
pub mod classify;
pub mod config;
pub mod dump;
pub mod encode;
pub mod error;
pub mod stream;
pub mod table;

pub use config::DumpConfig;
pub use dump::{Dump, DumpSummary, Dumper, TableSummary};
pub use error::DumpError;
pub use stream::{StreamStats, TableStream, stream_table};
pub use table::TableSession;
