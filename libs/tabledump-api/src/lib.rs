pub mod column;
pub mod error;
pub mod source;
pub mod value;

pub use column::{ColumnInfo, ScanKind};
pub use error::{ErrorKind, SourceError};
pub use source::{CreateStatement, RowCursor, TableHandle, TableSource};
pub use value::{Row, Value};
