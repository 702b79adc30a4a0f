//! Typed row storage on top of a spreadsheet grid.
//!
//! A [`Database`] maps tables onto sheets of a [`GridBackend`]: three
//! header rows carry the column names, column type tags, and the
//! authoritative row/column counts plus an optional uniqueness constraint;
//! data rows follow, one record per row. Operations re-read the header
//! before trusting cached counts, dedup against a digest index of the
//! constrained columns, and pace every backend call through a
//! 100-second-window quota throttle.

pub mod backend;
pub mod backends;
pub mod constraint;
pub mod database;
pub mod error;
pub mod index;
pub mod schema;
pub mod table;
pub mod throttle;

pub use backend::{GridBackend, Matrix, Row, SheetRef};
pub use backends::memory::MemoryGrid;
pub use constraint::Constraint;
pub use database::Database;
pub use error::{BackendError, StoreError};
pub use index::UniqueIndex;
pub use schema::{
    DATA_START_COL, DATA_START_ROW, Field, HEADER_ROWS, Record, SchemaBuilder, TableSchema,
};
pub use table::{ColumnPredicate, ConditionGroup, Table};
pub use throttle::{Clock, ManualClock, QuotaThrottle, SystemClock, WINDOW_BUDGET, WINDOW_SECS};

// Re-export for convenience
pub use gridbase_common::{CellValue, ColumnKind, RangeAddress, ValueFamily};
