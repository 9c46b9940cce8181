//! Backing store abstraction.
//!
//! The inventory lives in a remote, latency-heavy table service with a
//! spreadsheet's row/cell API: no row locking, no transactions, at-least-once
//! writes and transient failures. [`TableStore`] is that API; the engine never
//! talks to a backend directly.
//!
//! Row addressing follows the sheets: `sheet_row` arguments are 1-based and
//! count the header row, columns are 1-based. [`crate::schema::sheet_row`]
//! converts a data position into a sheet row.

use std::fmt;
use std::time::Instant;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

pub mod csv_file;
pub mod memory;
pub mod postgres;

pub use csv_file::CsvStore;
pub use memory::{FaultMode, MemoryStore};
pub use postgres::PostgresStore;

/// One data row as raw cells.
pub type Row = Vec<String>;

/// Kind of store call, used for fault injection and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreCall {
    EnsureSheet,
    ReadRows,
    UpdateCell,
    AppendRow,
    DeleteMatching,
    ReplaceRows,
}

impl StoreCall {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreCall::EnsureSheet => "ensure_sheet",
            StoreCall::ReadRows => "read_rows",
            StoreCall::UpdateCell => "update_cell",
            StoreCall::AppendRow => "append_row",
            StoreCall::DeleteMatching => "delete_matching",
            StoreCall::ReplaceRows => "replace_rows",
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, StoreCall::ReadRows | StoreCall::EnsureSheet)
    }
}

/// Backing store error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Network, rate-limit or dropped connection; the call may be retried
    Transient(String),
    /// The named sheet does not exist
    SheetNotFound(String),
    /// Row address outside the sheet's data rows
    RowOutOfRange { sheet: String, row: usize },
    /// Local file access failed
    Io(String),
    /// Any other backend failure; not retried
    Backend(String),
}

impl StoreError {
    /// Only transient failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Transient(msg) => write!(f, "transient store failure: {msg}"),
            StoreError::SheetNotFound(sheet) => write!(f, "sheet '{sheet}' not found"),
            StoreError::RowOutOfRange { sheet, row } => {
                write!(f, "row {row} is outside the data rows of sheet '{sheet}'")
            }
            StoreError::Io(msg) => write!(f, "store I/O error: {msg}"),
            StoreError::Backend(msg) => write!(f, "store error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock => {
                StoreError::Transient(err.to_string())
            }
            _ => StoreError::Io(err.to_string()),
        }
    }
}

/// Row/cell API of the backing table service.
///
/// Implementations must be safe to share between operator sessions; nothing
/// here serializes a read followed by a write, so read-modify-write sequences
/// are last-writer-wins. The one exception is [`TableStore::delete_matching`],
/// which must compare and delete in a single step.
pub trait TableStore: Send + Sync {
    /// Create the sheet with the given header if it does not exist yet.
    fn ensure_sheet(&self, sheet: &str, header: &[&str]) -> Result<(), StoreError>;

    /// All data rows in sheet order, header excluded.
    fn read_rows(&self, sheet: &str) -> Result<Vec<Row>, StoreError>;

    /// Overwrite one cell. `sheet_row` counts the header row.
    fn update_cell(
        &self,
        sheet: &str,
        sheet_row: usize,
        column: usize,
        value: &str,
    ) -> Result<(), StoreError>;

    /// Append one data row at the end of the sheet.
    fn append_row(&self, sheet: &str, values: &[String]) -> Result<(), StoreError>;

    /// Delete the first data row whose cells equal `expected`.
    ///
    /// Returns `false` when no such row exists any more, which is how a
    /// caller learns that a concurrent session consumed the row first.
    fn delete_matching(&self, sheet: &str, expected: &[String]) -> Result<bool, StoreError>;

    /// Clear all data rows and write `rows` in their place.
    fn replace_rows(&self, sheet: &str, rows: &[Row]) -> Result<(), StoreError>;
}

/// Time a store call, record it, and wrap it in a span.
pub(crate) fn observe<T>(
    call: StoreCall,
    sheet: &str,
    f: impl FnOnce() -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::store_call_span(call.as_str(), sheet).entered();

    let start = Instant::now();
    let result = f();
    let elapsed = start.elapsed();

    #[cfg(feature = "metrics")]
    METRICS.record_store_call(call.as_str(), elapsed, result.is_ok());

    match &result {
        Ok(_) => log::trace!("{} on '{}' took {:?}", call.as_str(), sheet, elapsed),
        Err(e) => log::debug!("{} on '{}' failed after {:?}: {}", call.as_str(), sheet, elapsed, e),
    }
    result
}

/// Zero-based index of a data row addressed by its sheet row.
pub(crate) fn data_index(sheet: &str, sheet_row: usize, len: usize) -> Result<usize, StoreError> {
    let header = crate::schema::HEADER_ROWS;
    if sheet_row <= header || sheet_row - header > len {
        return Err(StoreError::RowOutOfRange {
            sheet: sheet.to_string(),
            row: sheet_row,
        });
    }
    Ok(sheet_row - header - 1)
}

/// Write `value` into a 1-based column, padding short rows with empty cells.
pub(crate) fn set_cell(row: &mut Row, column: usize, value: &str) {
    if column == 0 {
        return;
    }
    if row.len() < column {
        row.resize(column, String::new());
    }
    row[column - 1] = value.to_string();
}
