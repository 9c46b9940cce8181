//! PostgreSQL-backed [`TableStore`].
//!
//! Sheets live in two tables: `stockguard_sheets` (name and header) and
//! `stockguard_sheet_rows` (one row per data row, cells as `TEXT[]`). Row
//! positions are the `id` order within a sheet, which keeps the positional
//! contract of the sheet API. Single-row statements are atomic on their own;
//! `replace_rows` runs inside a transaction.

use std::sync::{Mutex, MutexGuard};

use may_postgres::types::ToSql;

use super::{observe, Row, StoreCall, StoreError, TableStore};
use crate::connection::{connect, ConnectionError};
use crate::executor::{MayPostgresExecutor, SqlError, SqlExecutor};
use crate::schema::HEADER_ROWS;

const CREATE_SHEETS_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS stockguard_sheets (
        sheet TEXT PRIMARY KEY,
        header TEXT[] NOT NULL
    )
"#;

const CREATE_ROWS_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS stockguard_sheet_rows (
        id BIGSERIAL PRIMARY KEY,
        sheet TEXT NOT NULL REFERENCES stockguard_sheets(sheet),
        cells TEXT[] NOT NULL
    )
"#;

const CREATE_ROWS_INDEX_SQL: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_stockguard_sheet_rows_sheet_id
    ON stockguard_sheet_rows(sheet, id)
"#;

/// Create the backing tables if they are missing.
pub fn initialize_sheet_tables(executor: &dyn SqlExecutor) -> Result<(), SqlError> {
    executor.execute(CREATE_SHEETS_SQL, &[])?;
    executor.execute(CREATE_ROWS_SQL, &[])?;
    executor.execute(CREATE_ROWS_INDEX_SQL, &[])?;
    Ok(())
}

fn store_error(err: SqlError) -> StoreError {
    if err.is_connection_level() {
        StoreError::Transient(err.to_string())
    } else {
        StoreError::Backend(err.to_string())
    }
}

pub struct PostgresStore {
    // One session; statements from this process are serialized on it so an
    // open rewrite transaction never captures another caller's statement.
    executor: Mutex<MayPostgresExecutor>,
}

impl PostgresStore {
    /// Wrap an existing executor and make sure the tables exist.
    pub fn new(executor: MayPostgresExecutor) -> Result<Self, StoreError> {
        initialize_sheet_tables(&executor).map_err(store_error)?;
        Ok(Self {
            executor: Mutex::new(executor),
        })
    }

    /// Connect with a connection string and initialize the tables.
    pub fn connect(url: &str) -> Result<Self, StoreError> {
        let client = connect(url).map_err(|e| match e {
            ConnectionError::InvalidConnectionString(msg) => StoreError::Backend(msg),
            ConnectionError::PostgresError(pg) => store_error(SqlError::PostgresError(pg)),
        })?;
        Self::new(MayPostgresExecutor::new(client))
    }

    fn executor(&self) -> MutexGuard<'_, MayPostgresExecutor> {
        self.executor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn require_sheet(executor: &dyn SqlExecutor, sheet: &str) -> Result<(), StoreError> {
        let rows = executor
            .query_all("SELECT 1 FROM stockguard_sheets WHERE sheet = $1", &[&sheet])
            .map_err(store_error)?;
        if rows.is_empty() {
            return Err(StoreError::SheetNotFound(sheet.to_string()));
        }
        Ok(())
    }

    fn insert_row(
        executor: &dyn SqlExecutor,
        sheet: &str,
        cells: &[String],
    ) -> Result<(), StoreError> {
        let cells: Vec<String> = cells.to_vec();
        let params: [&dyn ToSql; 2] = [&sheet, &cells];
        executor
            .execute(
                "INSERT INTO stockguard_sheet_rows (sheet, cells) VALUES ($1, $2)",
                &params,
            )
            .map_err(store_error)?;
        Ok(())
    }
}

impl TableStore for PostgresStore {
    fn ensure_sheet(&self, sheet: &str, header: &[&str]) -> Result<(), StoreError> {
        observe(StoreCall::EnsureSheet, sheet, || {
            let header: Vec<String> = header.iter().map(|h| h.to_string()).collect();
            let params: [&dyn ToSql; 2] = [&sheet, &header];
            self.executor()
                .execute(
                    "INSERT INTO stockguard_sheets (sheet, header) VALUES ($1, $2) \
                     ON CONFLICT (sheet) DO NOTHING",
                    &params,
                )
                .map_err(store_error)?;
            Ok(())
        })
    }

    fn read_rows(&self, sheet: &str) -> Result<Vec<Row>, StoreError> {
        observe(StoreCall::ReadRows, sheet, || {
            let executor = self.executor();
            Self::require_sheet(&*executor, sheet)?;
            let rows = executor
                .query_all(
                    "SELECT cells FROM stockguard_sheet_rows WHERE sheet = $1 ORDER BY id",
                    &[&sheet],
                )
                .map_err(store_error)?;
            rows.iter()
                .map(|row| {
                    row.try_get::<_, Vec<Option<String>>>(0)
                        .map(|cells| cells.into_iter().map(Option::unwrap_or_default).collect())
                        .map_err(|e| StoreError::Backend(format!("cells of '{sheet}': {e}")))
                })
                .collect()
        })
    }

    fn update_cell(
        &self,
        sheet: &str,
        sheet_row: usize,
        column: usize,
        value: &str,
    ) -> Result<(), StoreError> {
        observe(StoreCall::UpdateCell, sheet, || {
            let out_of_range = || StoreError::RowOutOfRange {
                sheet: sheet.to_string(),
                row: sheet_row,
            };
            if sheet_row <= HEADER_ROWS || column == 0 {
                return Err(out_of_range());
            }
            let offset = (sheet_row - HEADER_ROWS - 1) as i64;
            let column = column as i32;
            let params: [&dyn ToSql; 4] = [&sheet, &offset, &column, &value];
            let updated = self
                .executor()
                .execute(
                    "UPDATE stockguard_sheet_rows SET cells[$3] = $4 WHERE id = ( \
                         SELECT id FROM stockguard_sheet_rows WHERE sheet = $1 \
                         ORDER BY id OFFSET $2 LIMIT 1)",
                    &params,
                )
                .map_err(store_error)?;
            if updated == 0 {
                return Err(out_of_range());
            }
            Ok(())
        })
    }

    fn append_row(&self, sheet: &str, values: &[String]) -> Result<(), StoreError> {
        observe(StoreCall::AppendRow, sheet, || {
            let executor = self.executor();
            Self::require_sheet(&*executor, sheet)?;
            Self::insert_row(&*executor, sheet, values)
        })
    }

    fn delete_matching(&self, sheet: &str, expected: &[String]) -> Result<bool, StoreError> {
        observe(StoreCall::DeleteMatching, sheet, || {
            let expected: Vec<String> = expected.to_vec();
            let params: [&dyn ToSql; 2] = [&sheet, &expected];
            // A concurrent delete of the same id leaves this one with zero rows.
            let deleted = self
                .executor()
                .execute(
                    "DELETE FROM stockguard_sheet_rows WHERE id = ( \
                         SELECT id FROM stockguard_sheet_rows WHERE sheet = $1 AND cells = $2 \
                         ORDER BY id LIMIT 1)",
                    &params,
                )
                .map_err(store_error)?;
            Ok(deleted > 0)
        })
    }

    fn replace_rows(&self, sheet: &str, rows: &[Row]) -> Result<(), StoreError> {
        observe(StoreCall::ReplaceRows, sheet, || {
            let executor = self.executor();
            Self::require_sheet(&*executor, sheet)?;
            let tx = executor
                .begin()
                .map_err(|e| store_error(SqlError::from(e)))?;
            tx.execute("DELETE FROM stockguard_sheet_rows WHERE sheet = $1", &[&sheet])
                .map_err(store_error)?;
            for row in rows {
                Self::insert_row(&tx, sheet, row)?;
            }
            tx.commit().map_err(|e| store_error(SqlError::from(e)))?;
            Ok(())
        })
    }
}
