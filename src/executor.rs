//! SQL execution over `may_postgres`.
//!
//! [`SqlExecutor`] is the narrow seam the PostgreSQL sheet store talks to, so
//! the same store code runs on a plain client or inside a [`Transaction`].
//!
//! [`Transaction`]: crate::transaction::Transaction

use may_postgres::types::ToSql;
use may_postgres::{Client, Error as PostgresError, Row};
use std::fmt;

/// SQL execution error
#[derive(Debug)]
pub enum SqlError {
    /// `PostgreSQL` error from `may_postgres`
    PostgresError(PostgresError),
    /// Row decoding failed
    ParseError(String),
    /// Other execution errors
    Other(String),
}

impl SqlError {
    /// Whether the failure happened below SQL (connection, I/O, timeout).
    ///
    /// Errors that carry a server-side SQLSTATE are statement errors and will
    /// fail the same way on a retry.
    pub fn is_connection_level(&self) -> bool {
        match self {
            SqlError::PostgresError(e) => e.as_db_error().is_none(),
            SqlError::ParseError(_) | SqlError::Other(_) => false,
        }
    }
}

impl fmt::Display for SqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlError::PostgresError(e) => write!(f, "PostgreSQL error: {e}"),
            SqlError::ParseError(s) => write!(f, "Parse error: {s}"),
            SqlError::Other(s) => write!(f, "Execution error: {s}"),
        }
    }
}

impl std::error::Error for SqlError {}

impl From<PostgresError> for SqlError {
    fn from(err: PostgresError) -> Self {
        SqlError::PostgresError(err)
    }
}

/// Execute statements against PostgreSQL.
pub trait SqlExecutor {
    /// Execute a statement and return the number of rows affected.
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, SqlError>;

    /// Execute a query and return all rows.
    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, SqlError>;
}

/// [`SqlExecutor`] backed directly by a `may_postgres::Client`.
pub struct MayPostgresExecutor {
    client: Client,
}

impl MayPostgresExecutor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Start a transaction on this executor's connection.
    ///
    /// Statements issued through the executor itself while the transaction is
    /// open share the same session and therefore the same transaction.
    pub fn begin(
        &self,
    ) -> Result<crate::transaction::Transaction, crate::transaction::TransactionError> {
        crate::transaction::Transaction::new(self.client.clone())
    }
}

impl SqlExecutor for MayPostgresExecutor {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, SqlError> {
        Ok(self.client.execute(query, params)?)
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, SqlError> {
        Ok(self.client.query(query, params)?)
    }
}
