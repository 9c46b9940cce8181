//! Explicit BEGIN/COMMIT/ROLLBACK over a `may_postgres` client.
//!
//! The sheet API has no transactions; the PostgreSQL backend uses this only
//! where a whole-sheet rewrite would otherwise be able to leave a sheet empty.

use crate::executor::{SqlError, SqlExecutor};
use may_postgres::types::ToSql;
use may_postgres::{Client, Error as PostgresError, Row};
use std::fmt;

/// Transaction error type
#[derive(Debug)]
pub enum TransactionError {
    /// PostgreSQL error from may_postgres
    PostgresError(PostgresError),
    /// Transaction already committed
    TransactionClosed,
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionError::PostgresError(e) => write!(f, "PostgreSQL error: {e}"),
            TransactionError::TransactionClosed => {
                write!(f, "Transaction has already been committed")
            }
        }
    }
}

impl std::error::Error for TransactionError {}

impl From<PostgresError> for TransactionError {
    fn from(err: PostgresError) -> Self {
        TransactionError::PostgresError(err)
    }
}

impl From<TransactionError> for SqlError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::PostgresError(e) => SqlError::PostgresError(e),
            TransactionError::TransactionClosed => {
                SqlError::Other("Transaction closed".to_string())
            }
        }
    }
}

/// An open transaction. Dropping it without [`Transaction::commit`] rolls back.
pub struct Transaction {
    client: Client,
    closed: bool,
}

impl Transaction {
    pub(crate) fn new(client: Client) -> Result<Self, TransactionError> {
        client.execute("BEGIN", &[])?;
        Ok(Self {
            client,
            closed: false,
        })
    }

    pub fn commit(mut self) -> Result<(), TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }
        self.closed = true;
        self.client.execute("COMMIT", &[])?;
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.client.execute("ROLLBACK", &[]) {
                log::warn!("rollback on drop failed: {e}");
            }
        }
    }
}

impl SqlExecutor for Transaction {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, SqlError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed.into());
        }
        Ok(self.client.execute(query, params)?)
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, SqlError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed.into());
        }
        Ok(self.client.query(query, params)?)
    }
}
