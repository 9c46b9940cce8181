//! Pending-transfer sheet and movement log.
//!
//! Pending rows are claimed by deleting them with an exact cell match, so two
//! sessions resolving the same transfer cannot both succeed.

use crate::engine::InventoryError;
use crate::retry::RetryPolicy;
use crate::schema::{MovementLogEntry, PendingTransfer};
use crate::store::{Row, TableStore};

/// Result of trying to take a pending row out of the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// This call removed the row.
    Claimed,
    /// The row was already gone before any attempt of this call touched it.
    Gone,
    /// An earlier attempt failed transiently and a later one found no row;
    /// the delete may have landed on that earlier attempt, or another
    /// session may have taken the row.
    Uncertain,
}

/// A pending transfer together with the raw cells it is stored as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub transfer: PendingTransfer,
    pub raw: Row,
}

pub struct Ledger<'a> {
    store: &'a dyn TableStore,
    pending_sheet: &'a str,
    movement_sheet: &'a str,
}

impl<'a> Ledger<'a> {
    pub fn new(store: &'a dyn TableStore, pending_sheet: &'a str, movement_sheet: &'a str) -> Self {
        Self {
            store,
            pending_sheet,
            movement_sheet,
        }
    }

    pub fn pending(&self) -> Result<Vec<PendingEntry>, InventoryError> {
        let rows = self.store.read_rows(self.pending_sheet)?;
        Ok(rows
            .into_iter()
            .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
            .map(|raw| PendingEntry {
                transfer: PendingTransfer::from_row(&raw),
                raw,
            })
            .collect())
    }

    /// Re-read the sheet and find `transfer` by creation time and key.
    pub fn find(&self, transfer: &PendingTransfer) -> Result<Option<PendingEntry>, InventoryError> {
        Ok(self
            .pending()?
            .into_iter()
            .find(|entry| entry.transfer.same_transfer(transfer)))
    }

    /// Append `raw` under `policy`. Before every retry the sheet is re-read,
    /// and an attempt whose row already landed counts as done.
    pub fn append_pending_once(
        &self,
        transfer: &PendingTransfer,
        raw: &Row,
        policy: &RetryPolicy,
    ) -> Result<(), InventoryError> {
        let mut attempted = false;
        policy.run("append pending transfer", || {
            if attempted && self.find(transfer)?.is_some() {
                log::debug!("pending transfer of {} already landed", transfer.key);
                return Ok(());
            }
            attempted = true;
            self.store.append_row(self.pending_sheet, raw)?;
            Ok(())
        })
    }

    /// Delete the pending row, retrying transient failures under `policy`.
    pub fn claim(&self, raw: &Row, policy: &RetryPolicy) -> Result<Claim, InventoryError> {
        let mut failed_attempt = false;
        let claimed = policy.run("claim pending transfer", || {
            match self.store.delete_matching(self.pending_sheet, raw) {
                Ok(deleted) => Ok(deleted),
                Err(e) => {
                    failed_attempt |= e.is_transient();
                    Err(e.into())
                }
            }
        })?;
        Ok(match (claimed, failed_attempt) {
            (true, _) => Claim::Claimed,
            (false, false) => Claim::Gone,
            (false, true) => Claim::Uncertain,
        })
    }

    pub fn append_movement(&self, entry: &MovementLogEntry) -> Result<(), InventoryError> {
        self.store.append_row(self.movement_sheet, &entry.to_row())?;
        Ok(())
    }

    pub fn movements(&self) -> Result<Vec<MovementLogEntry>, InventoryError> {
        let rows = self.store.read_rows(self.movement_sheet)?;
        Ok(rows.iter().map(|row| MovementLogEntry::from_row(row)).collect())
    }
}
