//! Read-only views over the sheets: stock lists, rack contents and the
//! transfer queues each location sees.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::engine::{InventoryEngine, InventoryError};
use crate::locator::locate;
use crate::normalize::normalize;
use crate::schema::{MovementLogEntry, PendingTransfer, StockRecord};

/// Stock of one key in one rack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RackAvailability {
    pub rack: String,
    pub display_name: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RackContents {
    pub rack: String,
    pub records: Vec<StockRecord>,
    pub total: i64,
}

impl InventoryEngine {
    /// All stock rows of a location, key and rack normalized.
    pub fn stock(&self, location: &str) -> Result<Vec<StockRecord>, InventoryError> {
        self.require_location(location)?;
        let rows = self
            .retry_policy()
            .run("read stock", || Ok(self.store().read_rows(location.trim())?))?;
        Ok(rows
            .iter()
            .map(|row| StockRecord::from_row(row))
            .filter(|record| !record.key.is_empty())
            .collect())
    }

    /// Racks holding `key` with stock left, one entry per rack.
    pub fn racks_for_key(
        &self,
        location: &str,
        key: &str,
    ) -> Result<Vec<RackAvailability>, InventoryError> {
        let key = normalize(key);
        let stock = self.stock(location)?;
        let racks: BTreeSet<String> = stock
            .iter()
            .filter(|r| r.key == key && !r.rack.is_empty())
            .map(|r| r.rack.clone())
            .collect();
        let rows: Vec<_> = stock.iter().map(StockRecord::to_row).collect();

        // Same row the mutator would pick when duplicates exist.
        Ok(racks
            .into_iter()
            .filter_map(|rack| {
                let found = locate(&rows, &key, &rack)?;
                (found.quantity > 0).then(|| RackAvailability {
                    rack,
                    display_name: found.record.display_name,
                    quantity: found.quantity,
                })
            })
            .collect())
    }

    /// Distinct rack labels of a location, sorted.
    pub fn racks(&self, location: &str) -> Result<Vec<String>, InventoryError> {
        let racks: BTreeSet<String> = self
            .stock(location)?
            .into_iter()
            .map(|r| r.rack)
            .filter(|rack| !rack.is_empty())
            .collect();
        Ok(racks.into_iter().collect())
    }

    /// Everything stored in one rack and the total piece count.
    pub fn rack_contents(
        &self,
        location: &str,
        rack: &str,
    ) -> Result<RackContents, InventoryError> {
        let rack = normalize(rack);
        let records: Vec<StockRecord> = self
            .stock(location)?
            .into_iter()
            .filter(|r| r.rack == rack)
            .collect();
        let total = records
            .iter()
            .try_fold(0i64, |sum, r| sum.checked_add(r.quantity))
            .ok_or_else(|| {
                InventoryError::validation(format!(
                    "The piece count of rack {rack} at {} is too large to total.",
                    location.trim()
                ))
            })?;
        Ok(RackContents {
            rack,
            records,
            total,
        })
    }

    /// Transfers on their way to `location`.
    pub fn incoming_transfers(
        &self,
        location: &str,
    ) -> Result<Vec<PendingTransfer>, InventoryError> {
        self.require_location(location)?;
        let location = location.trim();
        Ok(self
            .pending_transfers()?
            .into_iter()
            .filter(|t| t.destination == location)
            .collect())
    }

    /// Transfers sent from `location` and not yet received.
    pub fn outgoing_transfers(
        &self,
        location: &str,
    ) -> Result<Vec<PendingTransfer>, InventoryError> {
        self.require_location(location)?;
        let location = location.trim();
        Ok(self
            .pending_transfers()?
            .into_iter()
            .filter(|t| t.origin == location)
            .collect())
    }

    /// One pending transfer by creation timestamp and key.
    pub fn find_pending(
        &self,
        created_at: &str,
        key: &str,
    ) -> Result<Option<PendingTransfer>, InventoryError> {
        let key = normalize(key);
        let created_at = created_at.trim();
        Ok(self
            .pending_transfers()?
            .into_iter()
            .find(|t| t.created_at == created_at && t.key == key))
    }

    pub fn movement_log(&self) -> Result<Vec<MovementLogEntry>, InventoryError> {
        self.retry_policy()
            .run("read movements", || self.ledger().movements())
    }

    fn pending_transfers(&self) -> Result<Vec<PendingTransfer>, InventoryError> {
        let entries = self
            .retry_policy()
            .run("read pending transfers", || self.ledger().pending())?;
        Ok(entries.into_iter().map(|e| e.transfer).collect())
    }
}
