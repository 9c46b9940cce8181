//! Duplicate Reconciler
//!
//! Collapses rows that share a normalized (key, rack) into one survivor, the
//! row with the highest quantity (earliest on ties), and rewrites the sheet.
//! The rewrite is clear-then-write on stores without transactions, so it must
//! only run while no other session is writing to the location.

use std::collections::HashMap;

use serde::Serialize;

use crate::context::RequestContext;
use crate::engine::{InventoryEngine, InventoryError};
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
use crate::normalize::normalize;
use crate::schema::{cell, stock_columns, StockRecord};
use crate::store::{set_cell, Row};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub location: String,
    pub rows_before: usize,
    pub rows_removed: usize,
}

/// Survivors in their original order, with key and rack cells normalized,
/// and the number of rows dropped. Rows without a key or rack are kept as is.
pub fn collapse_duplicates(rows: &[Row]) -> (Vec<Row>, usize) {
    let mut best: HashMap<(String, String), (usize, i64)> = HashMap::new();
    for (index, row) in rows.iter().enumerate() {
        let record = StockRecord::from_row(row);
        if record.key.is_empty() || record.rack.is_empty() {
            continue;
        }
        best.entry((record.key, record.rack))
            .and_modify(|(winner, quantity)| {
                if record.quantity > *quantity {
                    *winner = index;
                    *quantity = record.quantity;
                }
            })
            .or_insert((index, record.quantity));
    }

    let mut kept = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let key = normalize(cell(row, stock_columns::KEY));
        let rack = normalize(cell(row, stock_columns::RACK));
        if key.is_empty() || rack.is_empty() {
            kept.push(row.clone());
            continue;
        }
        if best.get(&(key.clone(), rack.clone())).map(|(winner, _)| *winner) == Some(index) {
            let mut row = row.clone();
            set_cell(&mut row, stock_columns::KEY, &key);
            set_cell(&mut row, stock_columns::RACK, &rack);
            kept.push(row);
        }
    }
    let removed = rows.len() - kept.len();
    (kept, removed)
}

impl InventoryEngine {
    /// Remove duplicate (key, rack) rows from one location.
    ///
    /// Nothing is written when the sheet has no duplicates.
    pub fn reconcile_duplicates(
        &self,
        ctx: &RequestContext,
        location: &str,
    ) -> Result<ReconcileReport, InventoryError> {
        self.observe("reconcile", location, ctx, || {
            self.require_location(location)?;
            let location = location.trim();
            let rows = self
                .retry_policy()
                .run("reconcile: read stock", || Ok(self.store().read_rows(location)?))?;
            let (kept, removed) = collapse_duplicates(&rows);
            if removed > 0 {
                // Clear + rewrite is idempotent, so a retried rewrite is safe.
                self.retry_policy().run("reconcile: rewrite stock", || {
                    Ok(self.store().replace_rows(location, &kept)?)
                })?;
                log::info!("{location}: removed {removed} duplicate row(s) of {}", rows.len());
            } else {
                log::info!("{location}: no duplicate rows");
            }

            #[cfg(feature = "metrics")]
            METRICS.record_reconciled(removed);

            Ok(ReconcileReport {
                location: location.to_string(),
                rows_before: rows.len(),
                rows_removed: removed,
            })
        })
    }
}
