//! Record Locator
//!
//! Resolves a (key, rack) pair to the authoritative row of a stock sheet
//! snapshot. Historical sheets contain accidental duplicates; among those the
//! row with the highest quantity wins (earliest row on ties) so real stock is
//! preferred over a stale zero row.

use crate::normalize::normalize;
use crate::schema::{sheet_row, StockRecord};
use crate::store::Row;

/// A resolved stock row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    /// 1-based data position; add the header offset before writing.
    pub position: usize,
    pub quantity: i64,
    pub record: StockRecord,
}

impl Located {
    /// Row number in the sheet, header included.
    pub fn sheet_row(&self) -> usize {
        sheet_row(self.position)
    }
}

/// Every row matching the normalized key and rack, in sheet order.
pub fn locate_all(rows: &[Row], key: &str, rack: &str) -> Vec<Located> {
    let key = normalize(key);
    let rack = normalize(rack);
    if key.is_empty() || rack.is_empty() {
        return Vec::new();
    }
    rows.iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let record = StockRecord::from_row(row);
            (record.key == key && record.rack == rack).then(|| Located {
                position: index + 1,
                quantity: record.quantity,
                record,
            })
        })
        .collect()
}

/// The authoritative row for (key, rack), or `None`.
///
/// Never fails: blank inputs and empty snapshots are simply not found.
pub fn locate(rows: &[Row], key: &str, rack: &str) -> Option<Located> {
    locate_all(rows, key, rack)
        .into_iter()
        .fold(None, |best: Option<Located>, candidate| match best {
            Some(current) if current.quantity >= candidate.quantity => Some(current),
            _ => Some(candidate),
        })
}
