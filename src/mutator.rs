//! Stock Mutator
//!
//! Applies a signed quantity delta to one (key, rack) row of a location
//! sheet: locate, check, then write the timestamp cell followed by the
//! quantity cell. Each call re-reads the sheet, so a retried call works on a
//! fresh snapshot. Two sessions mutating the same row between read and write
//! are last-writer-wins; the store offers nothing stronger.

use crate::engine::InventoryError;
use crate::locator::locate;
use crate::normalize::normalize;
use crate::schema::{stock_columns, StockRecord};
use crate::store::TableStore;

/// What a delta did to the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaOutcome {
    pub key: String,
    pub rack: String,
    pub display_name: String,
    pub previous: i64,
    pub resulting: i64,
    /// A new row was appended instead of updating an existing one.
    pub created: bool,
}

/// Add `delta` to the stock of (key, rack) in `location`.
///
/// A positive delta on a missing row appends a new row with `display_name`.
/// A non-positive delta on a missing row is [`InventoryError::RecordNotFound`].
/// A delta that would drive the row negative is
/// [`InventoryError::InsufficientStock`] and writes nothing.
pub fn apply_delta(
    store: &dyn TableStore,
    location: &str,
    key: &str,
    rack: &str,
    display_name: &str,
    delta: i64,
    now: &str,
) -> Result<DeltaOutcome, InventoryError> {
    let key = normalize(key);
    let rack = normalize(rack);
    if key.is_empty() || rack.is_empty() {
        return Err(InventoryError::validation("Key and rack are required."));
    }

    let rows = store.read_rows(location)?;
    let Some(found) = locate(&rows, &key, &rack) else {
        if delta <= 0 {
            return Err(InventoryError::RecordNotFound {
                location: location.to_string(),
                key,
                rack,
            });
        }
        let record = StockRecord {
            key: key.clone(),
            display_name: display_name.trim().to_string(),
            rack: rack.clone(),
            quantity: delta,
            last_updated: now.to_string(),
        };
        store.append_row(location, &record.to_row())?;
        log::debug!("{location}: new row {key}/{rack} with {delta}");
        return Ok(DeltaOutcome {
            key,
            rack,
            display_name: record.display_name,
            previous: 0,
            resulting: delta,
            created: true,
        });
    };

    let Some(resulting) = found.quantity.checked_add(delta) else {
        return Err(InventoryError::validation(format!(
            "Adding {delta} to {key} in rack {rack} at {location} exceeds the largest \
             quantity a row can hold ({}).",
            found.quantity
        )));
    };
    if resulting < 0 {
        return Err(InventoryError::InsufficientStock {
            location: location.to_string(),
            key,
            rack,
            available: found.quantity,
            requested: -delta,
        });
    }

    let row = found.sheet_row();
    // Timestamp first: a retry after a lost quantity write only re-stamps.
    store.update_cell(location, row, stock_columns::UPDATED_AT, now)?;
    store.update_cell(location, row, stock_columns::QUANTITY, &resulting.to_string())?;
    log::debug!(
        "{location}: {key}/{rack} row {row} {} -> {resulting}",
        found.quantity
    );

    let display_name = if found.record.display_name.is_empty() {
        display_name.trim().to_string()
    } else {
        found.record.display_name
    };
    Ok(DeltaOutcome {
        key,
        rack,
        display_name,
        previous: found.quantity,
        resulting,
        created: false,
    })
}
