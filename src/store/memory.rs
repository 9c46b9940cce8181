//! In-process [`TableStore`] with fault injection.
//!
//! Used by tests and demos. Faults let a test reproduce the backing store's
//! bad days: a call that fails before touching anything, or one whose write
//! lands but whose confirmation is lost.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::{data_index, observe, set_cell, Row, StoreCall, StoreError, TableStore};

/// When an injected transient failure fires relative to the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultMode {
    /// Fail before the call has any effect.
    BeforeWrite,
    /// Apply the call, then report a transient failure anyway.
    AfterWrite,
}

#[derive(Debug)]
struct Fault {
    call: Option<StoreCall>,
    mode: FaultMode,
    /// Matching calls let through before the fault starts firing.
    skip: usize,
    remaining: usize,
}

#[derive(Debug, Default)]
struct Sheet {
    rows: Vec<Row>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    sheets: BTreeMap<String, Sheet>,
    faults: Vec<Fault>,
    calls: HashMap<StoreCall, usize>,
}

impl MemoryInner {
    /// Count the call and pop a matching fault, if any.
    fn take_fault(&mut self, call: StoreCall) -> Option<FaultMode> {
        *self.calls.entry(call).or_insert(0) += 1;
        let fault = self
            .faults
            .iter_mut()
            .find(|f| f.remaining > 0 && f.call.map_or(true, |c| c == call))?;
        if fault.skip > 0 {
            fault.skip -= 1;
            return None;
        }
        fault.remaining -= 1;
        let mode = fault.mode;
        self.faults.retain(|f| f.remaining > 0);
        Some(mode)
    }

    fn sheet_mut(&mut self, sheet: &str) -> Result<&mut Sheet, StoreError> {
        self.sheets
            .get_mut(sheet)
            .ok_or_else(|| StoreError::SheetNotFound(sheet.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style seeding of a sheet with existing data rows.
    pub fn with_sheet(self, sheet: &str, rows: Vec<Row>) -> Self {
        self.lock().sheets.insert(sheet.to_string(), Sheet { rows });
        self
    }

    /// Make the next `times` calls (of `call`, or of any kind when `None`)
    /// fail with a transient error.
    pub fn fail_next(&self, call: Option<StoreCall>, times: usize, mode: FaultMode) {
        self.fail_after(call, 0, times, mode);
    }

    /// Like [`MemoryStore::fail_next`], but the first `skip` matching calls
    /// succeed before the failures start.
    pub fn fail_after(&self, call: Option<StoreCall>, skip: usize, times: usize, mode: FaultMode) {
        self.lock().faults.push(Fault {
            call,
            mode,
            skip,
            remaining: times,
        });
    }

    /// Number of calls of one kind seen so far, including failed ones.
    pub fn call_count(&self, call: StoreCall) -> usize {
        self.lock().calls.get(&call).copied().unwrap_or(0)
    }

    /// Total write calls seen so far.
    pub fn write_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|(call, _)| call.is_write())
            .map(|(_, n)| n)
            .sum()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        // A panicking test thread must not wedge every other session.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn run<T>(
        &self,
        call: StoreCall,
        sheet: &str,
        f: impl FnOnce(&mut MemoryInner) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        observe(call, sheet, || {
            let mut inner = self.lock();
            match inner.take_fault(call) {
                Some(FaultMode::BeforeWrite) => Err(StoreError::Transient(format!(
                    "injected failure before {}",
                    call.as_str()
                ))),
                Some(FaultMode::AfterWrite) => {
                    f(&mut inner)?;
                    Err(StoreError::Transient(format!(
                        "injected failure after {}",
                        call.as_str()
                    )))
                }
                None => f(&mut inner),
            }
        })
    }
}

impl TableStore for MemoryStore {
    /// Headers are implicit here; only data rows are kept.
    fn ensure_sheet(&self, sheet: &str, _header: &[&str]) -> Result<(), StoreError> {
        self.run(StoreCall::EnsureSheet, sheet, |inner| {
            inner.sheets.entry(sheet.to_string()).or_default();
            Ok(())
        })
    }

    fn read_rows(&self, sheet: &str) -> Result<Vec<Row>, StoreError> {
        self.run(StoreCall::ReadRows, sheet, |inner| {
            Ok(inner.sheet_mut(sheet)?.rows.clone())
        })
    }

    fn update_cell(
        &self,
        sheet: &str,
        sheet_row: usize,
        column: usize,
        value: &str,
    ) -> Result<(), StoreError> {
        self.run(StoreCall::UpdateCell, sheet, |inner| {
            let rows = &mut inner.sheet_mut(sheet)?.rows;
            let index = data_index(sheet, sheet_row, rows.len())?;
            set_cell(&mut rows[index], column, value);
            Ok(())
        })
    }

    fn append_row(&self, sheet: &str, values: &[String]) -> Result<(), StoreError> {
        self.run(StoreCall::AppendRow, sheet, |inner| {
            inner.sheet_mut(sheet)?.rows.push(values.to_vec());
            Ok(())
        })
    }

    fn delete_matching(&self, sheet: &str, expected: &[String]) -> Result<bool, StoreError> {
        self.run(StoreCall::DeleteMatching, sheet, |inner| {
            let rows = &mut inner.sheet_mut(sheet)?.rows;
            match rows.iter().position(|row| row.as_slice() == expected) {
                Some(index) => {
                    rows.remove(index);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn replace_rows(&self, sheet: &str, rows: &[Row]) -> Result<(), StoreError> {
        self.run(StoreCall::ReplaceRows, sheet, |inner| {
            inner.sheet_mut(sheet)?.rows = rows.to_vec();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn seeded() -> MemoryStore {
        MemoryStore::new().with_sheet("Stock", vec![row(&["DW100", "Parabrisas", "R1", "10", ""])])
    }

    #[test]
    fn test_missing_sheet() {
        let store = MemoryStore::new();
        assert_eq!(
            store.read_rows("Nope"),
            Err(StoreError::SheetNotFound("Nope".into()))
        );
    }

    #[test]
    fn test_update_cell_uses_sheet_rows() {
        let store = seeded();
        store.update_cell("Stock", 2, 4, "7").unwrap();
        assert_eq!(store.read_rows("Stock").unwrap()[0][3], "7");
        assert!(matches!(
            store.update_cell("Stock", 1, 4, "7"),
            Err(StoreError::RowOutOfRange { .. })
        ));
    }

    #[test]
    fn test_delete_matching_only_once() {
        let store = seeded();
        let target = row(&["DW100", "Parabrisas", "R1", "10", ""]);
        assert_eq!(store.delete_matching("Stock", &target), Ok(true));
        assert_eq!(store.delete_matching("Stock", &target), Ok(false));
    }

    #[test]
    fn test_fault_before_write_has_no_effect() {
        let store = seeded();
        store.fail_next(Some(StoreCall::AppendRow), 1, FaultMode::BeforeWrite);
        let err = store.append_row("Stock", &row(&["X"])).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(store.read_rows("Stock").unwrap().len(), 1);
        store.append_row("Stock", &row(&["X"])).unwrap();
        assert_eq!(store.read_rows("Stock").unwrap().len(), 2);
    }

    #[test]
    fn test_fault_after_write_applies_then_fails() {
        let store = seeded();
        store.fail_next(None, 1, FaultMode::AfterWrite);
        assert!(store.append_row("Stock", &row(&["X"])).is_err());
        assert_eq!(store.read_rows("Stock").unwrap().len(), 2);
        assert_eq!(store.call_count(StoreCall::AppendRow), 1);
    }

    #[test]
    fn test_fault_after_skips_matching_calls() {
        let store = seeded();
        store.fail_after(Some(StoreCall::ReadRows), 2, 1, FaultMode::BeforeWrite);
        store.append_row("Stock", &row(&["X"])).unwrap();
        assert!(store.read_rows("Stock").is_ok());
        assert!(store.read_rows("Stock").is_ok());
        assert!(store.read_rows("Stock").unwrap_err().is_transient());
        assert_eq!(store.read_rows("Stock").unwrap().len(), 2);
    }
}
