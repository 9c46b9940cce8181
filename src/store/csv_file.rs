//! File-backed [`TableStore`]: one CSV file per sheet.
//!
//! Each file holds the header row followed by the data rows, the same shape
//! as an exported spreadsheet tab. Writes rewrite the whole file through a
//! temporary file and a rename, so a crash leaves either the old or the new
//! contents.
//!
//! Every operator session is its own process, so writers are serialized with
//! an advisory lock on `.stockguard.lock` in the sheet directory: exclusive
//! around each load-modify-save, shared around reads.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tempfile::NamedTempFile;

use super::{data_index, observe, set_cell, Row, StoreCall, StoreError, TableStore};

const LOCK_FILE: &str = ".stockguard.lock";

pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    /// Open (and create if needed) the directory holding the sheet files.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, sheet: &str) -> PathBuf {
        self.dir.join(format!("{sheet}.csv"))
    }

    /// Lock the whole directory. The lock is released when the file drops.
    fn lock(&self, exclusive: bool) -> Result<File, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.dir.join(LOCK_FILE))?;
        if exclusive {
            FileExt::lock_exclusive(&file)?;
        } else {
            FileExt::lock_shared(&file)?;
        }
        Ok(file)
    }

    /// Header plus data rows.
    fn load(&self, sheet: &str) -> Result<(Row, Vec<Row>), StoreError> {
        let path = self.path_for(sheet);
        if !path.exists() {
            return Err(StoreError::SheetNotFound(sheet.to_string()));
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)
            .map_err(csv_error)?;

        let mut records = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            records.push(record.iter().map(str::to_string).collect::<Row>());
        }
        let mut records = records.into_iter();
        let header = records.next().unwrap_or_default();
        Ok((header, records.collect()))
    }

    /// Caller holds the exclusive lock.
    fn save(&self, sheet: &str, header: &Row, rows: &[Row]) -> Result<(), StoreError> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = csv::WriterBuilder::new()
                .flexible(true)
                .from_writer(tmp.as_file_mut());
            writer.write_record(header).map_err(csv_error)?;
            for row in rows {
                // A zero-length record would vanish from the file.
                if row.is_empty() {
                    writer.write_record([""]).map_err(csv_error)?;
                } else {
                    writer.write_record(row).map_err(csv_error)?;
                }
            }
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(sheet))
            .map_err(|e| StoreError::from(e.error))?;
        Ok(())
    }

    fn modify<T>(
        &self,
        sheet: &str,
        f: impl FnOnce(&mut Vec<Row>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _lock = self.lock(true)?;
        let (header, mut rows) = self.load(sheet)?;
        let out = f(&mut rows)?;
        self.save(sheet, &header, &rows)?;
        Ok(out)
    }
}

fn csv_error(err: csv::Error) -> StoreError {
    match err.into_kind() {
        csv::ErrorKind::Io(io) => io.into(),
        other => StoreError::Backend(format!("csv: {other:?}")),
    }
}

impl TableStore for CsvStore {
    fn ensure_sheet(&self, sheet: &str, header: &[&str]) -> Result<(), StoreError> {
        observe(StoreCall::EnsureSheet, sheet, || {
            let _lock = self.lock(true)?;
            if self.path_for(sheet).exists() {
                return Ok(());
            }
            let header: Row = header.iter().map(|h| h.to_string()).collect();
            self.save(sheet, &header, &[])
        })
    }

    fn read_rows(&self, sheet: &str) -> Result<Vec<Row>, StoreError> {
        observe(StoreCall::ReadRows, sheet, || {
            let _lock = self.lock(false)?;
            self.load(sheet).map(|(_, rows)| rows)
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
            self.modify(sheet, |rows| {
                let index = data_index(sheet, sheet_row, rows.len())?;
                set_cell(&mut rows[index], column, value);
                Ok(())
            })
        })
    }

    fn append_row(&self, sheet: &str, values: &[String]) -> Result<(), StoreError> {
        observe(StoreCall::AppendRow, sheet, || {
            self.modify(sheet, |rows| {
                rows.push(values.to_vec());
                Ok(())
            })
        })
    }

    fn delete_matching(&self, sheet: &str, expected: &[String]) -> Result<bool, StoreError> {
        observe(StoreCall::DeleteMatching, sheet, || {
            self.modify(sheet, |rows| {
                match rows.iter().position(|row| row.as_slice() == expected) {
                    Some(index) => {
                        rows.remove(index);
                        Ok(true)
                    }
                    None => Ok(false),
                }
            })
        })
    }

    fn replace_rows(&self, sheet: &str, new_rows: &[Row]) -> Result<(), StoreError> {
        observe(StoreCall::ReplaceRows, sheet, || {
            self.modify(sheet, |rows| {
                *rows = new_rows.to_vec();
                Ok(())
            })
        })
    }
}
