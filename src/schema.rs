//! Sheet layouts and typed records.
//!
//! Column positions are part of the external contract: other tools write
//! quantity and timestamp cells by numeric offset, so the order below must not
//! change. All positions are 1-based like the sheets themselves.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::normalize::normalize;

/// Header rows above the first data row in every sheet.
pub const HEADER_ROWS: usize = 1;

/// Timestamp format used in every `FECHA` cell.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Per-location stock sheet columns.
pub mod stock_columns {
    pub const KEY: usize = 1;
    pub const NAME: usize = 2;
    pub const RACK: usize = 3;
    pub const QUANTITY: usize = 4;
    pub const UPDATED_AT: usize = 5;

    pub const HEADER: [&str; 5] = ["CLAVE", "NOMBRE", "RACK", "CANTIDAD", "FECHA"];
}

/// Pending-transfer sheet columns.
pub mod pending_columns {
    pub const CREATED_AT: usize = 1;
    pub const KEY: usize = 2;
    pub const NAME: usize = 3;
    pub const QUANTITY: usize = 4;
    pub const ORIGIN: usize = 5;
    pub const DESTINATION: usize = 6;

    pub const HEADER: [&str; 6] = ["FECHA", "CLAVE", "NOMBRE", "CANTIDAD", "ORIGEN", "DESTINO"];
}

/// Movement-log sheet columns.
pub mod movement_columns {
    pub const AT: usize = 1;
    pub const KEY: usize = 2;
    pub const KIND: usize = 3;
    pub const DETAIL: usize = 4;
    pub const QUANTITY: usize = 5;
    pub const PRICE: usize = 6;
    pub const OPERATOR: usize = 7;
    pub const LOCATION: usize = 8;

    pub const HEADER: [&str; 8] = [
        "FECHA", "CLAVE", "TIPO", "DETALLE", "CANTIDAD", "PRECIO", "USUARIO", "UBICACION",
    ];
}

/// Sheet row number (header included) for a 1-based data position.
pub fn sheet_row(data_position: usize) -> usize {
    data_position + HEADER_ROWS
}

/// Format a timestamp the way the sheets store it.
pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Read a 1-based cell, treating short rows as empty cells.
pub fn cell(row: &[String], column: usize) -> &str {
    column
        .checked_sub(1)
        .and_then(|index| row.get(index))
        .map(String::as_str)
        .unwrap_or("")
}

/// Coerce a quantity cell to an integer.
///
/// Sheets hand back numbers as text, sometimes with a decimal part (`"7.0"`).
/// Missing or non-numeric cells count as zero.
pub fn parse_quantity(raw: &str) -> i64 {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return value;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => value.trunc() as i64,
        _ => 0,
    }
}

fn parse_price(raw: &str) -> Decimal {
    Decimal::from_str(raw.trim()).unwrap_or(Decimal::ZERO)
}

/// One row of a location's stock sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub key: String,
    pub display_name: String,
    pub rack: String,
    pub quantity: i64,
    /// Raw `FECHA` cell; historical rows are not guaranteed to parse.
    pub last_updated: String,
}

impl StockRecord {
    /// Build a record from raw cells, normalizing key and rack.
    pub fn from_row(row: &[String]) -> Self {
        Self {
            key: normalize(cell(row, stock_columns::KEY)),
            display_name: cell(row, stock_columns::NAME).trim().to_string(),
            rack: normalize(cell(row, stock_columns::RACK)),
            quantity: parse_quantity(cell(row, stock_columns::QUANTITY)),
            last_updated: cell(row, stock_columns::UPDATED_AT).to_string(),
        }
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.key.clone(),
            self.display_name.clone(),
            self.rack.clone(),
            self.quantity.to_string(),
            self.last_updated.clone(),
        ]
    }
}

/// Stock in transit between two locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransfer {
    pub created_at: String,
    pub key: String,
    pub display_name: String,
    pub quantity: i64,
    pub origin: String,
    pub destination: String,
}

impl PendingTransfer {
    pub fn from_row(row: &[String]) -> Self {
        Self {
            created_at: cell(row, pending_columns::CREATED_AT).trim().to_string(),
            key: normalize(cell(row, pending_columns::KEY)),
            display_name: cell(row, pending_columns::NAME).trim().to_string(),
            quantity: parse_quantity(cell(row, pending_columns::QUANTITY)),
            origin: cell(row, pending_columns::ORIGIN).trim().to_string(),
            destination: cell(row, pending_columns::DESTINATION).trim().to_string(),
        }
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.created_at.clone(),
            self.key.clone(),
            self.display_name.clone(),
            self.quantity.to_string(),
            self.origin.clone(),
            self.destination.clone(),
        ]
    }

    /// Identity used to re-validate a transfer: creation timestamp plus key.
    pub fn same_transfer(&self, other: &PendingTransfer) -> bool {
        self.created_at == other.created_at && self.key == normalize(&other.key)
    }
}

/// Kind of stock movement recorded in the movement log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    Intake,
    Sale,
    TransferOut,
    TransferIn,
    Relocation,
    TransferCancel,
}

impl OperationType {
    pub fn label(&self) -> &'static str {
        match self {
            OperationType::Intake => "Intake",
            OperationType::Sale => "Sale",
            OperationType::TransferOut => "TransferOut",
            OperationType::TransferIn => "TransferIn",
            OperationType::Relocation => "Relocation",
            OperationType::TransferCancel => "TransferCancel",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Older movement rows carry the original Spanish labels.
        match s.trim() {
            "Intake" | "Alta" => Ok(OperationType::Intake),
            "Sale" | "Venta/Instalación" => Ok(OperationType::Sale),
            "TransferOut" | "Envío Traslado" => Ok(OperationType::TransferOut),
            "TransferIn" | "Recepción Traslado" => Ok(OperationType::TransferIn),
            "Relocation" | "Reubicación" => Ok(OperationType::Relocation),
            "TransferCancel" | "Cancelación Traslado" => Ok(OperationType::TransferCancel),
            other => Err(format!("unknown movement type '{other}'")),
        }
    }
}

/// Append-only audit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementLogEntry {
    pub at: String,
    pub key: String,
    /// `None` when the stored label is not recognized.
    pub kind: Option<OperationType>,
    pub detail: String,
    pub quantity: i64,
    pub price: Decimal,
    pub operator: String,
    pub location: String,
}

impl MovementLogEntry {
    pub fn from_row(row: &[String]) -> Self {
        Self {
            at: cell(row, movement_columns::AT).trim().to_string(),
            key: normalize(cell(row, movement_columns::KEY)),
            kind: cell(row, movement_columns::KIND).parse().ok(),
            detail: cell(row, movement_columns::DETAIL).to_string(),
            quantity: parse_quantity(cell(row, movement_columns::QUANTITY)),
            price: parse_price(cell(row, movement_columns::PRICE)),
            operator: cell(row, movement_columns::OPERATOR).trim().to_string(),
            location: cell(row, movement_columns::LOCATION).trim().to_string(),
        }
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.at.clone(),
            self.key.clone(),
            self.kind.map(|k| k.label().to_string()).unwrap_or_default(),
            self.detail.clone(),
            self.quantity.to_string(),
            self.price.normalize().to_string(),
            self.operator.clone(),
            self.location.clone(),
        ]
    }
}
