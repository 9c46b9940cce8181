//! Operation Engine
//!
//! The six business operations as compositions of locator and mutator calls
//! plus ledger writes. Every store step runs under the retry policy. The
//! store has no transactions, so multi-row operations compensate on failure:
//!
//! - transfer out: a failed pending append re-credits the origin rack
//! - relocate: a failed destination credit re-credits the source rack
//! - receive / cancel: the pending row is claimed (deleted) first, and put
//!   back if crediting stock fails
//!
//! A failed step is re-read before it is undone, since its write may have
//! landed with only the confirmation lost. If it landed the operation goes
//! on as if it had succeeded.
//!
//! A movement-log append that fails after the stock change leaves the change
//! in place; the receipt says the audit entry is missing. A compensation that
//! fails itself surfaces as [`InventoryError::PartialFailure`].

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::{SheetsConfig, StockguardConfig};
use crate::context::{Clock, RequestContext, SystemClock};
use crate::ledger::Ledger;
use crate::locator::locate;
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;
use crate::mutator::{apply_delta, DeltaOutcome};
use crate::retry::RetryPolicy;
use crate::schema::{
    movement_columns, pending_columns, stock_columns, MovementLogEntry, OperationType,
    PendingTransfer,
};
use crate::store::TableStore;

mod error;
mod operations;

pub use error::InventoryError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeRequest {
    pub location: String,
    pub key: String,
    pub display_name: String,
    pub rack: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRequest {
    pub location: String,
    pub key: String,
    pub rack: String,
    /// Customer or job reference
    pub detail: String,
    pub quantity: i64,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutRequest {
    pub origin: String,
    pub key: String,
    pub rack: String,
    pub quantity: i64,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveRequest {
    pub destination: String,
    /// The caller's copy; it is re-validated against the pending sheet.
    pub transfer: PendingTransfer,
    pub rack: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocateRequest {
    pub location: String,
    pub key: String,
    /// Used when the destination rack row has to be created; blank keeps the
    /// source row's name.
    pub display_name: String,
    pub rack_from: String,
    pub rack_to: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRequest {
    pub origin: String,
    pub transfer: PendingTransfer,
    pub return_rack: String,
}

/// Result of a completed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub message: String,
    /// False when the stock change happened but its movement entry is missing.
    pub audit_recorded: bool,
}

impl Receipt {
    fn new(message: String, audit_recorded: bool) -> Self {
        let message = if audit_recorded {
            message
        } else {
            format!("{message} The movement log entry could not be written.")
        };
        Self {
            message,
            audit_recorded,
        }
    }
}

pub struct InventoryEngine {
    store: Arc<dyn TableStore>,
    clock: Arc<dyn Clock>,
    sheets: SheetsConfig,
    retry: RetryPolicy,
    record_intake: bool,
}

impl InventoryEngine {
    pub fn new(store: Arc<dyn TableStore>, sheets: SheetsConfig) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            sheets,
            retry: RetryPolicy::default(),
            record_intake: false,
        }
    }

    pub fn from_config(store: Arc<dyn TableStore>, config: &StockguardConfig) -> Self {
        Self::new(store, config.sheets.clone())
            .with_retry(config.retry.policy())
            .with_intake_ledger(config.ledger.record_intake)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Also write an `Intake` movement for plain intake.
    pub fn with_intake_ledger(mut self, record_intake: bool) -> Self {
        self.record_intake = record_intake;
        self
    }

    pub fn sheets(&self) -> &SheetsConfig {
        &self.sheets
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Create any missing sheet with its header.
    pub fn initialize(&self) -> Result<(), InventoryError> {
        for location in &self.sheets.locations {
            self.retry.run("create stock sheet", || {
                Ok(self.store.ensure_sheet(location, &stock_columns::HEADER)?)
            })?;
        }
        self.retry.run("create pending sheet", || {
            Ok(self
                .store
                .ensure_sheet(&self.sheets.pending, &pending_columns::HEADER)?)
        })?;
        self.retry.run("create movement sheet", || {
            Ok(self
                .store
                .ensure_sheet(&self.sheets.movements, &movement_columns::HEADER)?)
        })?;
        log::info!(
            "sheets ready: {} location(s), '{}', '{}'",
            self.sheets.locations.len(),
            self.sheets.pending,
            self.sheets.movements
        );
        Ok(())
    }

    pub(crate) fn store(&self) -> &dyn TableStore {
        &*self.store
    }

    pub(crate) fn ledger(&self) -> Ledger<'_> {
        Ledger::new(&*self.store, &self.sheets.pending, &self.sheets.movements)
    }

    pub(crate) fn require_location(&self, location: &str) -> Result<(), InventoryError> {
        if self.sheets.is_location(location) {
            Ok(())
        } else {
            Err(InventoryError::validation(format!(
                "Unknown location '{}'. Known locations: {}.",
                location.trim(),
                self.sheets.locations.join(", ")
            )))
        }
    }

    /// Span, metrics and one log line around an operation.
    pub(crate) fn observe<T>(
        &self,
        operation: &'static str,
        location: &str,
        ctx: &RequestContext,
        f: impl FnOnce() -> Result<T, InventoryError>,
    ) -> Result<T, InventoryError> {
        #[cfg(feature = "tracing")]
        let _span =
            tracing_helpers::operation_span(operation, location, &ctx.request_id.to_string())
                .entered();

        let result = f();

        #[cfg(feature = "metrics")]
        METRICS.record_operation(operation, result.is_ok());

        match &result {
            Ok(_) => log::info!(
                "[{}] {operation} by {} at {location}: ok",
                ctx.request_id,
                ctx.operator
            ),
            Err(e) => log::warn!(
                "[{}] {operation} by {} at {location} failed ({}): {e}",
                ctx.request_id,
                ctx.operator,
                e.kind()
            ),
        }
        result
    }

    /// One mutator call under the retry policy.
    #[allow(clippy::too_many_arguments)]
    fn delta(
        &self,
        step: &str,
        location: &str,
        key: &str,
        rack: &str,
        display_name: &str,
        delta: i64,
        now: &str,
    ) -> Result<DeltaOutcome, InventoryError> {
        self.retry.run(step, || {
            apply_delta(&*self.store, location, key, rack, display_name, delta, now)
        })
    }

    /// Append a movement entry; a failure is logged, never propagated.
    fn record_movement(&self, ctx: &RequestContext, entry: MovementLogEntry) -> bool {
        match self
            .retry
            .run("append movement", || self.ledger().append_movement(&entry))
        {
            Ok(()) => true,
            Err(e) => {
                log::error!(
                    "[{}] movement entry lost for {} {:?} x{} at {}: {e}",
                    ctx.request_id,
                    entry.key,
                    entry.kind,
                    entry.quantity,
                    entry.location
                );
                false
            }
        }
    }

    /// Undo an applied step after `failure`. Returns the error to report.
    fn compensate(
        &self,
        operation: &'static str,
        failure: InventoryError,
        applied: String,
        undo: impl FnOnce() -> Result<(), InventoryError>,
    ) -> InventoryError {
        #[cfg(feature = "metrics")]
        METRICS.record_compensation(operation);

        log::warn!("{operation}: {failure} Undoing: {applied}.");
        match undo() {
            Ok(()) => {
                log::info!("{operation}: undone: {applied}");
                failure
            }
            Err(undo_err) => {
                log::error!("{operation}: could not undo '{applied}': {undo_err}");
                InventoryError::PartialFailure {
                    applied: format!("{applied} (undoing it also failed: {undo_err})"),
                    failure: Box::new(failure),
                }
            }
        }
    }

    /// Decide what a step reported as failed actually did before undoing
    /// anything.
    ///
    /// `landed` re-reads the store: `Some` means the step took effect and
    /// only its confirmation was lost, `None` means it never happened and
    /// `undo` runs. When the store cannot be re-read nothing is undone and
    /// the outcome is reported as a [`InventoryError::PartialFailure`].
    fn settle<T>(
        &self,
        operation: &'static str,
        failure: InventoryError,
        applied: String,
        landed: impl FnOnce() -> Result<Option<T>, InventoryError>,
        undo: impl FnOnce() -> Result<(), InventoryError>,
    ) -> Result<T, InventoryError> {
        match landed() {
            Ok(Some(value)) => {
                log::warn!("{operation}: {failure} The write landed anyway; continuing.");
                Ok(value)
            }
            Ok(None) => Err(self.compensate(operation, failure, applied, undo)),
            Err(check) => {
                log::error!("{operation}: could not tell whether the failed step landed: {check}");
                Err(InventoryError::PartialFailure {
                    applied: format!(
                        "{applied} (the next step may or may not have been written: {check})"
                    ),
                    failure: Box::new(failure),
                })
            }
        }
    }

    /// Current quantity of (key, rack), zero when no row exists.
    fn stock_level(&self, location: &str, key: &str, rack: &str) -> Result<i64, InventoryError> {
        let rows = self
            .retry
            .run("read stock level", || Ok(self.store.read_rows(location)?))?;
        Ok(locate(&rows, key, rack).map_or(0, |found| found.quantity))
    }

    /// Whether a credit of `quantity` reported as failed reached (key, rack)
    /// anyway, judged against the level read before the credit.
    fn credit_landed(
        &self,
        location: &str,
        key: &str,
        rack: &str,
        before: i64,
        quantity: i64,
    ) -> Result<Option<DeltaOutcome>, InventoryError> {
        let rows = self
            .retry
            .run("verify stock credit", || Ok(self.store.read_rows(location)?))?;
        let Some(found) = locate(&rows, key, rack) else {
            return Ok(None);
        };
        match before.checked_add(quantity) {
            Some(expected) if found.quantity >= expected => Ok(Some(DeltaOutcome {
                key: found.record.key,
                rack: found.record.rack,
                display_name: found.record.display_name,
                previous: found.quantity - quantity,
                resulting: found.quantity,
                created: before == 0,
            })),
            _ => Ok(None),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn movement(
        &self,
        ctx: &RequestContext,
        at: &str,
        location: &str,
        key: &str,
        kind: OperationType,
        detail: String,
        quantity: i64,
        price: Decimal,
    ) -> MovementLogEntry {
        MovementLogEntry {
            at: at.to_string(),
            key: key.to_string(),
            kind: Some(kind),
            detail,
            quantity,
            price,
            operator: ctx.operator.clone(),
            location: location.trim().to_string(),
        }
    }
}

fn require_positive(quantity: i64) -> Result<(), InventoryError> {
    if quantity <= 0 {
        return Err(InventoryError::validation(format!(
            "Quantity must be greater than zero (got {quantity})."
        )));
    }
    Ok(())
}

fn require_field(name: &str, value: &str) -> Result<(), InventoryError> {
    if value.trim().is_empty() {
        return Err(InventoryError::validation(format!("{name} is required.")));
    }
    Ok(())
}
