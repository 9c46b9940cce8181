//! Service boundary
//!
//! Binds an [`InventoryEngine`] to a logged-in [`Session`]. Mutating calls
//! never return `Err`: every failure becomes an [`OperationOutcome`] with
//! `success = false` and a message the operator can act on. Views return
//! `Result` since callers render data, not messages.

use std::sync::Arc;

use serde::Serialize;

use crate::auth::Session;
use crate::context::RequestContext;
use crate::engine::{
    CancelRequest, IntakeRequest, InventoryEngine, InventoryError, Receipt, ReceiveRequest,
    RelocateRequest, SaleRequest, TransferOutRequest,
};
use crate::reconcile::ReconcileReport;
use crate::schema::{MovementLogEntry, PendingTransfer, StockRecord};
use crate::views::{RackAvailability, RackContents};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    pub success: bool,
    pub message: String,
}

impl OperationOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl From<Result<Receipt, InventoryError>> for OperationOutcome {
    fn from(result: Result<Receipt, InventoryError>) -> Self {
        match result {
            Ok(receipt) => OperationOutcome::ok(receipt.message),
            Err(e) => OperationOutcome::failed(e.to_string()),
        }
    }
}

pub struct InventoryService {
    engine: Arc<InventoryEngine>,
    session: Session,
}

impl InventoryService {
    pub fn new(engine: Arc<InventoryEngine>, session: Session) -> Self {
        Self { engine, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn engine(&self) -> &InventoryEngine {
        &self.engine
    }

    fn context(&self) -> RequestContext {
        RequestContext::new(self.session.user.clone())
    }

    fn check_location(&self, location: &str) -> Result<(), InventoryError> {
        if self.session.can_access(location) {
            Ok(())
        } else {
            Err(InventoryError::AccessDenied {
                user: self.session.user.clone(),
                target: location.trim().to_string(),
            })
        }
    }

    fn check_admin(&self, what: &str) -> Result<(), InventoryError> {
        if self.session.is_admin() {
            Ok(())
        } else {
            Err(InventoryError::AccessDenied {
                user: self.session.user.clone(),
                target: what.to_string(),
            })
        }
    }

    pub fn intake(&self, req: &IntakeRequest) -> OperationOutcome {
        self.check_location(&req.location)
            .and_then(|()| self.engine.intake(&self.context(), req))
            .into()
    }

    pub fn sell(&self, req: &SaleRequest) -> OperationOutcome {
        self.check_location(&req.location)
            .and_then(|()| self.engine.sell(&self.context(), req))
            .into()
    }

    /// Only the origin needs to be accessible; any known location may receive.
    pub fn transfer_out(&self, req: &TransferOutRequest) -> OperationOutcome {
        self.check_location(&req.origin)
            .and_then(|()| self.engine.transfer_out(&self.context(), req))
            .into()
    }

    pub fn receive(&self, req: &ReceiveRequest) -> OperationOutcome {
        self.check_location(&req.destination)
            .and_then(|()| self.engine.receive(&self.context(), req))
            .into()
    }

    pub fn cancel_transfer(&self, req: &CancelRequest) -> OperationOutcome {
        self.check_location(&req.origin)
            .and_then(|()| self.engine.cancel_transfer(&self.context(), req))
            .into()
    }

    pub fn relocate(&self, req: &RelocateRequest) -> OperationOutcome {
        self.check_location(&req.location)
            .and_then(|()| self.engine.relocate(&self.context(), req))
            .into()
    }

    /// Admin only; see [`InventoryEngine::reconcile_duplicates`].
    pub fn reconcile_duplicates(&self, location: &str) -> OperationOutcome {
        let result = self
            .check_admin("the duplicate reconciler")
            .and_then(|()| self.engine.reconcile_duplicates(&self.context(), location));
        match result {
            Ok(ReconcileReport {
                location,
                rows_removed: 0,
                ..
            }) => OperationOutcome::ok(format!("No duplicate rows found at {location}.")),
            Ok(report) => OperationOutcome::ok(format!(
                "Removed {} duplicate row(s) at {}; {} row(s) remain.",
                report.rows_removed,
                report.location,
                report.rows_before - report.rows_removed
            )),
            Err(e) => OperationOutcome::failed(e.to_string()),
        }
    }

    pub fn stock(&self, location: &str) -> Result<Vec<StockRecord>, InventoryError> {
        self.check_location(location)?;
        self.engine.stock(location)
    }

    pub fn racks_for_key(
        &self,
        location: &str,
        key: &str,
    ) -> Result<Vec<RackAvailability>, InventoryError> {
        self.check_location(location)?;
        self.engine.racks_for_key(location, key)
    }

    pub fn racks(&self, location: &str) -> Result<Vec<String>, InventoryError> {
        self.check_location(location)?;
        self.engine.racks(location)
    }

    pub fn rack_contents(
        &self,
        location: &str,
        rack: &str,
    ) -> Result<RackContents, InventoryError> {
        self.check_location(location)?;
        self.engine.rack_contents(location, rack)
    }

    pub fn incoming_transfers(
        &self,
        location: &str,
    ) -> Result<Vec<PendingTransfer>, InventoryError> {
        self.check_location(location)?;
        self.engine.incoming_transfers(location)
    }

    pub fn outgoing_transfers(
        &self,
        location: &str,
    ) -> Result<Vec<PendingTransfer>, InventoryError> {
        self.check_location(location)?;
        self.engine.outgoing_transfers(location)
    }

    /// A pending transfer this session is a party to.
    pub fn find_pending(
        &self,
        created_at: &str,
        key: &str,
    ) -> Result<Option<PendingTransfer>, InventoryError> {
        Ok(self.engine.find_pending(created_at, key)?.filter(|t| {
            self.session.can_access(&t.origin) || self.session.can_access(&t.destination)
        }))
    }

    pub fn movement_log(&self) -> Result<Vec<MovementLogEntry>, InventoryError> {
        self.check_admin("the movement log")?;
        self.engine.movement_log()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::config::SheetsConfig;
    use crate::retry::RetryPolicy;
    use crate::store::MemoryStore;
    use rust_decimal::Decimal;

    fn service(role: Role, location: Option<&str>) -> InventoryService {
        let engine = InventoryEngine::new(Arc::new(MemoryStore::new()), SheetsConfig::default())
            .with_retry(RetryPolicy::immediate(3));
        engine.initialize().unwrap();
        InventoryService::new(
            Arc::new(engine),
            Session {
                user: "tester".into(),
                role,
                assigned_location: location.map(str::to_string),
            },
        )
    }

    fn intake(location: &str) -> IntakeRequest {
        IntakeRequest {
            location: location.into(),
            key: "DW100".into(),
            display_name: "Parabrisas".into(),
            rack: "R1".into(),
            quantity: 2,
        }
    }

    #[test]
    fn test_user_is_limited_to_assigned_location() {
        let svc = service(Role::User, Some("Inventario_Suc1"));
        assert!(svc.intake(&intake("Inventario_Suc1")).success);
        let denied = svc.intake(&intake("Inventario_Suc2"));
        assert!(!denied.success);
        assert!(denied.message.contains("not allowed"));
        assert!(svc.stock("Inventario_Suc2").is_err());
    }

    #[test]
    fn test_failures_become_messages() {
        let svc = service(Role::Admin, None);
        let outcome = svc.sell(&SaleRequest {
            location: "Inventario_Suc1".into(),
            key: "DW100".into(),
            rack: "R1".into(),
            detail: "Público".into(),
            quantity: 1,
            price: Decimal::new(500, 0),
        });
        assert!(!outcome.success);
        assert!(outcome.message.contains("not found in rack R1"));
    }

    #[test]
    fn test_admin_only_operations() {
        let user = service(Role::User, Some("Inventario_Suc1"));
        assert!(!user.reconcile_duplicates("Inventario_Suc1").success);
        assert!(matches!(
            user.movement_log(),
            Err(InventoryError::AccessDenied { .. })
        ));

        let admin = service(Role::Admin, None);
        let outcome = admin.reconcile_duplicates("Inventario_Suc1");
        assert!(outcome.success);
        assert!(outcome.message.contains("No duplicate rows"));
        assert!(admin.movement_log().unwrap().is_empty());
    }
}
