//! Inventory scenarios over the in-memory and CSV stores.
//!
//! These exercise whole operations end to end: stock rows, the pending
//! transfer sheet and the movement log together, under injected store
//! failures and concurrent sessions.

use std::sync::Arc;

use chrono::NaiveDate;
use fake::faker::lorem::en::Word;
use fake::Fake;
use rand::seq::SliceRandom;
use rust_decimal::Decimal;
use stockguard::config::SheetsConfig;
use stockguard::store::{FaultMode, StoreCall};
use stockguard::{
    CancelRequest, CsvStore, FixedClock, IntakeRequest, InventoryEngine, InventoryError,
    MemoryStore, OperationType, PendingTransfer, ReceiveRequest, RelocateRequest, RequestContext,
    RetryPolicy, SaleRequest, TableStore, TransferOutRequest,
};

const SUC_A: &str = "Inventario_Suc1";
const SUC_B: &str = "Inventario_Suc2";
const SUC_C: &str = "Inventario_Suc3";

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap(),
    ))
}

fn setup() -> (Arc<MemoryStore>, Arc<FixedClock>, InventoryEngine) {
    let store = Arc::new(MemoryStore::new());
    let clock = clock();
    let engine = InventoryEngine::new(store.clone(), SheetsConfig::default())
        .with_clock(clock.clone())
        .with_retry(RetryPolicy::immediate(3));
    engine.initialize().unwrap();
    (store, clock, engine)
}

fn ctx() -> RequestContext {
    RequestContext::new("sucursal1")
}

fn intake(engine: &InventoryEngine, location: &str, key: &str, rack: &str, quantity: i64) {
    engine
        .intake(
            &ctx(),
            &IntakeRequest {
                location: location.into(),
                key: key.into(),
                display_name: "Windshield".into(),
                rack: rack.into(),
                quantity,
            },
        )
        .unwrap();
}

fn sale(key: &str, rack: &str, quantity: i64) -> SaleRequest {
    SaleRequest {
        location: SUC_A.into(),
        key: key.into(),
        rack: rack.into(),
        detail: "Public".into(),
        quantity,
        price: Decimal::new(500, 0),
    }
}

fn transfer_out(quantity: i64) -> TransferOutRequest {
    TransferOutRequest {
        origin: SUC_A.into(),
        key: "DW100".into(),
        rack: "R1".into(),
        quantity,
        destination: SUC_B.into(),
    }
}

fn quantity(engine: &InventoryEngine, location: &str, key: &str, rack: &str) -> Option<i64> {
    engine
        .rack_contents(location, rack)
        .unwrap()
        .records
        .into_iter()
        .find(|r| r.key == key)
        .map(|r| r.quantity)
}

fn only_pending(engine: &InventoryEngine) -> PendingTransfer {
    let mut pending = engine.incoming_transfers(SUC_B).unwrap();
    assert_eq!(pending.len(), 1);
    pending.remove(0)
}

#[test]
fn test_end_to_end_scenario() {
    let (_store, _clock, engine) = setup();

    intake(&engine, SUC_A, "DW100", "R1", 10);
    let stock = engine.stock(SUC_A).unwrap();
    assert_eq!(stock.len(), 1);
    assert_eq!(
        (stock[0].key.as_str(), stock[0].rack.as_str(), stock[0].quantity),
        ("DW100", "R1", 10)
    );

    engine.sell(&ctx(), &sale("DW100", "R1", 3)).unwrap();
    assert_eq!(quantity(&engine, SUC_A, "DW100", "R1"), Some(7));
    let log = engine.movement_log().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind, Some(OperationType::Sale));
    assert_eq!(log[0].quantity, 3);
    assert_eq!(log[0].price, Decimal::new(500, 0));

    engine.transfer_out(&ctx(), &transfer_out(4)).unwrap();
    assert_eq!(quantity(&engine, SUC_A, "DW100", "R1"), Some(3));
    let transfer = only_pending(&engine);
    assert_eq!(transfer.key, "DW100");
    assert_eq!(transfer.quantity, 4);
    assert_eq!(transfer.origin, SUC_A);
    assert_eq!(transfer.destination, SUC_B);

    engine
        .receive(
            &ctx(),
            &ReceiveRequest {
                destination: SUC_B.into(),
                transfer,
                rack: "R5".into(),
            },
        )
        .unwrap();
    assert_eq!(quantity(&engine, SUC_B, "DW100", "R5"), Some(4));
    assert!(engine.incoming_transfers(SUC_B).unwrap().is_empty());
}

#[test]
fn test_transfer_round_trip_logs_both_sides() {
    let (_store, _clock, engine) = setup();
    intake(&engine, SUC_A, "DW100", "R1", 8);

    engine.transfer_out(&ctx(), &transfer_out(5)).unwrap();
    let transfer = only_pending(&engine);
    engine
        .receive(
            &ctx(),
            &ReceiveRequest {
                destination: SUC_B.into(),
                transfer,
                rack: "R2".into(),
            },
        )
        .unwrap();

    assert_eq!(quantity(&engine, SUC_A, "DW100", "R1"), Some(3));
    assert_eq!(quantity(&engine, SUC_B, "DW100", "R2"), Some(5));
    assert!(engine.outgoing_transfers(SUC_A).unwrap().is_empty());
    let kinds: Vec<_> = engine
        .movement_log()
        .unwrap()
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![Some(OperationType::TransferOut), Some(OperationType::TransferIn)]
    );
}

#[test]
fn test_repeated_intake_never_duplicates_rows() {
    let (_store, _clock, engine) = setup();
    let racks = ["R1", "R2", "R3"];
    let mut rng = rand::thread_rng();
    let keys: Vec<String> = (0..4).map(|_| Word().fake::<String>()).collect();

    for _ in 0..30 {
        let key = keys.choose(&mut rng).unwrap();
        let rack = racks.choose(&mut rng).unwrap();
        // Operators type keys in any case and spacing.
        let typed = format!("  {} ", key.to_lowercase());
        intake(&engine, SUC_A, &typed, &rack.to_lowercase(), 1);
    }

    let stock = engine.stock(SUC_A).unwrap();
    let mut pairs: Vec<_> = stock.iter().map(|r| (r.key.clone(), r.rack.clone())).collect();
    let total: i64 = stock.iter().map(|r| r.quantity).sum();
    pairs.sort();
    pairs.dedup();
    assert_eq!(pairs.len(), stock.len());
    assert_eq!(total, 30);
}

#[test]
fn test_oversell_fails_without_writing() {
    let (store, _clock, engine) = setup();
    intake(&engine, SUC_A, "DW100", "R1", 2);
    let writes = store.write_count();

    let err = engine.sell(&ctx(), &sale("DW100", "R1", 3)).unwrap_err();
    assert!(matches!(
        err,
        InventoryError::InsufficientStock { available: 2, requested: 3, .. }
    ));
    let err = engine.transfer_out(&ctx(), &transfer_out(3)).unwrap_err();
    assert!(matches!(err, InventoryError::InsufficientStock { .. }));

    assert_eq!(store.write_count(), writes);
    assert_eq!(quantity(&engine, SUC_A, "DW100", "R1"), Some(2));
    assert!(engine.movement_log().unwrap().is_empty());
}

#[test]
fn test_validation_errors() {
    let (_store, _clock, engine) = setup();
    intake(&engine, SUC_A, "DW100", "R1", 2);

    let zero = engine.sell(&ctx(), &sale("DW100", "R1", 0)).unwrap_err();
    assert!(matches!(zero, InventoryError::Validation(_)));

    let mut same = transfer_out(1);
    same.destination = format!(" {SUC_A} ");
    assert!(matches!(
        engine.transfer_out(&ctx(), &same),
        Err(InventoryError::Validation(_))
    ));

    let relocate = RelocateRequest {
        location: SUC_A.into(),
        key: "DW100".into(),
        display_name: String::new(),
        rack_from: "r1".into(),
        rack_to: " R1".into(),
        quantity: 1,
    };
    let err = engine.relocate(&ctx(), &relocate).unwrap_err();
    assert!(err.to_string().contains("both R1"));
}

#[test]
fn test_relocate_moves_between_racks() {
    let (_store, _clock, engine) = setup();
    intake(&engine, SUC_A, "DW100", "R1", 6);

    let receipt = engine
        .relocate(
            &ctx(),
            &RelocateRequest {
                location: SUC_A.into(),
                key: "DW100".into(),
                display_name: String::new(),
                rack_from: "R1".into(),
                rack_to: "R7".into(),
                quantity: 4,
            },
        )
        .unwrap();
    assert!(receipt.audit_recorded);
    assert_eq!(quantity(&engine, SUC_A, "DW100", "R1"), Some(2));
    assert_eq!(quantity(&engine, SUC_A, "DW100", "R7"), Some(4));
    let moved = engine.rack_contents(SUC_A, "R7").unwrap();
    assert_eq!(moved.records[0].display_name, "Windshield");
    assert_eq!(
        engine.movement_log().unwrap()[0].kind,
        Some(OperationType::Relocation)
    );
}

#[test]
fn test_cancel_returns_stock_and_blocks_receive() {
    let (_store, _clock, engine) = setup();
    intake(&engine, SUC_A, "DW100", "R1", 5);
    engine.transfer_out(&ctx(), &transfer_out(5)).unwrap();
    let transfer = only_pending(&engine);

    engine
        .cancel_transfer(
            &ctx(),
            &CancelRequest {
                origin: SUC_A.into(),
                transfer: transfer.clone(),
                return_rack: "R9".into(),
            },
        )
        .unwrap();
    assert_eq!(quantity(&engine, SUC_A, "DW100", "R1"), Some(0));
    assert_eq!(quantity(&engine, SUC_A, "DW100", "R9"), Some(5));

    // The destination still holds the stale record.
    let err = engine
        .receive(
            &ctx(),
            &ReceiveRequest {
                destination: SUC_B.into(),
                transfer,
                rack: "R1".into(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, InventoryError::AlreadyResolved { .. }));
    assert_eq!(engine.stock(SUC_B).unwrap().len(), 0);
}

#[test]
fn test_receive_and_cancel_race_resolves_once() {
    let (_store, clock, engine) = setup();
    let engine = Arc::new(engine);
    intake(&engine, SUC_A, "DW100", "R1", 10);

    for round in 0..10 {
        clock.advance_secs(1);
        engine.transfer_out(&ctx(), &transfer_out(1)).unwrap();
        let transfer = only_pending(&engine);

        let receiving = {
            let engine = engine.clone();
            let transfer = transfer.clone();
            may::go!(move || {
                engine.receive(
                    &RequestContext::new("sucursal2"),
                    &ReceiveRequest {
                        destination: SUC_B.into(),
                        transfer,
                        rack: "R1".into(),
                    },
                )
            })
        };
        let cancelling = {
            let engine = engine.clone();
            may::go!(move || {
                engine.cancel_transfer(
                    &RequestContext::new("sucursal1"),
                    &CancelRequest {
                        origin: SUC_A.into(),
                        transfer,
                        return_rack: "R1".into(),
                    },
                )
            })
        };
        let received = receiving.join().unwrap();
        let cancelled = cancelling.join().unwrap();

        assert!(
            received.is_ok() ^ cancelled.is_ok(),
            "round {round}: exactly one side must win"
        );
        let loser = if received.is_ok() { cancelled } else { received };
        assert!(matches!(loser, Err(InventoryError::AlreadyResolved { .. })));
        assert!(engine.incoming_transfers(SUC_B).unwrap().is_empty());

        let a = quantity(&engine, SUC_A, "DW100", "R1").unwrap_or(0);
        let b = quantity(&engine, SUC_B, "DW100", "R1").unwrap_or(0);
        assert_eq!(a + b, 10, "round {round}: stock must not be double-credited");
    }
}

#[test]
fn test_reconcile_keeps_highest_duplicate() {
    let (store, _clock, engine) = setup();
    for qty in [0, 7, 3] {
        store
            .append_row(
                SUC_A,
                &[
                    "DW100".into(),
                    "Windshield".into(),
                    "R1".into(),
                    qty.to_string(),
                    String::new(),
                ],
            )
            .unwrap();
    }

    let report = engine.reconcile_duplicates(&ctx(), SUC_A).unwrap();
    assert_eq!(report.rows_removed, 2);
    let stock = engine.stock(SUC_A).unwrap();
    assert_eq!(stock.len(), 1);
    assert_eq!(stock[0].quantity, 7);

    let writes = store.write_count();
    let again = engine.reconcile_duplicates(&ctx(), SUC_A).unwrap();
    assert_eq!(again.rows_removed, 0);
    assert_eq!(store.write_count(), writes);
}

#[test]
fn test_transient_failures_are_retried() {
    let (store, _clock, engine) = setup();
    intake(&engine, SUC_A, "DW100", "R1", 5);

    store.fail_next(Some(StoreCall::ReadRows), 2, FaultMode::BeforeWrite);
    engine.sell(&ctx(), &sale("DW100", "R1", 1)).unwrap();
    assert_eq!(quantity(&engine, SUC_A, "DW100", "R1"), Some(4));
}

#[test]
fn test_lost_timestamp_confirmation_does_not_double_apply() {
    let (store, _clock, engine) = setup();
    intake(&engine, SUC_A, "DW100", "R1", 5);

    store.fail_next(Some(StoreCall::UpdateCell), 1, FaultMode::AfterWrite);
    engine.sell(&ctx(), &sale("DW100", "R1", 2)).unwrap();
    assert_eq!(quantity(&engine, SUC_A, "DW100", "R1"), Some(3));
}

#[test]
fn test_exhausted_retries_leave_stock_unchanged() {
    let (store, _clock, engine) = setup();
    intake(&engine, SUC_A, "DW100", "R1", 5);

    store.fail_next(None, 3, FaultMode::BeforeWrite);
    let err = engine.sell(&ctx(), &sale("DW100", "R1", 2)).unwrap_err();
    assert!(matches!(
        err,
        InventoryError::TransientStoreFailure { attempts: 3, .. }
    ));
    assert_eq!(quantity(&engine, SUC_A, "DW100", "R1"), Some(5));
}

#[test]
fn test_failed_pending_append_restores_origin() {
    let (store, _clock, engine) = setup();
    intake(&engine, SUC_A, "DW100", "R1", 5);

    store.fail_next(Some(StoreCall::AppendRow), 3, FaultMode::BeforeWrite);
    let err = engine.transfer_out(&ctx(), &transfer_out(2)).unwrap_err();
    assert!(matches!(err, InventoryError::TransientStoreFailure { .. }));
    assert_eq!(quantity(&engine, SUC_A, "DW100", "R1"), Some(5));
    assert!(engine.outgoing_transfers(SUC_A).unwrap().is_empty());
}

#[test]
fn test_failed_receive_credit_puts_transfer_back() {
    let (store, _clock, engine) = setup();
    intake(&engine, SUC_A, "DW100", "R1", 5);
    engine.transfer_out(&ctx(), &transfer_out(2)).unwrap();
    let transfer = only_pending(&engine);
    let request = ReceiveRequest {
        destination: SUC_B.into(),
        transfer,
        rack: "R1".into(),
    };

    // The destination row is new, so the credit is an append.
    store.fail_next(Some(StoreCall::AppendRow), 3, FaultMode::BeforeWrite);
    assert!(engine.receive(&ctx(), &request).is_err());
    assert_eq!(only_pending(&engine).quantity, 2);

    engine.receive(&ctx(), &request).unwrap();
    assert_eq!(quantity(&engine, SUC_B, "DW100", "R1"), Some(2));
}

#[test]
fn test_pending_append_that_landed_is_not_undone() {
    let (store, _clock, engine) = setup();
    intake(&engine, SUC_A, "DW100", "R1", 5);

    // The third attempt writes the row but its confirmation is lost.
    store.fail_next(Some(StoreCall::AppendRow), 2, FaultMode::BeforeWrite);
    store.fail_next(Some(StoreCall::AppendRow), 1, FaultMode::AfterWrite);
    engine.transfer_out(&ctx(), &transfer_out(2)).unwrap();

    assert_eq!(quantity(&engine, SUC_A, "DW100", "R1"), Some(3));
    let outgoing = engine.outgoing_transfers(SUC_A).unwrap();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].quantity, 2);
}

#[test]
fn test_receive_credit_that_landed_keeps_transfer_claimed() {
    let (store, _clock, engine) = setup();
    intake(&engine, SUC_A, "DW100", "R1", 5);
    engine.transfer_out(&ctx(), &transfer_out(2)).unwrap();
    let transfer = only_pending(&engine);

    store.fail_next(Some(StoreCall::AppendRow), 2, FaultMode::BeforeWrite);
    store.fail_next(Some(StoreCall::AppendRow), 1, FaultMode::AfterWrite);
    engine
        .receive(
            &ctx(),
            &ReceiveRequest {
                destination: SUC_B.into(),
                transfer,
                rack: "R4".into(),
            },
        )
        .unwrap();

    assert_eq!(quantity(&engine, SUC_B, "DW100", "R4"), Some(2));
    assert!(engine.incoming_transfers(SUC_B).unwrap().is_empty());
    assert_eq!(quantity(&engine, SUC_A, "DW100", "R1"), Some(3));
}

#[test]
fn test_failed_cancel_credit_puts_transfer_back() {
    let (store, _clock, engine) = setup();
    intake(&engine, SUC_A, "DW100", "R1", 5);
    engine.transfer_out(&ctx(), &transfer_out(2)).unwrap();
    let request = CancelRequest {
        origin: SUC_A.into(),
        transfer: only_pending(&engine),
        return_rack: "R9".into(),
    };

    store.fail_next(Some(StoreCall::AppendRow), 3, FaultMode::BeforeWrite);
    let err = engine.cancel_transfer(&ctx(), &request).unwrap_err();
    assert!(matches!(err, InventoryError::TransientStoreFailure { .. }));
    assert_eq!(only_pending(&engine).quantity, 2);
    assert_eq!(quantity(&engine, SUC_A, "DW100", "R9"), None);

    engine.cancel_transfer(&ctx(), &request).unwrap();
    assert_eq!(quantity(&engine, SUC_A, "DW100", "R9"), Some(2));
    assert!(engine.incoming_transfers(SUC_B).unwrap().is_empty());
}

#[test]
fn test_transfer_is_only_resolved_by_its_own_locations() {
    let (_store, _clock, engine) = setup();
    intake(&engine, SUC_A, "DW100", "R1", 5);
    engine.transfer_out(&ctx(), &transfer_out(2)).unwrap();
    let transfer = only_pending(&engine);

    let err = engine
        .receive(
            &ctx(),
            &ReceiveRequest {
                destination: SUC_C.into(),
                transfer: transfer.clone(),
                rack: "R1".into(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, InventoryError::Validation(ref msg) if msg.contains("addressed to")));

    let err = engine
        .cancel_transfer(
            &ctx(),
            &CancelRequest {
                origin: SUC_B.into(),
                transfer,
                return_rack: "R1".into(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, InventoryError::Validation(ref msg) if msg.contains("was sent from")));

    assert_eq!(only_pending(&engine).quantity, 2);
    assert!(engine.stock(SUC_C).unwrap().is_empty());
    assert!(engine.stock(SUC_B).unwrap().is_empty());
}

fn relocate_to_r7(quantity: i64) -> RelocateRequest {
    RelocateRequest {
        location: SUC_A.into(),
        key: "DW100".into(),
        display_name: String::new(),
        rack_from: "R1".into(),
        rack_to: "R7".into(),
        quantity,
    }
}

#[test]
fn test_failed_relocate_credit_restores_source() {
    let (store, _clock, engine) = setup();
    intake(&engine, SUC_A, "DW100", "R1", 6);

    store.fail_next(Some(StoreCall::AppendRow), 3, FaultMode::BeforeWrite);
    let err = engine.relocate(&ctx(), &relocate_to_r7(4)).unwrap_err();
    assert!(matches!(err, InventoryError::TransientStoreFailure { .. }));
    assert_eq!(quantity(&engine, SUC_A, "DW100", "R1"), Some(6));
    assert_eq!(quantity(&engine, SUC_A, "DW100", "R7"), None);
    assert!(engine.movement_log().unwrap().is_empty());
}

#[test]
fn test_failed_relocate_restore_reports_partial_failure() {
    let (store, _clock, engine) = setup();
    intake(&engine, SUC_A, "DW100", "R1", 6);

    // Reads: level check, debit, three credit attempts, the landed check,
    // then the restore attempts fail.
    store.fail_next(Some(StoreCall::AppendRow), 3, FaultMode::BeforeWrite);
    store.fail_after(Some(StoreCall::ReadRows), 6, 3, FaultMode::BeforeWrite);
    let err = engine.relocate(&ctx(), &relocate_to_r7(4)).unwrap_err();
    assert!(matches!(err, InventoryError::PartialFailure { .. }));
    assert!(err.to_string().contains("Deducted 4 x DW100 from rack R1"));
    assert!(err.to_string().contains("Manual correction"));
    assert_eq!(quantity(&engine, SUC_A, "DW100", "R1"), Some(2));
}

#[test]
fn test_unverifiable_relocate_credit_is_not_undone() {
    let (store, _clock, engine) = setup();
    intake(&engine, SUC_A, "DW100", "R1", 6);

    // The landed check itself cannot read the sheet.
    store.fail_next(Some(StoreCall::AppendRow), 3, FaultMode::BeforeWrite);
    store.fail_after(Some(StoreCall::ReadRows), 5, 3, FaultMode::BeforeWrite);
    let err = engine.relocate(&ctx(), &relocate_to_r7(4)).unwrap_err();
    assert!(matches!(err, InventoryError::PartialFailure { .. }));
    assert!(err.to_string().contains("may or may not have been written"));
    assert_eq!(quantity(&engine, SUC_A, "DW100", "R1"), Some(2));
    assert_eq!(quantity(&engine, SUC_A, "DW100", "R7"), None);
}

#[test]
fn test_failed_undo_reports_partial_failure() {
    let (store, _clock, engine) = setup();
    intake(&engine, SUC_A, "DW100", "R1", 5);
    engine.transfer_out(&ctx(), &transfer_out(2)).unwrap();
    let transfer = only_pending(&engine);

    store.fail_next(Some(StoreCall::AppendRow), 6, FaultMode::BeforeWrite);
    let err = engine
        .receive(
            &ctx(),
            &ReceiveRequest {
                destination: SUC_B.into(),
                transfer,
                rack: "R1".into(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, InventoryError::PartialFailure { .. }));
    assert!(err.to_string().contains("Manual correction"));
}

#[test]
fn test_missing_audit_entry_keeps_the_sale() {
    let (store, _clock, engine) = setup();
    intake(&engine, SUC_A, "DW100", "R1", 5);

    store.fail_next(Some(StoreCall::AppendRow), 3, FaultMode::BeforeWrite);
    let receipt = engine.sell(&ctx(), &sale("DW100", "R1", 1)).unwrap();
    assert!(!receipt.audit_recorded);
    assert!(receipt.message.contains("movement log entry could not be written"));
    assert_eq!(quantity(&engine, SUC_A, "DW100", "R1"), Some(4));
}

#[test]
fn test_intake_ledger_is_optional() {
    let (_store, _clock, engine) = setup();
    intake(&engine, SUC_A, "DW100", "R1", 1);
    assert!(engine.movement_log().unwrap().is_empty());

    let engine = engine.with_intake_ledger(true);
    intake(&engine, SUC_A, "DW100", "R1", 1);
    let log = engine.movement_log().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind, Some(OperationType::Intake));
}

#[test]
fn test_csv_store_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(CsvStore::open(dir.path()).unwrap());
    let engine = InventoryEngine::new(store, SheetsConfig::default())
        .with_clock(clock())
        .with_retry(RetryPolicy::immediate(3));
    engine.initialize().unwrap();

    intake(&engine, SUC_A, "DW100", "R1", 10);
    engine.sell(&ctx(), &sale("dw100", "r1", 3)).unwrap();
    engine.transfer_out(&ctx(), &transfer_out(4)).unwrap();

    let sheet = std::fs::read_to_string(dir.path().join(format!("{SUC_A}.csv"))).unwrap();
    let mut lines = sheet.lines();
    assert_eq!(lines.next(), Some("CLAVE,NOMBRE,RACK,CANTIDAD,FECHA"));
    assert_eq!(lines.next(), Some("DW100,Windshield,R1,3,2024-06-01 09:30:00"));

    // A second engine over the same directory sees the same state.
    let reopened = InventoryEngine::new(
        Arc::new(CsvStore::open(dir.path()).unwrap()),
        SheetsConfig::default(),
    );
    assert_eq!(reopened.outgoing_transfers(SUC_A).unwrap().len(), 1);
    assert_eq!(reopened.movement_log().unwrap().len(), 2);
}
