//! # Stockguard
//!
//! Multi-location glass-parts inventory over a spreadsheet-like table store
//! that has no transactions, no row locks and at-least-once writes.
//!
//! The consistency engine resolves a (key, rack) pair to one authoritative
//! stock row, applies quantity deltas, and keeps the pending-transfer sheet
//! and the movement log in step with stock under concurrent operator
//! sessions and transient store failures.
//!
//! ```no_run
//! use std::sync::Arc;
//! use stockguard::{
//!     CredentialStore, IntakeRequest, InventoryEngine, InventoryService, StockguardConfig,
//! };
//!
//! let config = StockguardConfig::load().unwrap();
//! let engine = InventoryEngine::from_config(config.open_store().unwrap(), &config);
//! engine.initialize().unwrap();
//! let session = CredentialStore::new(config.users.clone())
//!     .authenticate("admin", "secret")
//!     .unwrap();
//! let service = InventoryService::new(Arc::new(engine), session);
//! let outcome = service.intake(&IntakeRequest {
//!     location: "Inventario_Suc1".into(),
//!     key: "DW100".into(),
//!     display_name: "Windshield".into(),
//!     rack: "R1".into(),
//!     quantity: 10,
//! });
//! println!("{}", outcome.message);
//! ```

pub mod auth;
pub mod config;
pub mod connection;
pub mod context;
pub mod engine;
pub mod executor;
pub mod ledger;
pub mod locator;
pub mod metrics;
pub mod mutator;
pub mod normalize;
pub mod reconcile;
pub mod retry;
pub mod schema;
pub mod service;
pub mod store;
pub mod transaction;
pub mod views;

pub use auth::{AuthError, CredentialStore, Role, Session};
pub use config::StockguardConfig;
pub use context::{Clock, FixedClock, RequestContext, SystemClock};
pub use engine::{
    CancelRequest, IntakeRequest, InventoryEngine, InventoryError, Receipt, ReceiveRequest,
    RelocateRequest, SaleRequest, TransferOutRequest,
};
pub use retry::RetryPolicy;
pub use schema::{MovementLogEntry, OperationType, PendingTransfer, StockRecord};
pub use service::{InventoryService, OperationOutcome};
pub use store::{CsvStore, MemoryStore, PostgresStore, StoreError, TableStore};
