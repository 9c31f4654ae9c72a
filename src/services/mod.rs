//! Service layer: one clonable service per concern, composed by
//! [`crate::engine::StockEngine`].

pub mod fulfillment;
pub mod ledger;
pub mod reconciliation;
pub mod reservations;
pub mod snapshot;

pub use fulfillment::{
    CreateShipment, FulfillmentService, ReceiveReturn, ReturnLineRequest, ShipmentLineRequest,
};
pub use ledger::{LedgerService, NewLedgerEntry};
pub use reconciliation::{ReconcileReport, ReconciliationService};
pub use reservations::{ReservationService, ReserveOutcome, ReserveRequest, SplitConsumption};
pub use snapshot::{Availability, SnapshotService};
