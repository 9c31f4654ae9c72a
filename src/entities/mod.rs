//! Database entities.
//!
//! Every table except `tenants` is tenant-owned and implements
//! [`crate::scope::TenantScoped`]; all access goes through the scope guard.

pub mod order;
pub mod order_line;
pub mod product;
pub mod product_variant;
pub mod reservation;
pub mod return_line;
pub mod return_receipt;
pub mod shipment;
pub mod shipment_line;
pub mod stock_ledger;
pub mod stock_snapshot;
pub mod tenant;
pub mod warehouse;
