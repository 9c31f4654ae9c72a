//! Stockflow
//!
//! Multi-tenant inventory accounting and reservation engine: an append-only
//! stock ledger, materialized per-warehouse snapshots, idempotent
//! reservations with FIFO split consumption, and shipment/return
//! orchestration, all behind a tenant scope guard that makes unscoped data
//! access unrepresentable.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod engine;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod observability;
pub mod scope;
pub mod services;

pub use engine::StockEngine;
pub use errors::ServiceError;
pub use scope::TenantContext;
