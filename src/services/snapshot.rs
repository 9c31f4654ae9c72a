//! Materialized stock snapshots: the read path for availability checks.
//!
//! The snapshot row is also the serialization point for concurrent writers:
//! every mutation locks it before reading `available`, so two reservations
//! racing for the last unit cannot both observe it free.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, QueryFilter, QuerySelect,
    Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::entities::reservation::{self, Entity as Reservations, ReservationStatus};
use crate::entities::stock_snapshot::{self, Entity as StockSnapshots};
use crate::errors::ServiceError;
use crate::scope::{self, TenantContext};
use crate::services::ledger::LedgerService;

/// On-hand / reserved / available triple returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub on_hand: i64,
    pub reserved: i64,
    pub available: i64,
}

impl Availability {
    fn zero() -> Self {
        Self {
            on_hand: 0,
            reserved: 0,
            available: 0,
        }
    }
}

impl From<&stock_snapshot::Model> for Availability {
    fn from(model: &stock_snapshot::Model) -> Self {
        Self {
            on_hand: model.on_hand,
            reserved: model.reserved,
            available: model.available,
        }
    }
}

/// Service over the materialized `(tenant, warehouse, variant)` aggregates.
#[derive(Clone)]
pub struct SnapshotService {
    db: Arc<DatabaseConnection>,
}

impl SnapshotService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Reads the snapshot row under an exclusive row lock. Concurrent
    /// writers targeting the same `(warehouse, variant)` block here;
    /// distinct pairs proceed independently.
    pub(crate) async fn lock_row<C>(
        conn: &C,
        ctx: &TenantContext,
        warehouse_id: Uuid,
        variant_id: Uuid,
    ) -> Result<Option<stock_snapshot::Model>, ServiceError>
    where
        C: ConnectionTrait,
    {
        scope::scoped::<StockSnapshots>(ctx)
            .filter(stock_snapshot::Column::WarehouseId.eq(warehouse_id))
            .filter(stock_snapshot::Column::VariantId.eq(variant_id))
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Applies `(delta_on_hand, delta_reserved)` to the snapshot, creating
    /// the row on first movement. Missing rows read as zeros. Must run in
    /// the same transaction as the ledger append that caused it so a crash
    /// between the two never leaves them inconsistent.
    pub async fn apply_delta_within<C>(
        conn: &C,
        ctx: &TenantContext,
        warehouse_id: Uuid,
        variant_id: Uuid,
        delta_on_hand: i64,
        delta_reserved: i64,
    ) -> Result<stock_snapshot::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        let existing = Self::lock_row(conn, ctx, warehouse_id, variant_id).await?;

        match existing {
            Some(snapshot) => {
                let on_hand = snapshot.on_hand + delta_on_hand;
                let reserved = snapshot.reserved + delta_reserved;

                let mut active: stock_snapshot::ActiveModel = snapshot.into();
                active.on_hand = Set(on_hand);
                active.reserved = Set(reserved);
                active.available = Set(on_hand - reserved);
                active.update(conn).await.map_err(ServiceError::db_error)
            }
            None => {
                let snapshot = stock_snapshot::ActiveModel {
                    tenant_id: Set(ctx.tenant_id()),
                    warehouse_id: Set(warehouse_id),
                    variant_id: Set(variant_id),
                    on_hand: Set(delta_on_hand),
                    reserved: Set(delta_reserved),
                    available: Set(delta_on_hand - delta_reserved),
                    ..Default::default()
                };
                snapshot.insert(conn).await.map_err(ServiceError::db_error)
            }
        }
    }

    /// Recomputes the snapshot from its sources of truth: `on_hand` from the
    /// ledger sum, `reserved` from the active reservation sum. Drift
    /// recovery path, never the hot path.
    pub async fn rebuild_within<C>(
        conn: &C,
        ctx: &TenantContext,
        warehouse_id: Uuid,
        variant_id: Uuid,
    ) -> Result<stock_snapshot::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        let on_hand = LedgerService::sum_within(conn, ctx, warehouse_id, variant_id).await?;
        let reserved =
            Self::active_reservation_sum_within(conn, ctx, warehouse_id, variant_id).await?;

        let existing = Self::lock_row(conn, ctx, warehouse_id, variant_id).await?;
        match existing {
            Some(snapshot) => {
                let mut active: stock_snapshot::ActiveModel = snapshot.into();
                active.on_hand = Set(on_hand);
                active.reserved = Set(reserved);
                active.available = Set(on_hand - reserved);
                active.update(conn).await.map_err(ServiceError::db_error)
            }
            None => {
                let snapshot = stock_snapshot::ActiveModel {
                    tenant_id: Set(ctx.tenant_id()),
                    warehouse_id: Set(warehouse_id),
                    variant_id: Set(variant_id),
                    on_hand: Set(on_hand),
                    reserved: Set(reserved),
                    available: Set(on_hand - reserved),
                    ..Default::default()
                };
                snapshot.insert(conn).await.map_err(ServiceError::db_error)
            }
        }
    }

    /// Sum of ACTIVE reservation quantities for one `(warehouse, variant)`.
    pub(crate) async fn active_reservation_sum_within<C>(
        conn: &C,
        ctx: &TenantContext,
        warehouse_id: Uuid,
        variant_id: Uuid,
    ) -> Result<i64, ServiceError>
    where
        C: ConnectionTrait,
    {
        let reservations = scope::scoped::<Reservations>(ctx)
            .filter(reservation::Column::WarehouseId.eq(warehouse_id))
            .filter(reservation::Column::VariantId.eq(variant_id))
            .filter(reservation::Column::Status.eq(ReservationStatus::Active.as_str()))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(reservations.iter().map(|r| r.qty).sum())
    }

    /// Fetches the raw snapshot row, if it exists yet.
    #[instrument(skip(self))]
    pub async fn get(
        &self,
        ctx: &TenantContext,
        warehouse_id: Uuid,
        variant_id: Uuid,
    ) -> Result<Option<stock_snapshot::Model>, ServiceError> {
        scope::scoped::<StockSnapshots>(ctx)
            .filter(stock_snapshot::Column::WarehouseId.eq(warehouse_id))
            .filter(stock_snapshot::Column::VariantId.eq(variant_id))
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Availability read path. A variant that has never moved reads as
    /// all-zeros rather than an error.
    #[instrument(skip(self))]
    pub async fn get_availability(
        &self,
        ctx: &TenantContext,
        warehouse_id: Uuid,
        variant_id: Uuid,
    ) -> Result<Availability, ServiceError> {
        let snapshot = self.get(ctx, warehouse_id, variant_id).await?;
        Ok(snapshot
            .as_ref()
            .map(Availability::from)
            .unwrap_or_else(Availability::zero))
    }
}
