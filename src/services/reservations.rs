//! Reservation manager: idempotent creation, release, consumption, and
//! FIFO split consumption against the stock snapshot.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::reservation::{self, Entity as Reservations, ReservationStatus};
use crate::entities::stock_ledger::MovementKind;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::scope::{self, TenantContext};
use crate::services::ledger::{LedgerService, NewLedgerEntry};
use crate::services::snapshot::SnapshotService;

/// Parameters for creating a reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveRequest {
    pub order_line_id: Uuid,
    pub warehouse_id: Uuid,
    pub variant_id: Uuid,
    pub qty: i64,
    /// Idempotency token. Retrying with the same key returns the original
    /// reservation with no further side effects.
    pub dedupe_key: Option<String>,
}

/// Result of a reserve call.
#[derive(Debug, Clone)]
pub struct ReserveOutcome {
    pub reservation: reservation::Model,
    /// True when the dedupe key matched an existing reservation and nothing
    /// was mutated.
    pub reused: bool,
}

/// Result of a FIFO consumption walk.
#[derive(Debug, Clone)]
pub struct SplitConsumption {
    /// Reservations marked CONSUMED, oldest first. A split parent appears
    /// here with its qty already reduced to the consumed amount.
    pub consumed: Vec<reservation::Model>,
    /// The new ACTIVE reservation carrying a split's leftover, if the walk
    /// ended mid-reservation.
    pub remainder: Option<reservation::Model>,
}

/// Service managing the reservation lifecycle.
#[derive(Clone)]
pub struct ReservationService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl ReservationService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Creates a reservation against available stock.
    ///
    /// With a dedupe key, the call is idempotent: a retry after an ambiguous
    /// failure (e.g. a commit-ack timeout) finds the first attempt's row and
    /// returns it unchanged. Without a key, every call is a fresh claim.
    ///
    /// The snapshot row is read under an exclusive lock before the
    /// `available` check, so concurrent reserves against the same
    /// `(warehouse, variant)` serialize and can never jointly overdraw. The
    /// unique `(tenant_id, dedupe_key)` index backstops the dedupe lookup
    /// against a concurrent first attempt.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    pub async fn reserve(
        &self,
        ctx: &TenantContext,
        request: ReserveRequest,
    ) -> Result<ReserveOutcome, ServiceError> {
        if request.qty <= 0 {
            return Err(ServiceError::ValidationError(
                "Reservation quantity must be positive".to_string(),
            ));
        }

        let ctx = *ctx;
        let req = request.clone();
        let (model, reused) = self
            .db
            .transaction::<_, (reservation::Model, bool), ServiceError>(move |txn| {
                Box::pin(async move { Self::reserve_in_txn(txn, &ctx, req).await })
            })
            .await
            .map_err(ServiceError::from)?;

        self.event_sender
            .emit(Event::ReservationCreated {
                tenant_id: ctx.tenant_id(),
                reservation_id: model.id,
                order_line_id: model.order_line_id,
                qty: model.qty,
                reused,
            })
            .await;

        if reused {
            info!(reservation_id = %model.id, "Reservation reused via dedupe key");
        } else {
            info!(reservation_id = %model.id, qty = model.qty, "Reservation created");
        }

        Ok(ReserveOutcome {
            reservation: model,
            reused,
        })
    }

    async fn reserve_in_txn(
        txn: &DatabaseTransaction,
        ctx: &TenantContext,
        request: ReserveRequest,
    ) -> Result<(reservation::Model, bool), ServiceError> {
        if let Some(key) = &request.dedupe_key {
            let existing = scope::scoped::<Reservations>(ctx)
                .filter(reservation::Column::DedupeKey.eq(key.as_str()))
                .one(txn)
                .await
                .map_err(ServiceError::db_error)?;

            if let Some(found) = existing {
                return Ok((found, true));
            }
        }

        let snapshot =
            SnapshotService::lock_row(txn, ctx, request.warehouse_id, request.variant_id).await?;
        let available = snapshot.as_ref().map(|s| s.available).unwrap_or(0);
        if available < request.qty {
            return Err(ServiceError::InsufficientStock(format!(
                "requested {} but only {} available",
                request.qty, available
            )));
        }

        let created = reservation::ActiveModel {
            tenant_id: Set(ctx.tenant_id()),
            order_line_id: Set(request.order_line_id),
            warehouse_id: Set(request.warehouse_id),
            variant_id: Set(request.variant_id),
            qty: Set(request.qty),
            status: Set(ReservationStatus::Active.as_str().to_string()),
            dedupe_key: Set(request.dedupe_key),
            shipment_id: Set(None),
            ..Default::default()
        };
        let created = created.insert(txn).await.map_err(ServiceError::db_error)?;

        LedgerService::append_within(
            txn,
            ctx,
            NewLedgerEntry::new(
                request.warehouse_id,
                request.variant_id,
                0,
                MovementKind::Reserve,
            )
            .with_ref("reservation", created.id),
        )
        .await?;

        SnapshotService::apply_delta_within(
            txn,
            ctx,
            request.warehouse_id,
            request.variant_id,
            0,
            created.qty,
        )
        .await?;

        Ok((created, false))
    }

    /// Releases an ACTIVE reservation back to available stock.
    ///
    /// Returns `None` when the reservation is absent (which includes rows
    /// owned by other tenants) or already terminal; release is idempotent by
    /// state, not by key.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    pub async fn release(
        &self,
        ctx: &TenantContext,
        reservation_id: Uuid,
    ) -> Result<Option<reservation::Model>, ServiceError> {
        let ctx = *ctx;
        let released = self
            .db
            .transaction::<_, Option<reservation::Model>, ServiceError>(move |txn| {
                Box::pin(async move {
                    let Some(found) = Self::lock_reservation(txn, &ctx, reservation_id).await?
                    else {
                        return Ok(None);
                    };
                    if !found.is_active() {
                        return Ok(None);
                    }

                    let qty = found.qty;
                    let warehouse_id = found.warehouse_id;
                    let variant_id = found.variant_id;

                    let mut active: reservation::ActiveModel = found.into();
                    active.status = Set(ReservationStatus::Released.as_str().to_string());
                    let updated = active.update(txn).await.map_err(ServiceError::db_error)?;

                    LedgerService::append_within(
                        txn,
                        &ctx,
                        NewLedgerEntry::new(warehouse_id, variant_id, 0, MovementKind::Release)
                            .with_ref("reservation", updated.id),
                    )
                    .await?;

                    SnapshotService::apply_delta_within(
                        txn,
                        &ctx,
                        warehouse_id,
                        variant_id,
                        0,
                        -qty,
                    )
                    .await?;

                    Ok(Some(updated))
                })
            })
            .await
            .map_err(ServiceError::from)?;

        if let Some(model) = &released {
            self.event_sender
                .emit(Event::ReservationReleased {
                    tenant_id: ctx.tenant_id(),
                    reservation_id: model.id,
                    qty: model.qty,
                })
                .await;
            info!(reservation_id = %model.id, "Reservation released");
        }

        Ok(released)
    }

    /// Consumes an ACTIVE reservation in full: the reserved quantity ships,
    /// so on-hand and reserved drop together and available is unchanged.
    ///
    /// Returns `None` when absent or already terminal; re-running against a
    /// CONSUMED reservation is a no-op, not an error.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    pub async fn consume(
        &self,
        ctx: &TenantContext,
        reservation_id: Uuid,
    ) -> Result<Option<reservation::Model>, ServiceError> {
        let ctx = *ctx;
        let consumed = self
            .db
            .transaction::<_, Option<reservation::Model>, ServiceError>(move |txn| {
                Box::pin(async move {
                    let Some(found) = Self::lock_reservation(txn, &ctx, reservation_id).await?
                    else {
                        return Ok(None);
                    };
                    if !found.is_active() {
                        return Ok(None);
                    }

                    let qty = found.qty;
                    let warehouse_id = found.warehouse_id;
                    let variant_id = found.variant_id;

                    let mut active: reservation::ActiveModel = found.into();
                    active.status = Set(ReservationStatus::Consumed.as_str().to_string());
                    let updated = active.update(txn).await.map_err(ServiceError::db_error)?;

                    LedgerService::append_within(
                        txn,
                        &ctx,
                        NewLedgerEntry::new(warehouse_id, variant_id, -qty, MovementKind::Ship)
                            .with_ref("reservation", updated.id),
                    )
                    .await?;

                    SnapshotService::apply_delta_within(
                        txn,
                        &ctx,
                        warehouse_id,
                        variant_id,
                        -qty,
                        -qty,
                    )
                    .await?;

                    Ok(Some(updated))
                })
            })
            .await
            .map_err(ServiceError::from)?;

        if let Some(model) = &consumed {
            self.event_sender
                .emit(Event::ReservationConsumed {
                    tenant_id: ctx.tenant_id(),
                    reservation_id: model.id,
                    qty: model.qty,
                })
                .await;
            info!(reservation_id = %model.id, "Reservation consumed");
        }

        Ok(consumed)
    }

    /// Consumes `qty_to_consume` units across the ACTIVE reservations of one
    /// `(order_line, warehouse, variant)`, oldest first.
    ///
    /// When the walk ends inside a reservation, that row is split: it
    /// becomes CONSUMED at exactly the quantity taken from it, and a new
    /// ACTIVE reservation (no dedupe key) carries the leftover. Total
    /// quantity across CONSUMED and ACTIVE rows is conserved.
    ///
    /// Invoked once per shipment line inside the fulfillment transaction;
    /// the ledger entry and snapshot delta for the full quantity are the
    /// caller's responsibility.
    pub async fn consume_exact_or_split_within(
        txn: &DatabaseTransaction,
        ctx: &TenantContext,
        order_line_id: Uuid,
        warehouse_id: Uuid,
        variant_id: Uuid,
        qty_to_consume: i64,
        shipment_id: Option<Uuid>,
    ) -> Result<SplitConsumption, ServiceError> {
        if qty_to_consume <= 0 {
            return Err(ServiceError::ValidationError(
                "Consumption quantity must be positive".to_string(),
            ));
        }

        let active_reservations = scope::scoped::<Reservations>(ctx)
            .filter(reservation::Column::OrderLineId.eq(order_line_id))
            .filter(reservation::Column::WarehouseId.eq(warehouse_id))
            .filter(reservation::Column::VariantId.eq(variant_id))
            .filter(reservation::Column::Status.eq(ReservationStatus::Active.as_str()))
            .order_by_asc(reservation::Column::CreatedAt)
            .lock_exclusive()
            .all(txn)
            .await
            .map_err(ServiceError::db_error)?;

        let total: i64 = active_reservations.iter().map(|r| r.qty).sum();
        if total < qty_to_consume {
            return Err(ServiceError::ReservationShortage(format!(
                "order line {} has {} reserved but {} requested",
                order_line_id, total, qty_to_consume
            )));
        }

        let mut remaining = qty_to_consume;
        let mut consumed = Vec::new();
        let mut remainder = None;

        for res in active_reservations {
            if remaining == 0 {
                break;
            }

            if res.qty <= remaining {
                remaining -= res.qty;

                let mut active: reservation::ActiveModel = res.into();
                active.status = Set(ReservationStatus::Consumed.as_str().to_string());
                active.shipment_id = Set(shipment_id);
                let updated = active.update(txn).await.map_err(ServiceError::db_error)?;
                consumed.push(updated);
            } else {
                // Split: the parent keeps exactly the consumed quantity and
                // a fresh ACTIVE row carries the untouched leftover.
                let leftover = res.qty - remaining;

                let child = reservation::ActiveModel {
                    tenant_id: Set(ctx.tenant_id()),
                    order_line_id: Set(res.order_line_id),
                    warehouse_id: Set(res.warehouse_id),
                    variant_id: Set(res.variant_id),
                    qty: Set(leftover),
                    status: Set(ReservationStatus::Active.as_str().to_string()),
                    dedupe_key: Set(None),
                    shipment_id: Set(None),
                    ..Default::default()
                };
                let child = child.insert(txn).await.map_err(ServiceError::db_error)?;

                let mut active: reservation::ActiveModel = res.into();
                active.qty = Set(remaining);
                active.status = Set(ReservationStatus::Consumed.as_str().to_string());
                active.shipment_id = Set(shipment_id);
                let updated = active.update(txn).await.map_err(ServiceError::db_error)?;

                consumed.push(updated);
                remainder = Some(child);
                remaining = 0;
            }
        }

        Ok(SplitConsumption {
            consumed,
            remainder,
        })
    }

    /// Tenant-guarded point lookup.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    pub async fn get(
        &self,
        ctx: &TenantContext,
        reservation_id: Uuid,
    ) -> Result<Option<reservation::Model>, ServiceError> {
        scope::find_by_id::<Reservations, _>(ctx, self.db.as_ref(), reservation_id).await
    }

    /// All reservations for one order line, oldest first.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    pub async fn list_for_order_line(
        &self,
        ctx: &TenantContext,
        order_line_id: Uuid,
    ) -> Result<Vec<reservation::Model>, ServiceError> {
        scope::scoped::<Reservations>(ctx)
            .filter(reservation::Column::OrderLineId.eq(order_line_id))
            .order_by_asc(reservation::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    async fn lock_reservation(
        txn: &DatabaseTransaction,
        ctx: &TenantContext,
        reservation_id: Uuid,
    ) -> Result<Option<reservation::Model>, ServiceError> {
        scope::scoped::<Reservations>(ctx)
            .filter(reservation::Column::Id.eq(reservation_id))
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(ServiceError::db_error)
    }
}
