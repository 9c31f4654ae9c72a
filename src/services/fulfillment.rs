//! Fulfillment orchestration: shipments consume reservations and decrement
//! on-hand; returns increment on-hand and never touch reservations.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, QueryFilter,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::order::Entity as Orders;
use crate::entities::order_line::Entity as OrderLines;
use crate::entities::reservation::{self, Entity as Reservations, ReservationStatus};
use crate::entities::return_line;
use crate::entities::return_receipt;
use crate::entities::shipment::{self, Entity as Shipments, ShipmentStatus};
use crate::entities::shipment_line::{self, Entity as ShipmentLines};
use crate::entities::stock_ledger::MovementKind;
use crate::entities::warehouse::Entity as Warehouses;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::scope::{self, TenantContext};
use crate::services::ledger::{LedgerService, NewLedgerEntry};
use crate::services::reservations::ReservationService;
use crate::services::snapshot::SnapshotService;

/// One requested shipment line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentLineRequest {
    pub order_line_id: Uuid,
    pub variant_id: Uuid,
    pub qty: i64,
}

/// Parameters for creating a shipment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShipment {
    pub order_id: Uuid,
    pub warehouse_id: Uuid,
    pub lines: Vec<ShipmentLineRequest>,
}

/// One requested return line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnLineRequest {
    pub order_line_id: Uuid,
    pub variant_id: Uuid,
    pub qty: i64,
    pub reason: Option<String>,
}

/// Parameters for receiving a return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveReturn {
    pub order_id: Uuid,
    pub warehouse_id: Uuid,
    pub lines: Vec<ReturnLineRequest>,
}

/// Service composing ledger, snapshot, and reservation operations into
/// shipment and return workflows.
#[derive(Clone)]
pub struct FulfillmentService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl FulfillmentService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Creates a shipment, consuming reservations for every line.
    ///
    /// One transaction spans all lines: a shortage or validation failure on
    /// any line aborts the whole shipment. Each line consumes its order
    /// line's ACTIVE reservations FIFO (splitting the last one if needed),
    /// appends one SHIP ledger entry, and moves on-hand and reserved down
    /// together.
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id(), order_id = %request.order_id))]
    pub async fn create_shipment(
        &self,
        ctx: &TenantContext,
        request: CreateShipment,
    ) -> Result<shipment::Model, ServiceError> {
        if request.lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "Shipment must contain at least one line".to_string(),
            ));
        }
        if request.lines.iter().any(|l| l.qty <= 0) {
            return Err(ServiceError::ValidationError(
                "Shipment line quantities must be positive".to_string(),
            ));
        }

        let ctx = *ctx;
        let req = request.clone();
        let created = self
            .db
            .transaction::<_, shipment::Model, ServiceError>(move |txn| {
                Box::pin(async move { Self::create_shipment_in_txn(txn, &ctx, req).await })
            })
            .await
            .map_err(ServiceError::from)?;

        self.event_sender
            .emit(Event::ShipmentCreated {
                tenant_id: ctx.tenant_id(),
                shipment_id: created.id,
                order_id: created.order_id,
                line_count: request.lines.len(),
            })
            .await;

        info!(shipment_id = %created.id, lines = request.lines.len(), "Shipment created");
        Ok(created)
    }

    async fn create_shipment_in_txn(
        txn: &DatabaseTransaction,
        ctx: &TenantContext,
        request: CreateShipment,
    ) -> Result<shipment::Model, ServiceError> {
        scope::find_by_id::<Orders, _>(ctx, txn, request.order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", request.order_id)))?;
        scope::find_by_id::<Warehouses, _>(ctx, txn, request.warehouse_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Warehouse {} not found", request.warehouse_id))
            })?;

        let created = shipment::ActiveModel {
            tenant_id: Set(ctx.tenant_id()),
            order_id: Set(request.order_id),
            warehouse_id: Set(request.warehouse_id),
            status: Set(ShipmentStatus::Created.as_str().to_string()),
            ..Default::default()
        };
        let created = created.insert(txn).await.map_err(ServiceError::db_error)?;

        for line in &request.lines {
            let order_line = scope::find_by_id::<OrderLines, _>(ctx, txn, line.order_line_id)
                .await?
                .ok_or(ServiceError::OrderLineNotFound(line.order_line_id))?;

            if order_line.order_id != request.order_id {
                return Err(ServiceError::ValidationError(format!(
                    "Order line {} does not belong to order {}",
                    line.order_line_id, request.order_id
                )));
            }
            if order_line.variant_id != line.variant_id {
                return Err(ServiceError::VariantMismatch(format!(
                    "order line {} tracks variant {}, shipment line requested {}",
                    order_line.id, order_line.variant_id, line.variant_id
                )));
            }

            ReservationService::consume_exact_or_split_within(
                txn,
                ctx,
                line.order_line_id,
                request.warehouse_id,
                line.variant_id,
                line.qty,
                Some(created.id),
            )
            .await?;

            LedgerService::append_within(
                txn,
                ctx,
                NewLedgerEntry::new(
                    request.warehouse_id,
                    line.variant_id,
                    -line.qty,
                    MovementKind::Ship,
                )
                .with_ref("shipment", created.id),
            )
            .await?;

            SnapshotService::apply_delta_within(
                txn,
                ctx,
                request.warehouse_id,
                line.variant_id,
                -line.qty,
                -line.qty,
            )
            .await?;

            let shipment_line = shipment_line::ActiveModel {
                tenant_id: Set(ctx.tenant_id()),
                shipment_id: Set(created.id),
                order_line_id: Set(line.order_line_id),
                variant_id: Set(line.variant_id),
                qty: Set(line.qty),
                ..Default::default()
            };
            shipment_line
                .insert(txn)
                .await
                .map_err(ServiceError::db_error)?;
        }

        Ok(created)
    }

    /// CREATED → SHIPPED.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    pub async fn mark_shipped(
        &self,
        ctx: &TenantContext,
        shipment_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        self.transition(ctx, shipment_id, ShipmentStatus::Created, ShipmentStatus::Shipped)
            .await
    }

    /// SHIPPED → DELIVERED.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    pub async fn mark_delivered(
        &self,
        ctx: &TenantContext,
        shipment_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        self.transition(ctx, shipment_id, ShipmentStatus::Shipped, ShipmentStatus::Delivered)
            .await
    }

    async fn transition(
        &self,
        ctx: &TenantContext,
        shipment_id: Uuid,
        expected: ShipmentStatus,
        next: ShipmentStatus,
    ) -> Result<shipment::Model, ServiceError> {
        let ctx = *ctx;
        let updated = self
            .db
            .transaction::<_, shipment::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let found = scope::scoped::<Shipments>(&ctx)
                        .filter(shipment::Column::Id.eq(shipment_id))
                        .lock_exclusive()
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Shipment {} not found", shipment_id))
                        })?;

                    if found.status() != Some(expected) {
                        return Err(ServiceError::InvalidStatus(format!(
                            "shipment {} is {}, expected {}",
                            shipment_id,
                            found.status,
                            expected.as_str()
                        )));
                    }

                    let mut active: shipment::ActiveModel = found.into();
                    active.status = Set(next.as_str().to_string());
                    active.update(txn).await.map_err(ServiceError::db_error)
                })
            })
            .await
            .map_err(ServiceError::from)?;

        self.event_sender
            .emit(Event::ShipmentStatusChanged {
                tenant_id: ctx.tenant_id(),
                shipment_id,
                old_status: expected.as_str().to_string(),
                new_status: next.as_str().to_string(),
            })
            .await;

        Ok(updated)
    }

    /// Cancels a CREATED shipment, reversing its consumption.
    ///
    /// Every reservation this shipment consumed returns to ACTIVE at the
    /// quantity it was consumed at; a split's remainder row was never
    /// touched, so the order line's total ACTIVE quantity lands back at its
    /// pre-shipment value. A compensating SHIP entry per line restores the
    /// ledger sum, and on-hand/reserved move back up together.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    pub async fn cancel_shipment(
        &self,
        ctx: &TenantContext,
        shipment_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        let ctx = *ctx;
        let cancelled = self
            .db
            .transaction::<_, shipment::Model, ServiceError>(move |txn| {
                Box::pin(async move { Self::cancel_shipment_in_txn(txn, &ctx, shipment_id).await })
            })
            .await
            .map_err(ServiceError::from)?;

        self.event_sender
            .emit(Event::ShipmentCancelled {
                tenant_id: ctx.tenant_id(),
                shipment_id,
            })
            .await;

        info!(shipment_id = %shipment_id, "Shipment cancelled");
        Ok(cancelled)
    }

    async fn cancel_shipment_in_txn(
        txn: &DatabaseTransaction,
        ctx: &TenantContext,
        shipment_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        let found = scope::scoped::<Shipments>(ctx)
            .filter(shipment::Column::Id.eq(shipment_id))
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Shipment {} not found", shipment_id)))?;

        if found.status() != Some(ShipmentStatus::Created) {
            return Err(ServiceError::InvalidStatus(format!(
                "shipment {} is {}; only newly created shipments can be cancelled",
                shipment_id, found.status
            )));
        }

        let consumed = scope::scoped::<Reservations>(ctx)
            .filter(reservation::Column::ShipmentId.eq(shipment_id))
            .filter(reservation::Column::Status.eq(ReservationStatus::Consumed.as_str()))
            .all(txn)
            .await
            .map_err(ServiceError::db_error)?;

        for res in consumed {
            let mut active: reservation::ActiveModel = res.into();
            active.status = Set(ReservationStatus::Active.as_str().to_string());
            active.shipment_id = Set(None);
            active.update(txn).await.map_err(ServiceError::db_error)?;
        }

        let lines = scope::scoped::<ShipmentLines>(ctx)
            .filter(shipment_line::Column::ShipmentId.eq(shipment_id))
            .all(txn)
            .await
            .map_err(ServiceError::db_error)?;

        for line in lines {
            LedgerService::append_within(
                txn,
                ctx,
                NewLedgerEntry::new(
                    found.warehouse_id,
                    line.variant_id,
                    line.qty,
                    MovementKind::Ship,
                )
                .with_reason("shipment cancelled")
                .with_ref("shipment", shipment_id),
            )
            .await?;

            SnapshotService::apply_delta_within(
                txn,
                ctx,
                found.warehouse_id,
                line.variant_id,
                line.qty,
                line.qty,
            )
            .await?;
        }

        let mut active: shipment::ActiveModel = found.into();
        active.status = Set(ShipmentStatus::Cancelled.as_str().to_string());
        active.update(txn).await.map_err(ServiceError::db_error)
    }

    /// Receives a return: every line increments on-hand with a RETURN ledger
    /// entry. Reservations are not involved.
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id(), order_id = %request.order_id))]
    pub async fn receive_return(
        &self,
        ctx: &TenantContext,
        request: ReceiveReturn,
    ) -> Result<return_receipt::Model, ServiceError> {
        if request.lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "Return must contain at least one line".to_string(),
            ));
        }
        if request.lines.iter().any(|l| l.qty <= 0) {
            return Err(ServiceError::ValidationError(
                "Return line quantities must be positive".to_string(),
            ));
        }

        let ctx = *ctx;
        let req = request.clone();
        let created = self
            .db
            .transaction::<_, return_receipt::Model, ServiceError>(move |txn| {
                Box::pin(async move { Self::receive_return_in_txn(txn, &ctx, req).await })
            })
            .await
            .map_err(ServiceError::from)?;

        self.event_sender
            .emit(Event::ReturnReceived {
                tenant_id: ctx.tenant_id(),
                return_id: created.id,
                order_id: created.order_id,
                line_count: request.lines.len(),
            })
            .await;

        info!(return_id = %created.id, lines = request.lines.len(), "Return received");
        Ok(created)
    }

    async fn receive_return_in_txn(
        txn: &DatabaseTransaction,
        ctx: &TenantContext,
        request: ReceiveReturn,
    ) -> Result<return_receipt::Model, ServiceError> {
        scope::find_by_id::<Orders, _>(ctx, txn, request.order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", request.order_id)))?;
        scope::find_by_id::<Warehouses, _>(ctx, txn, request.warehouse_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Warehouse {} not found", request.warehouse_id))
            })?;

        let receipt = return_receipt::ActiveModel {
            tenant_id: Set(ctx.tenant_id()),
            order_id: Set(request.order_id),
            warehouse_id: Set(request.warehouse_id),
            ..Default::default()
        };
        let receipt = receipt.insert(txn).await.map_err(ServiceError::db_error)?;

        for line in &request.lines {
            let order_line = scope::find_by_id::<OrderLines, _>(ctx, txn, line.order_line_id)
                .await?
                .ok_or(ServiceError::OrderLineNotFound(line.order_line_id))?;

            if order_line.variant_id != line.variant_id {
                return Err(ServiceError::VariantMismatch(format!(
                    "order line {} tracks variant {}, return line requested {}",
                    order_line.id, order_line.variant_id, line.variant_id
                )));
            }

            LedgerService::append_within(
                txn,
                ctx,
                NewLedgerEntry::new(
                    request.warehouse_id,
                    line.variant_id,
                    line.qty,
                    MovementKind::Return,
                )
                .with_ref("return", receipt.id),
            )
            .await?;

            SnapshotService::apply_delta_within(
                txn,
                ctx,
                request.warehouse_id,
                line.variant_id,
                line.qty,
                0,
            )
            .await?;

            let return_line = return_line::ActiveModel {
                tenant_id: Set(ctx.tenant_id()),
                return_id: Set(receipt.id),
                order_line_id: Set(line.order_line_id),
                variant_id: Set(line.variant_id),
                qty: Set(line.qty),
                reason: Set(line.reason.clone()),
                ..Default::default()
            };
            return_line
                .insert(txn)
                .await
                .map_err(ServiceError::db_error)?;
        }

        Ok(receipt)
    }

    /// Tenant-guarded shipment lookup with its lines.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    pub async fn get_shipment(
        &self,
        ctx: &TenantContext,
        shipment_id: Uuid,
    ) -> Result<Option<(shipment::Model, Vec<shipment_line::Model>)>, ServiceError> {
        let Some(found) = scope::find_by_id::<Shipments, _>(ctx, self.db.as_ref(), shipment_id)
            .await?
        else {
            return Ok(None);
        };

        let lines = scope::scoped::<ShipmentLines>(ctx)
            .filter(shipment_line::Column::ShipmentId.eq(shipment_id))
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        Ok(Some((found, lines)))
    }
}
