//! Programmatic entry point composing every service over one connection
//! pool and event channel.

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::product_variant::Entity as ProductVariants;
use crate::entities::stock_ledger::MovementKind;
use crate::entities::warehouse::Entity as Warehouses;
use crate::entities::{reservation, return_receipt, shipment, stock_snapshot};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::scope::{self, TenantContext};
use crate::services::{
    Availability, CreateShipment, FulfillmentService, LedgerService, NewLedgerEntry,
    ReceiveReturn, ReconcileReport, ReconciliationService, ReservationService, ReserveOutcome,
    ReserveRequest, SnapshotService,
};

/// The inventory engine.
///
/// Every operation takes an explicit [`TenantContext`]; there is no ambient
/// tenant state anywhere in the crate.
#[derive(Clone)]
pub struct StockEngine {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    ledger: LedgerService,
    snapshots: SnapshotService,
    reservations: ReservationService,
    fulfillment: FulfillmentService,
    reconciliation: ReconciliationService,
}

impl StockEngine {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            ledger: LedgerService::new(db.clone()),
            snapshots: SnapshotService::new(db.clone()),
            reservations: ReservationService::new(db.clone(), event_sender.clone()),
            fulfillment: FulfillmentService::new(db.clone(), event_sender.clone()),
            reconciliation: ReconciliationService::new(db.clone(), event_sender.clone()),
            db,
            event_sender,
        }
    }

    /// Records a stock adjustment: a ledger entry plus the matching on-hand
    /// delta, in one transaction. Only `Receipt` and `Adjust` movements may
    /// be recorded this way; reservation and fulfillment movements go
    /// through their own operations.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    pub async fn adjust_stock(
        &self,
        ctx: &TenantContext,
        warehouse_id: Uuid,
        variant_id: Uuid,
        qty_delta: i64,
        kind: MovementKind,
        reason: Option<String>,
    ) -> Result<stock_snapshot::Model, ServiceError> {
        if !matches!(kind, MovementKind::Receipt | MovementKind::Adjust) {
            return Err(ServiceError::ValidationError(format!(
                "adjust_stock accepts receipt or adjust movements, got {}",
                kind.as_str()
            )));
        }
        if qty_delta == 0 {
            return Err(ServiceError::ValidationError(
                "Adjustment delta must be non-zero".to_string(),
            ));
        }

        let ctx = *ctx;
        let snapshot = self
            .db
            .transaction::<_, stock_snapshot::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    Self::adjust_stock_in_txn(
                        txn,
                        &ctx,
                        warehouse_id,
                        variant_id,
                        qty_delta,
                        kind,
                        reason,
                    )
                    .await
                })
            })
            .await
            .map_err(ServiceError::from)?;

        self.event_sender
            .emit(Event::StockAdjusted {
                tenant_id: ctx.tenant_id(),
                warehouse_id,
                variant_id,
                qty_delta,
                kind: kind.as_str().to_string(),
                new_on_hand: snapshot.on_hand,
            })
            .await;

        info!(
            warehouse_id = %warehouse_id,
            variant_id = %variant_id,
            qty_delta,
            kind = kind.as_str(),
            "Stock adjusted"
        );

        Ok(snapshot)
    }

    async fn adjust_stock_in_txn(
        txn: &DatabaseTransaction,
        ctx: &TenantContext,
        warehouse_id: Uuid,
        variant_id: Uuid,
        qty_delta: i64,
        kind: MovementKind,
        reason: Option<String>,
    ) -> Result<stock_snapshot::Model, ServiceError> {
        scope::find_by_id::<Warehouses, _>(ctx, txn, warehouse_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Warehouse {} not found", warehouse_id)))?;
        scope::find_by_id::<ProductVariants, _>(ctx, txn, variant_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Variant {} not found", variant_id)))?;

        let mut entry = NewLedgerEntry::new(warehouse_id, variant_id, qty_delta, kind);
        entry.reason = reason;
        LedgerService::append_within(txn, ctx, entry).await?;
        SnapshotService::apply_delta_within(txn, ctx, warehouse_id, variant_id, qty_delta, 0).await
    }

    /// See [`ReservationService::reserve`].
    pub async fn reserve(
        &self,
        ctx: &TenantContext,
        request: ReserveRequest,
    ) -> Result<ReserveOutcome, ServiceError> {
        self.reservations.reserve(ctx, request).await
    }

    /// See [`ReservationService::release`].
    pub async fn release(
        &self,
        ctx: &TenantContext,
        reservation_id: Uuid,
    ) -> Result<Option<reservation::Model>, ServiceError> {
        self.reservations.release(ctx, reservation_id).await
    }

    /// See [`ReservationService::consume`].
    pub async fn consume(
        &self,
        ctx: &TenantContext,
        reservation_id: Uuid,
    ) -> Result<Option<reservation::Model>, ServiceError> {
        self.reservations.consume(ctx, reservation_id).await
    }

    /// See [`SnapshotService::get_availability`].
    pub async fn get_availability(
        &self,
        ctx: &TenantContext,
        warehouse_id: Uuid,
        variant_id: Uuid,
    ) -> Result<Availability, ServiceError> {
        self.snapshots
            .get_availability(ctx, warehouse_id, variant_id)
            .await
    }

    /// See [`FulfillmentService::create_shipment`].
    pub async fn create_shipment(
        &self,
        ctx: &TenantContext,
        request: CreateShipment,
    ) -> Result<shipment::Model, ServiceError> {
        self.fulfillment.create_shipment(ctx, request).await
    }

    /// See [`FulfillmentService::cancel_shipment`].
    pub async fn cancel_shipment(
        &self,
        ctx: &TenantContext,
        shipment_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        self.fulfillment.cancel_shipment(ctx, shipment_id).await
    }

    /// See [`FulfillmentService::mark_shipped`].
    pub async fn mark_shipped(
        &self,
        ctx: &TenantContext,
        shipment_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        self.fulfillment.mark_shipped(ctx, shipment_id).await
    }

    /// See [`FulfillmentService::mark_delivered`].
    pub async fn mark_delivered(
        &self,
        ctx: &TenantContext,
        shipment_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        self.fulfillment.mark_delivered(ctx, shipment_id).await
    }

    /// See [`FulfillmentService::receive_return`].
    pub async fn receive_return(
        &self,
        ctx: &TenantContext,
        request: ReceiveReturn,
    ) -> Result<return_receipt::Model, ServiceError> {
        self.fulfillment.receive_return(ctx, request).await
    }

    /// Rebuilds one snapshot from the ledger and active reservations.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()))]
    pub async fn rebuild_snapshot(
        &self,
        ctx: &TenantContext,
        warehouse_id: Uuid,
        variant_id: Uuid,
    ) -> Result<stock_snapshot::Model, ServiceError> {
        let ctx = *ctx;
        self.db
            .transaction::<_, stock_snapshot::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    SnapshotService::rebuild_within(txn, &ctx, warehouse_id, variant_id).await
                })
            })
            .await
            .map_err(ServiceError::from)
    }

    /// See [`ReconciliationService::reconcile`].
    pub async fn reconcile(
        &self,
        ctx: &TenantContext,
        warehouse_id: Uuid,
        variant_id: Uuid,
    ) -> Result<ReconcileReport, ServiceError> {
        self.reconciliation
            .reconcile(ctx, warehouse_id, variant_id)
            .await
    }

    pub fn ledger(&self) -> &LedgerService {
        &self.ledger
    }

    pub fn snapshots(&self) -> &SnapshotService {
        &self.snapshots
    }

    pub fn reservations(&self) -> &ReservationService {
        &self.reservations
    }

    pub fn fulfillment(&self) -> &FulfillmentService {
        &self.fulfillment
    }

    pub fn reconciliation(&self) -> &ReconciliationService {
        &self.reconciliation
    }

    pub fn db(&self) -> &Arc<DatabaseConnection> {
        &self.db
    }
}
