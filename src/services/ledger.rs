//! Stock ledger: the append-only source of truth for quantity movements.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::entities::stock_ledger::{self, Entity as StockLedgerEntries, MovementKind};
use crate::errors::ServiceError;
use crate::scope::{self, TenantContext};

/// Parameters for one ledger append.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub warehouse_id: Uuid,
    pub variant_id: Uuid,
    pub qty_delta: i64,
    pub kind: MovementKind,
    pub reason: Option<String>,
    pub correlation_id: Option<Uuid>,
    pub ref_type: Option<String>,
    pub ref_id: Option<Uuid>,
}

impl NewLedgerEntry {
    pub fn new(warehouse_id: Uuid, variant_id: Uuid, qty_delta: i64, kind: MovementKind) -> Self {
        Self {
            warehouse_id,
            variant_id,
            qty_delta,
            kind,
            reason: None,
            correlation_id: None,
            ref_type: None,
            ref_id: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_ref(mut self, ref_type: impl Into<String>, ref_id: Uuid) -> Self {
        self.ref_type = Some(ref_type.into());
        self.ref_id = Some(ref_id);
        self
    }

    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

/// Service for the append-only stock ledger.
#[derive(Clone)]
pub struct LedgerService {
    db: Arc<DatabaseConnection>,
}

impl LedgerService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Appends one entry inside the caller's transaction. Pure insert: the
    /// business validation happened upstream, and the matching snapshot
    /// delta is applied in the same transaction by the caller.
    pub async fn append_within<C>(
        conn: &C,
        ctx: &TenantContext,
        entry: NewLedgerEntry,
    ) -> Result<stock_ledger::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        let model = stock_ledger::ActiveModel {
            tenant_id: Set(ctx.tenant_id()),
            warehouse_id: Set(entry.warehouse_id),
            variant_id: Set(entry.variant_id),
            qty_delta: Set(entry.qty_delta),
            kind: Set(entry.kind.as_str().to_string()),
            reason: Set(entry.reason),
            correlation_id: Set(entry.correlation_id),
            ref_type: Set(entry.ref_type),
            ref_id: Set(entry.ref_id),
            ..Default::default()
        };

        model.insert(conn).await.map_err(ServiceError::db_error)
    }

    /// Sum of all deltas for one `(warehouse, variant)`. Recovery path used
    /// by snapshot rebuild, not the availability hot path.
    pub(crate) async fn sum_within<C>(
        conn: &C,
        ctx: &TenantContext,
        warehouse_id: Uuid,
        variant_id: Uuid,
    ) -> Result<i64, ServiceError>
    where
        C: ConnectionTrait,
    {
        let entries = scope::scoped::<StockLedgerEntries>(ctx)
            .filter(stock_ledger::Column::WarehouseId.eq(warehouse_id))
            .filter(stock_ledger::Column::VariantId.eq(variant_id))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(entries.iter().map(|e| e.qty_delta).sum())
    }

    /// See [`LedgerService::sum_within`].
    #[instrument(skip(self))]
    pub async fn sum(
        &self,
        ctx: &TenantContext,
        warehouse_id: Uuid,
        variant_id: Uuid,
    ) -> Result<i64, ServiceError> {
        Self::sum_within(self.db.as_ref(), ctx, warehouse_id, variant_id).await
    }

    /// Paginated movement history for one `(warehouse, variant)`, newest
    /// first.
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        ctx: &TenantContext,
        warehouse_id: Uuid,
        variant_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<stock_ledger::Model>, u64), ServiceError> {
        if page == 0 {
            return Err(ServiceError::ValidationError(
                "Page number must be greater than 0".to_string(),
            ));
        }
        if limit == 0 || limit > 1000 {
            return Err(ServiceError::ValidationError(
                "Limit must be between 1 and 1000".to_string(),
            ));
        }

        let query = scope::scoped::<StockLedgerEntries>(ctx)
            .filter(stock_ledger::Column::WarehouseId.eq(warehouse_id))
            .filter(stock_ledger::Column::VariantId.eq(variant_id))
            .order_by_desc(stock_ledger::Column::CreatedAt);

        let paginator = query.paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let entries = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;

        Ok((entries, total))
    }
}
