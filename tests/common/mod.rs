#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use sea_orm::{ActiveModelTrait, Set};
use stockflow::db::{self, DbConfig};
use stockflow::entities::{order, order_line, product, product_variant, tenant, warehouse};
use stockflow::events::{process_events, EventSender};
use stockflow::{StockEngine, TenantContext};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Test harness backed by an in-memory SQLite database.
///
/// The pool is pinned to a single connection so every handle sees the same
/// in-memory database.
pub struct TestApp {
    pub engine: StockEngine,
    pub db: Arc<db::DbPool>,
    pub event_sender: EventSender,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        stockflow::observability::init_tracing("warn");

        let config = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(5),
        };
        let pool = db::establish_connection_with_config(&config)
            .await
            .expect("db connect");
        db::run_migrations(&pool).await.expect("migrations");

        let pool = Arc::new(pool);
        let (tx, rx) = mpsc::channel(100);
        let event_sender = EventSender::new(tx);
        let event_task = tokio::spawn(process_events(rx));

        let engine = StockEngine::new(pool.clone(), event_sender.clone());

        Self {
            engine,
            db: pool,
            event_sender,
            _event_task: event_task,
        }
    }

    /// Creates a tenant and returns a context for it.
    pub async fn seed_tenant(&self, name: &str) -> TenantContext {
        let created = tenant::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed tenant");
        TenantContext::new(created.id)
    }

    pub async fn seed_warehouse(&self, ctx: &TenantContext, code: &str) -> Uuid {
        let created = warehouse::ActiveModel {
            tenant_id: Set(ctx.tenant_id()),
            code: Set(code.to_string()),
            name: Set(format!("Warehouse {code}")),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed warehouse");
        created.id
    }

    /// Creates a product with one variant and returns the variant id.
    pub async fn seed_variant(&self, ctx: &TenantContext, sku: &str) -> Uuid {
        let created_product = product::ActiveModel {
            tenant_id: Set(ctx.tenant_id()),
            name: Set(format!("Product for {sku}")),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed product");

        let created = product_variant::ActiveModel {
            tenant_id: Set(ctx.tenant_id()),
            product_id: Set(created_product.id),
            sku: Set(sku.to_string()),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed variant");
        created.id
    }

    /// Creates an order with a single line for `variant_id` and returns
    /// `(order_id, order_line_id)`.
    pub async fn seed_order_with_line(
        &self,
        ctx: &TenantContext,
        variant_id: Uuid,
        qty: i64,
    ) -> (Uuid, Uuid) {
        let created_order = order::ActiveModel {
            tenant_id: Set(ctx.tenant_id()),
            order_number: Set(format!("SO-{}", Uuid::new_v4())),
            status: Set("open".to_string()),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed order");

        let created_line = order_line::ActiveModel {
            tenant_id: Set(ctx.tenant_id()),
            order_id: Set(created_order.id),
            variant_id: Set(variant_id),
            qty: Set(qty),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed order line");

        (created_order.id, created_line.id)
    }

    /// Adds another line to an existing order.
    pub async fn seed_line(
        &self,
        ctx: &TenantContext,
        order_id: Uuid,
        variant_id: Uuid,
        qty: i64,
    ) -> Uuid {
        let created_line = order_line::ActiveModel {
            tenant_id: Set(ctx.tenant_id()),
            order_id: Set(order_id),
            variant_id: Set(variant_id),
            qty: Set(qty),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed order line");
        created_line.id
    }
}
