use std::sync::Arc;

use sea_orm::{ActiveModelTrait, Set};
use stockflow::db::{self, DbConfig};
use stockflow::entities::stock_ledger::MovementKind;
use stockflow::entities::{order, order_line, product, product_variant, tenant, warehouse};
use stockflow::events::{process_events, EventSender};
use stockflow::services::ReserveRequest;
use stockflow::{StockEngine, TenantContext};
use tokio::sync::mpsc;

// This test is ignored by default because row-lock serialization needs a
// real Postgres; SQLite's single-writer model makes it pass trivially.
// Run with: DATABASE_URL=postgres://... cargo test -- --ignored reserve_race
#[tokio::test]
#[ignore]
async fn reserve_race_never_overdraws() {
    let database_url = std::env::var("DATABASE_URL")
        .expect("set DATABASE_URL to a Postgres database to run this test");

    let pool = db::establish_connection_with_config(&DbConfig {
        url: database_url,
        max_connections: 10,
        ..Default::default()
    })
    .await
    .expect("db connect");
    db::run_migrations(&pool).await.expect("migrations");

    let pool = Arc::new(pool);
    let (tx, rx) = mpsc::channel(100);
    tokio::spawn(process_events(rx));
    let engine = StockEngine::new(pool.clone(), EventSender::new(tx));

    let created_tenant = tenant::ActiveModel {
        name: Set("race".to_string()),
        ..Default::default()
    }
    .insert(pool.as_ref())
    .await
    .unwrap();
    let ctx = TenantContext::new(created_tenant.id);

    let created_warehouse = warehouse::ActiveModel {
        tenant_id: Set(ctx.tenant_id()),
        code: Set("WH1".to_string()),
        name: Set("Race warehouse".to_string()),
        ..Default::default()
    }
    .insert(pool.as_ref())
    .await
    .unwrap();

    let created_product = product::ActiveModel {
        tenant_id: Set(ctx.tenant_id()),
        name: Set("Race product".to_string()),
        ..Default::default()
    }
    .insert(pool.as_ref())
    .await
    .unwrap();
    let created_variant = product_variant::ActiveModel {
        tenant_id: Set(ctx.tenant_id()),
        product_id: Set(created_product.id),
        sku: Set("RACE-1".to_string()),
        ..Default::default()
    }
    .insert(pool.as_ref())
    .await
    .unwrap();

    let created_order = order::ActiveModel {
        tenant_id: Set(ctx.tenant_id()),
        order_number: Set("SO-RACE".to_string()),
        status: Set("open".to_string()),
        ..Default::default()
    }
    .insert(pool.as_ref())
    .await
    .unwrap();
    let created_line = order_line::ActiveModel {
        tenant_id: Set(ctx.tenant_id()),
        order_id: Set(created_order.id),
        variant_id: Set(created_variant.id),
        qty: Set(20),
        ..Default::default()
    }
    .insert(pool.as_ref())
    .await
    .unwrap();

    engine
        .adjust_stock(
            &ctx,
            created_warehouse.id,
            created_variant.id,
            10,
            MovementKind::Receipt,
            None,
        )
        .await
        .unwrap();

    // 20 concurrent single-unit reserves against 10 available: exactly the
    // subset that fits may succeed.
    let mut tasks = Vec::new();
    for _ in 0..20 {
        let engine = engine.clone();
        let warehouse_id = created_warehouse.id;
        let variant_id = created_variant.id;
        let order_line_id = created_line.id;
        tasks.push(tokio::spawn(async move {
            engine
                .reserve(
                    &ctx,
                    ReserveRequest {
                        order_line_id,
                        warehouse_id,
                        variant_id,
                        qty: 1,
                        dedupe_key: None,
                    },
                )
                .await
                .is_ok()
        }));
    }

    let mut success = 0;
    for task in tasks {
        if task.await.unwrap_or(false) {
            success += 1;
        }
    }
    assert_eq!(
        success, 10,
        "exactly 10 reservations should succeed; got {}",
        success
    );

    let availability = engine
        .get_availability(&ctx, created_warehouse.id, created_variant.id)
        .await
        .unwrap();
    assert_eq!(availability.reserved, 10);
    assert_eq!(availability.available, 0);
}
