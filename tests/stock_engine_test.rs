mod common;

use assert_matches::assert_matches;
use common::TestApp;
use stockflow::entities::stock_ledger::MovementKind;
use stockflow::errors::ServiceError;
use stockflow::services::ReserveRequest;

#[tokio::test]
async fn adjust_creates_snapshot_lazily_and_reads_back() {
    let app = TestApp::new().await;
    let ctx = app.seed_tenant("acme").await;
    let warehouse = app.seed_warehouse(&ctx, "WH1").await;
    let variant = app.seed_variant(&ctx, "SKU-1").await;

    // Nothing has moved yet: reads as zeros, not an error.
    let availability = app
        .engine
        .get_availability(&ctx, warehouse, variant)
        .await
        .unwrap();
    assert_eq!(availability.on_hand, 0);
    assert_eq!(availability.available, 0);

    let snapshot = app
        .engine
        .adjust_stock(&ctx, warehouse, variant, 10, MovementKind::Receipt, None)
        .await
        .unwrap();
    assert_eq!(snapshot.on_hand, 10);
    assert_eq!(snapshot.reserved, 0);
    assert_eq!(snapshot.available, 10);

    let availability = app
        .engine
        .get_availability(&ctx, warehouse, variant)
        .await
        .unwrap();
    assert_eq!(availability.on_hand, 10);
    assert_eq!(availability.available, 10);
}

#[tokio::test]
async fn adjust_rejects_zero_delta_and_foreign_kinds() {
    let app = TestApp::new().await;
    let ctx = app.seed_tenant("acme").await;
    let warehouse = app.seed_warehouse(&ctx, "WH1").await;
    let variant = app.seed_variant(&ctx, "SKU-1").await;

    assert_matches!(
        app.engine
            .adjust_stock(&ctx, warehouse, variant, 0, MovementKind::Adjust, None)
            .await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        app.engine
            .adjust_stock(&ctx, warehouse, variant, 5, MovementKind::Ship, None)
            .await,
        Err(ServiceError::ValidationError(_))
    );

    // The warehouse and variant must exist under this tenant.
    assert_matches!(
        app.engine
            .adjust_stock(
                &ctx,
                warehouse,
                uuid::Uuid::new_v4(),
                5,
                MovementKind::Receipt,
                None
            )
            .await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn snapshot_on_hand_equals_ledger_sum() {
    let app = TestApp::new().await;
    let ctx = app.seed_tenant("acme").await;
    let warehouse = app.seed_warehouse(&ctx, "WH1").await;
    let variant = app.seed_variant(&ctx, "SKU-1").await;

    app.engine
        .adjust_stock(&ctx, warehouse, variant, 10, MovementKind::Receipt, None)
        .await
        .unwrap();
    app.engine
        .adjust_stock(
            &ctx,
            warehouse,
            variant,
            -3,
            MovementKind::Adjust,
            Some("cycle count shrinkage".to_string()),
        )
        .await
        .unwrap();
    let snapshot = app
        .engine
        .adjust_stock(&ctx, warehouse, variant, 5, MovementKind::Receipt, None)
        .await
        .unwrap();

    let ledger_sum = app
        .engine
        .ledger()
        .sum(&ctx, warehouse, variant)
        .await
        .unwrap();
    assert_eq!(snapshot.on_hand, 12);
    assert_eq!(ledger_sum, snapshot.on_hand);
    assert_eq!(snapshot.available, snapshot.on_hand - snapshot.reserved);
}

/// Full lifecycle: adjust +10, reserve 3 (deduped), release it, reserve 2,
/// consume it. Final snapshot must read 8 on hand, 0 reserved, 8 available.
#[tokio::test]
async fn adjust_reserve_release_consume_scenario() {
    let app = TestApp::new().await;
    let ctx = app.seed_tenant("t1").await;
    let warehouse = app.seed_warehouse(&ctx, "WH1").await;
    let variant = app.seed_variant(&ctx, "V1").await;
    let (_order, line) = app.seed_order_with_line(&ctx, variant, 5).await;

    app.engine
        .adjust_stock(&ctx, warehouse, variant, 10, MovementKind::Receipt, None)
        .await
        .unwrap();

    let first = app
        .engine
        .reserve(
            &ctx,
            ReserveRequest {
                order_line_id: line,
                warehouse_id: warehouse,
                variant_id: variant,
                qty: 3,
                dedupe_key: Some("k1".to_string()),
            },
        )
        .await
        .unwrap();
    assert!(!first.reused);

    let availability = app
        .engine
        .get_availability(&ctx, warehouse, variant)
        .await
        .unwrap();
    assert_eq!(
        (availability.on_hand, availability.reserved, availability.available),
        (10, 3, 7)
    );

    app.engine
        .release(&ctx, first.reservation.id)
        .await
        .unwrap()
        .expect("release active reservation");

    let second = app
        .engine
        .reserve(
            &ctx,
            ReserveRequest {
                order_line_id: line,
                warehouse_id: warehouse,
                variant_id: variant,
                qty: 2,
                dedupe_key: None,
            },
        )
        .await
        .unwrap();
    app.engine
        .consume(&ctx, second.reservation.id)
        .await
        .unwrap()
        .expect("consume active reservation");

    let availability = app
        .engine
        .get_availability(&ctx, warehouse, variant)
        .await
        .unwrap();
    assert_eq!(
        (availability.on_hand, availability.reserved, availability.available),
        (8, 0, 8)
    );

    // The ledger agrees with the projection.
    let ledger_sum = app
        .engine
        .ledger()
        .sum(&ctx, warehouse, variant)
        .await
        .unwrap();
    assert_eq!(ledger_sum, 8);
}

#[tokio::test]
async fn ledger_history_paginates_newest_first() {
    let app = TestApp::new().await;
    let ctx = app.seed_tenant("acme").await;
    let warehouse = app.seed_warehouse(&ctx, "WH1").await;
    let variant = app.seed_variant(&ctx, "SKU-1").await;

    for delta in [10, -2, 4] {
        let kind = if delta > 0 {
            MovementKind::Receipt
        } else {
            MovementKind::Adjust
        };
        app.engine
            .adjust_stock(&ctx, warehouse, variant, delta, kind, None)
            .await
            .unwrap();
    }

    let (page, total) = app
        .engine
        .ledger()
        .history(&ctx, warehouse, variant, 1, 2)
        .await
        .unwrap();
    assert_eq!(total, 3);
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].qty_delta, 4);

    assert_matches!(
        app.engine.ledger().history(&ctx, warehouse, variant, 0, 2).await,
        Err(ServiceError::ValidationError(_))
    );
}
