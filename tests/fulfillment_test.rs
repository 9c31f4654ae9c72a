mod common;

use assert_matches::assert_matches;
use common::TestApp;
use stockflow::entities::reservation::ReservationStatus;
use stockflow::entities::shipment::ShipmentStatus;
use stockflow::entities::stock_ledger::MovementKind;
use stockflow::errors::ServiceError;
use stockflow::services::{
    CreateShipment, ReceiveReturn, ReserveRequest, ReturnLineRequest, ShipmentLineRequest,
};
use uuid::Uuid;

#[tokio::test]
async fn shipment_consumes_reservations_and_decrements_stock() {
    let app = TestApp::new().await;
    let ctx = app.seed_tenant("acme").await;
    let warehouse = app.seed_warehouse(&ctx, "WH1").await;
    let variant = app.seed_variant(&ctx, "SKU-1").await;
    let (order, line) = app.seed_order_with_line(&ctx, variant, 5).await;

    app.engine
        .adjust_stock(&ctx, warehouse, variant, 10, MovementKind::Receipt, None)
        .await
        .unwrap();
    app.engine
        .reserve(
            &ctx,
            ReserveRequest {
                order_line_id: line,
                warehouse_id: warehouse,
                variant_id: variant,
                qty: 5,
                dedupe_key: None,
            },
        )
        .await
        .unwrap();

    let created = app
        .engine
        .create_shipment(
            &ctx,
            CreateShipment {
                order_id: order,
                warehouse_id: warehouse,
                lines: vec![ShipmentLineRequest {
                    order_line_id: line,
                    variant_id: variant,
                    qty: 3,
                }],
            },
        )
        .await
        .unwrap();
    assert_eq!(created.status(), Some(ShipmentStatus::Created));

    // 3 shipped out of 5 reserved: the reservation split.
    let availability = app
        .engine
        .get_availability(&ctx, warehouse, variant)
        .await
        .unwrap();
    assert_eq!(
        (availability.on_hand, availability.reserved, availability.available),
        (7, 2, 5)
    );

    let reservations = app
        .engine
        .reservations()
        .list_for_order_line(&ctx, line)
        .await
        .unwrap();
    let consumed: Vec<_> = reservations
        .iter()
        .filter(|r| r.status() == Some(ReservationStatus::Consumed))
        .collect();
    let active: Vec<_> = reservations
        .iter()
        .filter(|r| r.status() == Some(ReservationStatus::Active))
        .collect();
    assert_eq!(consumed.len(), 1);
    assert_eq!(consumed[0].qty, 3);
    assert_eq!(consumed[0].shipment_id, Some(created.id));
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].qty, 2);

    let (_, lines) = app
        .engine
        .fulfillment()
        .get_shipment(&ctx, created.id)
        .await
        .unwrap()
        .expect("shipment exists");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].qty, 3);

    // Projection still agrees with the ledger.
    let ledger_sum = app
        .engine
        .ledger()
        .sum(&ctx, warehouse, variant)
        .await
        .unwrap();
    assert_eq!(ledger_sum, 7);
}

#[tokio::test]
async fn shipment_is_all_or_nothing_across_lines() {
    let app = TestApp::new().await;
    let ctx = app.seed_tenant("acme").await;
    let warehouse = app.seed_warehouse(&ctx, "WH1").await;
    let variant_a = app.seed_variant(&ctx, "SKU-A").await;
    let variant_b = app.seed_variant(&ctx, "SKU-B").await;
    let (order, line_a) = app.seed_order_with_line(&ctx, variant_a, 5).await;
    let line_b = app.seed_line(&ctx, order, variant_b, 2).await;

    for variant in [variant_a, variant_b] {
        app.engine
            .adjust_stock(&ctx, warehouse, variant, 10, MovementKind::Receipt, None)
            .await
            .unwrap();
    }
    app.engine
        .reserve(
            &ctx,
            ReserveRequest {
                order_line_id: line_a,
                warehouse_id: warehouse,
                variant_id: variant_a,
                qty: 5,
                dedupe_key: None,
            },
        )
        .await
        .unwrap();
    // Line B only has 1 reserved; shipping 2 must sink the whole shipment.
    app.engine
        .reserve(
            &ctx,
            ReserveRequest {
                order_line_id: line_b,
                warehouse_id: warehouse,
                variant_id: variant_b,
                qty: 1,
                dedupe_key: None,
            },
        )
        .await
        .unwrap();

    let result = app
        .engine
        .create_shipment(
            &ctx,
            CreateShipment {
                order_id: order,
                warehouse_id: warehouse,
                lines: vec![
                    ShipmentLineRequest {
                        order_line_id: line_a,
                        variant_id: variant_a,
                        qty: 3,
                    },
                    ShipmentLineRequest {
                        order_line_id: line_b,
                        variant_id: variant_b,
                        qty: 2,
                    },
                ],
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::ReservationShortage(_)));

    // Line A's consumption rolled back with everything else.
    let availability_a = app
        .engine
        .get_availability(&ctx, warehouse, variant_a)
        .await
        .unwrap();
    assert_eq!(
        (availability_a.on_hand, availability_a.reserved),
        (10, 5)
    );
    let reservations_a = app
        .engine
        .reservations()
        .list_for_order_line(&ctx, line_a)
        .await
        .unwrap();
    assert!(reservations_a.iter().all(|r| r.is_active()));
}

#[tokio::test]
async fn shipment_lifecycle_transitions_in_order() {
    let app = TestApp::new().await;
    let ctx = app.seed_tenant("acme").await;
    let warehouse = app.seed_warehouse(&ctx, "WH1").await;
    let variant = app.seed_variant(&ctx, "SKU-1").await;
    let (order, line) = app.seed_order_with_line(&ctx, variant, 2).await;

    app.engine
        .adjust_stock(&ctx, warehouse, variant, 5, MovementKind::Receipt, None)
        .await
        .unwrap();
    app.engine
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
    let created = app
        .engine
        .create_shipment(
            &ctx,
            CreateShipment {
                order_id: order,
                warehouse_id: warehouse,
                lines: vec![ShipmentLineRequest {
                    order_line_id: line,
                    variant_id: variant,
                    qty: 2,
                }],
            },
        )
        .await
        .unwrap();

    // Delivery before shipping is out of order.
    assert_matches!(
        app.engine.mark_delivered(&ctx, created.id).await,
        Err(ServiceError::InvalidStatus(_))
    );

    let shipped = app.engine.mark_shipped(&ctx, created.id).await.unwrap();
    assert_eq!(shipped.status(), Some(ShipmentStatus::Shipped));

    // Only pre-ship shipments may be cancelled.
    assert_matches!(
        app.engine.cancel_shipment(&ctx, created.id).await,
        Err(ServiceError::InvalidStatus(_))
    );

    let delivered = app.engine.mark_delivered(&ctx, created.id).await.unwrap();
    assert_eq!(delivered.status(), Some(ShipmentStatus::Delivered));
}

#[tokio::test]
async fn cancelling_a_shipment_restores_reservations_and_stock() {
    let app = TestApp::new().await;
    let ctx = app.seed_tenant("acme").await;
    let warehouse = app.seed_warehouse(&ctx, "WH1").await;
    let variant = app.seed_variant(&ctx, "SKU-1").await;
    let (order, line) = app.seed_order_with_line(&ctx, variant, 5).await;

    app.engine
        .adjust_stock(&ctx, warehouse, variant, 10, MovementKind::Receipt, None)
        .await
        .unwrap();
    app.engine
        .reserve(
            &ctx,
            ReserveRequest {
                order_line_id: line,
                warehouse_id: warehouse,
                variant_id: variant,
                qty: 5,
                dedupe_key: None,
            },
        )
        .await
        .unwrap();
    let created = app
        .engine
        .create_shipment(
            &ctx,
            CreateShipment {
                order_id: order,
                warehouse_id: warehouse,
                lines: vec![ShipmentLineRequest {
                    order_line_id: line,
                    variant_id: variant,
                    qty: 3,
                }],
            },
        )
        .await
        .unwrap();

    let cancelled = app.engine.cancel_shipment(&ctx, created.id).await.unwrap();
    assert_eq!(cancelled.status(), Some(ShipmentStatus::Cancelled));

    // Pre-shipment state: 10 on hand, 5 reserved across the split rows.
    let availability = app
        .engine
        .get_availability(&ctx, warehouse, variant)
        .await
        .unwrap();
    assert_eq!(
        (availability.on_hand, availability.reserved, availability.available),
        (10, 5, 5)
    );

    let reservations = app
        .engine
        .reservations()
        .list_for_order_line(&ctx, line)
        .await
        .unwrap();
    assert!(reservations.iter().all(|r| r.is_active()));
    let total: i64 = reservations.iter().map(|r| r.qty).sum();
    assert_eq!(total, 5);

    // Compensating entries keep the ledger in agreement.
    let ledger_sum = app
        .engine
        .ledger()
        .sum(&ctx, warehouse, variant)
        .await
        .unwrap();
    assert_eq!(ledger_sum, 10);
}

#[tokio::test]
async fn returns_increment_on_hand_and_leave_reservations_alone() {
    let app = TestApp::new().await;
    let ctx = app.seed_tenant("acme").await;
    let warehouse = app.seed_warehouse(&ctx, "WH1").await;
    let variant = app.seed_variant(&ctx, "SKU-1").await;
    let (order, line) = app.seed_order_with_line(&ctx, variant, 5).await;

    app.engine
        .adjust_stock(&ctx, warehouse, variant, 10, MovementKind::Receipt, None)
        .await
        .unwrap();
    app.engine
        .reserve(
            &ctx,
            ReserveRequest {
                order_line_id: line,
                warehouse_id: warehouse,
                variant_id: variant,
                qty: 3,
                dedupe_key: None,
            },
        )
        .await
        .unwrap();

    app.engine
        .receive_return(
            &ctx,
            ReceiveReturn {
                order_id: order,
                warehouse_id: warehouse,
                lines: vec![ReturnLineRequest {
                    order_line_id: line,
                    variant_id: variant,
                    qty: 2,
                    reason: Some("damaged box".to_string()),
                }],
            },
        )
        .await
        .unwrap();

    let availability = app
        .engine
        .get_availability(&ctx, warehouse, variant)
        .await
        .unwrap();
    assert_eq!(
        (availability.on_hand, availability.reserved, availability.available),
        (12, 3, 9)
    );
}

#[tokio::test]
async fn shipment_and_return_validate_their_lines() {
    let app = TestApp::new().await;
    let ctx = app.seed_tenant("acme").await;
    let warehouse = app.seed_warehouse(&ctx, "WH1").await;
    let variant = app.seed_variant(&ctx, "SKU-1").await;
    let other_variant = app.seed_variant(&ctx, "SKU-2").await;
    let (order, line) = app.seed_order_with_line(&ctx, variant, 5).await;

    // Empty shipment.
    assert_matches!(
        app.engine
            .create_shipment(
                &ctx,
                CreateShipment {
                    order_id: order,
                    warehouse_id: warehouse,
                    lines: vec![],
                },
            )
            .await,
        Err(ServiceError::ValidationError(_))
    );

    // Unknown order.
    assert_matches!(
        app.engine
            .create_shipment(
                &ctx,
                CreateShipment {
                    order_id: Uuid::new_v4(),
                    warehouse_id: warehouse,
                    lines: vec![ShipmentLineRequest {
                        order_line_id: line,
                        variant_id: variant,
                        qty: 1,
                    }],
                },
            )
            .await,
        Err(ServiceError::NotFound(_))
    );

    // Unknown order line.
    assert_matches!(
        app.engine
            .receive_return(
                &ctx,
                ReceiveReturn {
                    order_id: order,
                    warehouse_id: warehouse,
                    lines: vec![ReturnLineRequest {
                        order_line_id: Uuid::new_v4(),
                        variant_id: variant,
                        qty: 1,
                        reason: None,
                    }],
                },
            )
            .await,
        Err(ServiceError::OrderLineNotFound(_))
    );

    // Line exists but tracks a different variant.
    assert_matches!(
        app.engine
            .receive_return(
                &ctx,
                ReceiveReturn {
                    order_id: order,
                    warehouse_id: warehouse,
                    lines: vec![ReturnLineRequest {
                        order_line_id: line,
                        variant_id: other_variant,
                        qty: 1,
                        reason: None,
                    }],
                },
            )
            .await,
        Err(ServiceError::VariantMismatch(_))
    );
}
