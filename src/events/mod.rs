use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the engine after a transaction commits.
///
/// Emission is strictly post-commit: an event never describes state that a
/// rollback could take back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    StockAdjusted {
        tenant_id: Uuid,
        warehouse_id: Uuid,
        variant_id: Uuid,
        qty_delta: i64,
        kind: String,
        new_on_hand: i64,
    },
    ReservationCreated {
        tenant_id: Uuid,
        reservation_id: Uuid,
        order_line_id: Uuid,
        qty: i64,
        reused: bool,
    },
    ReservationReleased {
        tenant_id: Uuid,
        reservation_id: Uuid,
        qty: i64,
    },
    ReservationConsumed {
        tenant_id: Uuid,
        reservation_id: Uuid,
        qty: i64,
    },
    ShipmentCreated {
        tenant_id: Uuid,
        shipment_id: Uuid,
        order_id: Uuid,
        line_count: usize,
    },
    ShipmentStatusChanged {
        tenant_id: Uuid,
        shipment_id: Uuid,
        old_status: String,
        new_status: String,
    },
    ShipmentCancelled {
        tenant_id: Uuid,
        shipment_id: Uuid,
    },
    ReturnReceived {
        tenant_id: Uuid,
        return_id: Uuid,
        order_id: Uuid,
        line_count: usize,
    },
    SnapshotDriftDetected {
        tenant_id: Uuid,
        warehouse_id: Uuid,
        variant_id: Uuid,
        drift_on_hand: i64,
        drift_reserved: i64,
    },
}

/// Cloneable handle for emitting events into the processing channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event. Failure here means the consumer is gone; the state
    /// change already committed, so callers log and move on rather than
    /// failing the operation.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Post-commit emission helper: logs on failure instead of propagating.
    pub async fn emit(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Event channel closed; dropping event");
        }
    }
}

/// Drains the event channel, logging each event. Spawn alongside the engine:
///
/// ```ignore
/// let (tx, rx) = tokio::sync::mpsc::channel(100);
/// tokio::spawn(process_events(rx));
/// let sender = EventSender::new(tx);
/// ```
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::SnapshotDriftDetected {
                tenant_id,
                warehouse_id,
                variant_id,
                drift_on_hand,
                drift_reserved,
            } => {
                warn!(
                    tenant_id = %tenant_id,
                    warehouse_id = %warehouse_id,
                    variant_id = %variant_id,
                    drift_on_hand,
                    drift_reserved,
                    "Snapshot drift detected"
                );
            }
            other => {
                info!(event = ?other, "Processing event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_survives_a_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        // Must not panic or error out of the caller.
        sender
            .emit(Event::ReservationReleased {
                tenant_id: Uuid::new_v4(),
                reservation_id: Uuid::new_v4(),
                qty: 1,
            })
            .await;
    }

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = EventSender::new(tx);
        sender
            .send(Event::ShipmentCancelled {
                tenant_id: Uuid::new_v4(),
                shipment_id: Uuid::new_v4(),
            })
            .await
            .unwrap();
        assert!(matches!(
            rx.recv().await,
            Some(Event::ShipmentCancelled { .. })
        ));
    }
}
