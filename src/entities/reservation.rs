use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scope::TenantScoped;

/// Status for stock reservations.
///
/// `Active` transitions to `Released` or `Consumed` exactly once. A partial
/// consumption splits the row: the original becomes `Consumed` at the
/// consumed quantity and a fresh `Active` sibling carries the remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Active,
    Released,
    Consumed,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "active",
            ReservationStatus::Released => "released",
            ReservationStatus::Consumed => "consumed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ReservationStatus::Active),
            "released" => Some(ReservationStatus::Released),
            "consumed" => Some(ReservationStatus::Consumed),
            _ => None,
        }
    }
}

/// A claim against available stock tied to an order line.
///
/// `dedupe_key` is unique per tenant when present; retrying a create with the
/// same key returns the original row. `shipment_id` is stamped when a
/// shipment consumes the reservation so a cancellation can restore exactly
/// the rows it consumed.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reservations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub order_line_id: Uuid,
    pub warehouse_id: Uuid,
    pub variant_id: Uuid,
    pub qty: i64,
    pub status: String,
    pub dedupe_key: Option<String>,
    pub shipment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn status(&self) -> Option<ReservationStatus> {
        ReservationStatus::from_str(&self.status)
    }

    pub fn is_active(&self) -> bool {
        self.status() == Some(ReservationStatus::Active)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order_line::Entity",
        from = "Column::OrderLineId",
        to = "super::order_line::Column::Id"
    )]
    OrderLine,
}

impl Related<super::order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderLine.def()
    }
}

impl TenantScoped for Entity {
    fn tenant_column() -> Column {
        Column::TenantId
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();
        if insert {
            if let ActiveValue::NotSet = active_model.id {
                active_model.id = Set(Uuid::new_v4());
            }
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }
        active_model.updated_at = Set(Some(now));
        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservation_status_conversion() {
        assert_eq!(ReservationStatus::Active.as_str(), "active");
        assert_eq!(ReservationStatus::Consumed.as_str(), "consumed");
        assert_eq!(
            ReservationStatus::from_str("released"),
            Some(ReservationStatus::Released)
        );
        assert_eq!(ReservationStatus::from_str("pending"), None);
    }
}
