use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scope::TenantScoped;

/// Kinds of stock movement recorded in the ledger.
///
/// `Reserve` and `Release` rows always carry a zero `qty_delta`; they exist
/// for the audit trail, while the reserved quantity itself lives only in the
/// snapshot's `reserved` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementKind {
    Receipt,
    Adjust,
    Reserve,
    Release,
    Ship,
    Return,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Receipt => "receipt",
            MovementKind::Adjust => "adjust",
            MovementKind::Reserve => "reserve",
            MovementKind::Release => "release",
            MovementKind::Ship => "ship",
            MovementKind::Return => "return",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "receipt" => Some(MovementKind::Receipt),
            "adjust" => Some(MovementKind::Adjust),
            "reserve" => Some(MovementKind::Reserve),
            "release" => Some(MovementKind::Release),
            "ship" => Some(MovementKind::Ship),
            "return" => Some(MovementKind::Return),
            _ => None,
        }
    }
}

/// Append-only record of a signed quantity movement. Rows are never updated
/// or deleted; the ledger is the source of truth the snapshot is rebuilt
/// from.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub warehouse_id: Uuid,
    pub variant_id: Uuid,
    pub qty_delta: i64,
    pub kind: String,
    pub reason: Option<String>,
    pub correlation_id: Option<Uuid>,
    pub ref_type: Option<String>,
    pub ref_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn kind(&self) -> Option<MovementKind> {
        MovementKind::from_str(&self.kind)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

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
        if insert {
            if let ActiveValue::NotSet = active_model.id {
                active_model.id = Set(Uuid::new_v4());
            }
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(Utc::now());
            }
        }
        Ok(active_model)
    }
}
