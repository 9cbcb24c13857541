use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A trackable office-supply type. Owned by the item catalog; read-only here.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "items")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub specification: Option<String>,
    pub default_location_id: Option<Uuid>,
    /// Stock at or below this level is flagged. Zero disables alerting.
    pub low_stock_threshold: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::inventory_transaction::Entity")]
    InventoryTransactions,
}

impl Related<super::inventory_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryTransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn alerts_enabled(&self) -> bool {
        self.low_stock_threshold > 0
    }

    /// Whether `stock` should be flagged against this item's own threshold.
    pub fn is_low_stock(&self, stock: i64) -> bool {
        self.alerts_enabled() && stock <= i64::from(self.low_stock_threshold)
    }
}
