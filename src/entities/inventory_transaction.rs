use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a stock movement.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransactionType {
    #[sea_orm(string_value = "inbound")]
    Inbound,
    #[sea_orm(string_value = "outbound")]
    Outbound,
}

impl TransactionType {
    pub fn opposite(self) -> Self {
        match self {
            TransactionType::Inbound => TransactionType::Outbound,
            TransactionType::Outbound => TransactionType::Inbound,
        }
    }

    /// Signed stock effect of `quantity` units moving in this direction.
    pub fn signed(self, quantity: i32) -> i64 {
        match self {
            TransactionType::Inbound => i64::from(quantity),
            TransactionType::Outbound => -i64::from(quantity),
        }
    }
}

/// One ledger row. Rows are only ever inserted, patched on descriptive fields, or deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_transactions")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub item_id: Uuid,
    pub location_id: Uuid,
    #[sea_orm(column_name = "type")]
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub quantity: i32,
    pub date: DateTime<Utc>,
    pub operator: String,
    pub supplier: Option<String>,
    pub recipient: Option<String>,
    pub purpose: Option<String>,
    pub notes: String,
    pub batch_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::item::Entity",
        from = "Column::ItemId",
        to = "super::item::Column::Id"
    )]
    Item,
    #[sea_orm(
        belongs_to = "super::location::Entity",
        from = "Column::LocationId",
        to = "super::location::Column::Id"
    )]
    Location,
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl Related<super::location::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Location.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Signed stock effect of this row.
    pub fn signed_quantity(&self) -> i64 {
        self.transaction_type.signed(self.quantity)
    }
}
