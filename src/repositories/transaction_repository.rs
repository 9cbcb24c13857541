use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::{Expr, Func, LikeExpr, SimpleExpr},
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, FromQueryResult,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;

use crate::entities::inventory_transaction::{ActiveModel, Column, Entity as InventoryTransaction};
use crate::entities::{InventoryTransactionModel, TransactionType};
use crate::errors::ServiceError;
use crate::ledger::stock::{fold_balances, StockKey, StockMap};

/// Quantity total and row count for one (position, direction) group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionTotal {
    pub key: StockKey,
    pub transaction_type: TransactionType,
    pub quantity: i64,
    pub rows: i64,
}

#[derive(Debug, FromQueryResult)]
struct PositionTotalRow {
    item_id: Uuid,
    location_id: Uuid,
    kind: String,
    total: Option<i64>,
    row_count: i64,
}

impl TryFrom<PositionTotalRow> for PositionTotal {
    type Error = ServiceError;

    fn try_from(row: PositionTotalRow) -> Result<Self, Self::Error> {
        let transaction_type = TransactionType::from_str(&row.kind).map_err(|_| {
            ServiceError::InternalError(format!("unknown transaction type '{}'", row.kind))
        })?;
        Ok(Self {
            key: StockKey::new(row.item_id, row.location_id),
            transaction_type,
            quantity: row.total.unwrap_or(0),
            rows: row.row_count,
        })
    }
}

/// Ledger storage. Stock is never stored; it is summed from these rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionRepository;

impl TransactionRepository {
    pub async fn insert<C: ConnectionTrait>(
        conn: &C,
        row: InventoryTransactionModel,
    ) -> Result<InventoryTransactionModel, ServiceError> {
        row.into_active_model()
            .reset_all()
            .insert(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
    ) -> Result<Option<InventoryTransactionModel>, ServiceError> {
        InventoryTransaction::find_by_id(id)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn get<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
    ) -> Result<InventoryTransactionModel, ServiceError> {
        Self::find_by_id(conn, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Transaction {} not found", id)))
    }

    /// Writes back the descriptive fields of `row`. Stock-affecting columns are left untouched.
    pub async fn update_descriptive<C: ConnectionTrait>(
        conn: &C,
        row: InventoryTransactionModel,
    ) -> Result<InventoryTransactionModel, ServiceError> {
        let active = ActiveModel {
            id: Set(row.id),
            operator: Set(row.operator),
            supplier: Set(row.supplier),
            recipient: Set(row.recipient),
            purpose: Set(row.purpose),
            notes: Set(row.notes),
            ..Default::default()
        };
        active.update(conn).await.map_err(ServiceError::db_error)
    }

    pub async fn delete<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<u64, ServiceError> {
        let result = InventoryTransaction::delete_by_id(id)
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(result.rows_affected)
    }

    pub async fn delete_batch<C: ConnectionTrait>(
        conn: &C,
        batch_id: Uuid,
    ) -> Result<u64, ServiceError> {
        let result = InventoryTransaction::delete_many()
            .filter(Column::BatchId.eq(batch_id))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(result.rows_affected)
    }

    pub async fn find_by_batch<C: ConnectionTrait>(
        conn: &C,
        batch_id: Uuid,
    ) -> Result<Vec<InventoryTransactionModel>, ServiceError> {
        InventoryTransaction::find()
            .filter(Column::BatchId.eq(batch_id))
            .order_by_asc(Column::CreatedAt)
            .order_by_asc(Column::Id)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn count_batch_rows<C: ConnectionTrait>(
        conn: &C,
        batch_id: Uuid,
    ) -> Result<u64, ServiceError> {
        InventoryTransaction::find()
            .filter(Column::BatchId.eq(batch_id))
            .count(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Per-(position, direction) totals for the rows matching `condition`.
    pub async fn position_totals<C: ConnectionTrait>(
        conn: &C,
        condition: Condition,
    ) -> Result<Vec<PositionTotal>, ServiceError> {
        let rows = InventoryTransaction::find()
            .select_only()
            .column(Column::ItemId)
            .column(Column::LocationId)
            .column_as(Column::TransactionType, "kind")
            .column_as(Column::Quantity.sum(), "total")
            .column_as(Column::Id.count(), "row_count")
            .filter(condition)
            .group_by(Column::ItemId)
            .group_by(Column::LocationId)
            .group_by(Column::TransactionType)
            .into_model::<PositionTotalRow>()
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;

        rows.into_iter().map(PositionTotal::try_from).collect()
    }

    /// Raw balances for every position matching `condition`.
    pub async fn balances<C: ConnectionTrait>(
        conn: &C,
        condition: Condition,
    ) -> Result<StockMap, ServiceError> {
        let totals = Self::position_totals(conn, condition).await?;
        Ok(fold_balances(
            totals
                .into_iter()
                .map(|t| (t.key, t.transaction_type, t.quantity)),
        ))
    }

    /// Raw balance of a single position; zero when it has no rows.
    pub async fn balance<C: ConnectionTrait>(conn: &C, key: StockKey) -> Result<i64, ServiceError> {
        let map = Self::balances(conn, position_condition(key)).await?;
        Ok(map.get(&key).copied().unwrap_or(0))
    }

    /// Raw balances for exactly the requested positions, zero-filled.
    pub async fn stock_map<C: ConnectionTrait>(
        conn: &C,
        keys: &[StockKey],
    ) -> Result<StockMap, ServiceError> {
        if keys.is_empty() {
            return Ok(StockMap::new());
        }

        let item_ids: BTreeSet<Uuid> = keys.iter().map(|k| k.item_id).collect();
        let location_ids: BTreeSet<Uuid> = keys.iter().map(|k| k.location_id).collect();
        let condition = Condition::all()
            .add(Column::ItemId.is_in(item_ids))
            .add(Column::LocationId.is_in(location_ids));

        let all = Self::balances(conn, condition).await?;
        Ok(keys
            .iter()
            .map(|key| (*key, all.get(key).copied().unwrap_or(0)))
            .collect())
    }

    /// Signed sum of all rows for `item_id` (optionally one location) dated before `before`.
    pub async fn balance_before<C: ConnectionTrait>(
        conn: &C,
        item_id: Uuid,
        location_id: Option<Uuid>,
        before: DateTime<Utc>,
    ) -> Result<i64, ServiceError> {
        let condition = scope_condition(item_id, location_id).add(Column::Date.lt(before));
        let map = Self::balances(conn, condition).await?;
        Ok(map.values().sum())
    }

    /// Rows for `item_id` (optionally one location) dated on or after `from`, oldest first.
    pub async fn movements_since<C: ConnectionTrait>(
        conn: &C,
        item_id: Uuid,
        location_id: Option<Uuid>,
        from: DateTime<Utc>,
    ) -> Result<Vec<InventoryTransactionModel>, ServiceError> {
        InventoryTransaction::find()
            .filter(scope_condition(item_id, location_id).add(Column::Date.gte(from)))
            .order_by_asc(Column::Date)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn recent_for_item<C: ConnectionTrait>(
        conn: &C,
        item_id: Uuid,
        limit: u64,
    ) -> Result<Vec<InventoryTransactionModel>, ServiceError> {
        InventoryTransaction::find()
            .filter(Column::ItemId.eq(item_id))
            .order_by_desc(Column::Date)
            .order_by_desc(Column::CreatedAt)
            .limit(limit)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    /// One page of rows matching `condition`. `page` is 1-based.
    /// Returns the rows and the total number of matches.
    pub async fn search<C: ConnectionTrait>(
        conn: &C,
        condition: Condition,
        order_by: Column,
        descending: bool,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<InventoryTransactionModel>, u64), ServiceError> {
        let mut query = InventoryTransaction::find().filter(condition);
        query = if descending {
            query.order_by_desc(order_by).order_by_desc(Column::Id)
        } else {
            query.order_by_asc(order_by).order_by_asc(Column::Id)
        };

        let paginator = query.paginate(conn, limit);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::db_error)?;
        let rows = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((rows, total))
    }
}

/// Filter selecting one position.
pub fn position_condition(key: StockKey) -> Condition {
    Condition::all()
        .add(Column::ItemId.eq(key.item_id))
        .add(Column::LocationId.eq(key.location_id))
}

/// Filter selecting one item, optionally narrowed to one location.
pub fn scope_condition(item_id: Uuid, location_id: Option<Uuid>) -> Condition {
    let mut condition = Condition::all().add(Column::ItemId.eq(item_id));
    if let Some(location_id) = location_id {
        condition = condition.add(Column::LocationId.eq(location_id));
    }
    condition
}

/// Case-insensitive substring match on a text column. `%` and `_` in
/// `needle` match literally.
pub fn contains_ci(column: Column, needle: &str) -> SimpleExpr {
    let pattern = format!("%{}%", escape_like(&needle.trim().to_lowercase()));
    Expr::expr(Func::lower(Expr::col(column))).like(LikeExpr::new(pattern).escape(LIKE_ESCAPE))
}

const LIKE_ESCAPE: char = '\\';

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("c:\\tmp"), "c:\\\\tmp");
        assert_eq!(escape_like("plain"), "plain");
    }
}
