//! Inventory Query Service
//!
//! Read path over the ledger: per-position stock joined with item and
//! location metadata, low-stock alerts, per-location summaries, global
//! statistics and a daily movement series. Nothing here writes.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use sea_orm::{ColumnTrait, Condition, DatabaseConnection};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::entities::inventory_transaction::Column;
use crate::entities::{InventoryTransactionModel, ItemModel, LocationModel, TransactionType};
use crate::errors::ServiceError;
use crate::ledger::stock::{display_stock, StockMap};
use crate::repositories::{ItemRepository, LocationRepository, TransactionRepository};

const RECENT_TRANSACTIONS: u64 = 20;
const TOP_N: usize = 10;
const MAX_HISTORY_DAYS: u32 = 365;
pub const DEFAULT_HISTORY_DAYS: u32 = 30;

/// Filters for [`InventoryQueryService::get_inventory_status`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InventoryStatusFilter {
    /// Case-insensitive match on item name, category or location name
    pub search: Option<String>,
    pub category: Option<String>,
    pub location_id: Option<Uuid>,
    pub has_stock: Option<bool>,
    pub is_low_stock: Option<bool>,
    pub min_stock: Option<i64>,
    pub max_stock: Option<i64>,
}

/// Stock of one (item, location) position with its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryStatus {
    pub item_id: Uuid,
    pub item_name: String,
    pub category: String,
    pub unit: String,
    pub low_stock_threshold: i32,
    pub location_id: Uuid,
    pub location_code: String,
    pub location_name: String,
    pub current_stock: i64,
    pub is_low_stock: bool,
}

impl InventoryStatus {
    fn new(item: &ItemModel, location: &LocationModel, balance: i64) -> Self {
        let current_stock = display_stock(balance);
        Self {
            item_id: item.id,
            item_name: item.name.clone(),
            category: item.category.clone(),
            unit: item.unit.clone(),
            low_stock_threshold: item.low_stock_threshold,
            location_id: location.id,
            location_code: location.code.clone(),
            location_name: location.name.clone(),
            current_stock,
            is_low_stock: item.is_low_stock(current_stock),
        }
    }

    fn matches(&self, filter: &InventoryStatusFilter) -> bool {
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let hit = [&self.item_name, &self.category, &self.location_name]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        if let Some(category) = &filter.category {
            if !self.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(location_id) = filter.location_id {
            if self.location_id != location_id {
                return false;
            }
        }
        if let Some(has_stock) = filter.has_stock {
            if (self.current_stock > 0) != has_stock {
                return false;
            }
        }
        if let Some(is_low) = filter.is_low_stock {
            if self.is_low_stock != is_low {
                return false;
            }
        }
        if filter.min_stock.map_or(false, |min| self.current_stock < min) {
            return false;
        }
        if filter.max_stock.map_or(false, |max| self.current_stock > max) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationStock {
    pub location_id: Uuid,
    pub location_code: String,
    pub location_name: String,
    pub current_stock: i64,
    pub is_low_stock: bool,
}

/// One item across every location it has ledger rows at.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryDetail {
    pub item: ItemModel,
    pub total_stock: i64,
    pub is_low_stock: bool,
    pub locations: Vec<LocationStock>,
    /// Newest first
    pub recent_transactions: Vec<InventoryTransactionModel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockAlert {
    pub item_id: Uuid,
    pub item_name: String,
    pub category: String,
    pub unit: String,
    pub location_id: Uuid,
    pub location_code: String,
    pub location_name: String,
    pub current_stock: i64,
    /// Threshold the stock was compared against (override or item threshold)
    pub threshold: i64,
    pub stock_deficit: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationItemStock {
    pub item_id: Uuid,
    pub item_name: String,
    pub category: String,
    pub unit: String,
    pub current_stock: i64,
    pub low_stock_threshold: i32,
    pub is_low_stock: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInventorySummary {
    pub location: LocationModel,
    pub items: Vec<LocationItemStock>,
    pub total_items: usize,
    pub total_stock: i64,
    pub low_stock_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStock {
    pub category: String,
    pub total_stock: i64,
    pub item_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationStockTotal {
    pub location_id: Uuid,
    pub location_code: String,
    pub location_name: String,
    pub total_stock: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryStatistics {
    pub total_items: usize,
    pub total_locations: usize,
    pub total_stock: i64,
    pub low_stock_alerts: usize,
    pub zero_stock_positions: usize,
    pub top_categories: Vec<CategoryStock>,
    pub top_locations: Vec<LocationStockTotal>,
}

/// Movements of one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyMovement {
    pub date: NaiveDate,
    pub inbound: i64,
    pub outbound: i64,
    pub net_change: i64,
    pub running_stock: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryHistory {
    pub item_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<Uuid>,
    pub days: u32,
    /// Balance of every movement dated before the first day
    pub opening_stock: i64,
    pub series: Vec<DailyMovement>,
}

/// Buckets `movements` into one entry per day from `start` through `end`,
/// carrying a running balance seeded with `opening`.
pub fn daily_series(
    movements: &[InventoryTransactionModel],
    start: NaiveDate,
    end: NaiveDate,
    opening: i64,
) -> Vec<DailyMovement> {
    let mut buckets: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
    for row in movements {
        let bucket = buckets.entry(row.date.date_naive()).or_insert((0, 0));
        match row.transaction_type {
            TransactionType::Inbound => bucket.0 += i64::from(row.quantity),
            TransactionType::Outbound => bucket.1 += i64::from(row.quantity),
        }
    }

    let mut running = opening;
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(|date| {
            let (inbound, outbound) = buckets.get(&date).copied().unwrap_or((0, 0));
            let net_change = inbound - outbound;
            running += net_change;
            DailyMovement {
                date,
                inbound,
                outbound,
                net_change,
                running_stock: running,
            }
        })
        .collect()
}

/// Read-only queries over current stock.
#[derive(Clone)]
pub struct InventoryQueryService {
    db_pool: Arc<DatabaseConnection>,
}

impl InventoryQueryService {
    pub fn new(db_pool: Arc<DatabaseConnection>) -> Self {
        Self { db_pool }
    }

    /// Every position with ledger rows, joined with its item and location.
    /// Positions whose references no longer resolve are skipped.
    async fn positions(&self, condition: Condition) -> Result<Vec<InventoryStatus>, ServiceError> {
        let balances = TransactionRepository::balances(&*self.db_pool, condition).await?;
        let (items, locations) = self.references(&balances).await?;

        let mut rows: Vec<InventoryStatus> = balances
            .iter()
            .filter_map(|(key, balance)| {
                let item = items.get(&key.item_id)?;
                let location = locations.get(&key.location_id)?;
                Some(InventoryStatus::new(item, location, *balance))
            })
            .collect();
        rows.sort_by(|a, b| {
            a.item_name
                .cmp(&b.item_name)
                .then_with(|| a.item_id.cmp(&b.item_id))
                .then_with(|| a.location_code.cmp(&b.location_code))
        });
        Ok(rows)
    }

    async fn references(
        &self,
        balances: &StockMap,
    ) -> Result<(HashMap<Uuid, ItemModel>, HashMap<Uuid, LocationModel>), ServiceError> {
        let items =
            ItemRepository::find_by_ids(&*self.db_pool, balances.keys().map(|k| k.item_id)).await?;
        let locations =
            LocationRepository::find_by_ids(&*self.db_pool, balances.keys().map(|k| k.location_id))
                .await?;
        Ok((items, locations))
    }

    #[instrument(skip(self))]
    pub async fn get_inventory_status(
        &self,
        filter: InventoryStatusFilter,
    ) -> Result<Vec<InventoryStatus>, ServiceError> {
        let mut condition = Condition::all();
        if let Some(location_id) = filter.location_id {
            condition = condition.add(Column::LocationId.eq(location_id));
        }

        let rows: Vec<InventoryStatus> = self
            .positions(condition)
            .await?
            .into_iter()
            .filter(|row| row.matches(&filter))
            .collect();
        debug!(rows = rows.len(), "Inventory status computed");
        Ok(rows)
    }

    #[instrument(skip(self))]
    pub async fn get_item_inventory(&self, item_id: Uuid) -> Result<InventoryDetail, ServiceError> {
        let item = ItemRepository::get(&*self.db_pool, item_id).await?;
        let balances = TransactionRepository::balances(
            &*self.db_pool,
            Condition::all().add(Column::ItemId.eq(item_id)),
        )
        .await?;
        let locations =
            LocationRepository::find_by_ids(&*self.db_pool, balances.keys().map(|k| k.location_id))
                .await?;

        let mut per_location: Vec<LocationStock> = balances
            .iter()
            .filter_map(|(key, balance)| {
                let location = locations.get(&key.location_id)?;
                let current_stock = display_stock(*balance);
                Some(LocationStock {
                    location_id: location.id,
                    location_code: location.code.clone(),
                    location_name: location.name.clone(),
                    current_stock,
                    is_low_stock: item.is_low_stock(current_stock),
                })
            })
            .collect();
        per_location.sort_by(|a, b| a.location_code.cmp(&b.location_code));

        let total_stock: i64 = per_location.iter().map(|l| l.current_stock).sum();
        let recent_transactions =
            TransactionRepository::recent_for_item(&*self.db_pool, item_id, RECENT_TRANSACTIONS)
                .await?;

        Ok(InventoryDetail {
            is_low_stock: item.is_low_stock(total_stock),
            item,
            total_stock,
            locations: per_location,
            recent_transactions,
        })
    }

    /// Positions at or below their threshold. `threshold` overrides the
    /// item's own value, but items with a zero threshold never alert.
    #[instrument(skip(self))]
    pub async fn get_low_stock_items(
        &self,
        threshold: Option<i64>,
    ) -> Result<Vec<LowStockAlert>, ServiceError> {
        if threshold.map_or(false, |t| t < 0) {
            return Err(ServiceError::validation("threshold", "must not be negative"));
        }

        let balances = TransactionRepository::balances(&*self.db_pool, Condition::all()).await?;
        let (items, locations) = self.references(&balances).await?;

        let mut alerts: Vec<LowStockAlert> = balances
            .iter()
            .filter_map(|(key, balance)| {
                let item = items.get(&key.item_id)?;
                let location = locations.get(&key.location_id)?;
                if !item.alerts_enabled() {
                    return None;
                }
                let limit = threshold.unwrap_or_else(|| i64::from(item.low_stock_threshold));
                let current_stock = display_stock(*balance);
                (current_stock <= limit).then(|| LowStockAlert {
                    item_id: item.id,
                    item_name: item.name.clone(),
                    category: item.category.clone(),
                    unit: item.unit.clone(),
                    location_id: location.id,
                    location_code: location.code.clone(),
                    location_name: location.name.clone(),
                    current_stock,
                    threshold: limit,
                    stock_deficit: (limit - current_stock).max(0),
                })
            })
            .collect();

        alerts.sort_by(|a, b| {
            b.stock_deficit
                .cmp(&a.stock_deficit)
                .then_with(|| a.item_name.cmp(&b.item_name))
                .then_with(|| a.item_id.cmp(&b.item_id))
                .then_with(|| a.location_code.cmp(&b.location_code))
        });
        Ok(alerts)
    }

    /// Items in stock at one location, sorted by name.
    #[instrument(skip(self))]
    pub async fn get_location_inventory_summary(
        &self,
        location_id: Uuid,
    ) -> Result<LocationInventorySummary, ServiceError> {
        let location = LocationRepository::get(&*self.db_pool, location_id).await?;
        let balances = TransactionRepository::balances(
            &*self.db_pool,
            Condition::all().add(Column::LocationId.eq(location_id)),
        )
        .await?;
        let items =
            ItemRepository::find_by_ids(&*self.db_pool, balances.keys().map(|k| k.item_id)).await?;

        let mut rows: Vec<LocationItemStock> = balances
            .iter()
            .filter(|(_, balance)| **balance > 0)
            .filter_map(|(key, balance)| {
                let item = items.get(&key.item_id)?;
                Some(LocationItemStock {
                    item_id: item.id,
                    item_name: item.name.clone(),
                    category: item.category.clone(),
                    unit: item.unit.clone(),
                    current_stock: *balance,
                    low_stock_threshold: item.low_stock_threshold,
                    is_low_stock: item.is_low_stock(*balance),
                })
            })
            .collect();
        rows.sort_by(|a, b| a.item_name.cmp(&b.item_name).then(a.item_id.cmp(&b.item_id)));

        Ok(LocationInventorySummary {
            location,
            total_items: rows.len(),
            total_stock: rows.iter().map(|r| r.current_stock).sum(),
            low_stock_count: rows.iter().filter(|r| r.is_low_stock).count(),
            items: rows,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_inventory_statistics(&self) -> Result<InventoryStatistics, ServiceError> {
        let rows = self.positions(Condition::all()).await?;

        let total_items = rows.iter().map(|r| r.item_id).collect::<HashSet<_>>().len();
        let total_locations = rows.iter().map(|r| r.location_id).collect::<HashSet<_>>().len();

        let mut categories: HashMap<&str, (i64, HashSet<Uuid>)> = HashMap::new();
        let mut by_location: HashMap<Uuid, LocationStockTotal> = HashMap::new();
        for row in rows.iter().filter(|r| r.current_stock > 0) {
            let entry = categories.entry(row.category.as_str()).or_default();
            entry.0 += row.current_stock;
            entry.1.insert(row.item_id);

            by_location
                .entry(row.location_id)
                .or_insert_with(|| LocationStockTotal {
                    location_id: row.location_id,
                    location_code: row.location_code.clone(),
                    location_name: row.location_name.clone(),
                    total_stock: 0,
                })
                .total_stock += row.current_stock;
        }

        let mut top_categories: Vec<CategoryStock> = categories
            .into_iter()
            .map(|(category, (total_stock, items))| CategoryStock {
                category: category.to_string(),
                total_stock,
                item_count: items.len(),
            })
            .collect();
        top_categories.sort_by(|a, b| {
            b.total_stock
                .cmp(&a.total_stock)
                .then_with(|| a.category.cmp(&b.category))
        });
        top_categories.truncate(TOP_N);

        let mut top_locations: Vec<LocationStockTotal> = by_location.into_values().collect();
        top_locations.sort_by(|a, b| {
            b.total_stock
                .cmp(&a.total_stock)
                .then_with(|| a.location_code.cmp(&b.location_code))
        });
        top_locations.truncate(TOP_N);

        Ok(InventoryStatistics {
            total_items,
            total_locations,
            total_stock: rows.iter().map(|r| r.current_stock).sum(),
            low_stock_alerts: rows.iter().filter(|r| r.is_low_stock).count(),
            zero_stock_positions: rows.iter().filter(|r| r.current_stock == 0).count(),
            top_categories,
            top_locations,
        })
    }

    /// Daily movements over the trailing `days` UTC days ending today,
    /// including days without movements.
    #[instrument(skip(self))]
    pub async fn get_inventory_history(
        &self,
        item_id: Uuid,
        location_id: Option<Uuid>,
        days: u32,
    ) -> Result<InventoryHistory, ServiceError> {
        self.inventory_history_at(item_id, location_id, days, Utc::now())
            .await
    }

    /// [`Self::get_inventory_history`] with an explicit clock.
    pub async fn inventory_history_at(
        &self,
        item_id: Uuid,
        location_id: Option<Uuid>,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<InventoryHistory, ServiceError> {
        if days == 0 || days > MAX_HISTORY_DAYS {
            return Err(ServiceError::validation(
                "days",
                format!("must be between 1 and {}", MAX_HISTORY_DAYS),
            ));
        }
        ItemRepository::get(&*self.db_pool, item_id).await?;
        if let Some(location_id) = location_id {
            LocationRepository::get(&*self.db_pool, location_id).await?;
        }

        let today = now.date_naive();
        let start = today - Duration::days(i64::from(days) - 1);
        let window_start = Utc.from_utc_datetime(&start.and_time(NaiveTime::default()));

        let opening_stock =
            TransactionRepository::balance_before(&*self.db_pool, item_id, location_id, window_start)
                .await?;
        let movements =
            TransactionRepository::movements_since(&*self.db_pool, item_id, location_id, window_start)
                .await?;

        Ok(InventoryHistory {
            item_id,
            location_id,
            days,
            opening_stock,
            series: daily_series(&movements, start, today, opening_stock),
        })
    }
}
