use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

use crate::entities::TransactionType;

/// Identifies one stock position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockKey {
    pub item_id: Uuid,
    pub location_id: Uuid,
}

impl StockKey {
    pub fn new(item_id: Uuid, location_id: Uuid) -> Self {
        Self {
            item_id,
            location_id,
        }
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.item_id, self.location_id)
    }
}

/// Raw ledger balance per position (Σ inbound − Σ outbound). May be negative
/// only if the ledger was written around the sufficiency checks.
pub type StockMap = HashMap<StockKey, i64>;

/// Floors a raw balance for display.
pub fn display_stock(balance: i64) -> i64 {
    balance.max(0)
}

/// Folds per-(position, direction) quantity totals into balances.
pub fn fold_balances<I>(totals: I) -> StockMap
where
    I: IntoIterator<Item = (StockKey, TransactionType, i64)>,
{
    let mut map = StockMap::new();
    for (key, transaction_type, total) in totals {
        let entry = map.entry(key).or_insert(0);
        match transaction_type {
            TransactionType::Inbound => *entry += total,
            TransactionType::Outbound => *entry -= total,
        }
    }
    map
}

/// One position whose requested outbound quantity exceeds what is on hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockShortfall {
    pub item_id: Uuid,
    pub location_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    pub required: i64,
    pub available: i64,
}

impl fmt::Display for StockShortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let item = self
            .item_name
            .clone()
            .unwrap_or_else(|| self.item_id.to_string());
        let location = self
            .location_name
            .clone()
            .unwrap_or_else(|| self.location_id.to_string());
        write!(
            f,
            "insufficient stock for item {} at location {}: need {}, have {}",
            item, location, self.required, self.available
        )
    }
}

/// Outcome of an aggregate sufficiency check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAvailability {
    pub shortfalls: Vec<StockShortfall>,
}

impl StockAvailability {
    pub fn is_valid(&self) -> bool {
        self.shortfalls.is_empty()
    }

    pub fn errors(&self) -> Vec<String> {
        self.shortfalls.iter().map(ToString::to_string).collect()
    }

    /// Fills in human-readable names where the lookups know them.
    pub fn with_names(
        mut self,
        item_names: &HashMap<Uuid, String>,
        location_names: &HashMap<Uuid, String>,
    ) -> Self {
        for shortfall in &mut self.shortfalls {
            shortfall.item_name = item_names.get(&shortfall.item_id).cloned();
            shortfall.location_name = location_names.get(&shortfall.location_id).cloned();
        }
        self
    }
}

/// Checks a set of prospective outbound movements against current balances.
///
/// Demand is summed per position first, so several rows drawing on the same
/// position are judged together: three rows of 40 against 100 on hand fail.
/// Produces at most one shortfall per position, ordered by key.
pub fn validate_stock_availability<I>(outbound: I, current: &StockMap) -> StockAvailability
where
    I: IntoIterator<Item = (StockKey, i64)>,
{
    let mut demand: BTreeMap<StockKey, i64> = BTreeMap::new();
    for (key, quantity) in outbound {
        *demand.entry(key).or_insert(0) += quantity;
    }

    let shortfalls = demand
        .into_iter()
        .filter_map(|(key, required)| {
            let available = display_stock(current.get(&key).copied().unwrap_or(0));
            (required > available).then(|| StockShortfall {
                item_id: key.item_id,
                location_id: key.location_id,
                item_name: None,
                location_name: None,
                required,
                available,
            })
        })
        .collect();

    StockAvailability { shortfalls }
}
