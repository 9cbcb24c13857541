#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use office_inventory::{
    config::AppConfig,
    db,
    entities::{item, location, InventoryTransactionModel, ItemModel, LocationModel},
    ledger::TransactionDraft,
    AppState,
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use uuid::Uuid;

/// Application state backed by a fresh in-memory SQLite database.
///
/// The pool holds a single connection so every query sees the same database.
pub struct TestApp {
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        adjust(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::check_connection(&pool)
            .await
            .expect("test database did not answer a ping");

        Self {
            state: AppState::new(Arc::new(pool), cfg),
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }

    pub async fn seed_item(&self, name: &str, category: &str, low_stock_threshold: i32) -> ItemModel {
        let now = Utc::now();
        item::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            category: Set(category.to_string()),
            unit: Set("pcs".to_string()),
            specification: Set(None),
            default_location_id: Set(None),
            low_stock_threshold: Set(low_stock_threshold),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db())
        .await
        .expect("failed to seed item")
    }

    pub async fn seed_location(&self, code: &str, name: &str) -> LocationModel {
        location::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            name: Set(name.to_string()),
            parent_id: Set(None),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("failed to seed location")
    }

    /// Seeds one item and one location.
    pub async fn seed_position(&self, low_stock_threshold: i32) -> (ItemModel, LocationModel) {
        let item = self.seed_item("A4 Paper", "Paper", low_stock_threshold).await;
        let location = self.seed_location("A-01", "Main cabinet").await;
        (item, location)
    }

    pub async fn receive(&self, item_id: Uuid, location_id: Uuid, quantity: i32) -> InventoryTransactionModel {
        self.state
            .transactions
            .create_transaction(TransactionDraft::inbound(
                item_id,
                location_id,
                quantity,
                "alice",
                "Office Depot",
            ))
            .await
            .expect("inbound should be recorded")
    }

    pub async fn issue(&self, item_id: Uuid, location_id: Uuid, quantity: i32) -> InventoryTransactionModel {
        self.state
            .transactions
            .create_transaction(outbound(item_id, location_id, quantity))
            .await
            .expect("outbound should be recorded")
    }

    pub async fn stock(&self, item_id: Uuid, location_id: Uuid) -> i64 {
        self.state
            .transactions
            .current_stock(item_id, location_id)
            .await
            .expect("stock should be readable")
    }
}

pub fn outbound(item_id: Uuid, location_id: Uuid, quantity: i32) -> TransactionDraft {
    TransactionDraft::outbound(item_id, location_id, quantity, "bob", "Finance", "Monthly supplies")
}
