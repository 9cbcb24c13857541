//! Office Inventory Library
//!
//! Transaction ledger and stock aggregation core for an office-supply
//! inventory tracker. Stock is never stored: it is the sum of inbound minus
//! outbound movements recorded per (item, location).
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod ledger;
pub mod migrator;
pub mod repositories;
pub mod services;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::db::StockLocks;
use crate::services::{BatchImportService, InventoryQueryService, TransactionService};

/// Services sharing one connection pool and one stock lock table.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub transactions: TransactionService,
    pub inventory: InventoryQueryService,
    pub imports: BatchImportService,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let locks = StockLocks::new();
        let transactions = TransactionService::from_config(db.clone(), &config).with_locks(locks);
        let inventory = InventoryQueryService::new(db.clone());
        let imports = BatchImportService::new(transactions.clone(), config.import_chunk_size);

        Self {
            db,
            config,
            transactions,
            inventory,
            imports,
        }
    }
}
