use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use office_inventory::{
    config::{self, AppConfig},
    db,
    services::{
        inventory_query::{InventoryStatusFilter, DEFAULT_HISTORY_DAYS},
        ImportMode,
    },
    AppState,
};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config().context("failed to load application config")?;
    config::init_tracing(config.log_level(), config.log_json);

    let context = CliContext::initialize(config).await?;
    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&context.state.db)
                .await
                .context("failed to run migrations")?;
            println!("Migrations applied");
        }
        Commands::Stock { item, location } => handle_stock(&context, item, location, cli.json).await?,
        Commands::Status { search, low } => handle_status(&context, search, low, cli.json).await?,
        Commands::LowStock { threshold } => handle_low_stock(&context, threshold, cli.json).await?,
        Commands::History {
            item,
            location,
            days,
        } => handle_history(&context, item, location, days, cli.json).await?,
        Commands::Import { file, atomic } => handle_import(&context, file, atomic, cli.json).await?,
        Commands::DeleteBatch { batch_id } => {
            let deleted = context.state.transactions.delete_batch(batch_id).await?;
            if cli.json {
                print_json(&serde_json::json!({ "batchId": batch_id, "deleted": deleted }))?;
            } else {
                println!("Deleted {} rows from batch {}", deleted, batch_id);
            }
        }
        Commands::Reverse { id, operator } => {
            let reversal = context.state.transactions.reverse_transaction(id, &operator).await?;
            if cli.json {
                print_json(&reversal)?;
            } else {
                println!(
                    "Recorded {} {} as reversal {} of {}",
                    reversal.transaction_type, reversal.quantity, reversal.id, id
                );
            }
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "inventory-cli", about = "Office inventory ledger tools")]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Current stock of one item at one location
    Stock { item: Uuid, location: Uuid },
    /// Stock per item and location
    Status {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, action = ArgAction::SetTrue)]
        low: bool,
    },
    /// Positions at or below their low-stock threshold
    LowStock {
        #[arg(long)]
        threshold: Option<i64>,
    },
    /// Daily movements for an item
    History {
        item: Uuid,
        #[arg(long)]
        location: Option<Uuid>,
        #[arg(long, default_value_t = DEFAULT_HISTORY_DAYS)]
        days: u32,
    },
    /// Import transaction drafts from a JSON file
    Import {
        file: PathBuf,
        /// Commit each chunk all-or-nothing instead of row by row
        #[arg(long, action = ArgAction::SetTrue)]
        atomic: bool,
    },
    /// Delete every row of a batch
    DeleteBatch { batch_id: Uuid },
    /// Record the opposite movement of a transaction
    Reverse {
        id: Uuid,
        #[arg(long)]
        operator: String,
    },
}

struct CliContext {
    state: AppState,
}

impl CliContext {
    async fn initialize(config: AppConfig) -> Result<Self> {
        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        db::check_connection(&db_pool)
            .await
            .context("database did not answer a ping")?;
        Ok(Self {
            state: AppState::new(Arc::new(db_pool), config),
        })
    }
}

async fn handle_stock(context: &CliContext, item: Uuid, location: Uuid, json: bool) -> Result<()> {
    let stock = context.state.transactions.current_stock(item, location).await?;
    if json {
        print_json(&serde_json::json!({ "itemId": item, "locationId": location, "currentStock": stock }))?;
    } else {
        println!("{}", stock);
    }
    Ok(())
}

async fn handle_status(
    context: &CliContext,
    search: Option<String>,
    low: bool,
    json: bool,
) -> Result<()> {
    let filter = InventoryStatusFilter {
        search,
        is_low_stock: low.then_some(true),
        ..Default::default()
    };
    let rows = context.state.inventory.get_inventory_status(filter).await?;
    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No stock recorded");
    }
    for row in rows {
        println!(
            "- {} @ {} ({}) • {} {}{}",
            row.item_name,
            row.location_code,
            row.location_name,
            row.current_stock,
            row.unit,
            if row.is_low_stock { " • LOW" } else { "" }
        );
    }
    Ok(())
}

async fn handle_low_stock(context: &CliContext, threshold: Option<i64>, json: bool) -> Result<()> {
    let alerts = context.state.inventory.get_low_stock_items(threshold).await?;
    if json {
        return print_json(&alerts);
    }
    if alerts.is_empty() {
        println!("No low-stock positions");
    }
    for alert in alerts {
        println!(
            "- {} @ {} • {} {} (threshold {}, short {})",
            alert.item_name,
            alert.location_code,
            alert.current_stock,
            alert.unit,
            alert.threshold,
            alert.stock_deficit
        );
    }
    Ok(())
}

async fn handle_history(
    context: &CliContext,
    item: Uuid,
    location: Option<Uuid>,
    days: u32,
    json: bool,
) -> Result<()> {
    let history = context
        .state
        .inventory
        .get_inventory_history(item, location, days)
        .await?;
    if json {
        return print_json(&history);
    }
    println!("Opening stock: {}", history.opening_stock);
    for day in history.series {
        println!(
            "{}  +{:<6} -{:<6} = {}",
            day.date, day.inbound, day.outbound, day.running_stock
        );
    }
    Ok(())
}

async fn handle_import(context: &CliContext, file: PathBuf, atomic: bool, json: bool) -> Result<()> {
    let raw = fs::read_to_string(&file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let rows = parse_import_rows(&raw)?;
    let mode = if atomic {
        ImportMode::Atomic
    } else {
        ImportMode::PerRow
    };

    let report = context.state.imports.import(rows, mode).await?;
    if json {
        return print_json(&report);
    }
    println!("{}", report.summary());
    for failure in &report.failed {
        println!("  row {}: {}", failure.row, failure.reason);
    }
    Ok(())
}

/// Accepts either a bare array of drafts or `{ "transactions": [...] }`.
fn parse_import_rows(raw: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(raw).context("import file is not valid JSON")?;
    match value {
        Value::Array(rows) => Ok(rows),
        Value::Object(mut map) => match map.remove("transactions") {
            Some(Value::Array(rows)) => Ok(rows),
            _ => Err(anyhow!("expected a \"transactions\" array")),
        },
        _ => Err(anyhow!("expected a JSON array of transactions")),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
