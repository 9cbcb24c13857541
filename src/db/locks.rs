use dashmap::DashMap;
use sea_orm::{ConnectionTrait, DbBackend, DbErr, Statement};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::ledger::stock::StockKey;

/// Process-wide locks keyed by (item, location).
///
/// Writes that check stock and then insert hold the lock for every key they
/// touch until their database transaction finishes, so two requests against
/// the same pair cannot both pass the sufficiency check on the same snapshot.
#[derive(Clone, Default)]
pub struct StockLocks {
    inner: Arc<LockMap>,
}

type LockMap = DashMap<StockKey, Arc<Mutex<()>>>;

/// Holds the acquired locks; dropping it releases them and forgets every key
/// no other task is holding or waiting on.
pub struct StockGuard {
    map: Arc<LockMap>,
    held: Vec<(StockKey, OwnedMutexGuard<()>)>,
}

impl Drop for StockGuard {
    fn drop(&mut self) {
        for (key, guard) in self.held.drain(..) {
            drop(guard);
            self.map
                .remove_if(&key, |_, mutex| Arc::strong_count(mutex) == 1);
        }
    }
}

impl StockLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires every key in ascending order. Duplicates are collapsed.
    pub async fn acquire<I>(&self, keys: I) -> StockGuard
    where
        I: IntoIterator<Item = StockKey>,
    {
        let ordered: BTreeSet<StockKey> = keys.into_iter().collect();
        let mut held = Vec::with_capacity(ordered.len());
        for key in ordered {
            let mutex = self
                .inner
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            held.push((key, mutex.lock_owned().await));
        }
        StockGuard {
            map: Arc::clone(&self.inner),
            held,
        }
    }

    /// Number of keys currently held or awaited.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Takes a transaction-scoped advisory lock per key on PostgreSQL so separate
/// processes serialize too. No-op on other backends.
pub async fn advisory_lock_keys<C, I>(conn: &C, keys: I) -> Result<(), DbErr>
where
    C: ConnectionTrait,
    I: IntoIterator<Item = StockKey>,
{
    if conn.get_database_backend() != DbBackend::Postgres {
        return Ok(());
    }

    let ordered: BTreeSet<StockKey> = keys.into_iter().collect();
    for key in ordered {
        conn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT pg_advisory_xact_lock(hashtext($1))",
            [key.to_string().into()],
        ))
        .await?;
    }
    Ok(())
}
