//! Batch Import Orchestrator
//!
//! Splits a bulk upload into chunks so no single database transaction grows
//! without bound. A chunk either goes through as one all-or-nothing batch or
//! row by row; a failed chunk or row never stops the ones after it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::TransactionType;
use crate::errors::ServiceError;
use crate::ledger::draft::TransactionDraft;
use crate::ledger::stock::StockKey;
use crate::services::transactions::{BatchTransactionRequest, TransactionService};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportMode {
    /// Each chunk is committed as one batch or not at all
    #[default]
    Atomic,
    /// Each row is committed on its own
    PerRow,
}

/// A rejected input row. `row` is 1-based across the whole upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFailure {
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub total: usize,
    pub imported: usize,
    /// Valid rows rolled back because another row in their chunk failed
    pub skipped: usize,
    pub failed: Vec<ImportFailure>,
    /// One per committed chunk in atomic mode
    pub batch_ids: Vec<Uuid>,
}

impl ImportReport {
    pub fn is_complete(&self) -> bool {
        self.imported == self.total
    }

    pub fn summary(&self) -> String {
        format!(
            "{} of {} imported, {} failed, {} skipped",
            self.imported,
            self.total,
            self.failed.len(),
            self.skipped
        )
    }

    fn fail(&mut self, row: usize, reason: impl Into<String>) {
        self.failed.push(ImportFailure {
            row,
            reason: reason.into(),
        });
    }
}

/// Drives bulk uploads through [`TransactionService`].
#[derive(Clone)]
pub struct BatchImportService {
    transactions: TransactionService,
    chunk_size: usize,
}

impl BatchImportService {
    pub fn new(transactions: TransactionService, chunk_size: usize) -> Self {
        Self {
            transactions,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Imports raw JSON rows. Rows that do not parse as drafts are reported
    /// as failures; infrastructure errors abort the import.
    #[instrument(skip(self, rows), fields(rows = rows.len(), chunk_size = self.chunk_size))]
    pub async fn import(&self, rows: Vec<Value>, mode: ImportMode) -> Result<ImportReport, ServiceError> {
        let mut report = ImportReport {
            total: rows.len(),
            ..Default::default()
        };

        let mut offset = 0;
        let mut rows = rows.into_iter().peekable();
        while rows.peek().is_some() {
            let chunk: Vec<Value> = rows.by_ref().take(self.chunk_size).collect();
            let chunk_len = chunk.len();

            let mut drafts = Vec::with_capacity(chunk_len);
            for (index, value) in chunk.into_iter().enumerate() {
                let row = offset + index + 1;
                match TransactionDraft::from_json(value) {
                    Ok(draft) => drafts.push((row, draft)),
                    Err(err) => report.fail(row, err.to_string()),
                }
            }

            match mode {
                ImportMode::Atomic => {
                    let parse_failures = chunk_len - drafts.len();
                    if parse_failures > 0 {
                        report.skipped += drafts.len();
                    } else {
                        self.import_chunk(drafts, &mut report).await?;
                    }
                }
                ImportMode::PerRow => self.import_rows(drafts, &mut report).await?,
            }

            offset += chunk_len;
        }

        info!(
            imported = report.imported,
            failed = report.failed.len(),
            skipped = report.skipped,
            "Import finished"
        );
        Ok(report)
    }

    async fn import_chunk(
        &self,
        drafts: Vec<(usize, TransactionDraft)>,
        report: &mut ImportReport,
    ) -> Result<(), ServiceError> {
        let rows: Vec<usize> = drafts.iter().map(|(row, _)| *row).collect();
        let outbound_keys: Vec<(usize, StockKey)> = drafts
            .iter()
            .filter(|(_, d)| d.transaction_type == TransactionType::Outbound)
            .map(|(row, d)| (*row, StockKey::new(d.item_id, d.location_id)))
            .collect();

        let request = BatchTransactionRequest {
            transactions: drafts.into_iter().map(|(_, draft)| draft).collect(),
            batch_id: None,
        };

        match self.transactions.create_batch_transactions(request).await {
            Ok(batch) => {
                report.imported += batch.success.len();
                report.batch_ids.push(batch.batch_id);
            }
            Err(ServiceError::BatchRejected(batch)) => {
                warn!(batch_id = %batch.batch_id, "Chunk rejected: {}", batch.summary());
                for failure in &batch.failed {
                    report.fail(rows[failure.row - 1], failure.reason.clone());
                }
                report.skipped += rows.len() - batch.failed.len();
            }
            Err(ServiceError::InsufficientStock(shortfalls)) => {
                let short: HashSet<StockKey> = shortfalls
                    .iter()
                    .map(|s| StockKey::new(s.item_id, s.location_id))
                    .collect();
                let mut attributed = 0;
                for (row, key) in &outbound_keys {
                    if short.contains(key) {
                        if let Some(shortfall) = shortfalls
                            .iter()
                            .find(|s| StockKey::new(s.item_id, s.location_id) == *key)
                        {
                            report.fail(*row, shortfall.to_string());
                            attributed += 1;
                        }
                    }
                }
                report.skipped += rows.len() - attributed;
            }
            Err(err) if err.is_client_error() => {
                // Not attributable to one row; the whole chunk fails with it.
                for row in &rows {
                    report.fail(*row, err.to_string());
                }
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    async fn import_rows(
        &self,
        drafts: Vec<(usize, TransactionDraft)>,
        report: &mut ImportReport,
    ) -> Result<(), ServiceError> {
        for (row, draft) in drafts {
            match self.transactions.create_transaction(draft).await {
                Ok(_) => report.imported += 1,
                Err(err) if err.is_client_error() => report.fail(row, err.to_string()),
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_every_outcome() {
        let mut report = ImportReport {
            total: 5,
            imported: 2,
            skipped: 1,
            ..Default::default()
        };
        report.fail(4, "bad");
        report.fail(5, "bad");
        assert_eq!(report.summary(), "2 of 5 imported, 2 failed, 1 skipped");
        assert!(!report.is_complete());
    }

    #[test]
    fn mode_parses_from_camel_case() {
        let mode: ImportMode = serde_json::from_str("\"perRow\"").unwrap();
        assert_eq!(mode, ImportMode::PerRow);
    }
}
