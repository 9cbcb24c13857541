mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::{outbound, TestApp};
use office_inventory::{
    entities::TransactionType,
    errors::ServiceError,
    ledger::{StockKey, TransactionDraft, TransactionPatch},
    services::{
        transactions::{SortOrder, StatisticsQuery, TransactionHistoryQuery, TransactionSortField},
        BatchTransactionRequest,
    },
};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn inbound_increases_stock() {
    let app = TestApp::new().await;
    let (item, location) = app.seed_position(10).await;

    let row = app
        .state
        .transactions
        .create_transaction(TransactionDraft::inbound(item.id, location.id, 100, "alice", "S"))
        .await
        .unwrap();

    assert_eq!(row.transaction_type, TransactionType::Inbound);
    assert_eq!(row.notes, "");
    assert!(row.batch_id.is_none());
    assert_eq!(app.stock(item.id, location.id).await, 100);
}

#[tokio::test]
async fn outbound_over_stock_is_rejected_and_stock_unchanged() {
    let app = TestApp::new().await;
    let (item, location) = app.seed_position(10).await;
    app.receive(item.id, location.id, 100).await;

    let err = app
        .state
        .transactions
        .create_transaction(outbound(item.id, location.id, 150))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::InsufficientStock(ref shortfalls) => {
        assert_eq!(shortfalls.len(), 1);
        assert_eq!(shortfalls[0].required, 150);
        assert_eq!(shortfalls[0].available, 100);
        assert_eq!(shortfalls[0].item_name.as_deref(), Some("A4 Paper"));
        assert_eq!(shortfalls[0].location_name.as_deref(), Some("Main cabinet"));
    });
    assert_eq!(app.stock(item.id, location.id).await, 100);
}

#[tokio::test]
async fn outbound_may_take_exactly_the_stock() {
    let app = TestApp::new().await;
    let (item, location) = app.seed_position(10).await;
    app.receive(item.id, location.id, 100).await;

    app.issue(item.id, location.id, 100).await;
    assert_eq!(app.stock(item.id, location.id).await, 0);
}

#[tokio::test]
async fn unknown_references_are_not_found() {
    let app = TestApp::new().await;
    let (item, location) = app.seed_position(0).await;

    let err = app
        .state
        .transactions
        .create_transaction(TransactionDraft::inbound(Uuid::new_v4(), location.id, 5, "alice", "S"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(ref msg) if msg.starts_with("Item"));

    let err = app
        .state
        .transactions
        .create_transaction(TransactionDraft::inbound(item.id, Uuid::new_v4(), 5, "alice", "S"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(ref msg) if msg.starts_with("Location"));
}

#[tokio::test]
async fn field_errors_win_over_missing_references() {
    let app = TestApp::new().await;

    let err = app
        .state
        .transactions
        .create_transaction(TransactionDraft::inbound(Uuid::new_v4(), Uuid::new_v4(), 0, "", "S"))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(ref fields) => {
        let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
        assert!(names.contains(&"operator"));
        assert!(names.contains(&"quantity"));
    });
}

#[tokio::test]
async fn business_rules_are_reported_together() {
    let app = TestApp::new().await;
    let (item, location) = app.seed_position(0).await;

    let mut draft = TransactionDraft::inbound(item.id, location.id, 5, "alice", "S")
        .with_date(Utc::now() + Duration::days(2));
    draft.supplier = None;

    let err = app.state.transactions.create_transaction(draft).await.unwrap_err();
    assert_matches!(err, ServiceError::BusinessRule(ref errors) => {
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("supplier")));
        assert!(errors.iter().any(|e| e.contains("future")));
    });
    assert_eq!(app.stock(item.id, location.id).await, 0);
}

#[tokio::test]
async fn oversized_quantities_hit_the_quantity_limit() {
    let app = TestApp::new().await;
    let (item, location) = app.seed_position(0).await;

    for quantity in [1_000_001_i64, 3_000_000_000] {
        let draft = TransactionDraft::from_json(json!({
            "itemId": item.id,
            "locationId": location.id,
            "type": "inbound",
            "quantity": quantity,
            "operator": "alice",
            "supplier": "S"
        }))
        .unwrap();
        let err = app.state.transactions.create_transaction(draft).await.unwrap_err();
        assert_matches!(err, ServiceError::BusinessRule(ref errors) => {
            assert!(errors[0].contains("limit"), "{quantity}: {errors:?}");
        });
    }
    assert_eq!(app.stock(item.id, location.id).await, 0);
}

#[tokio::test]
async fn batch_demand_is_checked_in_aggregate() {
    let app = TestApp::new().await;
    let (item, location) = app.seed_position(0).await;
    app.receive(item.id, location.id, 100).await;

    let request = BatchTransactionRequest {
        transactions: vec![
            outbound(item.id, location.id, 40),
            outbound(item.id, location.id, 40),
            outbound(item.id, location.id, 40),
        ],
        batch_id: None,
    };
    let err = app
        .state
        .transactions
        .create_batch_transactions(request)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::InsufficientStock(ref shortfalls) => {
        assert_eq!(shortfalls[0].required, 120);
        assert_eq!(shortfalls[0].available, 100);
    });
    assert_eq!(app.stock(item.id, location.id).await, 100);
}

#[tokio::test]
async fn one_bad_row_rolls_back_the_whole_batch() {
    let app = TestApp::new().await;
    let (item, location) = app.seed_position(0).await;
    app.receive(item.id, location.id, 100).await;

    let mut missing_recipient = outbound(item.id, location.id, 10);
    missing_recipient.recipient = None;
    let batch_id = Uuid::new_v4();
    let request = BatchTransactionRequest {
        transactions: vec![
            TransactionDraft::inbound(item.id, location.id, 5, "alice", "S"),
            missing_recipient,
            outbound(item.id, location.id, 10),
        ],
        batch_id: Some(batch_id),
    };

    let err = app
        .state
        .transactions
        .create_batch_transactions(request)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::BatchRejected(ref report) => {
        assert_eq!(report.batch_id, batch_id);
        assert_eq!(report.success.len() + report.failed.len(), 3);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].row, 2);
        assert!(report.failed[0].reason.contains("recipient"));
    });
    assert_eq!(err.to_string(), "Batch rejected: 1 of 3 rows failed");

    let page = app
        .state
        .transactions
        .get_transaction_history(TransactionHistoryQuery {
            batch_id: Some(batch_id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.pagination.total, 0);
    assert_eq!(app.stock(item.id, location.id).await, 100);
}

#[tokio::test]
async fn batch_rows_share_a_batch_id_and_delete_as_a_unit() {
    let app = TestApp::new().await;
    let (item, location) = app.seed_position(0).await;

    let report = app
        .state
        .transactions
        .create_batch_transactions(BatchTransactionRequest {
            transactions: vec![
                TransactionDraft::inbound(item.id, location.id, 30, "alice", "S"),
                TransactionDraft::inbound(item.id, location.id, 20, "alice", "S"),
                outbound(item.id, location.id, 10),
            ],
            batch_id: None,
        })
        .await
        .unwrap();

    assert_eq!(report.success.len(), 3);
    assert!(report.is_complete());
    assert!(report
        .success
        .iter()
        .all(|row| row.batch_id == Some(report.batch_id)));
    assert_eq!(app.stock(item.id, location.id).await, 40);

    let err = app
        .state
        .transactions
        .delete_transaction(report.success[0].id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::PolicyViolation(ref reason) if reason.contains("batch"));

    let deleted = app.state.transactions.delete_batch(report.batch_id).await.unwrap();
    assert_eq!(deleted, 3);
    assert_eq!(app.stock(item.id, location.id).await, 0);

    let err = app.state.transactions.delete_batch(report.batch_id).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn empty_batch_is_a_validation_error() {
    let app = TestApp::new().await;
    let err = app
        .state
        .transactions
        .create_batch_transactions(BatchTransactionRequest::default())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn deletion_window_boundary() {
    let app = TestApp::new().await;
    let (item, location) = app.seed_position(0).await;

    let too_old = app
        .state
        .transactions
        .create_transaction(
            TransactionDraft::inbound(item.id, location.id, 5, "alice", "S")
                .with_date(Utc::now() - Duration::days(7) - Duration::seconds(1)),
        )
        .await
        .unwrap();
    let recent = app
        .state
        .transactions
        .create_transaction(
            TransactionDraft::inbound(item.id, location.id, 5, "alice", "S")
                .with_date(Utc::now() - Duration::days(6) - Duration::hours(23)),
        )
        .await
        .unwrap();

    let err = app
        .state
        .transactions
        .delete_transaction(too_old.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::PolicyViolation(ref reason) if reason.contains("7 days"));

    app.state.transactions.delete_transaction(recent.id).await.unwrap();
    assert_matches!(
        app.state.transactions.get_transaction(recent.id).await,
        Err(ServiceError::NotFound(_))
    );
    assert_eq!(app.stock(item.id, location.id).await, 5);
}

#[tokio::test]
async fn deleting_consumed_inbound_is_refused() {
    let app = TestApp::new().await;
    let (item, location) = app.seed_position(0).await;
    let inbound = app.receive(item.id, location.id, 100).await;
    app.issue(item.id, location.id, 70).await;

    let err = app
        .state
        .transactions
        .delete_transaction(inbound.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(app.stock(item.id, location.id).await, 30);
}

#[tokio::test]
async fn reversal_restores_prior_stock() {
    let app = TestApp::new().await;
    let (item, location) = app.seed_position(0).await;
    app.receive(item.id, location.id, 100).await;
    let before = app.stock(item.id, location.id).await;

    let issued = app.issue(item.id, location.id, 25).await;
    assert_eq!(app.stock(item.id, location.id).await, 75);

    let reversal = app
        .state
        .transactions
        .reverse_transaction(issued.id, "carol")
        .await
        .unwrap();

    assert_eq!(reversal.transaction_type, TransactionType::Inbound);
    assert_eq!(reversal.quantity, 25);
    assert_eq!(reversal.supplier.as_deref(), Some("Finance"));
    assert!(reversal
        .purpose
        .as_deref()
        .unwrap_or_default()
        .contains(&issued.id.to_string()));
    assert_eq!(app.stock(item.id, location.id).await, before);

    // the original row is untouched
    let original = app.state.transactions.get_transaction(issued.id).await.unwrap();
    assert_eq!(original, issued);
}

#[tokio::test]
async fn reversal_window_is_enforced() {
    let app = TestApp::new().await;
    let (item, location) = app.seed_position(0).await;
    let old = app
        .state
        .transactions
        .create_transaction(
            TransactionDraft::inbound(item.id, location.id, 5, "alice", "S")
                .with_date(Utc::now() - Duration::days(31)),
        )
        .await
        .unwrap();

    let err = app
        .state
        .transactions
        .reverse_transaction(old.id, "carol")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::PolicyViolation(_));
    assert_eq!(app.stock(item.id, location.id).await, 5);
}

#[tokio::test]
async fn update_only_touches_descriptive_fields() {
    let app = TestApp::new().await;
    let (item, location) = app.seed_position(0).await;
    let row = app.receive(item.id, location.id, 10).await;

    let unchanged = app
        .state
        .transactions
        .update_transaction(row.id, TransactionPatch::default())
        .await
        .unwrap();
    assert_eq!(unchanged, row);

    let patch = TransactionPatch::from_json(json!({ "notes": "counted twice", "supplier": "Staples" })).unwrap();
    let updated = app.state.transactions.update_transaction(row.id, patch).await.unwrap();
    assert_eq!(updated.notes, "counted twice");
    assert_eq!(updated.supplier.as_deref(), Some("Staples"));
    assert_eq!(updated.quantity, 10);

    let patch = TransactionPatch::from_json(json!({ "quantity": 99 })).unwrap();
    let err = app.state.transactions.update_transaction(row.id, patch).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(ref fields) if fields[0].field == "quantity");

    let patch = TransactionPatch::from_json(json!({ "operator": "   " })).unwrap();
    let err = app.state.transactions.update_transaction(row.id, patch).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let patch = TransactionPatch::from_json(json!({ "supplier": "" })).unwrap();
    let err = app.state.transactions.update_transaction(row.id, patch).await.unwrap_err();
    assert_matches!(err, ServiceError::BusinessRule(_));

    assert_eq!(app.stock(item.id, location.id).await, 10);
}

#[tokio::test]
async fn update_of_missing_row_is_not_found() {
    let app = TestApp::new().await;
    let patch = TransactionPatch::from_json(json!({ "notes": "x" })).unwrap();
    let err = app
        .state
        .transactions
        .update_transaction(Uuid::new_v4(), patch)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn history_filters_sorts_and_paginates() {
    let app = TestApp::new().await;
    let (item, location) = app.seed_position(0).await;
    for quantity in [5, 15, 25, 35] {
        app.receive(item.id, location.id, quantity).await;
    }
    app.issue(item.id, location.id, 7).await;

    let page = app
        .state
        .transactions
        .get_transaction_history(TransactionHistoryQuery {
            item_id: Some(item.id),
            sort_by: TransactionSortField::Quantity,
            sort_order: SortOrder::Asc,
            page: Some(2),
            limit: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.pagination.total, 5);
    assert_eq!(page.pagination.total_pages, 3);
    let quantities: Vec<i32> = page.data.iter().map(|r| r.quantity).collect();
    assert_eq!(quantities, vec![15, 25]);

    let outbound_only = app
        .state
        .transactions
        .get_transaction_history(TransactionHistoryQuery {
            transaction_type: Some(TransactionType::Outbound),
            recipient: Some("fin".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(outbound_only.pagination.total, 1);
    assert_eq!(outbound_only.data[0].quantity, 7);

    let by_operator = app
        .state
        .transactions
        .get_transaction_history(TransactionHistoryQuery {
            operator: Some("ALI".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_operator.pagination.total, 4);

    let err = app
        .state
        .transactions
        .get_transaction_history(TransactionHistoryQuery {
            page: Some(0),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn history_page_far_past_the_end() {
    let app = TestApp::new().await;
    let (item, location) = app.seed_position(0).await;
    app.receive(item.id, location.id, 10).await;

    let empty = app
        .state
        .transactions
        .get_transaction_history(TransactionHistoryQuery {
            page: Some(1_000),
            limit: Some(100),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(empty.data.is_empty());
    assert_eq!(empty.pagination.total, 1);

    let err = app
        .state
        .transactions
        .get_transaction_history(TransactionHistoryQuery {
            page: Some(u64::MAX / 10),
            limit: Some(100),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(ref fields) if fields[0].field == "page");
}

#[tokio::test]
async fn operator_search_treats_wildcards_literally() {
    let app = TestApp::new().await;
    let (item, location) = app.seed_position(0).await;
    for operator in ["a_b", "axb", "50%off", "500ff"] {
        app.state
            .transactions
            .create_transaction(TransactionDraft::inbound(item.id, location.id, 1, operator, "S"))
            .await
            .unwrap();
    }

    for (needle, expected) in [("a_b", "a_b"), ("A_B", "a_b"), ("0%o", "50%off")] {
        let page = app
            .state
            .transactions
            .get_transaction_history(TransactionHistoryQuery {
                operator: Some(needle.into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 1, "searching {needle}");
        assert_eq!(page.data[0].operator, expected);
    }
}

#[tokio::test]
async fn statistics_rank_items_by_quantity_moved() {
    let app = TestApp::new().await;
    let (paper, shelf) = app.seed_position(0).await;
    let pens = app.seed_item("Blue pens", "Writing", 0).await;
    app.receive(paper.id, shelf.id, 100).await;
    app.issue(paper.id, shelf.id, 30).await;
    app.receive(pens.id, shelf.id, 50).await;

    let stats = app
        .state
        .transactions
        .get_transaction_statistics(StatisticsQuery::default())
        .await
        .unwrap();

    assert_eq!(stats.total_inbound, 150);
    assert_eq!(stats.total_outbound, 30);
    assert_eq!(stats.net_change, 120);
    assert_eq!(stats.transaction_count, 3);
    assert_eq!(stats.inbound_count, 2);
    assert_eq!(stats.top_items[0].item_id, paper.id);
    assert_eq!(stats.top_items[0].total_moved(), 130);
    assert_eq!(stats.top_items[1].item_name.as_deref(), Some("Blue pens"));
    assert_eq!(stats.top_locations.len(), 1);
    assert_eq!(stats.top_locations[0].location_code.as_deref(), Some("A-01"));

    let scoped = app
        .state
        .transactions
        .get_transaction_statistics(StatisticsQuery {
            item_id: Some(pens.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(scoped.total_inbound, 50);
    assert_eq!(scoped.top_items.len(), 1);
}

#[tokio::test]
async fn stock_map_zero_fills_unknown_positions() {
    let app = TestApp::new().await;
    let (item, location) = app.seed_position(0).await;
    app.receive(item.id, location.id, 12).await;

    let known = StockKey::new(item.id, location.id);
    let unknown = StockKey::new(item.id, Uuid::new_v4());
    let map = app.state.transactions.stock_map(&[known, unknown]).await.unwrap();

    assert_eq!(map.len(), 2);
    assert_eq!(map[&known], 12);
    assert_eq!(map[&unknown], 0);
}

#[tokio::test]
async fn concurrent_outbound_cannot_overdraw() {
    let app = TestApp::new().await;
    let (item, location) = app.seed_position(0).await;
    app.receive(item.id, location.id, 100).await;

    let first = app.state.transactions.clone();
    let second = app.state.transactions.clone();
    let (a, b) = tokio::join!(
        first.create_transaction(outbound(item.id, location.id, 60)),
        second.create_transaction(outbound(item.id, location.id, 60)),
    );

    let succeeded = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(succeeded, 1);
    assert!(matches!(a, Err(ServiceError::InsufficientStock(_))) || matches!(b, Err(ServiceError::InsufficientStock(_))));
    assert_eq!(app.stock(item.id, location.id).await, 40);
}
