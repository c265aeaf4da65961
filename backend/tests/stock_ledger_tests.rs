//! Stock ledger tests
//!
//! Tests for the cell arithmetic and its audit trail:
//! - Replaying history from zero reconstructs every cell exactly
//! - No cell is ever observed below zero
//! - A rejected change leaves neither a quantity change nor a history row
//! - The auditor detects tampered history and drifted cells
//! - Stock views drop empty cells and order by SKU then batch code

use proptest::prelude::*;
use shared::*;
use uuid::Uuid;

fn key(inventory: u128, sku: u128, batch: u128) -> CellKey {
    CellKey::new(
        Uuid::from_u128(inventory),
        Uuid::from_u128(sku),
        Uuid::from_u128(batch),
    )
}

fn level(sku: u128, sku_code: &str, batch: u128, batch_code: &str, quantity: i32) -> StockLevel {
    StockLevel {
        sku_id: Uuid::from_u128(sku),
        sku_code: sku_code.to_string(),
        sku_name: format!("{} name", sku_code),
        batch_id: Uuid::from_u128(batch),
        batch_code: batch_code.to_string(),
        quantity,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_delta_below_zero_is_insufficient() {
        assert_eq!(
            StockChange::Delta(-5).apply(3),
            Err(StockError::Insufficient {
                available: 3,
                requested: 5
            })
        );
        assert_eq!(StockChange::Delta(-3).apply(3), Ok(0));
    }

    #[test]
    fn test_absolute_overwrites() {
        assert_eq!(StockChange::Absolute(15).apply(18), Ok(15));
        assert_eq!(StockChange::Absolute(0).apply(18), Ok(0));
        assert_eq!(
            StockChange::Absolute(-1).apply(18),
            Err(StockError::NegativeQuantity(-1))
        );
    }

    #[test]
    fn test_overflow_is_rejected() {
        assert_eq!(StockChange::Delta(1).apply(i32::MAX), Err(StockError::Overflow));
    }

    #[test]
    fn test_rejected_change_writes_nothing() {
        let mut book = StockBook::new();
        let cell = key(1, 10, 100);
        book.apply(cell, StockChange::Delta(4), "in").unwrap();

        assert!(book.apply(cell, StockChange::Delta(-5), "out").is_err());
        assert_eq!(book.quantity(&cell), 4);
        assert_eq!(book.entries().len(), 1);
    }

    #[test]
    fn test_zero_cells_persist_in_book() {
        let mut book = StockBook::new();
        let cell = key(1, 10, 100);
        book.apply(cell, StockChange::Delta(2), "in").unwrap();
        book.apply(cell, StockChange::Delta(-2), "out").unwrap();

        assert_eq!(book.quantity(&cell), 0);
        assert_eq!(book.cells().count(), 1);
    }

    #[test]
    fn test_audit_detects_tampered_history() {
        let cell = key(1, 10, 100);
        let entries = vec![
            LedgerEntry {
                key: cell,
                old_quantity: 0,
                new_quantity: 20,
                reason: "Production batch B001 created".to_string(),
            },
            LedgerEntry {
                key: cell,
                old_quantity: 25,
                new_quantity: 5,
                reason: "Transfer Order TO-00001 (sent out)".to_string(),
            },
        ];

        let audit = audit_ledger(&entries, vec![(cell, 5)]);
        assert!(!audit.is_clean());
        assert_eq!(audit.chain_breaks.len(), 1);
        assert_eq!(audit.chain_breaks[0].position, 1);
        assert_eq!(audit.chain_breaks[0].expected_old_quantity, 20);
        assert!(audit.mismatched_cells.is_empty());
    }

    #[test]
    fn test_audit_detects_drifted_cell() {
        let cell = key(1, 10, 100);
        let entries = vec![LedgerEntry {
            key: cell,
            old_quantity: 0,
            new_quantity: 20,
            reason: "Production batch B001 created".to_string(),
        }];

        let audit = audit_ledger(&entries, vec![(cell, 19)]);
        assert_eq!(
            audit.mismatched_cells,
            vec![CellMismatch {
                key: cell,
                stored_quantity: 19,
                replayed_quantity: 20,
            }]
        );
    }

    #[test]
    fn test_audit_detects_missing_cell() {
        let cell = key(1, 10, 100);
        let entries = vec![LedgerEntry {
            key: cell,
            old_quantity: 0,
            new_quantity: 7,
            reason: "Receive Order RO-00001 (manual receipt)".to_string(),
        }];

        let audit = audit_ledger(&entries, Vec::new());
        assert_eq!(audit.mismatched_cells.len(), 1);
        assert_eq!(audit.mismatched_cells[0].stored_quantity, 0);
    }

    #[test]
    fn test_empty_ledger_is_clean() {
        let audit = audit_ledger(&[], Vec::new());
        assert!(audit.is_clean());
        assert_eq!(audit.entries_replayed, 0);
    }

    #[test]
    fn test_group_by_sku_orders_and_filters() {
        let levels = vec![
            level(2, "SKU-PORK-250", 100, "B001", 4),
            level(1, "SKU-BEEF-500", 101, "B002", 3),
            level(1, "SKU-BEEF-500", 100, "B001", 0),
            level(1, "SKU-BEEF-500", 102, "B003", 7),
        ];

        let grouped = group_by_sku(levels);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].sku_code, "SKU-BEEF-500");
        assert_eq!(grouped[0].total_quantity, 10);
        let codes: Vec<&str> = grouped[0].batches.iter().map(|b| b.batch_code.as_str()).collect();
        assert_eq!(codes, vec!["B002", "B003"]);
        assert_eq!(grouped[1].sku_code, "SKU-PORK-250");
    }

    #[test]
    fn test_document_codes() {
        assert_eq!(DocumentKind::Batch.format_code(2), "B002");
        assert_eq!(DocumentKind::PurchaseOrder.format_code(1), "PO-00001");
        assert_eq!(DocumentKind::TransferOrder.format_code(12), "TO-00012");
        assert_eq!(DocumentKind::ReceiveOrder.format_code(345), "RO-00345");
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn change_strategy() -> impl Strategy<Value = StockChange> {
        prop_oneof![
            4 => (-40i32..60).prop_map(StockChange::Delta),
            1 => (0i32..80).prop_map(StockChange::Absolute),
        ]
    }

    fn op_strategy() -> impl Strategy<Value = (CellKey, StockChange)> {
        (0u128..2, 0u128..2, 0u128..3, change_strategy())
            .prop_map(|(inv, sku, batch, change)| (key(inv, 10 + sku, 100 + batch), change))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Replaying history from zero reconstructs every cell
        #[test]
        fn prop_replay_reconstructs_cells(ops in prop::collection::vec(op_strategy(), 0..60)) {
            let mut book = StockBook::new();
            for (cell, change) in ops {
                let _ = book.apply(cell, change, "op");
            }

            let replayed = StockBook::replay(book.entries());
            for (cell, quantity) in book.cells() {
                prop_assert_eq!(replayed.get(cell).copied().unwrap_or(0), *quantity);
            }

            let audit = audit_ledger(book.entries(), book.cells().map(|(k, q)| (*k, *q)));
            prop_assert!(audit.is_clean());
            prop_assert_eq!(audit.entries_replayed, book.entries().len());
        }

        /// Quantities never go below zero, whatever is attempted
        #[test]
        fn prop_quantities_never_negative(ops in prop::collection::vec(op_strategy(), 0..60)) {
            let mut book = StockBook::new();
            for (cell, change) in ops {
                let before = book.quantity(&cell);
                match book.apply(cell, change, "op") {
                    Ok(after) => {
                        prop_assert!(after >= 0);
                    }
                    Err(_) => {
                        prop_assert_eq!(book.quantity(&cell), before);
                    }
                }
            }
            prop_assert!(book.entries().iter().all(|e| e.new_quantity >= 0 && e.old_quantity >= 0));
        }

        /// Each history entry chains from the previous entry of the same cell
        #[test]
        fn prop_history_chains_per_cell(ops in prop::collection::vec(op_strategy(), 1..60)) {
            let mut book = StockBook::new();
            for (cell, change) in &ops {
                let _ = book.apply(*cell, *change, "op");
            }

            for (cell, quantity) in book.cells() {
                let mut expected_old = 0;
                for entry in book.history(*cell) {
                    prop_assert_eq!(entry.old_quantity, expected_old);
                    expected_old = entry.new_quantity;
                }
                prop_assert_eq!(expected_old, *quantity);
            }
        }

        /// A failing unit of work rolls back everything it applied
        #[test]
        fn prop_atomically_restores_on_failure(
            seed in 0i32..50,
            take in 0i32..100,
        ) {
            let mut book = StockBook::new();
            let a = key(1, 10, 100);
            let b = key(1, 11, 100);
            book.apply(a, StockChange::Delta(seed), "seed").unwrap();
            let before = book.clone();

            let result = book.atomically(|book| -> Result<(), StockError> {
                book.apply(b, StockChange::Delta(5), "in")?;
                book.apply(a, StockChange::Delta(-take), "out")?;
                Ok(())
            });

            if take > seed {
                prop_assert!(result.is_err());
                prop_assert_eq!(book.entries(), before.entries());
                prop_assert_eq!(book.quantity(&b), 0);
            } else {
                prop_assert!(result.is_ok());
                prop_assert_eq!(book.quantity(&a), seed - take);
                prop_assert_eq!(book.quantity(&b), 5);
            }
        }

        /// Short reasons are rejected after trimming, longer ones accepted
        #[test]
        fn prop_reason_length(reason in "[ a-z]{0,12}") {
            let ok = reason.trim().chars().count() >= MIN_REASON_LEN;
            prop_assert_eq!(validate_reason(&reason).is_ok(), ok);
        }
    }
}
