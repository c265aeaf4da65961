//! Stock movement flow tests
//!
//! Drives production, transfer and receipt through the same domain rules the
//! services use, against the in-memory stock book:
//! - Production credits the producing inventory with one history row per item
//! - Transfers are all-or-nothing and leave no residue when a line is short
//! - Receipts credit the requesting inventory and keep discrepancies
//! - A purchase order is fulfilled exactly when all its transfers are received
//! - Manual edits record the caller's reason verbatim

use proptest::prelude::*;
use shared::*;
use uuid::Uuid;

// ============================================================================
// Helpers mirroring the service implementations
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum FlowError {
    Validation(ValidationFailure),
    State(OrderError),
    Shortage(Vec<Shortage>),
    Stock(StockError),
}

impl From<ValidationFailure> for FlowError {
    fn from(err: ValidationFailure) -> Self {
        FlowError::Validation(err)
    }
}

impl From<OrderError> for FlowError {
    fn from(err: OrderError) -> Self {
        FlowError::State(err)
    }
}

impl From<StockError> for FlowError {
    fn from(err: StockError) -> Self {
        FlowError::Stock(err)
    }
}

fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

/// Batch creation: credit every produced SKU at the producing inventory
fn produce(
    book: &mut StockBook,
    inventory_id: Uuid,
    batch_id: Uuid,
    batch_code: &str,
    items: &[RequestLine],
) -> Result<(), FlowError> {
    validate_request_lines(items)?;
    let reason = production_reason(batch_code);
    book.atomically(|b| -> Result<(), FlowError> {
        for (key, quantity) in production_cells(inventory_id, batch_id, items) {
            b.apply(key, StockChange::Delta(quantity), reason.clone())?;
        }
        Ok(())
    })
}

/// Transfer creation: check every line, then decrement the sending inventory
fn dispatch(
    book: &mut StockBook,
    po_status: PurchaseOrderStatus,
    route: PurchaseRoute,
    to_number: &str,
    lines: &[StockLine],
) -> Result<PurchaseOrderStatus, FlowError> {
    validate_stock_lines(lines)?;
    let next_status = po_status.on_dispatch()?;
    let reason = transfer_sent_reason(to_number);

    book.atomically(|b| -> Result<PurchaseOrderStatus, FlowError> {
        let plan = plan_dispatch(route.sending_inventory(), lines, |key| b.quantity(key))
            .map_err(FlowError::Shortage)?;
        for (key, change) in plan {
            b.apply(key, change, reason.clone())?;
        }
        Ok(next_status)
    })
}

/// A transfer order as stored: its status and per-line sent and received
/// quantities
#[derive(Debug, Clone)]
struct TransferRecord {
    status: TransferOrderStatus,
    lines: Vec<TransferLineReceipt>,
}

impl TransferRecord {
    fn sent(lines: &[StockLine]) -> Self {
        Self {
            status: TransferOrderStatus::Created,
            lines: lines
                .iter()
                .map(|l| TransferLineReceipt::sent(l.sku_id, l.batch_id, l.quantity))
                .collect(),
        }
    }

    fn line(&self, sku_id: Uuid, batch_id: Uuid) -> Option<&TransferLineReceipt> {
        self.lines
            .iter()
            .find(|l| l.sku_id == sku_id && l.batch_id == batch_id)
    }
}

/// Receipt against a transfer: credit the requesting inventory and record
/// what arrived on the transfer's lines
fn receive(
    book: &mut StockBook,
    transfer: &mut TransferRecord,
    route: PurchaseRoute,
    ro_number: &str,
    lines: &[StockLine],
) -> Result<(), FlowError> {
    validate_stock_lines(lines)?;
    let next_status = transfer.status.on_receipt()?;
    let reconciled = reconcile_receipt(&transfer.lines, lines)?;
    let reason = receive_from_transfer_reason(ro_number);

    book.atomically(|b| -> Result<(), FlowError> {
        for (key, change) in plan_receipt(route.receiving_inventory(), lines) {
            b.apply(key, change, reason.clone())?;
        }
        Ok(())
    })?;

    transfer.status = next_status;
    transfer.lines = reconciled;
    Ok(())
}

/// Purchase order status after a receipt, from its transfers' statuses
fn po_after_receipt(po_status: PurchaseOrderStatus, transfers: &[&TransferRecord]) -> PurchaseOrderStatus {
    let statuses: Vec<TransferOrderStatus> = transfers.iter().map(|t| t.status).collect();
    po_status.on_transfers_received(&statuses)
}

/// Manual stock edit
fn edit(book: &mut StockBook, key: CellKey, quantity: i32, reason: &str) -> Result<i32, FlowError> {
    validate_reason(reason)?;
    validate_absolute_quantity(quantity)?;
    Ok(book.apply(key, StockChange::Absolute(quantity), reason)?)
}

fn assert_clean(book: &StockBook) {
    let audit = audit_ledger(book.entries(), book.cells().map(|(k, q)| (*k, *q)));
    assert!(audit.is_clean(), "ledger audit failed: {:?}", audit);
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    const PRD: u128 = 1;
    const HUB: u128 = 2;
    const STORE: u128 = 3;
    const BEEF: u128 = 10;
    const PORK: u128 = 11;
    const B001: u128 = 100;
    const B002: u128 = 101;

    fn beef_line(batch: u128, quantity: i32) -> StockLine {
        StockLine {
            sku_id: id(BEEF),
            batch_id: id(batch),
            quantity,
        }
    }

    fn hub_po() -> PurchaseRoute {
        PurchaseRoute {
            requesting_inventory_id: id(HUB),
            fulfilling_inventory_id: id(PRD),
        }
    }

    fn produced_book() -> StockBook {
        let mut book = StockBook::new();
        produce(
            &mut book,
            id(PRD),
            id(B001),
            "B001",
            &[RequestLine {
                sku_id: id(BEEF),
                quantity: 20,
            }],
        )
        .unwrap();
        book
    }

    /// Batch B001 at PRD-001 with 20 units of beef
    #[test]
    fn test_production_credits_producing_inventory() {
        let book = produced_book();
        let cell = CellKey::new(id(PRD), id(BEEF), id(B001));

        assert_eq!(book.quantity(&cell), 20);
        let history: Vec<_> = book.history(cell).collect();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].old_quantity, 0);
        assert_eq!(history[0].new_quantity, 20);
        assert_eq!(history[0].reason, "Production batch B001 created");
    }

    /// Transfer the whole batch, then fail to send one more unit
    #[test]
    fn test_transfer_drains_sender_and_rejects_overdraw() {
        let mut book = produced_book();
        let cell = CellKey::new(id(PRD), id(BEEF), id(B001));

        let status = dispatch(
            &mut book,
            PurchaseOrderStatus::Created,
            hub_po(),
            "TO-00001",
            &[beef_line(B001, 20)],
        )
        .unwrap();
        assert_eq!(status, PurchaseOrderStatus::InTransit);
        assert_eq!(book.quantity(&cell), 0);
        assert_eq!(
            book.history(cell).last().map(|e| e.reason.as_str()),
            Some("Transfer Order TO-00001 (sent out)")
        );

        let entries_before = book.entries().len();
        let err = dispatch(
            &mut book,
            status,
            hub_po(),
            "TO-00002",
            &[beef_line(B001, 1)],
        )
        .unwrap_err();

        match err {
            FlowError::Shortage(shortages) => {
                assert_eq!(shortages.len(), 1);
                assert_eq!(shortages[0].requested, 1);
                assert_eq!(shortages[0].available, 0);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(book.quantity(&cell), 0);
        assert_eq!(book.entries().len(), entries_before);
    }

    /// Receive 18 of the 20 sent
    #[test]
    fn test_receipt_keeps_discrepancy_and_fulfils_po() {
        let mut book = produced_book();
        let sent = [beef_line(B001, 20)];
        let po_status =
            dispatch(&mut book, PurchaseOrderStatus::Created, hub_po(), "TO-00001", &sent).unwrap();

        let mut transfer = TransferRecord::sent(&sent);

        receive(&mut book, &mut transfer, hub_po(), "RO-00001", &[beef_line(B001, 18)]).unwrap();

        let hub_cell = CellKey::new(id(HUB), id(BEEF), id(B001));
        assert_eq!(book.quantity(&hub_cell), 18);
        assert_eq!(transfer.status, TransferOrderStatus::Fulfilled);
        let line = transfer.line(id(BEEF), id(B001)).unwrap();
        assert_eq!(line.sent_quantity, 20);
        assert_eq!(line.received_quantity, Some(18));
        assert_eq!(line.discrepancy(), Some(-2));
        assert_eq!(po_after_receipt(po_status, &[&transfer]), PurchaseOrderStatus::Fulfilled);
        assert_eq!(
            book.history(hub_cell).next().map(|e| e.reason.as_str()),
            Some("Receive Order RO-00001 from Transfer Order")
        );
        assert_clean(&book);
    }

    /// Cycle count at the hub
    #[test]
    fn test_manual_edit_records_reason_verbatim() {
        let mut book = produced_book();
        let sent = [beef_line(B001, 20)];
        dispatch(&mut book, PurchaseOrderStatus::Created, hub_po(), "TO-00001", &sent).unwrap();
        let mut transfer = TransferRecord::sent(&sent);
        receive(&mut book, &mut transfer, hub_po(), "RO-00001", &[beef_line(B001, 18)]).unwrap();

        let hub_cell = CellKey::new(id(HUB), id(BEEF), id(B001));
        let entries_before = book.entries().len();
        assert_eq!(edit(&mut book, hub_cell, 15, "cycle count adjustment").unwrap(), 15);

        assert_eq!(book.entries().len(), entries_before + 1);
        let last = book.history(hub_cell).last().unwrap();
        assert_eq!(last.old_quantity, 18);
        assert_eq!(last.new_quantity, 15);
        assert_eq!(last.reason, "cycle count adjustment");
        assert_clean(&book);
    }

    #[test]
    fn test_manual_edit_rejects_short_reason() {
        let mut book = produced_book();
        let cell = CellKey::new(id(PRD), id(BEEF), id(B001));

        let err = edit(&mut book, cell, 5, "  x ").unwrap_err();
        assert!(matches!(err, FlowError::Validation(ref f) if f.field == "reason"));
        assert_eq!(book.quantity(&cell), 20);
        assert_eq!(book.entries().len(), 1);
    }

    #[test]
    fn test_empty_items_rejected_before_any_change() {
        let mut book = produced_book();
        let before = book.entries().len();

        let err = dispatch(&mut book, PurchaseOrderStatus::Created, hub_po(), "TO-00001", &[])
            .unwrap_err();
        assert!(matches!(err, FlowError::Validation(ref f) if f.field == "items"));

        let mut transfer = TransferRecord::sent(&[]);
        let err = receive(&mut book, &mut transfer, hub_po(), "RO-00001", &[]).unwrap_err();
        assert!(matches!(err, FlowError::Validation(ref f) if f.field == "items"));

        assert_eq!(book.entries().len(), before);
    }

    /// One short line aborts the lines that were covered too
    #[test]
    fn test_partial_shortage_leaves_no_residue() {
        let mut book = produced_book();
        produce(
            &mut book,
            id(PRD),
            id(B002),
            "B002",
            &[RequestLine {
                sku_id: id(PORK),
                quantity: 3,
            }],
        )
        .unwrap();
        let snapshot: Vec<_> = book.cells().map(|(k, q)| (*k, *q)).collect();

        let lines = [
            beef_line(B001, 10),
            StockLine {
                sku_id: id(PORK),
                batch_id: id(B002),
                quantity: 5,
            },
        ];
        let err = dispatch(&mut book, PurchaseOrderStatus::Created, hub_po(), "TO-00001", &lines)
            .unwrap_err();
        assert!(matches!(err, FlowError::Shortage(ref s) if s.len() == 1));

        let after: Vec<_> = book.cells().map(|(k, q)| (*k, *q)).collect();
        assert_eq!(snapshot, after);

        // Fixing the short line and resubmitting succeeds
        let fixed = [
            beef_line(B001, 10),
            StockLine {
                sku_id: id(PORK),
                batch_id: id(B002),
                quantity: 3,
            },
        ];
        dispatch(&mut book, PurchaseOrderStatus::Created, hub_po(), "TO-00001", &fixed).unwrap();
        assert_eq!(book.quantity(&CellKey::new(id(PRD), id(BEEF), id(B001))), 10);
        assert_clean(&book);
    }

    #[test]
    fn test_every_short_line_is_reported() {
        let mut book = StockBook::new();
        let lines = [beef_line(B001, 1), beef_line(B002, 2)];
        let err = dispatch(&mut book, PurchaseOrderStatus::Created, hub_po(), "TO-00001", &lines)
            .unwrap_err();
        assert!(matches!(err, FlowError::Shortage(ref s) if s.len() == 2));
    }

    #[test]
    fn test_fulfilled_po_rejects_new_transfer() {
        let mut book = produced_book();
        let err = dispatch(
            &mut book,
            PurchaseOrderStatus::Fulfilled,
            hub_po(),
            "TO-00001",
            &[beef_line(B001, 1)],
        )
        .unwrap_err();
        assert_eq!(err, FlowError::State(OrderError::PurchaseOrderFulfilled));
        assert_eq!(book.quantity(&CellKey::new(id(PRD), id(BEEF), id(B001))), 20);
    }

    #[test]
    fn test_second_receipt_rejected() {
        let mut book = produced_book();
        let sent = [beef_line(B001, 20)];
        dispatch(&mut book, PurchaseOrderStatus::Created, hub_po(), "TO-00001", &sent).unwrap();
        let mut transfer = TransferRecord::sent(&sent);
        receive(&mut book, &mut transfer, hub_po(), "RO-00001", &sent).unwrap();

        let recorded = transfer.clone();
        let err = receive(&mut book, &mut transfer, hub_po(), "RO-00002", &sent).unwrap_err();
        assert_eq!(err, FlowError::State(OrderError::TransferAlreadyReceived));
        assert_eq!(book.quantity(&CellKey::new(id(HUB), id(BEEF), id(B001))), 20);
        assert_eq!(transfer.lines, recorded.lines);
    }

    #[test]
    fn test_receipt_of_unsent_batch_rejected() {
        let mut book = produced_book();
        let sent = [beef_line(B001, 20)];
        dispatch(&mut book, PurchaseOrderStatus::Created, hub_po(), "TO-00001", &sent).unwrap();

        let mut transfer = TransferRecord::sent(&sent);
        let err =
            receive(&mut book, &mut transfer, hub_po(), "RO-00001", &[beef_line(B002, 20)]).unwrap_err();
        assert!(matches!(err, FlowError::Validation(ref f) if f.field == "items"));
        assert_eq!(transfer.status, TransferOrderStatus::Created);
        assert_eq!(transfer.lines[0].received_quantity, None);
    }

    /// Manual hub to store transfer: the store is the requester of the
    /// synthetic purchase order, so the receipt lands at the store
    #[test]
    fn test_manual_transfer_routes_through_inverted_po() {
        let mut book = produced_book();
        let sent = [beef_line(B001, 20)];
        dispatch(&mut book, PurchaseOrderStatus::Created, hub_po(), "TO-00001", &sent).unwrap();
        receive(&mut book, &mut TransferRecord::sent(&sent), hub_po(), "RO-00001", &sent).unwrap();

        let route = PurchaseRoute::for_manual_transfer(id(HUB), id(STORE));
        let lines = [beef_line(B001, 8)];
        assert_eq!(
            synthetic_request_lines(&lines).unwrap(),
            vec![RequestLine {
                sku_id: id(BEEF),
                quantity: 8
            }]
        );

        let po_status =
            dispatch(&mut book, PurchaseOrderStatus::InTransit, route, "TO-00002", &lines).unwrap();
        let mut transfer = TransferRecord::sent(&lines);
        receive(&mut book, &mut transfer, route, "RO-00002", &lines).unwrap();
        assert_eq!(po_after_receipt(po_status, &[&transfer]), PurchaseOrderStatus::Fulfilled);

        assert_eq!(book.quantity(&CellKey::new(id(HUB), id(BEEF), id(B001))), 12);
        assert_eq!(book.quantity(&CellKey::new(id(STORE), id(BEEF), id(B001))), 8);
        assert_clean(&book);
    }

    #[test]
    fn test_manual_receipt_reason() {
        assert_eq!(manual_receipt_reason("RO-00007"), "Receive Order RO-00007 (manual receipt)");
    }

    /// Two transfers against one PO: the PO stays IN_TRANSIT until both are received
    #[test]
    fn test_po_waits_for_every_transfer() {
        let mut book = produced_book();
        let first = [beef_line(B001, 12)];
        let second = [beef_line(B001, 8)];
        let po_status =
            dispatch(&mut book, PurchaseOrderStatus::Created, hub_po(), "TO-00001", &first).unwrap();
        let po_status = dispatch(&mut book, po_status, hub_po(), "TO-00002", &second).unwrap();
        let mut to1 = TransferRecord::sent(&first);
        let mut to2 = TransferRecord::sent(&second);

        receive(&mut book, &mut to1, hub_po(), "RO-00001", &first).unwrap();
        let po_status = po_after_receipt(po_status, &[&to1, &to2]);
        assert_eq!(po_status, PurchaseOrderStatus::InTransit);
        assert_eq!(to2.line(id(BEEF), id(B001)).unwrap().received_quantity, None);

        receive(&mut book, &mut to2, hub_po(), "RO-00002", &[beef_line(B001, 7)]).unwrap();
        assert_eq!(po_after_receipt(po_status, &[&to1, &to2]), PurchaseOrderStatus::Fulfilled);
        assert_eq!(to2.line(id(BEEF), id(B001)).unwrap().discrepancy(), Some(-1));
        assert_eq!(book.quantity(&CellKey::new(id(HUB), id(BEEF), id(B001))), 19);
        assert_clean(&book);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    const SENDER: u128 = 1;
    const RECEIVER: u128 = 2;

    fn route() -> PurchaseRoute {
        PurchaseRoute {
            requesting_inventory_id: id(RECEIVER),
            fulfilling_inventory_id: id(SENDER),
        }
    }

    /// Distinct (sku, batch) lines with positive quantities
    fn lines_strategy() -> impl Strategy<Value = Vec<StockLine>> {
        prop::collection::btree_map((0u128..4, 0u128..4), 1i32..30, 1..6).prop_map(|lines| {
            lines
                .into_iter()
                .map(|((sku, batch), quantity)| StockLine {
                    sku_id: id(10 + sku),
                    batch_id: id(100 + batch),
                    quantity,
                })
                .collect()
        })
    }

    fn stocked_book(lines: &[StockLine], on_hand: &[i32]) -> StockBook {
        let mut book = StockBook::new();
        for (line, quantity) in lines.iter().zip(on_hand) {
            if *quantity > 0 {
                book.apply(line.cell(id(SENDER)), StockChange::Delta(*quantity), "seed")
                    .unwrap();
            }
        }
        book
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A transfer either moves every line or changes nothing
        #[test]
        fn prop_transfer_is_all_or_nothing(
            lines in lines_strategy(),
            on_hand in prop::collection::vec(0i32..40, 6),
        ) {
            let mut book = stocked_book(&lines, &on_hand);
            let before = book.clone();
            let covered = lines
                .iter()
                .all(|l| before.quantity(&l.cell(id(SENDER))) >= l.quantity);

            let result = dispatch(
                &mut book,
                PurchaseOrderStatus::Created,
                route(),
                "TO-00001",
                &lines,
            );

            prop_assert_eq!(result.is_ok(), covered);
            for line in &lines {
                let key = line.cell(id(SENDER));
                let expected = if covered {
                    before.quantity(&key) - line.quantity
                } else {
                    before.quantity(&key)
                };
                prop_assert_eq!(book.quantity(&key), expected);
                prop_assert!(book.quantity(&key) >= 0);
            }
            if !covered {
                prop_assert_eq!(book.entries().len(), before.entries().len());
            }
        }

        /// Stock is conserved between sender and receiver when everything
        /// sent arrives
        #[test]
        fn prop_full_receipt_conserves_stock(lines in lines_strategy()) {
            let on_hand: Vec<i32> = lines.iter().map(|l| l.quantity + 5).collect();
            let mut book = stocked_book(&lines, &on_hand);

            dispatch(&mut book, PurchaseOrderStatus::Created, route(), "TO-00001", &lines).unwrap();
            let mut transfer = TransferRecord::sent(&lines);
            receive(&mut book, &mut transfer, route(), "RO-00001", &lines).unwrap();
            prop_assert!(transfer.lines.iter().all(|l| l.discrepancy() == Some(0)));

            for line in &lines {
                prop_assert_eq!(book.quantity(&line.cell(id(SENDER))), 5);
                prop_assert_eq!(book.quantity(&line.cell(id(RECEIVER))), line.quantity);
            }
            let audit = audit_ledger(book.entries(), book.cells().map(|(k, q)| (*k, *q)));
            prop_assert!(audit.is_clean());
        }

        /// PO is FULFILLED iff it has transfers and every one is received
        #[test]
        fn prop_po_fulfilled_iff_all_received(
            received in prop::collection::vec(any::<bool>(), 0..8),
        ) {
            let status = PurchaseOrderStatus::InTransit.on_receipt(&received);
            let all = !received.is_empty() && received.iter().all(|r| *r);
            prop_assert_eq!(status == PurchaseOrderStatus::Fulfilled, all);
        }

        /// PO status never moves backwards on dispatch
        #[test]
        fn prop_dispatch_status_monotonic(idx in 0usize..3) {
            let statuses = [
                PurchaseOrderStatus::Created,
                PurchaseOrderStatus::InTransit,
                PurchaseOrderStatus::Fulfilled,
            ];
            let status = statuses[idx];
            match status.on_dispatch() {
                Ok(next) => {
                    prop_assert!(next >= status);
                }
                Err(err) => {
                    prop_assert_eq!(err, OrderError::PurchaseOrderFulfilled);
                }
            }
        }

        /// Synthetic PO lines keep the total sent per SKU
        #[test]
        fn prop_synthetic_lines_preserve_totals(lines in lines_strategy()) {
            let requested = synthetic_request_lines(&lines).unwrap();
            for r in &requested {
                let sent: i32 = lines
                    .iter()
                    .filter(|l| l.sku_id == r.sku_id)
                    .map(|l| l.quantity)
                    .sum();
                prop_assert_eq!(r.quantity, sent);
            }
            prop_assert!(validate_request_lines(&requested).is_ok());
        }
    }
}
