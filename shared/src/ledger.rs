//! In-memory stock ledger and history replay
//!
//! `StockBook` applies the same cell rules as the database-backed ledger:
//! every change goes through [`StockChange::apply`] and appends exactly one
//! entry. The auditor replays persisted history through a book and compares
//! the outcome with the stored cells.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{StockChange, StockError};
use crate::types::CellKey;

/// One recorded mutation of a stock cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub key: CellKey,
    pub old_quantity: i32,
    pub new_quantity: i32,
    pub reason: String,
}

/// Stock cells with their append-only history
#[derive(Debug, Clone, Default)]
pub struct StockBook {
    cells: BTreeMap<CellKey, i32>,
    entries: Vec<LedgerEntry>,
}

impl StockBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current quantity, 0 for a cell that was never touched
    pub fn quantity(&self, key: &CellKey) -> i32 {
        self.cells.get(key).copied().unwrap_or(0)
    }

    /// Apply one change and record it. A rejected change leaves the book
    /// untouched.
    pub fn apply(
        &mut self,
        key: CellKey,
        change: StockChange,
        reason: impl Into<String>,
    ) -> Result<i32, StockError> {
        let old_quantity = self.quantity(&key);
        let new_quantity = change.apply(old_quantity)?;
        self.cells.insert(key, new_quantity);
        self.entries.push(LedgerEntry {
            key,
            old_quantity,
            new_quantity,
            reason: reason.into(),
        });
        Ok(new_quantity)
    }

    /// Run `f` against the book as one unit: if it fails, every change it made
    /// is discarded.
    pub fn atomically<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut StockBook) -> Result<T, E>,
    {
        let snapshot = self.clone();
        let result = f(self);
        if result.is_err() {
            *self = snapshot;
        }
        result
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// History of one cell, oldest first
    pub fn history(&self, key: CellKey) -> impl Iterator<Item = &LedgerEntry> + '_ {
        self.entries.iter().filter(move |e| e.key == key)
    }

    /// Cells that have been touched, including ones now at zero
    pub fn cells(&self) -> impl Iterator<Item = (&CellKey, &i32)> {
        self.cells.iter()
    }

    /// Rebuild cell quantities from history alone, starting every cell at 0
    /// and taking each entry's new quantity.
    pub fn replay<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> BTreeMap<CellKey, i32> {
        let mut cells = BTreeMap::new();
        for entry in entries {
            cells.insert(entry.key, entry.new_quantity);
        }
        cells
    }
}

/// History entry whose old quantity does not follow from the entries before it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainBreak {
    /// Position of the entry in the replayed sequence
    pub position: usize,
    pub key: CellKey,
    pub expected_old_quantity: i32,
    pub recorded_old_quantity: i32,
}

/// Stored cell quantity that differs from the replayed history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellMismatch {
    pub key: CellKey,
    pub stored_quantity: i32,
    pub replayed_quantity: i32,
}

/// Outcome of replaying the ledger history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerAudit {
    pub entries_replayed: usize,
    pub cells_checked: usize,
    pub chain_breaks: Vec<ChainBreak>,
    pub mismatched_cells: Vec<CellMismatch>,
    /// Positions of entries that recorded a negative quantity
    pub negative_entries: Vec<usize>,
}

impl LedgerAudit {
    pub fn is_clean(&self) -> bool {
        self.chain_breaks.is_empty() && self.mismatched_cells.is_empty() && self.negative_entries.is_empty()
    }
}

/// Replay `entries` in order from zero and compare against `stored` cells
pub fn audit_ledger<'a>(
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
    stored: impl IntoIterator<Item = (CellKey, i32)>,
) -> LedgerAudit {
    let mut audit = LedgerAudit::default();
    let mut replayed: BTreeMap<CellKey, i32> = BTreeMap::new();

    for (position, entry) in entries.into_iter().enumerate() {
        let expected = replayed.get(&entry.key).copied().unwrap_or(0);
        if entry.old_quantity != expected {
            audit.chain_breaks.push(ChainBreak {
                position,
                key: entry.key,
                expected_old_quantity: expected,
                recorded_old_quantity: entry.old_quantity,
            });
        }
        if entry.new_quantity < 0 {
            audit.negative_entries.push(position);
        }
        replayed.insert(entry.key, entry.new_quantity);
        audit.entries_replayed += 1;
    }

    for (key, stored_quantity) in stored {
        audit.cells_checked += 1;
        let replayed_quantity = replayed.remove(&key).unwrap_or(0);
        if replayed_quantity != stored_quantity {
            audit.mismatched_cells.push(CellMismatch {
                key,
                stored_quantity,
                replayed_quantity,
            });
        }
    }

    // History for cells that no longer exist in storage
    for (key, replayed_quantity) in replayed {
        if replayed_quantity != 0 {
            audit.mismatched_cells.push(CellMismatch {
                key,
                stored_quantity: 0,
                replayed_quantity,
            });
        }
    }

    audit
}
