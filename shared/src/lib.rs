//! Shared types and domain rules for the Stockflow platform
//!
//! This crate holds the pieces of the stock movement flow that do not need a
//! database: document statuses and their transitions, quantity arithmetic,
//! input validation and an in-memory ledger used for auditing.

pub mod ledger;
pub mod models;
pub mod types;
pub mod validation;

pub use ledger::*;
pub use models::*;
pub use types::*;
pub use validation::*;
