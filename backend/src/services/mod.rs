//! Business logic services for the Stockflow platform

pub mod batch;
pub mod master_data;
pub mod purchase_order;
pub mod receive_order;
pub mod sequence;
pub mod stock_ledger;
pub mod transfer_order;
