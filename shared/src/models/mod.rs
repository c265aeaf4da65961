//! Domain models for the Stockflow platform

mod batch;
mod inventory;
mod purchase_order;
mod receive_order;
mod stock;
mod transfer_order;

pub use batch::*;
pub use inventory::*;
pub use purchase_order::*;
pub use receive_order::*;
pub use stock::*;
pub use transfer_order::*;

use thiserror::Error;

/// Rejected document state transitions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("Purchase order is already fulfilled")]
    PurchaseOrderFulfilled,

    #[error("Transfer order has already been received")]
    TransferAlreadyReceived,
}
