//! HTTP request handlers

mod batch;
mod health;
mod purchase_order;
mod receive_order;
mod stock;
mod transfer_order;

pub use batch::*;
pub use health::*;
pub use purchase_order::*;
pub use receive_order::*;
pub use stock::*;
pub use transfer_order::*;
