pub mod clients;
pub mod dto;
pub mod entities;
pub mod error;
pub mod migration;
pub mod services;
pub mod signature;
pub mod types;

#[cfg(test)]
mod totals_proptest;

pub use error::{OrdersError, OrdersResult};
pub use services::{
    CartService, CheckoutService, InvoiceService, OrderService, PaymentService, RefundService,
    ReturnService, RevalidationService,
};
