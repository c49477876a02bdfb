pub mod cart;
pub mod cart_item;
pub mod checkout_session;
pub mod invoice;
pub mod number_sequence;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod refund;
pub mod return_request;
pub mod status_history;
