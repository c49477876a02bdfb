pub mod cart;
pub mod checkout;
pub mod invoice;
pub mod order;
pub mod payment;
pub mod refund;
pub mod return_request;

pub use cart::*;
pub use checkout::*;
pub use invoice::*;
pub use order::*;
pub use payment::*;
pub use refund::*;
pub use return_request::*;
