use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Order-domain errors.
///
/// Each variant belongs to one slot of the service's error taxonomy and maps
/// to exactly one HTTP status at the controller boundary. Downstream
/// failures are "soft": callers either skip the mutation entirely or leave a
/// journaled state the reconciliation loop can repair.
#[derive(Error, Debug)]
pub enum OrdersError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Concurrent update on {resource} {id}, retries exhausted")]
    ConcurrentUpdate { resource: &'static str, id: Uuid },

    #[error("Cart is not valid for checkout: {0}")]
    CartInvalid(String),

    #[error("Insufficient stock for variant {variant_id}: requested {requested}")]
    StockUnavailable { variant_id: Uuid, requested: i32 },

    #[error("Checkout session expired")]
    CheckoutExpired,

    #[error("Cart totals drifted: session grand total {expected}, recomputed {actual}")]
    TotalsDrifted { expected: Decimal, actual: Decimal },

    #[error("Invalid payment signature")]
    InvalidSignature,

    #[error("Return window closed")]
    ReturnWindowClosed,

    #[error("Pricing service unavailable")]
    PricingUnavailable,

    #[error("Catalog service unavailable")]
    CatalogUnavailable,

    #[error("Payment gateway unavailable")]
    GatewayUnavailable,

    #[error("{service} service unavailable")]
    DownstreamUnavailable { service: &'static str },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type OrdersResult<T> = Result<T, OrdersError>;

impl OrdersError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        OrdersError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        OrdersError::Validation(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        OrdersError::InvalidState(message.into())
    }

    /// HTTP status this error surfaces as (§ error taxonomy).
    pub fn status_code(&self) -> u16 {
        match self {
            OrdersError::Validation(_) | OrdersError::CartInvalid(_) => 400,
            OrdersError::Unauthorized(_) | OrdersError::InvalidSignature => 401,
            OrdersError::Forbidden(_) => 403,
            OrdersError::NotFound { .. } => 404,
            OrdersError::InvalidState(_)
            | OrdersError::Conflict(_)
            | OrdersError::ConcurrentUpdate { .. }
            | OrdersError::CheckoutExpired
            | OrdersError::TotalsDrifted { .. }
            | OrdersError::ReturnWindowClosed
            | OrdersError::StockUnavailable { .. } => 409,
            OrdersError::PricingUnavailable
            | OrdersError::CatalogUnavailable
            | OrdersError::GatewayUnavailable
            | OrdersError::DownstreamUnavailable { .. } => 503,
            OrdersError::Database(_) | OrdersError::Internal(_) => 500,
        }
    }

    /// Short machine-readable code for the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            OrdersError::Validation(_) => "VALIDATION",
            OrdersError::Unauthorized(_) => "UNAUTHORIZED",
            OrdersError::Forbidden(_) => "FORBIDDEN",
            OrdersError::NotFound { .. } => "NOT_FOUND",
            OrdersError::InvalidState(_) => "INVALID_STATE",
            OrdersError::Conflict(_) => "CONFLICT",
            OrdersError::ConcurrentUpdate { .. } => "CONCURRENT_UPDATE",
            OrdersError::CartInvalid(_) => "CART_INVALID",
            OrdersError::StockUnavailable { .. } => "STOCK_UNAVAILABLE",
            OrdersError::CheckoutExpired => "CHECKOUT_EXPIRED",
            OrdersError::TotalsDrifted { .. } => "TOTALS_DRIFTED",
            OrdersError::InvalidSignature => "INVALID_SIGNATURE",
            OrdersError::ReturnWindowClosed => "RETURN_WINDOW_CLOSED",
            OrdersError::PricingUnavailable => "PRICING_UNAVAILABLE",
            OrdersError::CatalogUnavailable => "CATALOG_UNAVAILABLE",
            OrdersError::GatewayUnavailable => "GATEWAY_UNAVAILABLE",
            OrdersError::DownstreamUnavailable { .. } => "DOWNSTREAM_UNAVAILABLE",
            OrdersError::Database(_) | OrdersError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<kirana_core::Error> for OrdersError {
    fn from(err: kirana_core::Error) -> Self {
        match err {
            kirana_core::Error::Database(db) => OrdersError::Database(db),
            kirana_core::Error::Validation(msg) => OrdersError::Validation(msg),
            kirana_core::Error::NotFound(what) => OrdersError::NotFound {
                resource: "resource",
                id: what,
            },
            other => OrdersError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for OrdersError {
    fn from(err: serde_json::Error) -> Self {
        OrdersError::Internal(format!("snapshot (de)serialization failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(OrdersError::validation("bad").status_code(), 400);
        assert_eq!(OrdersError::not_found("Order", "x").status_code(), 404);
        assert_eq!(OrdersError::CheckoutExpired.status_code(), 409);
        assert_eq!(OrdersError::GatewayUnavailable.status_code(), 503);
        assert_eq!(OrdersError::InvalidSignature.status_code(), 401);
    }
}
