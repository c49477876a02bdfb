//! Response envelope: every payload ships as `{message, data, error}` and
//! every error carries a machine-readable code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kirana_orders::OrdersError;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Envelope<T: Serialize> {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

pub fn ok<T: Serialize>(message: &str, data: T) -> Response {
    (
        StatusCode::OK,
        Json(Envelope {
            message: message.to_string(),
            data: Some(data),
            error: None,
        }),
    )
        .into_response()
}

pub fn created<T: Serialize>(message: &str, data: T) -> Response {
    (
        StatusCode::CREATED,
        Json(Envelope {
            message: message.to_string(),
            data: Some(data),
            error: None,
        }),
    )
        .into_response()
}

/// Handler-boundary error. Everything a controller can fail with converts
/// into this; internals are logged, never surfaced.
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    code: String,
    message: String,
    fields: Vec<FieldError>,
}

pub type ApiResult<T> = std::result::Result<T, ApiFailure>;

impl ApiFailure {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn unauthorized(message: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: &str) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION", message)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(Envelope::<()> {
                message: self.message.clone(),
                data: None,
                error: Some(ApiError {
                    code: self.code,
                    message: self.message,
                    fields: self.fields,
                }),
            }),
        )
            .into_response()
    }
}

impl From<OrdersError> for ApiFailure {
    fn from(err: OrdersError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = match &err {
            OrdersError::Database(inner) => {
                tracing::error!(error = %inner, "database error");
                "internal server error".to_string()
            }
            OrdersError::Internal(inner) => {
                tracing::error!(error = %inner, "internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        Self {
            status,
            code: err.code().to_string(),
            message,
            fields: Vec::new(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiFailure {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldError {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "VALIDATION".to_string(),
            message: "validation failed".to_string(),
            fields,
        }
    }
}

impl From<serde_json::Error> for ApiFailure {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!(error = %err, "snapshot decode failed");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL",
            "internal server error",
        )
    }
}

impl From<loco_rs::Error> for ApiFailure {
    fn from(err: loco_rs::Error) -> Self {
        tracing::error!(error = %err, "framework error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL",
            "internal server error",
        )
    }
}
