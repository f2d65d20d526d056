//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use renderpay_core::{CatalogError, LedgerError};

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - resource already exists or invalid state transition.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Insufficient balance for the requested job.
    #[error("insufficient balance: balance={balance}, required={required}")]
    InsufficientBalance {
        /// Current cash balance in cents.
        balance: i64,
        /// Required charge in cents.
        required: i64,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AccountNotFound { external_id } => {
                Self::NotFound(format!("account not found: {external_id}"))
            }
            LedgerError::JobNotFound { job_id } => {
                Self::NotFound(format!("job not found: {job_id}"))
            }
            LedgerError::AccountAlreadyExists { .. } => {
                Self::Conflict("account already exists".into())
            }
            LedgerError::InsufficientBalance { balance, required } => {
                Self::InsufficientBalance { balance, required }
            }
            LedgerError::InvalidCost { .. }
            | LedgerError::InvalidCount { .. }
            | LedgerError::InvalidId(_) => Self::BadRequest(err.to_string()),
            LedgerError::JobNotFailed { .. } | LedgerError::JobAlreadySettled { .. } => {
                Self::Conflict(err.to_string())
            }
            LedgerError::Storage(_) | LedgerError::Serialization(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::UnknownModel { .. } => Self::NotFound(err.to_string()),
            _ => Self::BadRequest(err.to_string()),
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::InsufficientBalance { balance, required } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_balance",
                self.to_string(),
                Some(serde_json::json!({
                    "balance": balance,
                    "required": required
                })),
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_balance_maps_to_payment_required() {
        let response = ApiError::InsufficientBalance {
            balance: 10,
            required: 30,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn ledger_errors_map_to_api_errors() {
        let err: ApiError = LedgerError::AccountNotFound {
            external_id: "tg:1".into(),
        }
        .into();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err: ApiError = LedgerError::InvalidCost { unit_cost: 0 }.into();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn unpriceable_params_are_bad_request() {
        let err: ApiError = CatalogError::UnpriceableParams {
            model_id: "sparse".into(),
        }
        .into();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
