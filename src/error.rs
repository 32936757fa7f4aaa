use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

/// Failures raised by an [`AccountStore`](crate::services::store::AccountStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store has no atomic primitive with this name. Selects the fallback path.
    #[error("atomic primitive `{0}` is not available")]
    Unsupported(&'static str),

    #[error("account {0} does not exist")]
    AccountMissing(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Outcomes of the reserve / finalize / release lifecycle that callers act on.
#[derive(Debug, thiserror::Error)]
pub enum CreditError {
    #[error("Credit account not found")]
    AccountNotFound,

    #[error("Insufficient credits: need at least {required}, have {available}")]
    InsufficientCredits { required: i64, available: i64 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Charge of {actual} exceeds reservation of {reserved}")]
    ChargeExceedsReservation { reserved: i64, actual: i64 },

    #[error("Failed to reserve credits: {0}")]
    ReservationFailed(String),

    #[error("Failed to finalize credit usage: {0}")]
    FinalizationFailed(String),

    #[error("Failed to release reserved credits: {0}")]
    ReleaseFailed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Credits(#[from] CreditError),

    #[error("Credit store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Credits(err) => match err {
                CreditError::AccountNotFound => {
                    (StatusCode::NOT_FOUND, "ACCOUNT_NOT_FOUND", err.to_string())
                }
                CreditError::InsufficientCredits { .. } => (
                    StatusCode::PAYMENT_REQUIRED,
                    "INSUFFICIENT_CREDITS",
                    err.to_string(),
                ),
                CreditError::InvalidAmount(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_AMOUNT", err.to_string())
                }
                CreditError::ChargeExceedsReservation { .. } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "CHARGE_EXCEEDS_RESERVATION",
                    err.to_string(),
                ),
                CreditError::ReservationFailed(_) => {
                    (StatusCode::CONFLICT, "RESERVATION_FAILED", err.to_string())
                }
                CreditError::FinalizationFailed(msg) => {
                    tracing::error!("Credit finalization failed: {}", msg);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "FINALIZATION_FAILED",
                        "Credit usage could not be settled".to_string(),
                    )
                }
                CreditError::ReleaseFailed(msg) => {
                    tracing::error!("Credit release failed: {}", msg);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "RELEASE_FAILED",
                        "Reserved credits could not be released".to_string(),
                    )
                }
            },
            ApiError::StoreUnavailable(e) => {
                tracing::error!("Credit store error: {:?}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORE_UNAVAILABLE",
                    "Credit store temporarily unavailable".to_string(),
                )
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = self.parts();

        let body = json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, Json(body)).into_response()
    }
}

// Helper type for results
pub type Result<T> = std::result::Result<T, ApiError>;
