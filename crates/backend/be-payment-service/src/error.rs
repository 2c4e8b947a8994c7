use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use be_ledger_db::DbError;
use be_processors::ProcessorError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("{0}")]
    Validation(String),

    #[error("You can't use a live card gateway key on {0}")]
    EnvironmentMismatch(String),

    /// Gateway declined the payment; message/type/code come from the gateway
    /// and are surfaced verbatim.
    #[error("{message}")]
    Declined {
        message: String,
        error_type: String,
        code: Option<String>,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Transport or protocol failure talking to a gateway. Not retried.
    #[error("Gateway error: {0}")]
    Processor(String),

    /// The external charge succeeded but the ledger write did not. Needs
    /// reconciliation; must never be folded into a decline.
    #[error("Ledger write failed after a successful charge: {0}")]
    Ledger(#[source] DbError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ProcessorError> for PaymentError {
    fn from(err: ProcessorError) -> Self {
        match err {
            ProcessorError::Declined {
                message,
                error_type,
                code,
            } => Self::Declined {
                message,
                error_type,
                code,
            },
            other => Self::Processor(other.to_string()),
        }
    }
}

impl PaymentError {
    /// Coarse bucket for analytics; never exposed on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::EnvironmentMismatch(_) => "environment_mismatch",
            Self::Declined { .. } => "declined",
            Self::Unauthorized(_) => "unauthorized",
            Self::Processor(_) => "processor",
            Self::Ledger(_) => "ledger",
            Self::Db(_) => "db",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: u16,
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            PaymentError::Validation(_) | PaymentError::EnvironmentMismatch(_) => (
                StatusCode::BAD_REQUEST,
                "bad_request".to_string(),
                self.to_string(),
            ),
            PaymentError::Declined { message, .. } => (
                StatusCode::BAD_REQUEST,
                "PaymentMethodError".to_string(),
                message.clone(),
            ),
            PaymentError::Unauthorized(_) => (
                StatusCode::UNAUTHORIZED,
                "unauthorized".to_string(),
                self.to_string(),
            ),
            PaymentError::Db(e) if e.is_not_found() => (
                StatusCode::NOT_FOUND,
                "not_found".to_string(),
                e.to_string(),
            ),
            PaymentError::Processor(_) => (
                StatusCode::BAD_GATEWAY,
                "processor_error".to_string(),
                self.to_string(),
            ),
            PaymentError::Ledger(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ledger_error".to_string(),
                self.to_string(),
            ),
            PaymentError::Db(_) | PaymentError::Config(_) | PaymentError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error".to_string(),
                "Internal server error".to_string(),
            ),
        };

        tracing::error!(%status, error = %self, "Payment service error");

        let body = ErrorBody {
            error: ErrorDetail {
                code: status.as_u16(),
                error_type,
                message,
            },
        };

        (status, axum::Json(body)).into_response()
    }
}
