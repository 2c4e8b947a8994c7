//! Error types shared by the gateway clients

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessorError {
    /// The gateway refused the payment; message/type/code are supplied by the
    /// gateway and surfaced verbatim to the caller.
    #[error("{message}")]
    Declined {
        message: String,
        error_type: String,
        code: Option<String>,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Gateway authentication failed: {0}")]
    Authentication(String),

    /// Transport-level failure talking to the gateway. Never retried here.
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected gateway response: {0}")]
    Protocol(String),
}

impl ProcessorError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<reqwest::Error> for ProcessorError {
    fn from(err: reqwest::Error) -> Self {
        ProcessorError::Unavailable(err.to_string())
    }
}

pub type ProcessorResult<T> = Result<T, ProcessorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declined_displays_gateway_message() {
        let err = ProcessorError::Declined {
            message: "Your card was declined".to_string(),
            error_type: "card_error".to_string(),
            code: Some("card_declined".to_string()),
        };
        assert_eq!(err.to_string(), "Your card was declined");
    }

    #[test]
    fn not_found_is_detectable() {
        assert!(ProcessorError::NotFound("plan".to_string()).is_not_found());
        assert!(!ProcessorError::Unavailable("timeout".to_string()).is_not_found());
    }
}
