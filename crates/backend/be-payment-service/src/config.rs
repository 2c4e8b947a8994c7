use axum::http::HeaderValue;

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub environment: String,
    pub api_url: String,
    pub website_url: String,
    pub card_api_url: String,
    pub card_secret_key: String,
    pub redirect_api_url: String,
    pub redirect_client_id: String,
    pub redirect_client_secret: String,
    pub api_keys: Vec<String>,
    /// Platform revenue share as a fraction of the charge (0.05 = 5%).
    pub platform_fee_percent: f64,
    pub host_fee_percent: f64,
}

impl PaymentConfig {
    pub fn from_env() -> Result<Self, crate::error::PaymentError> {
        let environment =
            std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let api_url =
            std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        let website_url =
            std::env::var("WEBSITE_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());

        HeaderValue::from_str(&website_url).map_err(|e| {
            crate::error::PaymentError::Config(format!(
                "WEBSITE_URL '{website_url}' is not a valid header value: {e}"
            ))
        })?;

        let card_api_url = std::env::var("CARD_GATEWAY_URL").map_err(|_| {
            crate::error::PaymentError::Config(
                "CARD_GATEWAY_URL environment variable must be set".into(),
            )
        })?;

        let card_secret_key = std::env::var("CARD_GATEWAY_SECRET_KEY").map_err(|_| {
            crate::error::PaymentError::Config(
                "CARD_GATEWAY_SECRET_KEY environment variable must be set".into(),
            )
        })?;

        let redirect_api_url = std::env::var("REDIRECT_GATEWAY_URL").map_err(|_| {
            crate::error::PaymentError::Config(
                "REDIRECT_GATEWAY_URL environment variable must be set".into(),
            )
        })?;

        let redirect_client_id = std::env::var("REDIRECT_GATEWAY_CLIENT_ID").map_err(|_| {
            crate::error::PaymentError::Config(
                "REDIRECT_GATEWAY_CLIENT_ID environment variable must be set".into(),
            )
        })?;

        let redirect_client_secret = std::env::var("REDIRECT_GATEWAY_SECRET").map_err(|_| {
            crate::error::PaymentError::Config(
                "REDIRECT_GATEWAY_SECRET environment variable must be set".into(),
            )
        })?;

        let api_keys = std::env::var("PAYMENT_API_KEYS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let platform_fee_percent = match std::env::var("PLATFORM_FEE_PERCENT") {
            Ok(raw) => raw.parse::<f64>().map_err(|_| {
                crate::error::PaymentError::Config(
                    "PLATFORM_FEE_PERCENT must be a fraction such as 0.05".into(),
                )
            })?,
            Err(_) => 0.05,
        };

        let host_fee_percent = match std::env::var("HOST_FEE_PERCENT") {
            Ok(raw) => raw.parse::<f64>().map_err(|_| {
                crate::error::PaymentError::Config(
                    "HOST_FEE_PERCENT must be a fraction such as 0.05".into(),
                )
            })?,
            Err(_) => 0.0,
        };

        Ok(Self {
            environment,
            api_url,
            website_url,
            card_api_url,
            card_secret_key,
            redirect_api_url,
            redirect_client_id,
            redirect_client_secret,
            api_keys,
            platform_fee_percent,
            host_fee_percent,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_valid_api_key(&self, key: &str) -> bool {
        self.api_keys.iter().any(|k| k == key)
    }
}
