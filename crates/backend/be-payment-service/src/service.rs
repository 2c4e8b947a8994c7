use std::sync::Arc;

use be_auth_core::JwtConfig;
use be_ledger_db::DatabaseManager;
use be_processors::{CardGateway, RedirectGateway};

use crate::config::PaymentConfig;

pub struct AppState {
    pub card: CardGateway,
    pub redirect: RedirectGateway,
    pub config: PaymentConfig,
    pub db: Arc<DatabaseManager>,
    pub jwt_config: Arc<JwtConfig>,
}

impl AppState {
    pub fn from_env(db: Arc<DatabaseManager>) -> Result<Self, crate::error::PaymentError> {
        let config = PaymentConfig::from_env()?;
        let card = CardGateway::new(&config.card_api_url, &config.card_secret_key);
        let redirect = RedirectGateway::new(
            &config.redirect_api_url,
            &config.redirect_client_id,
            &config.redirect_client_secret,
        );
        let jwt_config = Arc::new(JwtConfig::from_env());
        Ok(Self {
            card,
            redirect,
            config,
            db,
            jwt_config,
        })
    }
}
