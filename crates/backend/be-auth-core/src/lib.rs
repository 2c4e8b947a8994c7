use anyhow::{Result, anyhow};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
    pub token_type: String,
}

#[derive(Clone)]
pub struct JwtConfig {
    pub access_token_encoding_key: EncodingKey,
    pub access_token_decoding_key: DecodingKey,

    pub access_token_expiry_hours: i64,

    pub validation: Validation,
}

impl JwtConfig {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            access_token_encoding_key: EncodingKey::from_secret(secret),
            access_token_decoding_key: DecodingKey::from_secret(secret),
            access_token_expiry_hours: 1,
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");
        Self::new(secret.as_bytes())
    }

    pub fn issue_access_token(&self, user_id: Uuid, email: &str) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::hours(self.access_token_expiry_hours)).timestamp(),
            token_type: "access".to_string(),
        };

        encode(&Header::default(), &claims, &self.access_token_encoding_key)
            .map_err(|e| anyhow!("Failed to sign token: {}", e))
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.access_token_decoding_key, &self.validation)
            .map_err(|e| anyhow!("Invalid token: {}", e))?;

        if token_data.claims.token_type != "access" {
            return Err(anyhow!("Invalid token type: expected access token"));
        }

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_and_validate_roundtrip() {
        let config = JwtConfig::new(b"test-secret");
        let user_id = Uuid::now_v7();

        let token = config.issue_access_token(user_id, "donor@example.com").unwrap();
        let claims = config.validate_access_token(&token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "donor@example.com");
        assert_eq!(claims.token_type, "access");
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let signer = JwtConfig::new(b"secret-a");
        let verifier = JwtConfig::new(b"secret-b");

        let token = signer
            .issue_access_token(Uuid::now_v7(), "donor@example.com")
            .unwrap();
        assert!(verifier.validate_access_token(&token).is_err());
    }

    #[test]
    fn rejects_garbage() {
        let config = JwtConfig::new(b"test-secret");
        assert!(config.validate_access_token("not-a-jwt").is_err());
    }
}
