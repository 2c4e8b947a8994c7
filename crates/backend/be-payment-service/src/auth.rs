use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use be_auth_core::{Claims, JwtConfig};

use crate::error::PaymentError;

/// Bearer-authenticated payer, when the header is present. Server-to-server
/// callers authenticate with `api_key` in the body instead, so a missing
/// header is not a rejection here.
pub struct MaybeAuthUser(pub Option<Claims>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = PaymentError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(auth_header) = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
        else {
            return Ok(MaybeAuthUser(None));
        };

        if !auth_header.starts_with("Bearer ") {
            return Err(PaymentError::Unauthorized(
                "Authorization header must start with 'Bearer '".to_string(),
            ));
        }

        let jwt_config = parts.extensions.get::<Arc<JwtConfig>>().ok_or_else(|| {
            PaymentError::Internal(anyhow::anyhow!("JwtConfig not found in extensions"))
        })?;

        let token = &auth_header[7..];
        let claims = jwt_config
            .validate_access_token(token)
            .map_err(|e| PaymentError::Unauthorized(e.to_string()))?;

        Ok(MaybeAuthUser(Some(claims)))
    }
}
