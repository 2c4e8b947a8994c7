//! Redirect (wallet) gateway client: two-phase approve/execute payments and
//! billing agreements behind a client-credentials token grant.

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;

use crate::error::{ProcessorError, ProcessorResult};

pub struct RedirectGateway {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: SecretString,
    access_token: tokio::sync::RwLock<Option<CachedToken>>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct GatewayLink {
    href: String,
    rel: String,
    #[allow(dead_code)]
    method: String,
}

#[derive(Debug, Deserialize)]
struct ApprovalResponse {
    id: Option<String>,
    links: Vec<GatewayLink>,
}

#[derive(Debug, Deserialize)]
struct GatewayFailure {
    name: Option<String>,
    message: Option<String>,
}

/// Phase-1 result: where to send the payer, and where phase 2 executes.
#[derive(Debug, Clone)]
pub struct ApprovalResource {
    /// Present for single payments; agreements are executed by the opaque
    /// token the payer brings back instead.
    pub payment_id: Option<String>,
    pub approval_url: String,
    pub execute_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutedPayment {
    pub id: String,
    pub payer_email: String,
    pub payer_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExecutedPaymentRaw {
    id: String,
    payer: ExecutedPayer,
}

#[derive(Debug, Deserialize)]
struct ExecutedPayer {
    status: Option<String>,
    payer_info: ExecutedPayerInfo,
}

#[derive(Debug, Deserialize)]
struct ExecutedPayerInfo {
    email: String,
}

#[derive(Debug, Clone)]
pub struct AgreementRequest {
    pub description: String,
    pub amount_minor: i64,
    pub currency: String,
    pub interval: String,
    pub return_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub description: String,
    pub amount_minor: i64,
    pub currency: String,
    pub return_url: String,
    pub cancel_url: String,
}

impl RedirectGateway {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            access_token: tokio::sync::RwLock::new(None),
        }
    }

    /// Fetches (or reuses) a client-credentials access token. Cached until a
    /// minute before expiry.
    async fn token(&self) -> ProcessorResult<String> {
        {
            let token = self.access_token.read().await;
            if let Some(ref t) = *token {
                if t.expires_at > Utc::now() {
                    return Ok(t.token.clone());
                }
            }
        }

        tracing::debug!("Refreshing gateway access token");

        let credentials = STANDARD.encode(format!(
            "{}:{}",
            self.client_id,
            self.client_secret.expose_secret()
        ));

        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .header("Authorization", format!("Basic {}", credentials))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProcessorError::Authentication(
                "Failed to obtain gateway access token".to_string(),
            ));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProcessorError::Protocol(e.to_string()))?;
        let new_token = CachedToken {
            token: token_response.access_token.clone(),
            expires_at: Utc::now()
                + chrono::Duration::seconds(token_response.expires_in as i64 - 60),
        };

        let mut token = self.access_token.write().await;
        *token = Some(new_token);

        Ok(token_response.access_token)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> ProcessorResult<T> {
        let token = self.token().await?;
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ProcessorError::Protocol(e.to_string()));
        }

        let failure: GatewayFailure = response
            .json()
            .await
            .map_err(|e| ProcessorError::Protocol(e.to_string()))?;
        let message = failure
            .message
            .unwrap_or_else(|| "Payment gateway error".to_string());

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProcessorError::Authentication(message));
        }
        if status.is_client_error() {
            return Err(ProcessorError::Declined {
                message,
                error_type: failure.name.unwrap_or_else(|| "gateway_error".to_string()),
                code: None,
            });
        }
        Err(ProcessorError::Unavailable(format!(
            "gateway returned {}: {}",
            status, message
        )))
    }

    fn into_approval(response: ApprovalResponse) -> ProcessorResult<ApprovalResource> {
        let approval_url = response
            .links
            .iter()
            .find(|l| l.rel == "approval_url")
            .map(|l| l.href.clone())
            .ok_or_else(|| {
                ProcessorError::Protocol("approval resource has no approval_url link".to_string())
            })?;
        let execute_url = response
            .links
            .iter()
            .find(|l| l.rel == "execute")
            .map(|l| l.href.clone())
            .ok_or_else(|| {
                ProcessorError::Protocol("approval resource has no execute link".to_string())
            })?;

        Ok(ApprovalResource {
            payment_id: response.id,
            approval_url,
            execute_url,
        })
    }

    /// Phase 1, recurring: requests a billing agreement the payer must
    /// approve in the browser.
    pub async fn create_billing_agreement(
        &self,
        request: &AgreementRequest,
    ) -> ProcessorResult<ApprovalResource> {
        let body = json!({
            "name": request.description,
            "description": request.description,
            "plan": {
                "type": "INFINITE",
                "payment_definitions": [{
                    "frequency": request.interval.to_uppercase(),
                    "frequency_interval": "1",
                    "amount": {
                        "value": format_major_units(request.amount_minor),
                        "currency": request.currency,
                    },
                }],
            },
            "redirect_urls": {
                "return_url": request.return_url,
                "cancel_url": request.cancel_url,
            },
        });

        let response: ApprovalResponse =
            self.post_json("/v1/payments/billing-agreements", &body).await?;
        Self::into_approval(response)
    }

    /// Phase 1, one-time: requests a single approval-based payment.
    pub async fn create_payment(
        &self,
        request: &PaymentRequest,
    ) -> ProcessorResult<ApprovalResource> {
        let body = json!({
            "intent": "sale",
            "transactions": [{
                "amount": {
                    "total": format_major_units(request.amount_minor),
                    "currency": request.currency,
                },
                "description": request.description,
            }],
            "redirect_urls": {
                "return_url": request.return_url,
                "cancel_url": request.cancel_url,
            },
        });

        let response: ApprovalResponse = self.post_json("/v1/payments/payment", &body).await?;
        Self::into_approval(response)
    }

    /// Phase 2, recurring: captures the billing agreement by the opaque token
    /// the payer returned with.
    pub async fn execute_agreement(&self, token: &str) -> ProcessorResult<ExecutedPayment> {
        let raw: ExecutedPaymentRaw = self
            .post_json(
                &format!("/v1/payments/billing-agreements/{}/agreement-execute", token),
                &json!({}),
            )
            .await?;
        Ok(ExecutedPayment {
            id: raw.id,
            payer_email: raw.payer.payer_info.email,
            payer_status: raw.payer.status,
        })
    }

    /// Phase 2, one-time: captures the payment for the approving payer.
    pub async fn execute_payment(
        &self,
        payment_id: &str,
        payer_id: &str,
    ) -> ProcessorResult<ExecutedPayment> {
        let raw: ExecutedPaymentRaw = self
            .post_json(
                &format!("/v1/payments/payment/{}/execute", payment_id),
                &json!({ "payer_id": payer_id }),
            )
            .await?;
        Ok(ExecutedPayment {
            id: raw.id,
            payer_email: raw.payer.payer_info.email,
            payer_status: raw.payer.status,
        })
    }
}

/// The gateway speaks decimal major units on the wire; the ledger keeps
/// minor units throughout. Assumes two-decimal currencies.
fn format_major_units(amount_minor: i64) -> String {
    format!("{}.{:02}", amount_minor / 100, amount_minor % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json_string, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(server: &MockServer) -> RedirectGateway {
        RedirectGateway::new(server.uri(), "client-id", "client-secret")
    }

    fn token_mock() -> Mock {
        Mock::given(method("POST"))
            .and(path("/v1/oauth2/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "token-abc",
                "token_type": "Bearer",
                "expires_in": 28800
            })))
    }

    fn executed_body() -> serde_json::Value {
        json!({
            "id": "I-123",
            "payer": {
                "payment_method": "wallet",
                "status": "verified",
                "payer_info": { "email": "payer@example.com" }
            }
        })
    }

    #[test]
    fn major_unit_formatting() {
        assert_eq!(format_major_units(1000), "10.00");
        assert_eq!(format_major_units(1099), "10.99");
        assert_eq!(format_major_units(5), "0.05");
    }

    #[tokio::test]
    async fn access_token_is_cached_across_calls() {
        let server = MockServer::start().await;
        token_mock().expect(1).mount(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/payments/billing-agreements/EC-123/agreement-execute"))
            .respond_with(ResponseTemplate::new(200).set_body_json(executed_body()))
            .expect(2)
            .mount(&server)
            .await;

        let gateway = gateway(&server);
        gateway.execute_agreement("EC-123").await.unwrap();
        let executed = gateway.execute_agreement("EC-123").await.unwrap();
        assert_eq!(executed.payer_email, "payer@example.com");
    }

    #[tokio::test]
    async fn execute_payment_posts_payer_id() {
        let server = MockServer::start().await;
        token_mock().mount(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/payments/payment/PAY-123/execute"))
            .and(body_json_string(r#"{"payer_id":"ABC123"}"#))
            .respond_with(ResponseTemplate::new(200).set_body_json(executed_body()))
            .expect(1)
            .mount(&server)
            .await;

        let executed = gateway(&server)
            .execute_payment("PAY-123", "ABC123")
            .await
            .unwrap();
        assert_eq!(executed.id, "I-123");
        assert_eq!(executed.payer_status.as_deref(), Some("verified"));
    }

    #[tokio::test]
    async fn create_payment_extracts_approval_links() {
        let server = MockServer::start().await;
        token_mock().mount(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/payments/payment"))
            .and(body_string_contains("10.00"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "PAY-123",
                "links": [
                    { "href": "https://wallet.example/approve?token=EC-123",
                      "rel": "approval_url", "method": "REDIRECT" },
                    { "href": "https://wallet.example/v1/payments/payment/PAY-123/execute",
                      "rel": "execute", "method": "POST" }
                ]
            })))
            .mount(&server)
            .await;

        let approval = gateway(&server)
            .create_payment(&PaymentRequest {
                description: "Donation to Test Group".to_string(),
                amount_minor: 1000,
                currency: "USD".to_string(),
                return_url: "https://api.example/callback".to_string(),
                cancel_url: "https://www.example/cancel".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(approval.payment_id.as_deref(), Some("PAY-123"));
        assert!(approval.approval_url.contains("token=EC-123"));
        assert!(approval.execute_url.ends_with("/execute"));
    }

    #[tokio::test]
    async fn failed_token_grant_is_an_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/oauth2/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "invalid_client"
            })))
            .mount(&server)
            .await;

        let err = gateway(&server).execute_agreement("EC-123").await.unwrap_err();
        assert!(matches!(err, ProcessorError::Authentication(_)));
    }
}
