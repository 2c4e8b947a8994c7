//! Card gateway client: tokenized customers, synchronous charges,
//! settlement lookup, and recurring plans/subscriptions.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::{ProcessorError, ProcessorResult};

pub struct CardGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: SecretString,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: GatewayErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetail {
    message: Option<String>,
    #[serde(rename = "type")]
    error_type: Option<String>,
    code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayCustomer {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayCharge {
    pub id: String,
    /// Settlement record to look up for the actually captured amount.
    pub balance_transaction: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayBalanceTransaction {
    pub id: String,
    /// Settled amount in minor units of `currency`; the gateway may have
    /// auto-converted to its fixed settlement currency.
    pub amount: i64,
    pub currency: String,
    pub exchange_rate: Option<f64>,
    pub fee: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPlan {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub interval: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySubscription {
    pub id: String,
    pub status: Option<String>,
    pub plan: Option<GatewayPlan>,
}

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub customer_id: String,
    pub description: String,
    /// Advisory platform revenue share, floor(amount × fee percent),
    /// computed on the requested (pre-settlement) amount.
    pub application_fee: i64,
    pub metadata: ChargeMetadata,
}

#[derive(Debug, Clone)]
pub struct ChargeMetadata {
    pub group_id: String,
    pub group_name: String,
    pub customer_email: String,
    pub payment_method_id: String,
}

#[derive(Debug, Clone)]
pub struct SubscribeRequest {
    pub customer_id: String,
    pub plan_id: String,
    pub application_fee_percent: f64,
    pub group_id: String,
    pub group_name: String,
    pub payment_method_id: String,
    pub description: String,
}

impl CardGateway {
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            secret_key: SecretString::from(secret_key.into()),
        }
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> ProcessorResult<T> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(self.secret_key.expose_secret())
            .form(params)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ProcessorResult<T> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> ProcessorResult<T> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ProcessorError::Protocol(e.to_string()));
        }

        let body: GatewayErrorBody = response
            .json()
            .await
            .map_err(|e| ProcessorError::Protocol(e.to_string()))?;
        let message = body
            .error
            .message
            .unwrap_or_else(|| "Payment gateway error".to_string());

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProcessorError::NotFound(message));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProcessorError::Authentication(message));
        }
        if status.is_client_error() {
            return Err(ProcessorError::Declined {
                message,
                error_type: body
                    .error
                    .error_type
                    .unwrap_or_else(|| "api_error".to_string()),
                code: body.error.code,
            });
        }

        Err(ProcessorError::Unavailable(format!(
            "gateway returned {}: {}",
            status, message
        )))
    }

    /// Creates a remote customer bound to a one-time card token. Called at
    /// most once per (user, token) pair; reuse is enforced by the caller.
    pub async fn create_customer(
        &self,
        email: &str,
        token: &str,
    ) -> ProcessorResult<GatewayCustomer> {
        let params = vec![
            ("email".to_string(), email.to_string()),
            ("source".to_string(), token.to_string()),
        ];
        self.post_form("/customers", &params).await
    }

    pub async fn create_charge(&self, request: &ChargeRequest) -> ProcessorResult<GatewayCharge> {
        let params = vec![
            ("amount".to_string(), request.amount_minor.to_string()),
            ("currency".to_string(), request.currency.clone()),
            ("customer".to_string(), request.customer_id.clone()),
            ("description".to_string(), request.description.clone()),
            (
                "application_fee".to_string(),
                request.application_fee.to_string(),
            ),
            (
                "metadata[groupId]".to_string(),
                request.metadata.group_id.clone(),
            ),
            (
                "metadata[groupName]".to_string(),
                request.metadata.group_name.clone(),
            ),
            (
                "metadata[customerEmail]".to_string(),
                request.metadata.customer_email.clone(),
            ),
            (
                "metadata[paymentMethodId]".to_string(),
                request.metadata.payment_method_id.clone(),
            ),
        ];
        self.post_form("/charges", &params).await
    }

    pub async fn retrieve_balance_transaction(
        &self,
        id: &str,
    ) -> ProcessorResult<GatewayBalanceTransaction> {
        self.get(&format!("/balance/history/{}", id)).await
    }

    pub async fn retrieve_plan(&self, id: &str) -> ProcessorResult<GatewayPlan> {
        self.get(&format!("/plans/{}", id)).await
    }

    pub async fn create_plan(
        &self,
        id: &str,
        amount_minor: i64,
        currency: &str,
        interval: &str,
    ) -> ProcessorResult<GatewayPlan> {
        let params = vec![
            ("id".to_string(), id.to_string()),
            ("name".to_string(), id.to_string()),
            ("amount".to_string(), amount_minor.to_string()),
            ("currency".to_string(), currency.to_string()),
            ("interval".to_string(), interval.to_string()),
        ];
        self.post_form("/plans", &params).await
    }

    pub async fn create_subscription(
        &self,
        request: &SubscribeRequest,
    ) -> ProcessorResult<GatewaySubscription> {
        let params = vec![
            ("plan".to_string(), request.plan_id.clone()),
            (
                "application_fee_percent".to_string(),
                format_percent(request.application_fee_percent),
            ),
            ("metadata[groupId]".to_string(), request.group_id.clone()),
            (
                "metadata[groupName]".to_string(),
                request.group_name.clone(),
            ),
            (
                "metadata[paymentMethodId]".to_string(),
                request.payment_method_id.clone(),
            ),
            (
                "metadata[description]".to_string(),
                request.description.clone(),
            ),
        ];
        self.post_form(
            &format!("/customers/{}/subscriptions", request.customer_id),
            &params,
        )
        .await
    }
}

/// Renders a fee fraction as the percent string the gateway expects
/// (0.05 → "5", 0.125 → "12.5").
fn format_percent(fraction: f64) -> String {
    let percent = fraction * 100.0;
    if percent.fract() == 0.0 {
        format!("{}", percent as i64)
    } else {
        format!("{}", percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(server: &MockServer) -> CardGateway {
        CardGateway::new(server.uri(), "sk_test_key")
    }

    #[test]
    fn percent_formatting() {
        assert_eq!(format_percent(0.05), "5");
        assert_eq!(format_percent(0.125), "12.5");
        assert_eq!(format_percent(0.0), "0");
    }

    #[tokio::test]
    async fn create_customer_posts_token_and_email() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/customers"))
            .and(header("authorization", "Bearer sk_test_key"))
            .and(body_string_contains("source=tok_visa"))
            .and(body_string_contains("email=donor%40example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cus_123",
                "email": "donor@example.com"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let customer = gateway(&server)
            .create_customer("donor@example.com", "tok_visa")
            .await
            .unwrap();
        assert_eq!(customer.id, "cus_123");
    }

    #[tokio::test]
    async fn charge_carries_application_fee_and_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/charges"))
            .and(body_string_contains("amount=1099"))
            .and(body_string_contains("currency=EUR"))
            .and(body_string_contains("application_fee=54"))
            .and(body_string_contains("groupName"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "ch_1",
                "balance_transaction": "txn_1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let charge = gateway(&server)
            .create_charge(&ChargeRequest {
                amount_minor: 1099,
                currency: "EUR".to_string(),
                customer_id: "cus_123".to_string(),
                description: "GiveHub: test-group".to_string(),
                application_fee: 54,
                metadata: ChargeMetadata {
                    group_id: "g1".to_string(),
                    group_name: "Test Group".to_string(),
                    customer_email: "donor@example.com".to_string(),
                    payment_method_id: "pm1".to_string(),
                },
            })
            .await
            .unwrap();
        assert_eq!(charge.id, "ch_1");
        assert_eq!(charge.balance_transaction, "txn_1");
    }

    #[tokio::test]
    async fn declined_charge_surfaces_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/charges"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "error": {
                    "message": "Your card was declined",
                    "type": "card_error",
                    "code": "card_declined"
                }
            })))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .create_charge(&ChargeRequest {
                amount_minor: 1099,
                currency: "EUR".to_string(),
                customer_id: "cus_123".to_string(),
                description: "GiveHub: test-group".to_string(),
                application_fee: 54,
                metadata: ChargeMetadata {
                    group_id: "g1".to_string(),
                    group_name: "Test Group".to_string(),
                    customer_email: "donor@example.com".to_string(),
                    payment_method_id: "pm1".to_string(),
                },
            })
            .await
            .unwrap_err();

        match err {
            ProcessorError::Declined {
                message,
                error_type,
                code,
            } => {
                assert_eq!(message, "Your card was declined");
                assert_eq!(error_type, "card_error");
                assert_eq!(code.as_deref(), Some("card_declined"));
            }
            other => panic!("expected decline, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn balance_transaction_parses_settlement_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/balance/history/txn_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "txn_1",
                "amount": 1400,
                "currency": "USD",
                "exchange_rate": 0.785,
                "fee": 155
            })))
            .mount(&server)
            .await;

        let settlement = gateway(&server)
            .retrieve_balance_transaction("txn_1")
            .await
            .unwrap();
        assert_eq!(settlement.amount, 1400);
        assert_eq!(settlement.currency, "USD");
        assert_eq!(settlement.exchange_rate, Some(0.785));
        assert_eq!(settlement.fee, 155);
    }

    #[tokio::test]
    async fn missing_plan_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/plans/eur-month-1000"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {
                    "message": "No such plan: eur-month-1000",
                    "type": "invalid_request_error"
                }
            })))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .retrieve_plan("eur-month-1000")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
