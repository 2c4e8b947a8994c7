use be_ledger_db::{Donation, Transaction};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub api_key: Option<String>,
    pub payment: PaymentBody,
}

#[derive(Debug, Deserialize)]
pub struct PaymentBody {
    /// One-time card token from the checkout form; absent on the redirect path.
    pub token: Option<String>,
    /// Minor units of `currency`.
    pub amount: Option<i64>,
    pub currency: String,
    pub interval: Option<String>,
    pub email: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub vendor: Option<String>,
    pub paidby: Option<String>,
    pub comment: Option<String>,
    pub link: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DonationResponse {
    pub donation: DonationSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TransactionSummary>,
}

#[derive(Debug, Serialize)]
pub struct DonationSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub group_id: Uuid,
    pub currency: String,
    pub amount: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<Uuid>,
}

impl From<&Donation> for DonationSummary {
    fn from(donation: &Donation) -> Self {
        Self {
            id: donation.id,
            user_id: donation.user_id,
            group_id: donation.group_id,
            currency: donation.currency.clone(),
            amount: donation.amount_minor,
            title: donation.title.clone(),
            subscription_id: donation.subscription_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionSummary {
    pub id: Uuid,
    pub status: String,
    pub currency: String,
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txn_currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_amount_in_group_currency: Option<i64>,
}

impl From<&Transaction> for TransactionSummary {
    fn from(transaction: &Transaction) -> Self {
        Self {
            id: transaction.id,
            status: format!("{:?}", transaction.status).to_lowercase(),
            currency: transaction.currency.clone(),
            amount: transaction.amount_minor,
            txn_currency: transaction.txn_currency.clone(),
            net_amount_in_group_currency: transaction.net_amount_in_group_currency,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentLink {
    pub method: String,
    pub rel: String,
    pub href: String,
}

#[derive(Debug, Serialize)]
pub struct LinksResponse {
    pub links: Vec<PaymentLink>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Opaque authorization token the payer returns with.
    pub token: String,
    #[serde(rename = "paymentId")]
    pub payment_id: Option<String>,
    #[serde(rename = "PayerID")]
    pub payer_id: Option<String>,
}
