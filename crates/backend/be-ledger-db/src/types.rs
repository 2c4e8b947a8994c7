use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Activity type written once per finalized donation transaction.
pub const ACTIVITY_TRANSACTION_CREATED: &str = "group.transaction.created";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "group_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Member,
    Backer,
    Host,
}

impl GroupRole {
    pub fn rank(&self) -> u8 {
        match self {
            GroupRole::Member => 0,
            GroupRole::Backer => 1,
            GroupRole::Host => 2,
        }
    }
}

impl std::fmt::Display for GroupRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupRole::Member => write!(f, "member"),
            GroupRole::Backer => write!(f, "backer"),
            GroupRole::Host => write!(f, "host"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "payment_service", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentService {
    Card,
    Wallet,
}

impl std::fmt::Display for PaymentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentService::Card => write!(f, "card"),
            PaymentService::Wallet => write!(f, "wallet"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "subscription_interval", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionInterval {
    Month,
    Year,
}

impl SubscriptionInterval {
    /// Parses a caller-supplied interval; anything but "month" or "year"
    /// is rejected.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "month" => Some(SubscriptionInterval::Month),
            "year" => Some(SubscriptionInterval::Year),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubscriptionInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionInterval::Month => write!(f, "month"),
            SubscriptionInterval::Year => write!(f, "year"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Created by redirect phase 1, invisible to normal queries until the
    /// payer returns and the payment is executed.
    Pending,
    Approved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "transaction_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Donation,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A donor created from a bare email has no credentials yet; donors who
    /// signed up through the website do.
    pub fn has_full_account(&self) -> bool {
        self.password_hash.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GroupMember {
    pub id: Uuid,
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub role: GroupRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProcessorAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub service: PaymentService,
    #[serde(skip_serializing)]
    pub secret_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentMethod {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub service: PaymentService,
    pub customer_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub interval: SubscriptionInterval,
    pub plan_id: Option<String>,
    pub external_id: Option<String>,
    pub data: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Donation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub group_id: Uuid,
    pub currency: String,
    pub amount_minor: i64,
    pub title: String,
    pub subscription_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub group_id: Uuid,
    pub donation_id: Option<Uuid>,
    pub payment_method_id: Option<Uuid>,
    pub subscription_id: Option<Uuid>,
    pub kind: TransactionKind,
    pub currency: String,
    pub amount_minor: i64,
    pub interval: Option<SubscriptionInterval>,
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub paidby: Option<String>,
    pub status: TransactionStatus,
    pub payout_method: Option<String>,
    pub amount_in_txn_currency: Option<i64>,
    pub txn_currency: Option<String>,
    pub txn_currency_fx_rate: Option<f64>,
    pub host_fee_in_txn_currency: Option<i64>,
    pub platform_fee_in_txn_currency: Option<i64>,
    pub payment_processor_fee_in_txn_currency: Option<i64>,
    pub net_amount_in_group_currency: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Activity {
    pub id: Uuid,
    pub activity_type: String,
    pub group_id: Uuid,
    pub user_id: Option<Uuid>,
    pub transaction_id: Option<Uuid>,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backer_outranks_member_but_not_host() {
        assert!(GroupRole::Backer.rank() > GroupRole::Member.rank());
        assert!(GroupRole::Host.rank() > GroupRole::Backer.rank());
    }

    #[test]
    fn interval_parses_only_month_and_year() {
        assert_eq!(
            SubscriptionInterval::parse("month"),
            Some(SubscriptionInterval::Month)
        );
        assert_eq!(
            SubscriptionInterval::parse("year"),
            Some(SubscriptionInterval::Year)
        );
        assert_eq!(SubscriptionInterval::parse("week"), None);
        assert_eq!(SubscriptionInterval::parse("Month"), None);
        assert_eq!(SubscriptionInterval::parse(""), None);
    }

    #[test]
    fn full_account_requires_password() {
        let user = User {
            id: Uuid::now_v7(),
            email: "donor@example.com".to_string(),
            name: None,
            password_hash: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(!user.has_full_account());

        let user = User {
            password_hash: Some("argon2-hash".to_string()),
            ..user
        };
        assert!(user.has_full_account());
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let user = User {
            id: Uuid::now_v7(),
            email: "donor@example.com".to_string(),
            name: Some("Donor".to_string()),
            password_hash: Some("argon2-hash".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["email"], "donor@example.com");
    }
}
