use bon::bon;
use chrono::Utc;
use serde_json::json;
use sqlx::{
    migrate::MigrateDatabase,
    postgres::{PgExecutor, PgPool, PgPoolOptions},
};
use std::time::Duration;
use uuid::Uuid;

use crate::{
    error::{DbError, DbResult},
    types::{
        ACTIVITY_TRANSACTION_CREATED, Activity, Donation, Group, GroupRole, PaymentMethod,
        PaymentService, ProcessorAccount, Subscription, SubscriptionInterval, Transaction,
        TransactionKind, TransactionStatus, User,
    },
};

const TRANSACTION_COLUMNS: &str = "id, user_id, group_id, donation_id, payment_method_id, \
     subscription_id, kind, currency, amount_minor, interval, tags, description, paidby, \
     status, payout_method, amount_in_txn_currency, txn_currency, txn_currency_fx_rate, \
     host_fee_in_txn_currency, platform_fee_in_txn_currency, \
     payment_processor_fee_in_txn_currency, net_amount_in_group_currency, created_at, updated_at";

#[derive(Debug)]
pub struct DatabaseManager {
    pub pool: PgPool,
}

/// Fields of a new transaction row; fee columns stay empty for pending
/// redirect rows and are filled from the settlement lookup on the card path.
struct NewTransaction {
    user_id: Option<Uuid>,
    group_id: Uuid,
    donation_id: Option<Uuid>,
    payment_method_id: Option<Uuid>,
    subscription_id: Option<Uuid>,
    currency: String,
    amount_minor: i64,
    interval: Option<SubscriptionInterval>,
    tags: Vec<String>,
    description: Option<String>,
    paidby: Option<String>,
    status: TransactionStatus,
    amount_in_txn_currency: Option<i64>,
    txn_currency: Option<String>,
    txn_currency_fx_rate: Option<f64>,
    host_fee_in_txn_currency: Option<i64>,
    platform_fee_in_txn_currency: Option<i64>,
    payment_processor_fee_in_txn_currency: Option<i64>,
    net_amount_in_group_currency: Option<i64>,
}

async fn insert_transaction<'e, E>(executor: E, row: NewTransaction) -> DbResult<Transaction>
where
    E: PgExecutor<'e>,
{
    let now = Utc::now();
    let query = format!(
        "INSERT INTO transactions ({TRANSACTION_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
                 $18, $19, $20, $21, $22, $23, $24) \
         RETURNING {TRANSACTION_COLUMNS}"
    );

    let transaction = sqlx::query_as::<_, Transaction>(&query)
        .bind(Uuid::now_v7())
        .bind(row.user_id)
        .bind(row.group_id)
        .bind(row.donation_id)
        .bind(row.payment_method_id)
        .bind(row.subscription_id)
        .bind(TransactionKind::Donation)
        .bind(&row.currency)
        .bind(row.amount_minor)
        .bind(row.interval)
        .bind(&row.tags)
        .bind(&row.description)
        .bind(&row.paidby)
        .bind(row.status)
        .bind(None::<String>)
        .bind(row.amount_in_txn_currency)
        .bind(&row.txn_currency)
        .bind(row.txn_currency_fx_rate)
        .bind(row.host_fee_in_txn_currency)
        .bind(row.platform_fee_in_txn_currency)
        .bind(row.payment_processor_fee_in_txn_currency)
        .bind(row.net_amount_in_group_currency)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await?;

    Ok(transaction)
}

async fn insert_donation<'e, E>(
    executor: E,
    user_id: Uuid,
    group_id: Uuid,
    currency: &str,
    amount_minor: i64,
    title: &str,
    subscription_id: Option<Uuid>,
) -> DbResult<Donation>
where
    E: PgExecutor<'e>,
{
    let now = Utc::now();

    let donation = sqlx::query_as::<_, Donation>(
        r#"
        INSERT INTO donations (id, user_id, group_id, currency, amount_minor, title,
                               subscription_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, user_id, group_id, currency, amount_minor, title, subscription_id,
                  created_at, updated_at
        "#,
    )
    .bind(Uuid::now_v7())
    .bind(user_id)
    .bind(group_id)
    .bind(currency)
    .bind(amount_minor)
    .bind(title)
    .bind(subscription_id)
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await?;

    Ok(donation)
}

async fn insert_activity<'e, E>(
    executor: E,
    group: &Group,
    user: &User,
    transaction: &Transaction,
) -> DbResult<Activity>
where
    E: PgExecutor<'e>,
{
    let snapshot = json!({
        "transaction": transaction,
        "group": { "id": group.id, "name": group.name, "slug": group.slug },
        "user": { "id": user.id, "email": user.email },
    });

    let activity = sqlx::query_as::<_, Activity>(
        r#"
        INSERT INTO activities (id, activity_type, group_id, user_id, transaction_id, data,
                                created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, activity_type, group_id, user_id, transaction_id, data, created_at
        "#,
    )
    .bind(Uuid::now_v7())
    .bind(ACTIVITY_TRANSACTION_CREATED)
    .bind(group.id)
    .bind(user.id)
    .bind(transaction.id)
    .bind(snapshot)
    .bind(Utc::now())
    .fetch_one(executor)
    .await?;

    Ok(activity)
}

#[bon]
impl DatabaseManager {
    pub async fn new(database_url: &str) -> DbResult<Self> {
        if !sqlx::Postgres::database_exists(database_url).await? {
            sqlx::Postgres::create_database(database_url).await?;
        }

        let pool = PgPoolOptions::new()
            .max_connections(50)
            .min_connections(3)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        let db_manager = DatabaseManager { pool };

        Self::run_migrations(&db_manager.pool).await?;

        Ok(db_manager)
    }

    async fn run_migrations(pool: &PgPool) -> DbResult<()> {
        tracing::debug!("Running ledger migrations");
        let migrator = sqlx::migrate!("./src/migrations");
        migrator.run(pool).await?;
        Ok(())
    }

    #[builder]
    pub async fn get_user(&self, id: Uuid) -> DbResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, password_hash, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found_with_id("user", id.to_string()))?;

        Ok(user)
    }

    /// Email lookup is case-insensitive; rows are stored lowercased.
    #[builder]
    pub async fn find_user_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, password_hash, created_at, updated_at
            FROM users
            WHERE email = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    #[builder]
    pub async fn create_user(&self, email: String, name: Option<String>) -> DbResult<User> {
        let now = Utc::now();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, name, password_hash, created_at, updated_at)
            VALUES ($1, lower($2), $3, $4, $5, $6)
            RETURNING id, email, name, password_hash, created_at, updated_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&email)
        .bind(&name)
        .bind(None::<String>)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    #[builder]
    pub async fn get_group(&self, id: Uuid) -> DbResult<Group> {
        let group = sqlx::query_as::<_, Group>(
            r#"
            SELECT id, name, slug, currency, created_at, updated_at
            FROM groups
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found_with_id("group", id.to_string()))?;

        Ok(group)
    }

    #[builder]
    pub async fn get_member_role(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> DbResult<Option<GroupRole>> {
        let role: Option<(GroupRole,)> = sqlx::query_as(
            r#"
            SELECT role FROM group_members WHERE group_id = $1 AND user_id = $2
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role.map(|r| r.0))
    }

    #[builder]
    pub async fn set_member_role(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        role: GroupRole,
    ) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO group_members (id, group_id, user_id, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (group_id, user_id)
            DO UPDATE SET role = EXCLUDED.role, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(group_id)
        .bind(user_id)
        .bind(role)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[builder]
    pub async fn get_processor_account(
        &self,
        user_id: Uuid,
        service: PaymentService,
    ) -> DbResult<Option<ProcessorAccount>> {
        let account = sqlx::query_as::<_, ProcessorAccount>(
            r#"
            SELECT id, user_id, service, secret_key, created_at, updated_at
            FROM processor_accounts
            WHERE user_id = $1 AND service = $2
            "#,
        )
        .bind(user_id)
        .bind(service)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    #[builder]
    pub async fn find_payment_method(
        &self,
        user_id: Uuid,
        token: &str,
        service: PaymentService,
    ) -> DbResult<Option<PaymentMethod>> {
        let method = sqlx::query_as::<_, PaymentMethod>(
            r#"
            SELECT id, user_id, token, service, customer_id, created_at, updated_at
            FROM payment_methods
            WHERE user_id = $1 AND token = $2 AND service = $3
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(service)
        .fetch_optional(&self.pool)
        .await?;

        Ok(method)
    }

    /// Insertion races on (user_id, token, service) surface as
    /// [`DbError::Duplicate`]; the caller re-reads the winning row.
    #[builder]
    pub async fn create_payment_method(
        &self,
        user_id: Uuid,
        token: String,
        service: PaymentService,
        customer_id: String,
    ) -> DbResult<PaymentMethod> {
        let now = Utc::now();

        let method = sqlx::query_as::<_, PaymentMethod>(
            r#"
            INSERT INTO payment_methods (id, user_id, token, service, customer_id,
                                         created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, token, service, customer_id, created_at, updated_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(&token)
        .bind(service)
        .bind(&customer_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(method)
    }

    /// Card-path one-time donation: Donation + approved Transaction + Activity
    /// in one SQL transaction. The external charge has already settled when
    /// this runs; a failure here is a reconciliation case, not a decline.
    #[builder]
    pub async fn record_donation_transaction(
        &self,
        group: &Group,
        user: &User,
        payment_method_id: Uuid,
        currency: String,
        amount_minor: i64,
        title: String,
        description: Option<String>,
        tags: Vec<String>,
        amount_in_txn_currency: i64,
        txn_currency: String,
        txn_currency_fx_rate: f64,
        host_fee_in_txn_currency: i64,
        platform_fee_in_txn_currency: i64,
        payment_processor_fee_in_txn_currency: i64,
        net_amount_in_group_currency: i64,
    ) -> DbResult<(Donation, Transaction)> {
        let mut tx = self.pool.begin().await?;

        let donation = insert_donation(
            &mut *tx,
            user.id,
            group.id,
            &currency,
            amount_minor,
            &title,
            None,
        )
        .await?;

        let transaction = insert_transaction(
            &mut *tx,
            NewTransaction {
                user_id: Some(user.id),
                group_id: group.id,
                donation_id: Some(donation.id),
                payment_method_id: Some(payment_method_id),
                subscription_id: None,
                currency,
                amount_minor,
                interval: None,
                tags,
                description,
                paidby: Some(user.id.to_string()),
                status: TransactionStatus::Approved,
                amount_in_txn_currency: Some(amount_in_txn_currency),
                txn_currency: Some(txn_currency),
                txn_currency_fx_rate: Some(txn_currency_fx_rate),
                host_fee_in_txn_currency: Some(host_fee_in_txn_currency),
                platform_fee_in_txn_currency: Some(platform_fee_in_txn_currency),
                payment_processor_fee_in_txn_currency: Some(payment_processor_fee_in_txn_currency),
                net_amount_in_group_currency: Some(net_amount_in_group_currency),
            },
        )
        .await?;

        insert_activity(&mut *tx, group, user, &transaction).await?;

        tx.commit().await?;

        Ok((donation, transaction))
    }

    /// Recurring card enrollment: Subscription (inactive) + Donation, no
    /// finalized Transaction until activation confirms out of band.
    #[builder]
    pub async fn record_recurring_enrollment(
        &self,
        group: &Group,
        user: &User,
        currency: String,
        amount_minor: i64,
        interval: SubscriptionInterval,
        plan_id: String,
        external_id: String,
        data: serde_json::Value,
        title: String,
    ) -> DbResult<(Donation, Subscription)> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (id, amount_minor, currency, interval, plan_id,
                                       external_id, data, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, amount_minor, currency, interval, plan_id, external_id, data,
                      is_active, created_at, updated_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(amount_minor)
        .bind(&currency)
        .bind(interval)
        .bind(&plan_id)
        .bind(&external_id)
        .bind(&data)
        .bind(false)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let donation = insert_donation(
            &mut *tx,
            user.id,
            group.id,
            &currency,
            amount_minor,
            &title,
            Some(subscription.id),
        )
        .await?;

        tx.commit().await?;

        Ok((donation, subscription))
    }

    /// Redirect phase 1: pending Transaction (+ inactive Subscription when
    /// recurring). Nothing here is visible to normal ledger queries.
    #[builder]
    pub async fn create_pending_transaction(
        &self,
        group_id: Uuid,
        currency: String,
        amount_minor: i64,
        interval: Option<SubscriptionInterval>,
        tags: Vec<String>,
        description: Option<String>,
        subscription_data: Option<serde_json::Value>,
    ) -> DbResult<(Transaction, Option<Subscription>)> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let subscription = match interval {
            Some(interval) => {
                let subscription = sqlx::query_as::<_, Subscription>(
                    r#"
                    INSERT INTO subscriptions (id, amount_minor, currency, interval, plan_id,
                                               external_id, data, is_active, created_at,
                                               updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                    RETURNING id, amount_minor, currency, interval, plan_id, external_id, data,
                              is_active, created_at, updated_at
                    "#,
                )
                .bind(Uuid::now_v7())
                .bind(amount_minor)
                .bind(&currency)
                .bind(interval)
                .bind(None::<String>)
                .bind(None::<String>)
                .bind(subscription_data.unwrap_or_else(|| json!({})))
                .bind(false)
                .bind(now)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;
                Some(subscription)
            }
            None => None,
        };

        let transaction = insert_transaction(
            &mut *tx,
            NewTransaction {
                user_id: None,
                group_id,
                donation_id: None,
                payment_method_id: None,
                subscription_id: subscription.as_ref().map(|s| s.id),
                currency,
                amount_minor,
                interval,
                tags,
                description,
                paidby: None,
                status: TransactionStatus::Pending,
                amount_in_txn_currency: None,
                txn_currency: None,
                txn_currency_fx_rate: None,
                host_fee_in_txn_currency: None,
                platform_fee_in_txn_currency: None,
                payment_processor_fee_in_txn_currency: None,
                net_amount_in_group_currency: None,
            },
        )
        .await?;

        tx.commit().await?;

        Ok((transaction, subscription))
    }

    /// First-class query for provisional rows; normal ledger reads never see
    /// pending transactions.
    #[builder]
    pub async fn get_pending_transaction(&self, id: Uuid) -> DbResult<Transaction> {
        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1 AND status = 'pending'"
        );

        let transaction = sqlx::query_as::<_, Transaction>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found_with_id("transaction", id.to_string()))?;

        Ok(transaction)
    }

    /// Redirect phase 2: promote the pending Transaction to approved, attach
    /// the resolved user, create the Donation, update the Subscription with
    /// the executed agreement, and write the Activity — one SQL transaction.
    #[builder]
    pub async fn finalize_redirect_transaction(
        &self,
        transaction_id: Uuid,
        group: &Group,
        user: &User,
        title: String,
        subscription_external_id: Option<String>,
        subscription_data: Option<serde_json::Value>,
    ) -> DbResult<(Donation, Transaction)> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let select = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE id = $1 AND status = 'pending' FOR UPDATE"
        );
        let pending = sqlx::query_as::<_, Transaction>(&select)
            .bind(transaction_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                DbError::not_found_with_id("transaction", transaction_id.to_string())
            })?;

        let donation = insert_donation(
            &mut *tx,
            user.id,
            group.id,
            &pending.currency,
            pending.amount_minor,
            &title,
            pending.subscription_id,
        )
        .await?;

        let update = format!(
            "UPDATE transactions \
             SET status = 'approved', user_id = $2, donation_id = $3, paidby = $4, \
                 updated_at = $5 \
             WHERE id = $1 \
             RETURNING {TRANSACTION_COLUMNS}"
        );
        let transaction = sqlx::query_as::<_, Transaction>(&update)
            .bind(transaction_id)
            .bind(user.id)
            .bind(donation.id)
            .bind(user.id.to_string())
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        if let Some(subscription_id) = pending.subscription_id {
            sqlx::query(
                r#"
                UPDATE subscriptions
                SET external_id = COALESCE($2, external_id),
                    data = COALESCE($3, data),
                    updated_at = $4
                WHERE id = $1
                "#,
            )
            .bind(subscription_id)
            .bind(&subscription_external_id)
            .bind(&subscription_data)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        insert_activity(&mut *tx, group, user, &transaction).await?;

        tx.commit().await?;

        Ok((donation, transaction))
    }
}
