//! Card-gateway donation path: synchronous charge with settlement-based fee
//! accounting, or recurring plan + subscription enrollment.

use be_ledger_db::{Group, PaymentService, SubscriptionInterval, User};
use be_processors::{ChargeMetadata, ChargeRequest};

use crate::error::PaymentError;
use crate::service::AppState;
use crate::types::{DonationResponse, DonationSummary, PaymentBody, TransactionSummary};
use crate::{analytics, fees, ledger, payment_methods, plans};

pub async fn process(
    state: &AppState,
    group: &Group,
    user: &User,
    payment: &PaymentBody,
    interval: Option<SubscriptionInterval>,
    token: &str,
    amount_minor: i64,
) -> Result<DonationResponse, PaymentError> {
    ensure_environment(state, user).await?;

    let method = payment_methods::resolve(state, user, token).await?;

    let title = ledger::donation_title(group);
    let description = payment
        .description
        .clone()
        .unwrap_or_else(|| title.clone());
    let charge_description = format!("GiveHub: {}", group.slug);

    match interval {
        Some(interval) => {
            let plan =
                plans::ensure_plan(&state.card, &payment.currency, interval, amount_minor).await?;
            let subscription = plans::subscribe(
                &state.card,
                &method.customer_id,
                &plan,
                state.config.platform_fee_percent,
                group,
                &method.id.to_string(),
                &charge_description,
            )
            .await?;

            let data = serde_json::to_value(&subscription)
                .map_err(|e| PaymentError::Internal(anyhow::anyhow!(e)))?;

            let (donation, db_subscription) = state
                .db
                .record_recurring_enrollment()
                .group(group)
                .user(user)
                .currency(payment.currency.clone())
                .amount_minor(amount_minor)
                .interval(interval)
                .plan_id(plan.id.clone())
                .external_id(subscription.id.clone())
                .data(data)
                .title(title)
                .call()
                .await
                .map_err(PaymentError::Ledger)?;

            ledger::promote_backer(&state.db, group.id, user.id)
                .await
                .map_err(PaymentError::Ledger)?;
            analytics::track_donation_created("card", true);

            tracing::info!(
                donation = %donation.id,
                subscription = %db_subscription.id,
                plan = %plan.id,
                "Recurring donation enrolled"
            );

            Ok(DonationResponse {
                donation: DonationSummary::from(&donation),
                transaction: None,
            })
        }
        None => {
            let application_fee = fees::preliminary_application_fee(
                amount_minor,
                state.config.platform_fee_percent,
            );

            let charge = state
                .card
                .create_charge(&ChargeRequest {
                    amount_minor,
                    currency: payment.currency.clone(),
                    customer_id: method.customer_id.clone(),
                    description: charge_description,
                    application_fee,
                    metadata: ChargeMetadata {
                        group_id: group.id.to_string(),
                        group_name: group.name.clone(),
                        customer_email: user.email.clone(),
                        payment_method_id: method.id.to_string(),
                    },
                })
                .await?;

            let settlement = state
                .card
                .retrieve_balance_transaction(&charge.balance_transaction)
                .await?;
            let fees = fees::FeeBreakdown::from_settlement(
                &settlement,
                state.config.platform_fee_percent,
                state.config.host_fee_percent,
            );

            let (donation, transaction) = state
                .db
                .record_donation_transaction()
                .group(group)
                .user(user)
                .payment_method_id(method.id)
                .currency(payment.currency.clone())
                .amount_minor(amount_minor)
                .title(title)
                .description(description)
                .tags(ledger::donation_tags(&payment.tags))
                .amount_in_txn_currency(fees.amount_in_txn_currency)
                .txn_currency(fees.txn_currency.clone())
                .txn_currency_fx_rate(fees.txn_currency_fx_rate)
                .host_fee_in_txn_currency(fees.host_fee_in_txn_currency)
                .platform_fee_in_txn_currency(fees.platform_fee_in_txn_currency)
                .payment_processor_fee_in_txn_currency(fees.payment_processor_fee_in_txn_currency)
                .net_amount_in_group_currency(fees.net_amount_in_group_currency)
                .call()
                .await
                .map_err(PaymentError::Ledger)?;

            ledger::promote_backer(&state.db, group.id, user.id)
                .await
                .map_err(PaymentError::Ledger)?;
            analytics::track_donation_created("card", false);

            tracing::info!(
                donation = %donation.id,
                charge = %charge.id,
                "Donation charged and ledgered"
            );

            Ok(DonationResponse {
                donation: DonationSummary::from(&donation),
                transaction: Some(TransactionSummary::from(&transaction)),
            })
        }
    }
}

/// A payer carrying a live gateway credential must not hit a non-production
/// deployment.
async fn ensure_environment(state: &AppState, user: &User) -> Result<(), PaymentError> {
    if state.config.is_production() {
        return Ok(());
    }

    let account = state
        .db
        .get_processor_account()
        .user_id(user.id)
        .service(PaymentService::Card)
        .call()
        .await?;

    if let Some(account) = account {
        if account.secret_key.contains("live") {
            return Err(PaymentError::EnvironmentMismatch(
                state.config.environment.clone(),
            ));
        }
    }

    Ok(())
}
