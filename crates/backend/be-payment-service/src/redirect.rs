//! Redirect-gateway donation path: two-phase approve/execute flow.
//!
//! Phase 1 leaves only a pending Transaction behind; no lock or open SQL
//! transaction survives the payer-interaction gap. Phase 2 finalizes the
//! ledger once the gateway confirms execution.

use be_ledger_db::{Group, SubscriptionInterval};
use be_processors::{AgreementRequest, PaymentRequest as GatewayPaymentRequest};
use serde_json::json;
use uuid::Uuid;

use crate::error::PaymentError;
use crate::service::AppState;
use crate::types::{CallbackQuery, LinksResponse, PaymentBody, PaymentLink};
use crate::{analytics, ledger};

pub async fn initiate(
    state: &AppState,
    group: &Group,
    payment: &PaymentBody,
    interval: Option<SubscriptionInterval>,
    amount_minor: i64,
) -> Result<LinksResponse, PaymentError> {
    let title = ledger::donation_title(group);
    let description = payment
        .description
        .clone()
        .unwrap_or_else(|| title.clone());

    let subscription_data = interval.map(|interval| {
        json!({
            "plan": {
                "description": title,
                "currency": payment.currency,
                "interval": interval.to_string(),
                "amount": amount_minor,
            }
        })
    });

    let (transaction, _subscription) = state
        .db
        .create_pending_transaction()
        .group_id(group.id)
        .currency(payment.currency.clone())
        .amount_minor(amount_minor)
        .maybe_interval(interval)
        .tags(ledger::donation_tags(&payment.tags))
        .description(description)
        .maybe_subscription_data(subscription_data)
        .call()
        .await?;

    let return_url = format!(
        "{}/groups/{}/transactions/{}/callback",
        state.config.api_url, group.id, transaction.id
    );
    let cancel_url = format!("{}/{}", state.config.website_url, group.slug);

    let approval = match interval {
        Some(interval) => {
            state
                .redirect
                .create_billing_agreement(&AgreementRequest {
                    description: title,
                    amount_minor,
                    currency: payment.currency.clone(),
                    interval: interval.to_string(),
                    return_url,
                    cancel_url,
                })
                .await?
        }
        None => {
            state
                .redirect
                .create_payment(&GatewayPaymentRequest {
                    description: title,
                    amount_minor,
                    currency: payment.currency.clone(),
                    return_url,
                    cancel_url,
                })
                .await?
        }
    };

    analytics::track_redirect_flow_initiated(interval.is_some());
    tracing::info!(
        transaction = %transaction.id,
        recurring = interval.is_some(),
        "Redirect approval created"
    );

    Ok(LinksResponse {
        links: vec![
            PaymentLink {
                method: "REDIRECT".to_string(),
                rel: "approval_url".to_string(),
                href: approval.approval_url,
            },
            PaymentLink {
                method: "POST".to_string(),
                rel: "execute".to_string(),
                href: approval.execute_url,
            },
        ],
    })
}

/// Phase 2: the payer came back approved. A gateway failure here leaves the
/// pending Transaction untouched; only a confirmed execution writes the
/// Donation, promotes membership, and records the Activity.
pub async fn callback(
    state: &AppState,
    group_id: Uuid,
    transaction_id: Uuid,
    query: &CallbackQuery,
) -> Result<String, PaymentError> {
    let group = state.db.get_group().id(group_id).call().await?;
    let pending = state
        .db
        .get_pending_transaction()
        .id(transaction_id)
        .call()
        .await?;
    if pending.group_id != group.id {
        return Err(be_ledger_db::DbError::not_found_with_id(
            "transaction",
            transaction_id.to_string(),
        )
        .into());
    }

    let executed = match (&query.payment_id, &query.payer_id) {
        (Some(payment_id), Some(payer_id)) => {
            state.redirect.execute_payment(payment_id, payer_id).await?
        }
        _ => state.redirect.execute_agreement(&query.token).await?,
    };

    let user = ledger::resolve_or_create_user(&state.db, &executed.payer_email).await?;

    let recurring = pending.subscription_id.is_some();
    let subscription_data = recurring.then(|| {
        json!({
            "billing_agreement_id": executed.id,
            "payer_status": executed.payer_status,
        })
    });

    let (donation, transaction) = state
        .db
        .finalize_redirect_transaction()
        .transaction_id(pending.id)
        .group(&group)
        .user(&user)
        .title(ledger::donation_title(&group))
        .maybe_subscription_external_id(recurring.then(|| executed.id.clone()))
        .maybe_subscription_data(subscription_data)
        .call()
        .await
        .map_err(PaymentError::Ledger)?;

    ledger::promote_backer(&state.db, group.id, user.id)
        .await
        .map_err(PaymentError::Ledger)?;
    analytics::track_redirect_flow_completed(recurring);

    tracing::info!(
        donation = %donation.id,
        transaction = %transaction.id,
        "Redirect donation finalized"
    );

    Ok(format!(
        "{}/{}?status=payment_success&userid={}&has_full_account={}",
        state.config.website_url,
        group.slug,
        user.id,
        user.has_full_account()
    ))
}
