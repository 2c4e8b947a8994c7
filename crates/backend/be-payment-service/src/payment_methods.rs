//! Idempotent payment-method resolution.

use be_ledger_db::{PaymentMethod, PaymentService, User};

use crate::error::PaymentError;
use crate::service::AppState;

/// Returns the stored method for (user, token) or creates a remote customer
/// and stores a new one. The unique constraint on (user_id, token, service)
/// guarantees at most one remote customer per pair: a racing insert loses
/// with a duplicate error and re-reads the winner's row.
pub async fn resolve(
    state: &AppState,
    user: &User,
    token: &str,
) -> Result<PaymentMethod, PaymentError> {
    if let Some(existing) = state
        .db
        .find_payment_method()
        .user_id(user.id)
        .token(token)
        .service(PaymentService::Card)
        .call()
        .await?
    {
        return Ok(existing);
    }

    let customer = state.card.create_customer(&user.email, token).await?;

    match state
        .db
        .create_payment_method()
        .user_id(user.id)
        .token(token.to_string())
        .service(PaymentService::Card)
        .customer_id(customer.id.clone())
        .call()
        .await
    {
        Ok(method) => Ok(method),
        Err(e) if e.is_duplicate() => {
            tracing::debug!(user = %user.id, "Lost payment-method race, reusing winner");
            state
                .db
                .find_payment_method()
                .user_id(user.id)
                .token(token)
                .service(PaymentService::Card)
                .call()
                .await?
                .ok_or_else(|| {
                    PaymentError::Internal(anyhow::anyhow!(
                        "payment method vanished after duplicate insert"
                    ))
                })
        }
        Err(e) => Err(e.into()),
    }
}
