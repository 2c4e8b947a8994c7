//! Recurring-plan management against the card gateway.

use be_ledger_db::{Group, SubscriptionInterval};
use be_processors::{CardGateway, GatewayPlan, GatewaySubscription, ProcessorError, SubscribeRequest};

use crate::error::PaymentError;

/// Deterministic remote plan id: donations sharing (currency, interval,
/// amount) reuse one plan. Pure so it can be tested without a gateway.
pub fn plan_id(currency: &str, interval: SubscriptionInterval, amount_minor: i64) -> String {
    format!("{}-{}-{}", currency.to_lowercase(), interval, amount_minor)
}

/// Retrieve-then-create: creation never happens without a failed retrieval
/// first, so concurrent enrollments converge on one remote plan.
pub async fn ensure_plan(
    card: &CardGateway,
    currency: &str,
    interval: SubscriptionInterval,
    amount_minor: i64,
) -> Result<GatewayPlan, PaymentError> {
    let id = plan_id(currency, interval, amount_minor);

    match card.retrieve_plan(&id).await {
        Ok(plan) => Ok(plan),
        Err(ProcessorError::NotFound(_)) => {
            tracing::debug!(plan = %id, "Plan missing, creating");
            card.create_plan(&id, amount_minor, currency, &interval.to_string())
                .await
                .map_err(Into::into)
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn subscribe(
    card: &CardGateway,
    customer_id: &str,
    plan: &GatewayPlan,
    application_fee_percent: f64,
    group: &Group,
    payment_method_id: &str,
    description: &str,
) -> Result<GatewaySubscription, PaymentError> {
    card.create_subscription(&SubscribeRequest {
        customer_id: customer_id.to_string(),
        plan_id: plan.id.clone(),
        application_fee_percent,
        group_id: group.id.to_string(),
        group_name: group.name.clone(),
        payment_method_id: payment_method_id.to_string(),
        description: description.to_string(),
    })
    .await
    .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_id_is_deterministic() {
        let a = plan_id("EUR", SubscriptionInterval::Month, 1000);
        let b = plan_id("EUR", SubscriptionInterval::Month, 1000);
        assert_eq!(a, b);
        assert_eq!(a, "eur-month-1000");
    }

    #[test]
    fn plan_id_distinguishes_all_three_inputs() {
        let base = plan_id("EUR", SubscriptionInterval::Month, 1000);
        assert_ne!(base, plan_id("USD", SubscriptionInterval::Month, 1000));
        assert_ne!(base, plan_id("EUR", SubscriptionInterval::Year, 1000));
        assert_ne!(base, plan_id("EUR", SubscriptionInterval::Month, 2000));
    }

    #[test]
    fn plan_id_is_case_insensitive_on_currency() {
        assert_eq!(
            plan_id("eur", SubscriptionInterval::Year, 500),
            plan_id("EUR", SubscriptionInterval::Year, 500)
        );
    }
}
