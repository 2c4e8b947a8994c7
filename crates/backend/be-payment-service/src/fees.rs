//! Fee accounting for settled charges.
//!
//! The advisory application fee sent with the charge is computed on the
//! requested amount; the ledgered fees are recomputed on the settled amount,
//! which may have been converted to the gateway's settlement currency.

use be_processors::GatewayBalanceTransaction;

/// Advisory revenue share submitted with the charge request, floored on the
/// requested (pre-settlement) amount.
pub fn preliminary_application_fee(amount_minor: i64, fee_fraction: f64) -> i64 {
    (amount_minor as f64 * fee_fraction).floor() as i64
}

/// Final fee columns for a settled transaction. Satisfies
/// `net == round((amount − platform − processor − host) × fx)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeBreakdown {
    pub amount_in_txn_currency: i64,
    pub txn_currency: String,
    pub txn_currency_fx_rate: f64,
    pub platform_fee_in_txn_currency: i64,
    pub host_fee_in_txn_currency: i64,
    pub payment_processor_fee_in_txn_currency: i64,
    pub net_amount_in_group_currency: i64,
}

impl FeeBreakdown {
    pub fn from_settlement(
        settlement: &GatewayBalanceTransaction,
        platform_fraction: f64,
        host_fraction: f64,
    ) -> Self {
        let amount = settlement.amount;
        let fx_rate = settlement.exchange_rate.unwrap_or(1.0);
        let platform_fee = (amount as f64 * platform_fraction).round() as i64;
        let host_fee = (amount as f64 * host_fraction).round() as i64;
        let processor_fee = settlement.fee;
        let net = ((amount - platform_fee - processor_fee - host_fee) as f64 * fx_rate).round()
            as i64;

        Self {
            amount_in_txn_currency: amount,
            txn_currency: settlement.currency.clone(),
            txn_currency_fx_rate: fx_rate,
            platform_fee_in_txn_currency: platform_fee,
            host_fee_in_txn_currency: host_fee,
            payment_processor_fee_in_txn_currency: processor_fee,
            net_amount_in_group_currency: net,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settlement(amount: i64, currency: &str, fx: Option<f64>, fee: i64) -> GatewayBalanceTransaction {
        GatewayBalanceTransaction {
            id: "txn_test".to_string(),
            amount,
            currency: currency.to_string(),
            exchange_rate: fx,
            fee,
        }
    }

    #[test]
    fn preliminary_fee_floors() {
        // 10.99 EUR at 5%: 54.95 → 54
        assert_eq!(preliminary_application_fee(1099, 0.05), 54);
        // 1.99 EUR at 5%: 9.95 → 9
        assert_eq!(preliminary_application_fee(199, 0.05), 9);
        assert_eq!(preliminary_application_fee(1000, 0.05), 50);
        assert_eq!(preliminary_application_fee(1099, 0.0), 0);
    }

    #[test]
    fn settled_charge_satisfies_ledger_invariant() {
        // 10.99 EUR settled as 14.00 USD at 0.785 back to EUR.
        let fees = FeeBreakdown::from_settlement(&settlement(1400, "USD", Some(0.785), 155), 0.05, 0.0);

        assert_eq!(fees.amount_in_txn_currency, 1400);
        assert_eq!(fees.txn_currency, "USD");
        assert_eq!(fees.platform_fee_in_txn_currency, 70);
        assert_eq!(fees.host_fee_in_txn_currency, 0);
        assert_eq!(fees.payment_processor_fee_in_txn_currency, 155);
        // round((1400 − 70 − 155 − 0) × 0.785) = round(922.375)
        assert_eq!(fees.net_amount_in_group_currency, 922);
    }

    #[test]
    fn missing_exchange_rate_defaults_to_parity() {
        let fees = FeeBreakdown::from_settlement(&settlement(1000, "EUR", None, 59), 0.05, 0.0);

        assert_eq!(fees.txn_currency_fx_rate, 1.0);
        assert_eq!(fees.platform_fee_in_txn_currency, 50);
        assert_eq!(fees.net_amount_in_group_currency, 1000 - 50 - 59);
    }

    #[test]
    fn host_fee_participates_in_net() {
        let fees = FeeBreakdown::from_settlement(&settlement(1000, "EUR", None, 0), 0.05, 0.10);

        assert_eq!(fees.host_fee_in_txn_currency, 100);
        assert_eq!(fees.net_amount_in_group_currency, 1000 - 50 - 100);
    }
}
