use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::Result;
use crate::config::FeeSchedule;
use crate::error::Error;

pub use rust_decimal::Decimal;

/// Spot price for one unit of the asset, stamped with the local receive time.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PriceQuote {
    pub amount: Decimal,
    pub currency: String,
    pub fetched_at: DateTime<Utc>,
}

/// Fee components of a [`ConversionEstimate`], in the quote currency.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct EstimatedFees {
    pub withdrawal_fee: Decimal,
    pub network_fee: Decimal,
}

impl EstimatedFees {
    /// Sum of both fees, or `None` on overflow.
    #[must_use]
    pub fn total(&self) -> Option<Decimal> {
        self.withdrawal_fee.checked_add(self.network_fee)
    }
}

/// What a cash-out of `btc_amount` is worth at `price_per_unit` after fees.
///
/// Values are exact; nothing is rounded.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConversionEstimate {
    pub btc_amount: Decimal,
    pub price_per_unit: Decimal,
    pub currency: String,
    pub gross_value: Decimal,
    pub estimated_fees: EstimatedFees,
    pub net_value: Decimal,
}

impl ConversionEstimate {
    /// Computes `gross = amount × price` and
    /// `net = gross − gross × withdrawal_fee_rate − network_fee`.
    pub fn compute(amount: Decimal, quote: &PriceQuote, fees: &FeeSchedule) -> Result<Self> {
        if amount <= Decimal::ZERO {
            return Err(Error::validation(format!(
                "amount must be greater than zero, got {amount}"
            )));
        }
        if quote.amount <= Decimal::ZERO {
            return Err(Error::validation(format!(
                "spot price must be greater than zero, got {} {}",
                quote.amount, quote.currency
            )));
        }

        let gross_value = amount
            .checked_mul(quote.amount)
            .ok_or_else(|| Error::validation(format!("{amount} × {} overflows", quote.amount)))?;
        let withdrawal_fee = gross_value
            .checked_mul(fees.withdrawal_fee_rate)
            .ok_or_else(|| {
                Error::validation(format!("withdrawal fee on {gross_value} overflows"))
            })?;
        let estimated_fees = EstimatedFees {
            withdrawal_fee,
            network_fee: fees.network_fee,
        };

        let net_value = estimated_fees
            .total()
            .and_then(|total| gross_value.checked_sub(total))
            .ok_or_else(|| Error::validation(format!("net value of {gross_value} overflows")))?;

        Ok(Self {
            btc_amount: amount,
            price_per_unit: quote.amount,
            currency: quote.currency.clone(),
            gross_value,
            estimated_fees,
            net_value,
        })
    }
}

/// A trading account as reported by `GET /accounts`.
#[non_exhaustive]
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    #[serde(deserialize_with = "currency_code")]
    pub currency: String,
    #[serde(default)]
    pub balance: Decimal,
    pub available: Decimal,
    #[serde(default)]
    pub hold: Decimal,
}

/// A linked payout destination from `GET /payment-methods`.
#[non_exhaustive]
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct PaymentMethod {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "optional_currency_code")]
    pub currency: Option<String>,
    #[serde(default = "default_allow_withdraw")]
    pub allow_withdraw: bool,
}

/// The exchange's acknowledgment of a withdrawal.
#[non_exhaustive]
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct WithdrawalRecord {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    pub amount: Decimal,
    #[serde(deserialize_with = "currency_code")]
    pub currency: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of `POST /withdrawals/payment-method`.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WithdrawalRequest {
    pub amount: Decimal,
    pub currency: String,
    pub payment_method_id: String,
}

impl WithdrawalRequest {
    pub fn new<C, P>(amount: Decimal, currency: C, payment_method_id: P) -> Result<Self>
    where
        C: Into<String>,
        P: Into<String>,
    {
        if amount <= Decimal::ZERO {
            return Err(Error::validation(format!(
                "withdrawal amount must be greater than zero, got {amount}"
            )));
        }
        let payment_method_id = payment_method_id.into();
        if payment_method_id.trim().is_empty() {
            return Err(Error::validation("payment method id cannot be empty"));
        }

        Ok(Self {
            amount,
            currency: currency.into(),
            payment_method_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SpotPriceResponse {
    pub data: SpotPrice,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SpotPrice {
    pub amount: Decimal,
    pub currency: String,
}

/// Response of `GET /time`; `epoch` is fractional unix seconds.
#[non_exhaustive]
#[derive(Debug, Deserialize)]
pub struct ServerTime {
    #[serde(default)]
    pub iso: Option<DateTime<Utc>>,
    pub epoch: Decimal,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CurrencyField {
    Code(String),
    Object { code: String },
}

impl From<CurrencyField> for String {
    fn from(field: CurrencyField) -> Self {
        match field {
            CurrencyField::Code(code) | CurrencyField::Object { code } => code,
        }
    }
}

fn currency_code<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    CurrencyField::deserialize(deserializer).map(String::from)
}

fn optional_currency_code<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Option::<CurrencyField>::deserialize(deserializer).map(|field| field.map(String::from))
}

const fn default_allow_withdraw() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;
    use crate::error::Kind;

    fn quote(amount: Decimal) -> PriceQuote {
        PriceQuote {
            amount,
            currency: "USD".to_owned(),
            fetched_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn estimate_applies_rate_and_flat_fee() -> Result<()> {
        let fees = FeeSchedule::new(dec!(0.01), dec!(2.50))?;
        let estimate = ConversionEstimate::compute(dec!(0.1), &quote(dec!(65000.00)), &fees)?;

        assert_eq!(estimate.gross_value, dec!(6500.000));
        assert_eq!(estimate.estimated_fees.withdrawal_fee, dec!(65.00000));
        assert_eq!(estimate.estimated_fees.network_fee, dec!(2.50));
        assert_eq!(estimate.net_value, dec!(6432.50));
        assert_eq!(estimate.currency, "USD");
        Ok(())
    }

    #[test]
    fn estimate_matches_formula_across_inputs() -> Result<()> {
        let fees = FeeSchedule::new(dec!(0.015), dec!(1.99))?;

        for (amount, price) in [
            (dec!(0.00000001), dec!(43210.12)),
            (dec!(1), dec!(1)),
            (dec!(12.345678), dec!(99999.99)),
        ] {
            let estimate = ConversionEstimate::compute(amount, &quote(price), &fees)?;
            let gross = amount * price;

            assert_eq!(estimate.gross_value, gross);
            assert_eq!(
                estimate.net_value,
                gross - gross * fees.withdrawal_fee_rate - fees.network_fee
            );
        }
        Ok(())
    }

    #[test]
    fn estimate_rejects_non_positive_amount_and_price() {
        let fees = FeeSchedule::default();

        let err = ConversionEstimate::compute(dec!(0), &quote(dec!(100)), &fees).unwrap_err();
        assert_eq!(err.kind(), Kind::Validation);

        let err = ConversionEstimate::compute(dec!(-1), &quote(dec!(100)), &fees).unwrap_err();
        assert_eq!(err.kind(), Kind::Validation);

        let err = ConversionEstimate::compute(dec!(1), &quote(dec!(0)), &fees).unwrap_err();
        assert_eq!(err.kind(), Kind::Validation);
    }

    #[test]
    fn estimate_overflow_is_a_validation_error() -> Result<()> {
        let fees = FeeSchedule::new(dec!(0.5), Decimal::MAX)?;

        let err = ConversionEstimate::compute(dec!(1), &quote(Decimal::MAX), &fees).unwrap_err();

        assert_eq!(err.kind(), Kind::Validation);
        assert!(err.to_string().contains("overflows"), "{err}");
        Ok(())
    }

    #[test]
    fn fee_total_reports_overflow() {
        let fees = EstimatedFees {
            withdrawal_fee: Decimal::MAX,
            network_fee: dec!(1),
        };

        assert_eq!(fees.total(), None);
    }

    #[test]
    fn account_accepts_both_currency_shapes() -> anyhow::Result<()> {
        let plain: Account = serde_json::from_value(json!({
            "id": "acc-1",
            "currency": "BTC",
            "balance": "0.5",
            "available": "0.4",
            "hold": "0.1",
        }))?;
        let nested: Account = serde_json::from_value(json!({
            "id": "acc-2",
            "currency": { "code": "BTC", "name": "Bitcoin" },
            "available": "0.25",
        }))?;

        assert_eq!(plain.currency, "BTC");
        assert_eq!(plain.available, dec!(0.4));
        assert_eq!(nested.currency, "BTC");
        assert_eq!(nested.balance, Decimal::ZERO);
        Ok(())
    }

    #[test]
    fn payment_method_defaults() -> anyhow::Result<()> {
        let method: PaymentMethod = serde_json::from_value(json!({
            "id": "pm-1",
            "type": "ach_bank_account",
            "name": "Checking ****1234",
        }))?;

        assert_eq!(method.kind, "ach_bank_account");
        assert!(method.allow_withdraw);
        assert_eq!(method.currency, None);
        Ok(())
    }

    #[test]
    fn withdrawal_record_without_optional_fields() -> anyhow::Result<()> {
        let record: WithdrawalRecord = serde_json::from_value(json!({
            "id": "wd-1",
            "amount": "0.10000000",
            "currency": "BTC",
            "payout_at": "2024-01-02T00:00:00Z",
        }))?;

        assert_eq!(record.amount, dec!(0.1));
        assert_eq!(record.status, None);
        assert_eq!(record.created_at, None);
        Ok(())
    }

    #[test]
    fn withdrawal_request_requires_positive_amount() {
        let err = WithdrawalRequest::new(dec!(0), "BTC", "pm-1").unwrap_err();
        assert_eq!(err.kind(), Kind::Validation);

        let err = WithdrawalRequest::new(dec!(0.1), "BTC", " ").unwrap_err();
        assert_eq!(err.kind(), Kind::Validation);
    }

    #[test]
    fn withdrawal_request_serializes_amount_as_string() -> anyhow::Result<()> {
        let request = WithdrawalRequest::new(dec!(0.1), "BTC", "pm-1")?;

        assert_eq!(
            serde_json::to_value(&request)?,
            json!({ "amount": "0.1", "currency": "BTC", "payment_method_id": "pm-1" })
        );
        Ok(())
    }
}
