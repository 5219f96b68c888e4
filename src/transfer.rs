//! Cash-out workflow: quote, balance check, payout-method check, then either
//! a preview or the withdrawal itself.
//!
//! The pipeline is re-run in full on every call and never resumes, retries or
//! rolls back. Halting conditions the caller can act on are returned as
//! [`TransferOutcome`] variants; transport and vendor failures are errors.

use bon::Builder;
use serde::Serialize;

use crate::client::Client;
use crate::error::Error;
use crate::types::{
    ConversionEstimate, Decimal, PaymentMethod, WithdrawalRecord, WithdrawalRequest,
};
use crate::{ASSET, Result};

/// Input for [`Client::transfer`].
///
/// Without `confirm` the workflow only previews; with it, `payout_method_id`
/// names the linked destination for the withdrawal.
#[non_exhaustive]
#[derive(Builder, Clone, Debug, PartialEq, Eq)]
pub struct TransferRequest {
    pub amount: Decimal,
    #[builder(default)]
    pub confirm: bool,
    #[builder(into)]
    pub payout_method_id: Option<String>,
}

impl TransferRequest {
    #[must_use]
    pub fn preview(amount: Decimal) -> Self {
        Self::builder().amount(amount).build()
    }

    #[must_use]
    pub fn confirmed<S: Into<String>>(amount: Decimal, payout_method_id: S) -> Self {
        Self::builder()
            .amount(amount)
            .confirm(true)
            .payout_method_id(payout_method_id)
            .build()
    }

    fn validate(&self) -> Result<()> {
        if self.amount <= Decimal::ZERO {
            return Err(Error::validation(format!(
                "transfer amount must be greater than zero, got {}",
                self.amount
            )));
        }
        if self.confirm && self.target().is_none() {
            return Err(Error::validation(
                "a confirmed transfer requires a payout method id",
            ));
        }
        Ok(())
    }

    fn target(&self) -> Option<&str> {
        self.payout_method_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Result of one run of the workflow.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransferOutcome {
    /// Checks passed and nothing was withdrawn.
    Preview { estimate: ConversionEstimate },
    /// The exchange accepted the withdrawal.
    Completed {
        estimate: ConversionEstimate,
        withdrawal: WithdrawalRecord,
    },
    InsufficientFunds {
        estimate: ConversionEstimate,
        requested: Decimal,
        available: Decimal,
    },
    NoPayoutMethod { estimate: ConversionEstimate },
    /// The confirmed target is not a linked payout method that allows withdrawals.
    UnknownPayoutMethod {
        estimate: ConversionEstimate,
        payout_method_id: String,
    },
}

impl TransferOutcome {
    #[must_use]
    pub fn estimate(&self) -> &ConversionEstimate {
        match self {
            TransferOutcome::Preview { estimate }
            | TransferOutcome::Completed { estimate, .. }
            | TransferOutcome::InsufficientFunds { estimate, .. }
            | TransferOutcome::NoPayoutMethod { estimate }
            | TransferOutcome::UnknownPayoutMethod { estimate, .. } => estimate,
        }
    }

    #[must_use]
    pub fn withdrawal(&self) -> Option<&WithdrawalRecord> {
        match self {
            TransferOutcome::Completed { withdrawal, .. } => Some(withdrawal),
            _ => None,
        }
    }

    /// True for the outcomes that halted the workflow early.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        matches!(
            self,
            TransferOutcome::InsufficientFunds { .. }
                | TransferOutcome::NoPayoutMethod { .. }
                | TransferOutcome::UnknownPayoutMethod { .. }
        )
    }
}

/// Runs the cash-out workflow for `request` against `client`.
///
/// Only payout methods that allow withdrawals count as linked destinations.
pub(crate) async fn run(client: &Client, request: &TransferRequest) -> Result<TransferOutcome> {
    request.validate()?;

    let estimate = client.estimate(request.amount).await?;

    let available = client.available_balance(ASSET).await?;
    if request.amount > available {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            requested = %request.amount,
            %available,
            "insufficient funds for transfer"
        );

        return Ok(TransferOutcome::InsufficientFunds {
            estimate,
            requested: request.amount,
            available,
        });
    }

    let methods: Vec<PaymentMethod> = client
        .payment_methods()
        .await?
        .into_iter()
        .filter(|method| method.allow_withdraw)
        .collect();
    if methods.is_empty() {
        #[cfg(feature = "tracing")]
        tracing::warn!("no payout method eligible for withdrawals");

        return Ok(TransferOutcome::NoPayoutMethod { estimate });
    }

    if !request.confirm {
        #[cfg(feature = "tracing")]
        tracing::info!(
            net = %estimate.net_value,
            currency = %estimate.currency,
            methods = methods.len(),
            "transfer preview ready"
        );

        return Ok(TransferOutcome::Preview { estimate });
    }

    let target = request
        .target()
        .ok_or_else(|| Error::validation("a confirmed transfer requires a payout method id"))?;
    if !methods.iter().any(|method| method.id == target) {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            payout_method_id = target,
            "payout method is not linked or does not allow withdrawals"
        );

        return Ok(TransferOutcome::UnknownPayoutMethod {
            estimate,
            payout_method_id: target.to_owned(),
        });
    }

    let withdrawal = client
        .withdraw(&WithdrawalRequest::new(request.amount, ASSET, target)?)
        .await?;

    Ok(TransferOutcome::Completed {
        estimate,
        withdrawal,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::error::Kind;

    #[test]
    fn builder_defaults_to_preview() {
        let request = TransferRequest::builder().amount(dec!(0.1)).build();

        assert!(!request.confirm);
        assert_eq!(request.payout_method_id, None);
        assert_eq!(request, TransferRequest::preview(dec!(0.1)));
    }

    #[test]
    fn confirmed_request_requires_target() {
        let request = TransferRequest::builder()
            .amount(dec!(0.1))
            .confirm(true)
            .payout_method_id("  ")
            .build();

        let err = request.validate().unwrap_err();
        assert_eq!(err.kind(), Kind::Validation);
        assert!(TransferRequest::confirmed(dec!(0.1), "pm-1").validate().is_ok());
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        let err = TransferRequest::preview(dec!(-0.5)).validate().unwrap_err();

        assert_eq!(err.kind(), Kind::Validation);
    }
}
