use chrono::Utc;
use reqwest::Client as ReqwestClient;
use reqwest::{Method, Request};
use rust_decimal::prelude::ToPrimitive as _;
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::{self, Credentials};
use crate::config::Config;
use crate::error::Error;
use crate::policy::TimePolicy;
use crate::transfer::{TransferOutcome, TransferRequest};
use crate::types::{
    Account, ConversionEstimate, Decimal, PaymentMethod, PriceQuote, ServerTime,
    SpotPriceResponse, WithdrawalRecord, WithdrawalRequest,
};
use crate::{ASSET, Result, Timestamp};

/// Client for the exchange endpoints a cash-out needs.
///
/// Holds fixed credentials and configuration; every method issues its
/// requests sequentially and keeps no state between calls.
#[derive(Clone, Debug)]
pub struct Client {
    config: Config,
    credentials: Credentials,
    client: ReqwestClient,
}

impl Client {
    /// Creates a client with an HTTP client honoring `config.timeout`.
    pub fn new(config: Config, credentials: Credentials) -> Result<Self> {
        let client = ReqwestClient::builder().timeout(config.timeout).build()?;
        Self::with_client(config, credentials, client)
    }

    /// Creates a client around a caller-supplied HTTP client.
    pub fn with_client(
        config: Config,
        credentials: Credentials,
        client: ReqwestClient,
    ) -> Result<Self> {
        config.validate()?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            environment = %config.environment,
            host = %config.host,
            key = credentials.key(),
            "created exchange client"
        );

        Ok(Self {
            config,
            credentials,
            client,
        })
    }

    /// Reads credentials and configuration from `COINBASE_*` variables.
    ///
    /// Credentials are checked first so a missing key fails before anything else.
    pub fn from_env() -> Result<Self> {
        let credentials = Credentials::from_env()?;
        Self::new(Config::from_env()?, credentials)
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Fetches the public spot price of the asset in the configured quote currency.
    pub async fn spot_price(&self) -> Result<PriceQuote> {
        let pair = format!("{ASSET}-{}", self.config.quote_currency);
        let url = self
            .config
            .price_host
            .join(&format!("v2/prices/{pair}/spot"))?;
        let request = self.client.request(Method::GET, url).build()?;

        let response = crate::request::<SpotPriceResponse>(&self.client, request, None).await?;
        let quote = PriceQuote {
            amount: response.data.amount,
            currency: response.data.currency,
            fetched_at: Utc::now(),
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(%pair, price = %quote.amount, "fetched spot price");

        Ok(quote)
    }

    /// Fetches the spot price and derives an estimate for `amount` of the asset.
    pub async fn estimate(&self, amount: Decimal) -> Result<ConversionEstimate> {
        if amount <= Decimal::ZERO {
            return Err(Error::validation(format!(
                "amount must be greater than zero, got {amount}"
            )));
        }

        let quote = self.spot_price().await?;
        let estimate = ConversionEstimate::compute(amount, &quote, &self.config.fees)?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            amount = %estimate.btc_amount,
            gross = %estimate.gross_value,
            fee_rate_pct = %(self.config.fees.withdrawal_fee_rate * Decimal::ONE_HUNDRED),
            net = %estimate.net_value,
            currency = %estimate.currency,
            "computed conversion estimate"
        );

        Ok(estimate)
    }

    pub async fn accounts(&self) -> Result<Vec<Account>> {
        let request = self
            .client
            .request(Method::GET, self.endpoint("accounts")?)
            .build()?;

        self.signed(request).await
    }

    /// Sum of `available` across accounts held in `currency`; zero when none exist.
    pub async fn available_balance(&self, currency: &str) -> Result<Decimal> {
        let available: Decimal = self
            .accounts()
            .await?
            .iter()
            .filter(|account| account.currency.eq_ignore_ascii_case(currency))
            .map(|account| account.available)
            .sum();

        #[cfg(feature = "tracing")]
        tracing::debug!(currency, %available, "fetched available balance");

        Ok(available)
    }

    /// Lists the payout methods linked to the account.
    pub async fn payment_methods(&self) -> Result<Vec<PaymentMethod>> {
        let request = self
            .client
            .request(Method::GET, self.endpoint("payment-methods")?)
            .build()?;

        self.signed(request).await
    }

    /// Requests a withdrawal to a linked payment method.
    ///
    /// Once accepted by the exchange the withdrawal cannot be undone.
    pub async fn withdraw(&self, withdrawal: &WithdrawalRequest) -> Result<WithdrawalRecord> {
        if withdrawal.amount <= Decimal::ZERO {
            return Err(Error::validation(format!(
                "withdrawal amount must be greater than zero, got {}",
                withdrawal.amount
            )));
        }

        let request = self
            .client
            .request(Method::POST, self.endpoint("withdrawals/payment-method")?)
            .json(withdrawal)
            .build()?;

        let record: WithdrawalRecord = self.signed(request).await?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            id = %record.id,
            amount = %record.amount,
            currency = %record.currency,
            payment_method_id = %withdrawal.payment_method_id,
            "withdrawal accepted"
        );

        Ok(record)
    }

    /// Runs the cash-out workflow: quote, balance check, payout-method check,
    /// then a preview or, for a confirmed request, the withdrawal.
    pub async fn transfer(&self, request: &TransferRequest) -> Result<TransferOutcome> {
        crate::transfer::run(self, request).await
    }

    /// Fetches the exchange clock.
    pub async fn server_time(&self) -> Result<ServerTime> {
        let request = self
            .client
            .request(Method::GET, self.endpoint("time")?)
            .build()?;

        crate::request::<ServerTime>(&self.client, request, None).await
    }

    async fn signed<Response: DeserializeOwned>(&self, request: Request) -> Result<Response> {
        let timestamp = self.timestamp().await?;
        let headers = auth::create_headers(&self.credentials, &request, timestamp)?;

        crate::request::<Response>(&self.client, request, Some(headers)).await
    }

    async fn timestamp(&self) -> Result<Timestamp> {
        match self.config.time {
            TimePolicy::Local => Ok(Utc::now().timestamp()),
            TimePolicy::Server => {
                let time = self.server_time().await?;
                time.epoch.trunc().to_i64().ok_or_else(|| {
                    Error::validation(format!(
                        "unable to represent server epoch {} as seconds",
                        time.epoch
                    ))
                })
            }
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.config.host.join(path)?)
    }
}
