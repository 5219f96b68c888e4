use std::str::FromStr as _;
use std::time::Duration;

use rust_decimal_macros::dec;
use url::Url;

use crate::Result;
use crate::error::Error;
use crate::policy::TimePolicy;
use crate::types::Decimal;

pub const PRODUCTION_HOST: &str = "https://api.exchange.coinbase.com/";
pub const SANDBOX_HOST: &str = "https://api-public.sandbox.exchange.coinbase.com/";
pub const PRICE_HOST: &str = "https://api.coinbase.com/";

pub const DEFAULT_QUOTE_CURRENCY: &str = "USD";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const SANDBOX_VAR: &str = "COINBASE_SANDBOX";
pub const HOST_VAR: &str = "COINBASE_HOST";
pub const PRICE_HOST_VAR: &str = "COINBASE_PRICE_HOST";
pub const QUOTE_CURRENCY_VAR: &str = "COINBASE_QUOTE_CURRENCY";
pub const WITHDRAWAL_FEE_RATE_VAR: &str = "COINBASE_WITHDRAWAL_FEE_RATE";
pub const NETWORK_FEE_VAR: &str = "COINBASE_NETWORK_FEE";
pub const TIMEOUT_VAR: &str = "COINBASE_TIMEOUT_SECS";
pub const TIME_POLICY_VAR: &str = "COINBASE_TIME_POLICY";

/// Which exchange deployment to talk to.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Sandbox,
}

impl Environment {
    #[must_use]
    pub const fn host(self) -> &'static str {
        match self {
            Environment::Production => PRODUCTION_HOST,
            Environment::Sandbox => SANDBOX_HOST,
        }
    }
}

/// Fees subtracted from the gross value of a cash-out estimate.
///
/// `withdrawal_fee_rate` is a fraction of the gross value (`0.01` is 1%);
/// `network_fee` is a flat amount in the quote currency.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FeeSchedule {
    pub withdrawal_fee_rate: Decimal,
    pub network_fee: Decimal,
}

impl FeeSchedule {
    pub fn new(withdrawal_fee_rate: Decimal, network_fee: Decimal) -> Result<Self> {
        let fees = Self {
            withdrawal_fee_rate,
            network_fee,
        };
        fees.validate()?;
        Ok(fees)
    }

    pub(crate) fn validate(self) -> Result<()> {
        if self.withdrawal_fee_rate.is_sign_negative() || self.withdrawal_fee_rate >= Decimal::ONE
        {
            return Err(Error::configuration(format!(
                "withdrawal fee rate must be in [0, 1), got {}",
                self.withdrawal_fee_rate
            )));
        }
        if self.network_fee.is_sign_negative() {
            return Err(Error::configuration(format!(
                "network fee cannot be negative, got {}",
                self.network_fee
            )));
        }
        Ok(())
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            withdrawal_fee_rate: dec!(0.01),
            network_fee: dec!(2.50),
        }
    }
}

/// Client configuration.
#[non_exhaustive]
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: Environment,
    pub host: Url,
    pub price_host: Url,
    pub quote_currency: String,
    pub fees: FeeSchedule,
    pub timeout: Duration,
    pub time: TimePolicy,
}

impl Config {
    pub fn new(environment: Environment) -> Result<Self> {
        Ok(Self {
            environment,
            host: parse_host(environment.host())?,
            price_host: parse_host(PRICE_HOST)?,
            quote_currency: DEFAULT_QUOTE_CURRENCY.to_owned(),
            fees: FeeSchedule::default(),
            timeout: DEFAULT_TIMEOUT,
            time: TimePolicy::default(),
        })
    }

    pub fn production() -> Result<Self> {
        Self::new(Environment::Production)
    }

    pub fn sandbox() -> Result<Self> {
        Self::new(Environment::Sandbox)
    }

    /// Overrides the exchange host, e.g. to point at a proxy or mock server.
    pub fn with_host(mut self, host: &str) -> Result<Self> {
        self.host = parse_host(host)?;
        Ok(self)
    }

    /// Overrides the host serving public spot prices.
    pub fn with_price_host(mut self, host: &str) -> Result<Self> {
        self.price_host = parse_host(host)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_quote_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.quote_currency = currency.into().to_ascii_uppercase();
        self
    }

    #[must_use]
    pub fn with_fees(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_time_policy(mut self, time: TimePolicy) -> Self {
        self.time = time;
        self
    }

    /// Builds a configuration from `COINBASE_*` environment variables.
    ///
    /// Unset variables fall back to production defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`Config::from_env`] but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup(SANDBOX_VAR) {
            Some(value) if parse_flag(SANDBOX_VAR, &value)? => Environment::Sandbox,
            _ => Environment::Production,
        };
        let mut config = Self::new(environment)?;

        if let Some(host) = lookup(HOST_VAR) {
            config = config.with_host(&host)?;
        }
        if let Some(host) = lookup(PRICE_HOST_VAR) {
            config = config.with_price_host(&host)?;
        }
        if let Some(currency) = lookup(QUOTE_CURRENCY_VAR) {
            config = config.with_quote_currency(currency.trim());
        }
        if let Some(rate) = lookup(WITHDRAWAL_FEE_RATE_VAR) {
            config.fees.withdrawal_fee_rate = parse_decimal(WITHDRAWAL_FEE_RATE_VAR, &rate)?;
        }
        if let Some(fee) = lookup(NETWORK_FEE_VAR) {
            config.fees.network_fee = parse_decimal(NETWORK_FEE_VAR, &fee)?;
        }
        if let Some(secs) = lookup(TIMEOUT_VAR) {
            let secs = secs.trim().parse::<u64>().map_err(|e| {
                Error::configuration(format!("invalid {TIMEOUT_VAR} `{secs}`: {e}"))
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(policy) = lookup(TIME_POLICY_VAR) {
            config = config.with_time_policy(TimePolicy::parse(&policy)?);
        }

        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.quote_currency.trim().is_empty() {
            return Err(Error::configuration("quote currency cannot be empty"));
        }
        if self.timeout.is_zero() {
            return Err(Error::configuration("request timeout must be non-zero"));
        }
        self.fees.validate()
    }
}

fn parse_host(host: &str) -> Result<Url> {
    let host = host.trim();
    let normalized = if host.ends_with('/') {
        host.to_owned()
    } else {
        format!("{host}/")
    };

    Url::parse(&normalized)
        .map_err(|e| Error::configuration(format!("invalid host `{host}`: {e}")))
}

fn parse_flag(var: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::configuration(format!(
            "invalid {var} `{other}`; expected true|false"
        ))),
    }
}

fn parse_decimal(var: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value.trim())
        .map_err(|e| Error::configuration(format!("invalid {var} `{value}`: {e}")))
}
