//! Static configuration: service endpoints, polling cadence and fee constants

use std::str::FromStr;

use bon::Builder;
use url::Url;

use crate::chain::NetworkMode;
use crate::error::{BulkPayError, Result};
use crate::fees::FeeConfig;
use crate::orchestrator::{PollingConfig, TransferMethod};
use crate::protocol::UsdcAmount;

pub const ENV_IRIS_URL: &str = "BULK_PAY_IRIS_URL";
pub const ENV_FAST_POLL_SECS: &str = "BULK_PAY_FAST_POLL_SECS";
pub const ENV_FAST_MAX_ATTEMPTS: &str = "BULK_PAY_FAST_MAX_ATTEMPTS";
pub const ENV_STANDARD_POLL_SECS: &str = "BULK_PAY_STANDARD_POLL_SECS";
pub const ENV_STANDARD_MAX_ATTEMPTS: &str = "BULK_PAY_STANDARD_MAX_ATTEMPTS";
pub const ENV_NATIVE_USD_PRICE: &str = "BULK_PAY_NATIVE_USD_PRICE";

/// Everything an orchestrator needs besides its collaborators
///
/// ```rust
/// use cctp_bulk_pay::{BulkPayConfig, PollingConfig};
///
/// let config = BulkPayConfig::builder()
///     .fast_polling(PollingConfig::fast().with_max_attempts(20))
///     .build();
/// assert_eq!(config.fast_polling.max_attempts, 20);
/// assert_eq!(config.standard_polling, PollingConfig::standard());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct BulkPayConfig {
    /// Overrides the Iris endpoint implied by the network mode
    pub iris_api_url: Option<Url>,
    #[builder(default = PollingConfig::fast())]
    pub fast_polling: PollingConfig,
    #[builder(default = PollingConfig::standard())]
    pub standard_polling: PollingConfig,
    #[builder(default)]
    pub fees: FeeConfig,
}

impl Default for BulkPayConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl BulkPayConfig {
    /// Loads `.env` if present, then reads the `BULK_PAY_*` variables
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// [`BulkPayError::InvalidConfig`] when a variable is set but malformed.
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reading from `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = parse_var::<Url>(&lookup, ENV_IRIS_URL)? {
            config.iris_api_url = Some(url);
        }
        if let Some(secs) = parse_var(&lookup, ENV_FAST_POLL_SECS)? {
            config.fast_polling = config.fast_polling.with_poll_interval_secs(secs);
        }
        if let Some(attempts) = parse_var(&lookup, ENV_FAST_MAX_ATTEMPTS)? {
            config.fast_polling = config.fast_polling.with_max_attempts(attempts);
        }
        if let Some(secs) = parse_var(&lookup, ENV_STANDARD_POLL_SECS)? {
            config.standard_polling = config.standard_polling.with_poll_interval_secs(secs);
        }
        if let Some(attempts) = parse_var(&lookup, ENV_STANDARD_MAX_ATTEMPTS)? {
            config.standard_polling = config.standard_polling.with_max_attempts(attempts);
        }
        if let Some(price) = parse_var::<UsdcAmount>(&lookup, ENV_NATIVE_USD_PRICE)? {
            config.fees.native_usd_price = price;
        }

        if config.fast_polling.max_attempts == 0 || config.standard_polling.max_attempts == 0 {
            return Err(BulkPayError::InvalidConfig(
                "polling needs at least one attempt".to_string(),
            ));
        }

        Ok(config)
    }

    /// Iris base URL for `mode`
    pub fn iris_url(&self, mode: NetworkMode) -> String {
        match &self.iris_api_url {
            Some(url) => url.as_str().trim_end_matches('/').to_string(),
            None => mode.iris_api_url().to_string(),
        }
    }

    /// Polling cadence for a burn submitted with `method`
    pub fn polling_for(&self, method: TransferMethod) -> PollingConfig {
        match method {
            TransferMethod::Standard => self.standard_polling,
            TransferMethod::Fast | TransferMethod::SameChain => self.fast_polling,
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    raw.parse()
        .map(Some)
        .map_err(|e| BulkPayError::InvalidConfig(format!("{key}={raw}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = BulkPayConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, BulkPayConfig::default());
        assert_eq!(
            config.iris_url(NetworkMode::Testnet),
            "https://iris-api-sandbox.circle.com"
        );
        assert_eq!(config.polling_for(TransferMethod::Fast), PollingConfig::fast());
        assert_eq!(
            config.polling_for(TransferMethod::Standard),
            PollingConfig::standard()
        );
    }

    #[test]
    fn test_overrides() {
        let config = BulkPayConfig::from_lookup(lookup(&[
            (ENV_IRIS_URL, "http://localhost:8080/"),
            (ENV_FAST_POLL_SECS, "2"),
            (ENV_STANDARD_MAX_ATTEMPTS, "90"),
            (ENV_NATIVE_USD_PRICE, "3150.25"),
        ]))
        .unwrap();

        assert_eq!(config.iris_url(NetworkMode::Mainnet), "http://localhost:8080");
        assert_eq!(config.fast_polling.poll_interval_secs, 2);
        assert_eq!(config.fast_polling.max_attempts, 10);
        assert_eq!(config.standard_polling.max_attempts, 90);
        assert_eq!(config.fees.native_usd_price, UsdcAmount::cents(315_025));
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        let err = BulkPayConfig::from_lookup(lookup(&[(ENV_FAST_MAX_ATTEMPTS, "ten")])).unwrap_err();
        assert!(matches!(err, BulkPayError::InvalidConfig(msg) if msg.contains(ENV_FAST_MAX_ATTEMPTS)));

        assert!(BulkPayConfig::from_lookup(lookup(&[(ENV_IRIS_URL, "not a url")])).is_err());
        assert!(BulkPayConfig::from_lookup(lookup(&[(ENV_STANDARD_MAX_ATTEMPTS, "0")])).is_err());
    }
}
