use std::time::Duration;

use super::TransferMethod;

/// Attestation polling cadence for one transfer method
///
/// ```rust
/// use cctp_bulk_pay::PollingConfig;
///
/// let config = PollingConfig::standard().with_max_attempts(20);
/// assert_eq!(config.total_timeout_secs(), 20 * 30);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    /// Maximum number of polling attempts before giving up.
    pub max_attempts: u32,
    /// Seconds to wait between polling attempts.
    pub poll_interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl PollingConfig {
    /// Fast transfers attest in well under a minute: 10 attempts, 5 seconds apart
    pub fn fast() -> Self {
        Self {
            max_attempts: 10,
            poll_interval_secs: 5,
        }
    }

    /// Standard transfers wait for hard finality: 60 attempts, 30 seconds apart
    pub fn standard() -> Self {
        Self {
            max_attempts: 60,
            poll_interval_secs: 30,
        }
    }

    pub fn for_method(method: TransferMethod) -> Self {
        match method {
            TransferMethod::Standard => Self::standard(),
            TransferMethod::Fast | TransferMethod::SameChain => Self::fast(),
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_poll_interval_secs(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Returns the total maximum wait time in seconds.
    pub fn total_timeout_secs(&self) -> u64 {
        self.max_attempts as u64 * self.poll_interval_secs
    }
}
