use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BulkPayError;
use crate::protocol::FinalityThreshold;

/// How a run moves USDC to its recipients
///
/// `SameChain` pays recipients on the connected chain with plain ERC-20
/// transfers. `Fast` and `Standard` burn through CCTP and differ only in the
/// finality the attestation waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferMethod {
    SameChain,
    #[default]
    Fast,
    Standard,
}

impl TransferMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SameChain => "same-chain",
            Self::Fast => "fast",
            Self::Standard => "standard",
        }
    }

    pub fn is_cross_chain(self) -> bool {
        !matches!(self, Self::SameChain)
    }

    /// Minimum finality passed to `depositForBurn`
    pub fn finality_threshold(self) -> Option<FinalityThreshold> {
        match self {
            Self::SameChain => None,
            Self::Fast => Some(FinalityThreshold::Fast),
            Self::Standard => Some(FinalityThreshold::Standard),
        }
    }

    /// Whether a run with this method processes the recipient
    pub fn accepts(self, recipient_is_same_chain: bool) -> bool {
        recipient_is_same_chain != self.is_cross_chain()
    }
}

impl fmt::Display for TransferMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferMethod {
    type Err = BulkPayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "same-chain" | "same_chain" => Ok(Self::SameChain),
            "fast" => Ok(Self::Fast),
            "standard" => Ok(Self::Standard),
            other => Err(BulkPayError::InvalidConfig(format!(
                "unknown transfer method \"{other}\""
            ))),
        }
    }
}
