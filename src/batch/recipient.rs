use std::fmt;

use alloy_primitives::{Address, Bytes, TxHash};
use serde::{Deserialize, Serialize};

use crate::orchestrator::TransferMethod;
use crate::protocol::UsdcAmount;

/// Identifier assigned to a recipient when it joins a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(pub u64);

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a recipient is in its payout
///
/// ```text
/// ready -> pending -> transferring -> completed                   (same chain)
/// ready -> pending -> burning -> attesting -> minting -> completed (cross chain)
/// any non-terminal -> failed
/// pending..minting -> ready                                       (user rejected a prompt)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientStatus {
    Ready,
    Pending,
    Transferring,
    Burning,
    Attesting,
    Minting,
    Completed,
    Failed,
}

impl RecipientStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Pending => "pending",
            Self::Transferring => "transferring",
            Self::Burning => "burning",
            Self::Attesting => "attesting",
            Self::Minting => "minting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Claimed by a run and not yet settled
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Transferring | Self::Burning | Self::Attesting | Self::Minting
        )
    }

    /// Whether `self -> to` is a legal step for a recipient on the given branch
    pub fn can_transition(self, to: Self, is_same_chain: bool) -> bool {
        use RecipientStatus::*;

        match (self, to) {
            (from, Failed) => !from.is_terminal(),
            (from, Ready) => from.is_in_flight(),
            (Ready, Pending) => true,
            (Pending, Transferring) | (Transferring, Completed) => is_same_chain,
            (Pending, Burning) | (Burning, Attesting) | (Attesting, Minting) | (Minting, Completed) => {
                !is_same_chain
            }
            _ => false,
        }
    }
}

impl fmt::Display for RecipientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated payout line that has not joined a batch yet
///
/// Status and the same-chain flag depend on the chain the wallet is connected
/// to when the draft is added, so drafts carry neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientDraft {
    pub address: Address,
    pub chain_id: u64,
    pub chain_name: String,
    pub amount: UsdcAmount,
}

/// One payee of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub id: RecipientId,
    pub address: Address,
    /// Destination chain
    pub chain_id: u64,
    pub chain_name: String,
    pub amount: UsdcAmount,
    /// Fixed at insertion; selects the branch of the state machine
    pub is_same_chain: bool,
    pub status: RecipientStatus,
    /// Method the recipient was submitted with, set when its chain operation starts
    #[serde(default)]
    pub method: Option<TransferMethod>,
    /// Latest transaction: the transfer, the burn, then the mint
    #[serde(default)]
    pub tx_hash: Option<TxHash>,
    #[serde(default)]
    pub attestation: Option<Bytes>,
    /// Only meaningful while `status` is `failed`
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use RecipientStatus::*;

    #[rstest]
    #[case(Ready, Pending)]
    #[case(Pending, Transferring)]
    #[case(Transferring, Completed)]
    #[case(Pending, Failed)]
    #[case(Transferring, Failed)]
    #[case(Pending, Ready)]
    #[case(Transferring, Ready)]
    fn test_same_chain_path(#[case] from: RecipientStatus, #[case] to: RecipientStatus) {
        assert!(from.can_transition(to, true));
    }

    #[rstest]
    #[case(Ready, Pending)]
    #[case(Pending, Burning)]
    #[case(Burning, Attesting)]
    #[case(Attesting, Minting)]
    #[case(Minting, Completed)]
    #[case(Attesting, Failed)]
    #[case(Minting, Ready)]
    fn test_cross_chain_path(#[case] from: RecipientStatus, #[case] to: RecipientStatus) {
        assert!(from.can_transition(to, false));
    }

    #[rstest]
    #[case(Pending, Burning)]
    #[case(Burning, Attesting)]
    #[case(Attesting, Minting)]
    #[case(Minting, Completed)]
    fn test_same_chain_never_enters_cctp_states(
        #[case] from: RecipientStatus,
        #[case] to: RecipientStatus,
    ) {
        assert!(!from.can_transition(to, true));
    }

    #[rstest]
    #[case(Pending, Transferring)]
    #[case(Transferring, Completed)]
    fn test_cross_chain_never_transfers_directly(
        #[case] from: RecipientStatus,
        #[case] to: RecipientStatus,
    ) {
        assert!(!from.can_transition(to, false));
    }

    #[rstest]
    #[case(Ready, Burning)]
    #[case(Ready, Transferring)]
    #[case(Burning, Minting)]
    #[case(Burning, Completed)]
    #[case(Completed, Failed)]
    #[case(Failed, Ready)]
    #[case(Completed, Ready)]
    #[case(Ready, Ready)]
    fn test_illegal_steps(#[case] from: RecipientStatus, #[case] to: RecipientStatus) {
        assert!(!from.can_transition(to, false));
        assert!(!from.can_transition(to, true));
    }

    #[test]
    fn test_ready_may_fail() {
        assert!(Ready.can_transition(Failed, true));
        assert!(Ready.can_transition(Failed, false));
    }

    #[test]
    fn test_status_serde_matches_display() {
        for status in [Ready, Pending, Transferring, Burning, Attesting, Minting, Completed, Failed] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }
}
