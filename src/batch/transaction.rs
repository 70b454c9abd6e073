use std::fmt;

use alloy_primitives::{Address, TxHash};
use serde::{Deserialize, Serialize};

use super::RecipientId;
use crate::protocol::UsdcAmount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Burn,
    Mint,
    Transfer,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Burn => "burn",
            Self::Mint => "mint",
            Self::Transfer => "transfer",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Audit entry for a confirmed chain operation
///
/// Appended once and never edited. A cross-chain payout yields a burn and a
/// mint; a same-chain payout yields one transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// `"{kind}-{recipient id}"`
    pub id: String,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub tx_hash: TxHash,
    /// Chain the transaction executed on
    pub chain_id: u64,
    pub amount: UsdcAmount,
    pub recipient: Address,
    pub recipient_id: RecipientId,
    /// Unix milliseconds
    pub timestamp: u64,
}

impl TransactionRecord {
    pub(crate) fn confirmed(
        kind: TransactionKind,
        recipient_id: RecipientId,
        recipient: Address,
        amount: UsdcAmount,
        chain_id: u64,
        tx_hash: TxHash,
        timestamp: u64,
    ) -> Self {
        Self {
            id: format!("{kind}-{recipient_id}"),
            kind,
            status: TransactionStatus::Confirmed,
            tx_hash,
            chain_id,
            amount,
            recipient,
            recipient_id,
            timestamp,
        }
    }
}
