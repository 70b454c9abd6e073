use std::fmt;

use thiserror::Error;

use crate::batch::{RecipientId, RecipientStatus};

/// A single rejected row from a CSV import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportLineError {
    /// 1-based line number in the imported text (the header is line 1)
    pub line: usize,
    pub reason: String,
}

impl fmt::Display for ImportLineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line {}: {}", self.line, self.reason)
    }
}

fn join_lines(errors: &[ImportLineError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Error, Debug)]
pub enum BulkPayError {
    #[error("Chain not supported: {chain_id}")]
    UnsupportedChain { chain_id: u64 },

    #[error("Source and destination share CCTP domain {domain}")]
    SameDomainTransfer { domain: u32 },

    #[error("Insufficient USDC balance. You have {available} USDC but need {required} USDC")]
    InsufficientBalance { available: String, required: String },

    #[error("Transaction cancelled by user")]
    UserRejected,

    #[error("Connected chain {chain_id} is not a {expected} chain")]
    NetworkMismatch { chain_id: u64, expected: String },

    #[error("Attestation timeout after {attempts} attempts")]
    AttestationTimeout { attempts: u32 },

    #[error("Chain operation failed: {0}")]
    ChainOperationFailed(String),

    #[error("CSV parsing errors:\n{}", join_lines(.errors))]
    ImportValidationFailed { errors: Vec<ImportLineError> },

    #[error("No wallet provider is installed")]
    WalletNotInstalled,

    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Failed to switch to chain {chain_id}: {reason}")]
    NetworkSwitchFailed { chain_id: u64, reason: String },

    #[error("Recipient chain {recipient_chain} does not match source chain {source_chain}")]
    SourceChainMismatch {
        recipient_chain: u64,
        source_chain: u64,
    },

    #[error("Network changed during request")]
    NetworkChanged,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Recipient {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: RecipientId,
        from: RecipientStatus,
        to: RecipientStatus,
    },

    #[error("Recipient not found: {0}")]
    RecipientNotFound(RecipientId),

    #[error("Recipient {0} is being processed")]
    RecipientBusy(RecipientId),

    #[error("Attestation not found (will retry)")]
    AttestationNotFound,

    #[error("Attestation service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Rate limit exceeded, retry after {retry_after_seconds} seconds")]
    RateLimitExceeded { retry_after_seconds: u64 },

    #[error("Fee schedule has no {fee_type} entry for domain {source_domain} -> {destination_domain}")]
    FeeUnavailable {
        fee_type: String,
        source_domain: u32,
        destination_domain: u32,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("RPC error: {0}")]
    Rpc(#[from] alloy_json_rpc::RpcError<alloy_transport::TransportErrorKind>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Hex conversion error: {0}")]
    Hex(#[from] alloy_primitives::hex::FromHexError),
}

impl BulkPayError {
    /// True when the operator declined a wallet prompt.
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, Self::UserRejected)
    }

    /// True for the transient "connected network changed underneath the request" condition.
    pub fn is_network_change(&self) -> bool {
        match self {
            Self::NetworkChanged => true,
            Self::Rpc(err) => err.to_string().to_lowercase().contains("network changed"),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BulkPayError>;
