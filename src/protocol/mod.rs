//! CCTP wire types
//!
//! Domain identifiers, finality thresholds, burn parameters, Iris API response
//! shapes and the fixed-point USDC amount used across the batch.

mod amount;
mod attestation;
mod burn;
mod domain_id;
mod finality;

pub use amount::{UsdcAmount, USDC_DECIMALS};
pub use attestation::{
    AttestationStatus, FeeScheduleEntry, MessagesResponse, SignedMessage, SourceMessage,
};
pub use burn::{BurnParams, DEFAULT_FAST_MAX_FEE_BPS};
pub use domain_id::{DomainId, InvalidDomainId};
pub use finality::FinalityThreshold;
