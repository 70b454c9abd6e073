//! OpenTelemetry span helpers for bulk payouts
//!
//! Span names are static and prefixed `cctp_bulk_pay.`; everything variable
//! goes into attributes. Spans that can fail carry empty `error.*` fields that
//! [`record_error`] fills in.
//!
//! ```text
//! cctp_bulk_pay.run
//! └── cctp_bulk_pay.process_recipient
//!     ├── cctp_bulk_pay.poll_attestation
//!     │   └── cctp_bulk_pay.attestation_attempt (one per attempt)
//!     └── cctp_bulk_pay.mint
//! cctp_bulk_pay.estimate_fees
//! cctp_bulk_pay.import_csv
//! ```

use alloy_primitives::{Address, TxHash};
use tracing::Span;

use crate::batch::RecipientId;
use crate::orchestrator::TransferMethod;
use crate::protocol::UsdcAmount;

/// Create span for one orchestration run over a batch.
///
/// Parent: caller
/// Children: cctp_bulk_pay.process_recipient
#[inline]
pub fn run(method: TransferMethod, source_chain_id: u64, claimed: usize) -> Span {
    tracing::info_span!(
        "cctp_bulk_pay.run",
        method = %method,
        source_chain_id = source_chain_id,
        claimed = claimed,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Create span for driving a single recipient to a settled status.
///
/// Parent: cctp_bulk_pay.run
/// Children: cctp_bulk_pay.poll_attestation, cctp_bulk_pay.mint
#[inline]
pub fn process_recipient(
    id: RecipientId,
    recipient: &Address,
    destination_chain_id: u64,
    amount: &UsdcAmount,
    same_chain: bool,
) -> Span {
    tracing::info_span!(
        "cctp_bulk_pay.process_recipient",
        recipient_id = %id,
        recipient = %recipient,
        destination_chain_id = destination_chain_id,
        amount = %amount,
        same_chain = same_chain,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Create span for polling the attestation service for a burn.
///
/// Parent: cctp_bulk_pay.process_recipient
/// Children: cctp_bulk_pay.attestation_attempt (multiple attempts)
#[inline]
pub fn poll_attestation(
    tx_hash: TxHash,
    source_domain: u32,
    max_attempts: u32,
    poll_interval_secs: u64,
) -> Span {
    tracing::info_span!(
        "cctp_bulk_pay.poll_attestation",
        tx_hash = %tx_hash,
        source_domain = source_domain,
        max_attempts = max_attempts,
        poll_interval_secs = poll_interval_secs,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Create span for a single attestation query.
///
/// Parent: cctp_bulk_pay.poll_attestation
/// Children: HTTP client request spans
#[inline]
pub fn attestation_attempt(attempt: u32) -> Span {
    tracing::debug_span!("cctp_bulk_pay.attestation_attempt", attempt = attempt)
}

/// Create span for minting on the destination chain.
///
/// Parent: cctp_bulk_pay.process_recipient
/// Children: provider RPC calls
#[inline]
pub fn mint(destination_chain_id: u64, attestation_length: usize) -> Span {
    tracing::info_span!(
        "cctp_bulk_pay.mint",
        destination_chain_id = destination_chain_id,
        attestation_length_bytes = attestation_length,
    )
}

/// Create span for a fee estimation pass.
///
/// Parent: caller
/// Children: provider and HTTP spans
#[inline]
pub fn estimate_fees(method: TransferMethod, source_chain_id: u64, recipients: usize) -> Span {
    tracing::info_span!(
        "cctp_bulk_pay.estimate_fees",
        method = %method,
        source_chain_id = source_chain_id,
        recipients = recipients,
        fee_source = tracing::field::Empty,
    )
}

/// Create span for parsing an uploaded CSV.
///
/// Parent: caller
/// Children: None
#[inline]
pub fn import_csv(bytes: usize) -> Span {
    tracing::info_span!(
        "cctp_bulk_pay.import_csv",
        bytes = bytes,
        rows = tracing::field::Empty,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Record error attributes on the current span.
///
/// Follows OpenTelemetry semantic conventions for error tracking:
/// - error.type: The error type/variant
/// - error.message: Human-readable error message
pub fn record_error<E: std::error::Error>(error: &E) {
    let message = error.to_string();
    let current_span = Span::current();
    current_span.record(
        "error.type",
        message.split(':').next().unwrap_or("Unknown"),
    );
    current_span.record("error.message", message.as_str());
    current_span.record("otel.status_code", "ERROR");
}

/// Record error attributes with an explicit type on the current span.
pub fn record_error_with_context(error_type: &str, error_message: &str) {
    let current_span = Span::current();
    current_span.record("error.type", error_type);
    current_span.record("error.message", error_message);
    current_span.record("otel.status_code", "ERROR");
}
