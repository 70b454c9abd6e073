//! Recipient batch: the per-recipient state machine and the audit log
//!
//! A [`RecipientBatch`] owns every recipient of a payout together with the
//! append-only transaction log and the status-change history. The
//! orchestrator is the only writer of status fields; everything else reads
//! snapshots.

mod recipient;
mod store;
mod transaction;

pub use recipient::{Recipient, RecipientDraft, RecipientId, RecipientStatus};
pub use store::{RecipientBatch, StatusChange};
pub use transaction::{TransactionKind, TransactionRecord, TransactionStatus};
