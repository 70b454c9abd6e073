use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;
use tracing::debug;

use super::{
    Recipient, RecipientDraft, RecipientId, RecipientStatus, TransactionRecord,
};
use crate::error::{BulkPayError, Result};

const EVENT_CAPACITY: usize = 256;

/// Interrupted message stored on recipients that were mid-flight when state was saved
pub(crate) const INTERRUPTED: &str = "interrupted before completion";

/// One status transition, in the order it happened
///
/// `at_millis` is unix milliseconds. Changes made during a run are stamped by
/// the orchestrator's clock, like transaction records; manual resets use the
/// system clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub recipient: RecipientId,
    pub from: RecipientStatus,
    pub to: RecipientStatus,
    pub at_millis: u64,
}

fn system_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[derive(Debug, Default)]
struct BatchState {
    next_id: u64,
    recipients: Vec<Recipient>,
    transactions: Vec<TransactionRecord>,
    history: Vec<StatusChange>,
}

impl BatchState {
    fn find_mut(&mut self, id: RecipientId) -> Result<&mut Recipient> {
        self.recipients
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(BulkPayError::RecipientNotFound(id))
    }
}

/// Shared handle to a batch of recipients
///
/// Clones point at the same batch. Readers always receive copies, so a
/// snapshot never changes underneath the caller. Every status change goes
/// through the transition rules of [`RecipientStatus::can_transition`] and is
/// appended to the history and broadcast to subscribers.
#[derive(Debug, Clone)]
pub struct RecipientBatch {
    state: Arc<Mutex<BatchState>>,
    events: broadcast::Sender<StatusChange>,
}

impl Default for RecipientBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl RecipientBatch {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(BatchState {
                next_id: 1,
                ..BatchState::default()
            })),
            events,
        }
    }

    /// Rebuilds a batch from saved recipients
    ///
    /// `pending` recipients go back to `ready`. Anything further along was cut
    /// off mid-operation and is marked `failed`, since its chain side effects
    /// are unknown.
    pub fn restore(recipients: Vec<Recipient>) -> Self {
        let batch = Self::new();
        {
            let mut state = batch.lock();
            state.next_id = recipients.iter().map(|r| r.id.0).max().unwrap_or(0) + 1;
            state.recipients = recipients
                .into_iter()
                .map(|mut recipient| {
                    match recipient.status {
                        RecipientStatus::Pending => {
                            recipient.status = RecipientStatus::Ready;
                            recipient.error = None;
                        }
                        status if status.is_in_flight() => {
                            recipient.status = RecipientStatus::Failed;
                            recipient.error = Some(INTERRUPTED.to_string());
                        }
                        _ => {}
                    }
                    recipient
                })
                .collect();
        }
        batch
    }

    fn lock(&self) -> MutexGuard<'_, BatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a recipient in `ready`
    ///
    /// The same-chain flag is fixed here from the chain the wallet is connected
    /// to; with no wallet connected every recipient is treated as cross chain.
    pub fn add(&self, draft: RecipientDraft, connected_chain: Option<u64>) -> RecipientId {
        let mut state = self.lock();
        let id = RecipientId(state.next_id);
        state.next_id += 1;
        state.recipients.push(Recipient {
            id,
            address: draft.address,
            is_same_chain: connected_chain == Some(draft.chain_id),
            chain_id: draft.chain_id,
            chain_name: draft.chain_name,
            amount: draft.amount,
            status: RecipientStatus::Ready,
            method: None,
            tx_hash: None,
            attestation: None,
            error: None,
        });
        debug!(recipient_id = %id, event = "recipient_added");
        id
    }

    pub fn add_all(
        &self,
        drafts: impl IntoIterator<Item = RecipientDraft>,
        connected_chain: Option<u64>,
    ) -> Vec<RecipientId> {
        drafts
            .into_iter()
            .map(|draft| self.add(draft, connected_chain))
            .collect()
    }

    /// Removes a recipient that is not being processed
    pub fn remove(&self, id: RecipientId) -> Result<Recipient> {
        let mut state = self.lock();
        let index = state
            .recipients
            .iter()
            .position(|r| r.id == id)
            .ok_or(BulkPayError::RecipientNotFound(id))?;
        if state.recipients[index].status.is_in_flight() {
            return Err(BulkPayError::RecipientBusy(id));
        }
        Ok(state.recipients.remove(index))
    }

    /// Removes every recipient that is not being processed
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let before = state.recipients.len();
        state.recipients.retain(|r| r.status.is_in_flight());
        before - state.recipients.len()
    }

    /// Puts a settled recipient back to `ready` so it can be paid again
    pub fn reset(&self, id: RecipientId) -> Result<()> {
        let mut state = self.lock();
        let recipient = state.find_mut(id)?;
        let from = recipient.status;
        match from {
            RecipientStatus::Ready => return Ok(()),
            status if status.is_in_flight() => {
                return Err(BulkPayError::InvalidTransition {
                    id,
                    from,
                    to: RecipientStatus::Ready,
                })
            }
            _ => {}
        }

        recipient.status = RecipientStatus::Ready;
        recipient.method = None;
        recipient.tx_hash = None;
        recipient.attestation = None;
        recipient.error = None;
        self.push_change(&mut state, id, from, RecipientStatus::Ready, system_millis());
        Ok(())
    }

    /// Resets every failed recipient, returning how many were reset
    pub fn reset_failed(&self) -> usize {
        let failed: Vec<RecipientId> = self
            .lock()
            .recipients
            .iter()
            .filter(|r| r.status == RecipientStatus::Failed)
            .map(|r| r.id)
            .collect();

        failed.into_iter().filter(|id| self.reset(*id).is_ok()).count()
    }

    pub fn get(&self, id: RecipientId) -> Option<Recipient> {
        self.lock().recipients.iter().find(|r| r.id == id).cloned()
    }

    pub fn snapshot(&self) -> Vec<Recipient> {
        self.lock().recipients.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().recipients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().recipients.is_empty()
    }

    /// Confirmed chain operations, oldest first
    pub fn transactions(&self) -> Vec<TransactionRecord> {
        self.lock().transactions.clone()
    }

    /// Every status change so far, oldest first
    pub fn status_events(&self) -> Vec<StatusChange> {
        self.lock().history.clone()
    }

    /// Live feed of status changes
    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.events.subscribe()
    }

    /// Moves every `ready` recipient accepted by `eligible` to `pending` and
    /// returns them
    ///
    /// Claiming happens under one lock, so two runs never claim the same
    /// recipient.
    pub(crate) fn claim_ready(
        &self,
        eligible: impl Fn(&Recipient) -> bool,
        at_millis: u64,
    ) -> Vec<Recipient> {
        let mut state = self.lock();
        let mut claimed = Vec::new();
        let mut changes = Vec::new();
        for recipient in state
            .recipients
            .iter_mut()
            .filter(|r| r.status == RecipientStatus::Ready && eligible(r))
        {
            recipient.status = RecipientStatus::Pending;
            recipient.error = None;
            changes.push(recipient.id);
            claimed.push(recipient.clone());
        }
        for id in changes {
            self.push_change(
                &mut state,
                id,
                RecipientStatus::Ready,
                RecipientStatus::Pending,
                at_millis,
            );
        }
        claimed
    }

    /// Applies a checked status change, then lets `update` fill in the other
    /// fields while the lock is held
    pub(crate) fn transition(
        &self,
        id: RecipientId,
        to: RecipientStatus,
        at_millis: u64,
        update: impl FnOnce(&mut Recipient),
    ) -> Result<()> {
        let mut state = self.lock();
        let recipient = state.find_mut(id)?;
        let from = recipient.status;
        if !from.can_transition(to, recipient.is_same_chain) {
            return Err(BulkPayError::InvalidTransition { id, from, to });
        }

        recipient.status = to;
        if to != RecipientStatus::Failed {
            recipient.error = None;
        }
        update(recipient);
        self.push_change(&mut state, id, from, to, at_millis);
        Ok(())
    }

    pub(crate) fn fail(
        &self,
        id: RecipientId,
        error: impl Into<String>,
        at_millis: u64,
    ) -> Result<()> {
        let error = error.into();
        self.transition(id, RecipientStatus::Failed, at_millis, |r| {
            r.error = Some(error);
        })
    }

    pub(crate) fn record_transaction(&self, record: TransactionRecord) {
        debug!(
            record_id = %record.id,
            tx_hash = %record.tx_hash,
            chain_id = record.chain_id,
            event = "transaction_recorded"
        );
        self.lock().transactions.push(record);
    }

    fn push_change(
        &self,
        state: &mut BatchState,
        recipient: RecipientId,
        from: RecipientStatus,
        to: RecipientStatus,
        at_millis: u64,
    ) {
        let change = StatusChange {
            recipient,
            from,
            to,
            at_millis,
        };
        state.history.push(change.clone());
        // No subscribers is fine
        let _ = self.events.send(change);
    }
}
