//! Drives recipients through their payout
//!
//! A run claims the `ready` recipients of the partition selected by the
//! transfer method and pays them one at a time:
//!
//! - same chain: `pending -> transferring -> completed`, one ERC-20 transfer
//! - cross chain: `pending -> burning -> attesting -> minting -> completed`,
//!   a CCTP burn on the source chain, an attestation from Circle and a mint on
//!   the destination chain
//!
//! A recipient that fails is marked `failed` and the run moves on. A rejected
//! wallet prompt puts the recipient back to `ready` instead.

mod method;
mod poller;
mod polling;

pub use method::TransferMethod;
pub use poller::AttestationPoller;
pub use polling::PollingConfig;

use alloy_primitives::Address;
use bon::Builder;
use tokio::sync::Mutex;
use tracing::{debug, info, warn, Instrument};

use crate::batch::{
    Recipient, RecipientBatch, RecipientId, RecipientStatus, TransactionKind, TransactionRecord,
};
use crate::chain::{Chain, ChainRegistry};
use crate::config::BulkPayConfig;
use crate::error::{BulkPayError, Result};
use crate::fees::{FeeEstimate, FeeEstimator};
use crate::protocol::BurnParams;
use crate::settings::{Settings, SharedSettings};
use crate::spans;
use crate::traits::{AttestationService, ChainClient, Clock, Wallet};

/// Outcome of one run, by recipient
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub completed: Vec<RecipientId>,
    pub failed: Vec<RecipientId>,
    /// Put back to `ready` after the operator rejected a wallet prompt
    pub reset: Vec<RecipientId>,
    /// `ready` recipients the run's transfer method does not cover
    pub untouched: Vec<RecipientId>,
}

enum Outcome {
    Completed,
    Failed,
    Reset,
}

/// The payout engine
///
/// Holds the collaborators and serializes every chain-mutating operation of
/// the signer, so concurrent runs over the same batch never interleave
/// transactions.
///
/// ```rust,no_run
/// use cctp_bulk_pay::testing::{FakeAttestationService, FakeChainClient, FakeClock, FakeWallet};
/// use cctp_bulk_pay::{Orchestrator, RecipientBatch, Settings};
///
/// # async fn example() -> cctp_bulk_pay::Result<()> {
/// let wallet = FakeWallet::connected(8453);
/// let chain = FakeChainClient::new(wallet.clone());
/// let orchestrator = Orchestrator::builder()
///     .wallet(wallet)
///     .attestations(FakeAttestationService::new(&chain))
///     .chain(chain)
///     .clock(FakeClock::new())
///     .build();
///
/// let batch = RecipientBatch::new();
/// let report = orchestrator.run(&batch, &Settings::default()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Builder)]
pub struct Orchestrator<W, C, A, K> {
    wallet: W,
    chain: C,
    attestations: A,
    clock: K,
    #[builder(default)]
    registry: ChainRegistry,
    #[builder(default)]
    config: BulkPayConfig,
    #[builder(skip)]
    signer: Mutex<()>,
}

impl<W, C, A, K> Orchestrator<W, C, A, K>
where
    W: Wallet,
    C: ChainClient,
    A: AttestationService,
    K: Clock,
{
    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn config(&self) -> &BulkPayConfig {
        &self.config
    }

    pub fn fee_estimator(&self) -> FeeEstimator<'_, C, A> {
        FeeEstimator::new(
            &self.chain,
            &self.attestations,
            &self.registry,
            &self.config.fees,
        )
    }

    /// Estimates the cost of the next run with the given settings
    ///
    /// Read-only; safe to call while a run is in flight. Never fails: when the
    /// connected chain cannot be read or is not usable in
    /// `settings.network_mode`, the method's fallback estimate is returned.
    pub async fn estimate_fees(&self, batch: &RecipientBatch, settings: &Settings) -> FeeEstimate {
        let method = settings.transfer_method;
        let source = match self.source_chain(settings).await {
            Ok(source) => source,
            Err(e) if e.is_network_change() || matches!(e, BulkPayError::NetworkMismatch { .. }) => {
                debug!(error = %e, method = %method, event = "fee_estimate_network_changed");
                return self.config.fees.fallback(method);
            }
            Err(e) => {
                warn!(error = %e, method = %method, event = "fee_estimate_fallback");
                return self.config.fees.fallback(method);
            }
        };

        self.fee_estimator()
            .estimate(&batch.snapshot(), method, &source)
            .await
    }

    /// Runs with whatever `settings` hold right now
    ///
    /// Later changes to `settings` do not affect this run.
    pub async fn execute(&self, batch: &RecipientBatch, settings: &SharedSettings) -> Result<RunReport> {
        let snapshot = settings.snapshot();
        self.run(batch, &snapshot).await
    }

    /// Pays every `ready` recipient that `settings.transfer_method` covers
    ///
    /// # Errors
    ///
    /// Only batch-level problems are returned, before any recipient is
    /// touched: no connected wallet, or a connected chain that is unsupported
    /// or belongs to the other network mode. Recipient failures are recorded on
    /// the recipients and in the report.
    pub async fn run(&self, batch: &RecipientBatch, settings: &Settings) -> Result<RunReport> {
        let method = settings.transfer_method;
        let signer = self.wallet.address().ok_or(BulkPayError::WalletNotConnected)?;
        let source = self.source_chain(settings).await?;

        let _signer_guard = self.signer.lock().await;

        let untouched: Vec<RecipientId> = batch
            .snapshot()
            .into_iter()
            .filter(|r| r.status == RecipientStatus::Ready && !method.accepts(r.is_same_chain))
            .map(|r| r.id)
            .collect();
        let claimed = batch.claim_ready(
            |r| method.accepts(r.is_same_chain),
            self.clock.unix_millis(),
        );

        let span = spans::run(method, source.id, claimed.len());
        async {
            info!(
                method = %method,
                source_chain_id = source.id,
                claimed = claimed.len(),
                untouched = untouched.len(),
                event = "run_started"
            );

            let mut report = RunReport {
                untouched,
                ..RunReport::default()
            };
            for recipient in claimed {
                let id = recipient.id;
                match self
                    .process(batch, recipient, &source, signer, method, settings)
                    .await
                {
                    Outcome::Completed => report.completed.push(id),
                    Outcome::Failed => report.failed.push(id),
                    Outcome::Reset => report.reset.push(id),
                }
            }

            info!(
                completed = report.completed.len(),
                failed = report.failed.len(),
                reset = report.reset.len(),
                event = "run_finished"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn source_chain(&self, settings: &Settings) -> Result<Chain> {
        let chain_id = self.wallet.active_chain_id().await?;
        self.registry
            .resolve_connected(chain_id, settings.network_mode)
            .cloned()
    }

    /// Settles one claimed recipient; never fails the run
    async fn process(
        &self,
        batch: &RecipientBatch,
        recipient: Recipient,
        source: &Chain,
        signer: Address,
        method: TransferMethod,
        settings: &Settings,
    ) -> Outcome {
        let id = recipient.id;
        let span = spans::process_recipient(
            id,
            &recipient.address,
            recipient.chain_id,
            &recipient.amount,
            recipient.is_same_chain,
        );

        async {
            let result = if recipient.is_same_chain {
                self.pay_same_chain(batch, &recipient, source, signer, method)
                    .await
            } else {
                self.pay_cross_chain(batch, &recipient, source, signer, method, settings)
                    .await
            };

            match result {
                Ok(()) => {
                    info!(recipient_id = %id, event = "recipient_completed");
                    Outcome::Completed
                }
                Err(e) if e.is_user_rejection() => {
                    info!(recipient_id = %id, event = "recipient_reset_after_rejection");
                    let at = self.clock.unix_millis();
                    if let Err(err) = batch.transition(id, RecipientStatus::Ready, at, |r| {
                        r.method = None;
                    }) {
                        warn!(recipient_id = %id, error = %err, event = "reset_refused");
                    }
                    Outcome::Reset
                }
                Err(e) => {
                    spans::record_error(&e);
                    warn!(recipient_id = %id, error = %e, event = "recipient_failed");
                    let at = self.clock.unix_millis();
                    if let Err(err) = batch.fail(id, e.to_string(), at) {
                        warn!(recipient_id = %id, error = %err, event = "fail_refused");
                    }
                    Outcome::Failed
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn pay_same_chain(
        &self,
        batch: &RecipientBatch,
        recipient: &Recipient,
        source: &Chain,
        signer: Address,
        method: TransferMethod,
    ) -> Result<()> {
        if recipient.chain_id != source.id {
            return Err(BulkPayError::SourceChainMismatch {
                recipient_chain: recipient.chain_id,
                source_chain: source.id,
            });
        }

        batch.transition(
            recipient.id,
            RecipientStatus::Transferring,
            self.clock.unix_millis(),
            |r| r.method = Some(method),
        )?;
        self.ensure_active_chain(source).await?;
        self.ensure_balance(source, signer, recipient).await?;

        let tx_hash = self
            .chain
            .transfer(source, recipient.address, recipient.amount)
            .await?;
        info!(
            recipient_id = %recipient.id,
            tx_hash = %tx_hash,
            explorer = %source.explorer_tx_url(tx_hash),
            event = "transfer_confirmed"
        );

        batch.record_transaction(TransactionRecord::confirmed(
            TransactionKind::Transfer,
            recipient.id,
            recipient.address,
            recipient.amount,
            source.id,
            tx_hash,
            self.clock.unix_millis(),
        ));
        batch.transition(
            recipient.id,
            RecipientStatus::Completed,
            self.clock.unix_millis(),
            |r| r.tx_hash = Some(tx_hash),
        )
    }

    async fn pay_cross_chain(
        &self,
        batch: &RecipientBatch,
        recipient: &Recipient,
        source: &Chain,
        signer: Address,
        method: TransferMethod,
        settings: &Settings,
    ) -> Result<()> {
        let destination = self
            .registry
            .get(recipient.chain_id, settings.network_mode)?;
        self.registry.ensure_cross_domain(source, destination)?;
        let finality = method.finality_threshold().ok_or_else(|| {
            BulkPayError::InvalidConfig(format!("{method} transfers cannot burn"))
        })?;

        batch.transition(
            recipient.id,
            RecipientStatus::Burning,
            self.clock.unix_millis(),
            |r| r.method = Some(method),
        )?;
        self.ensure_active_chain(source).await?;
        self.ensure_balance(source, signer, recipient).await?;

        let messenger = source.token_messenger();
        let allowance = self.chain.allowance(source, signer, messenger).await?;
        if allowance < recipient.amount {
            let approval = self
                .chain
                .approve(source, messenger, recipient.amount)
                .await?;
            debug!(
                recipient_id = %recipient.id,
                tx_hash = %approval,
                spender = %messenger,
                event = "approval_confirmed"
            );
        }

        let params = BurnParams::new(
            recipient.amount,
            recipient.address,
            destination.domain,
            source.usdc,
            finality,
            self.config.fees.fast_max_fee_bps,
        );
        let burn_tx = self.chain.deposit_for_burn(source, &params).await?;
        info!(
            recipient_id = %recipient.id,
            tx_hash = %burn_tx,
            destination_domain = destination.domain.as_u32(),
            min_finality_threshold = finality.as_u32(),
            max_fee = %params.max_fee,
            explorer = %source.explorer_tx_url(burn_tx),
            event = "burn_confirmed"
        );

        batch.record_transaction(TransactionRecord::confirmed(
            TransactionKind::Burn,
            recipient.id,
            recipient.address,
            recipient.amount,
            source.id,
            burn_tx,
            self.clock.unix_millis(),
        ));
        batch.transition(
            recipient.id,
            RecipientStatus::Attesting,
            self.clock.unix_millis(),
            |r| r.tx_hash = Some(burn_tx),
        )?;

        // Cadence follows the method this burn was submitted with
        let polling = self.config.polling_for(method);
        let signed = AttestationPoller::new(&self.attestations, &self.clock)
            .poll(burn_tx, source.domain, polling)
            .await?;

        batch.transition(
            recipient.id,
            RecipientStatus::Minting,
            self.clock.unix_millis(),
            |r| r.attestation = Some(signed.attestation.clone()),
        )?;

        let mint_tx = async {
            self.ensure_active_chain(destination).await?;
            self.chain.receive_message(destination, &signed).await
        }
        .instrument(spans::mint(destination.id, signed.attestation.len()))
        .await?;
        info!(
            recipient_id = %recipient.id,
            tx_hash = %mint_tx,
            explorer = %destination.explorer_tx_url(mint_tx),
            event = "mint_confirmed"
        );

        batch.record_transaction(TransactionRecord::confirmed(
            TransactionKind::Mint,
            recipient.id,
            recipient.address,
            recipient.amount,
            destination.id,
            mint_tx,
            self.clock.unix_millis(),
        ));
        batch.transition(
            recipient.id,
            RecipientStatus::Completed,
            self.clock.unix_millis(),
            |r| r.tx_hash = Some(mint_tx),
        )
    }

    /// Switches the wallet to `chain` unless it is already there
    async fn ensure_active_chain(&self, chain: &Chain) -> Result<()> {
        let active = self.wallet.active_chain_id().await?;
        if active != chain.id {
            debug!(from = active, to = chain.id, event = "switching_network");
            self.wallet.switch_network(chain.id).await?;
        }
        Ok(())
    }

    async fn ensure_balance(&self, chain: &Chain, signer: Address, recipient: &Recipient) -> Result<()> {
        let available = self.chain.balance_of(chain, signer).await?;
        if available < recipient.amount {
            return Err(BulkPayError::InsufficientBalance {
                available: available.to_string(),
                required: recipient.amount.to_string(),
            });
        }
        Ok(())
    }
}
