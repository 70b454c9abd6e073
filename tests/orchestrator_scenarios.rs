//! End-to-end payout runs against the in-memory fakes

use std::time::Duration;

use alloy_primitives::{address, Address, U256};
use cctp_bulk_pay::testing::{
    ChainCall, ChainOp, FakeAttestation, FakeAttestationService, FakeChainClient, FakeClock,
    FakeWallet,
};
use cctp_bulk_pay::traits::Wallet;
use cctp_bulk_pay::{
    BulkPayError, Chain, ChainRegistry, FeeSource, FinalityThreshold, NetworkMode, Orchestrator,
    RecipientBatch, RecipientDraft, RecipientId, RecipientStatus, Settings, SharedSettings,
    TransactionKind, TransferMethod, UsdcAmount,
};

const BASE: u64 = 8453;
const ARBITRUM: u64 = 42161;
const OPTIMISM: u64 = 10;

const ALICE: Address = address!("742d35Cc6634C0532925a3b844Bc454e4438f44e");
const BOB: Address = address!("0987654321098765432109876543210987654321");
const CAROL: Address = address!("1234567890123456789012345678901234567890");

type FakeOrchestrator = Orchestrator<FakeWallet, FakeChainClient, FakeAttestationService, FakeClock>;

struct Harness {
    source: u64,
    wallet: FakeWallet,
    chain: FakeChainClient,
    attestations: FakeAttestationService,
    clock: FakeClock,
    orchestrator: FakeOrchestrator,
    batch: RecipientBatch,
}

impl Harness {
    /// Wallet connected on `source` holding 1000 USDC there
    fn on(source: u64) -> Self {
        Self::with_registry(source, ChainRegistry::builtin())
    }

    fn with_registry(source: u64, registry: ChainRegistry) -> Self {
        let wallet = FakeWallet::connected(source);
        wallet.fund(source, FakeWallet::ACCOUNT, UsdcAmount::whole(1_000));
        let chain = FakeChainClient::new(wallet.clone());
        let attestations = FakeAttestationService::new(&chain);
        let clock = FakeClock::new();

        let orchestrator = Orchestrator::builder()
            .wallet(wallet.clone())
            .chain(chain.clone())
            .attestations(attestations.clone())
            .clock(clock.clone())
            .registry(registry)
            .build();

        Self {
            source,
            wallet,
            chain,
            attestations,
            clock,
            orchestrator,
            batch: RecipientBatch::new(),
        }
    }

    /// Adds a recipient as seen from the chain the harness started on
    fn add(&self, address: Address, chain_id: u64, amount: u64) -> RecipientId {
        let chain_name = self
            .orchestrator
            .registry()
            .get(chain_id, NetworkMode::Mainnet)
            .map(|c| c.name.to_string())
            .unwrap_or_default();

        self.batch.add(
            RecipientDraft {
                address,
                chain_id,
                chain_name,
                amount: UsdcAmount::whole(amount),
            },
            Some(self.source),
        )
    }

    fn status(&self, id: RecipientId) -> RecipientStatus {
        self.batch.get(id).unwrap().status
    }

    fn error(&self, id: RecipientId) -> Option<String> {
        self.batch.get(id).unwrap().error
    }

    fn kinds_for(&self, id: RecipientId) -> Vec<TransactionKind> {
        self.batch
            .transactions()
            .into_iter()
            .filter(|t| t.recipient_id == id)
            .map(|t| t.kind)
            .collect()
    }
}

fn settings(method: TransferMethod) -> Settings {
    Settings {
        transfer_method: method,
        ..Settings::default()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_one_attestation_timeout_does_not_stop_the_batch() {
    init_tracing();
    let h = Harness::on(BASE);
    let first = h.add(ALICE, ARBITRUM, 10);
    let second = h.add(BOB, ARBITRUM, 20);
    let third = h.add(CAROL, ARBITRUM, 30);
    h.attestations.always_pending_for(BOB);

    let report = h
        .orchestrator
        .run(&h.batch, &settings(TransferMethod::Fast))
        .await
        .unwrap();

    assert_eq!(report.completed, vec![first, third]);
    assert_eq!(report.failed, vec![second]);
    assert_eq!(h.status(first), RecipientStatus::Completed);
    assert_eq!(h.status(third), RecipientStatus::Completed);
    assert_eq!(h.status(second), RecipientStatus::Failed);
    assert_eq!(
        h.error(second).as_deref(),
        Some("Attestation timeout after 10 attempts")
    );

    assert_eq!(
        h.kinds_for(first),
        vec![TransactionKind::Burn, TransactionKind::Mint]
    );
    assert_eq!(
        h.kinds_for(third),
        vec![TransactionKind::Burn, TransactionKind::Mint]
    );
    assert_eq!(h.kinds_for(second), vec![TransactionKind::Burn]);

    // Only the stuck burn was polled past its first attempt
    assert_eq!(h.clock.sleep_count(), 10);
    assert_eq!(h.clock.total_sleep_time(), Duration::from_secs(50));
    let stuck_burn = h.batch.get(second).unwrap().tx_hash.unwrap();
    assert_eq!(h.attestations.message_queries(stuck_burn), 10);
    assert_eq!(h.chain.unminted_burns(), vec![stuck_burn]);

    assert_eq!(h.wallet.balance(ARBITRUM, ALICE), UsdcAmount::whole(10));
    assert_eq!(h.wallet.balance(ARBITRUM, BOB), UsdcAmount::ZERO);
    assert_eq!(h.wallet.balance(ARBITRUM, CAROL), UsdcAmount::whole(30));
    assert_eq!(
        h.wallet.balance(BASE, FakeWallet::ACCOUNT),
        UsdcAmount::whole(940)
    );

    // Back to the source before each burn, to the destination before each mint
    assert_eq!(h.wallet.switch_log(), vec![ARBITRUM, BASE, ARBITRUM]);
}

#[tokio::test]
async fn test_transaction_records_name_the_chain_they_ran_on() {
    let h = Harness::on(BASE);
    let id = h.add(ALICE, OPTIMISM, 5);

    h.orchestrator
        .run(&h.batch, &settings(TransferMethod::Standard))
        .await
        .unwrap();

    let records = h.batch.transactions();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, format!("burn-{id}"));
    assert_eq!(records[0].chain_id, BASE);
    assert_eq!(records[1].id, format!("mint-{id}"));
    assert_eq!(records[1].chain_id, OPTIMISM);
    assert!(records[0].timestamp >= FakeClock::START_UNIX_MILLIS);
    assert_eq!(h.batch.get(id).unwrap().tx_hash, Some(records[1].tx_hash));
}

#[tokio::test]
async fn test_method_change_mid_run_does_not_affect_in_flight_polling() {
    let h = Harness::on(BASE);
    let first = h.add(ALICE, ARBITRUM, 10);
    let second = h.add(BOB, OPTIMISM, 10);
    h.attestations.script_recipient(
        ALICE,
        vec![
            FakeAttestation::NotFound,
            FakeAttestation::Pending,
            FakeAttestation::Complete,
        ],
    );
    h.attestations.script_recipient(
        BOB,
        vec![FakeAttestation::PendingConfirmations, FakeAttestation::Complete],
    );

    let shared = SharedSettings::new(settings(TransferMethod::Fast));
    let ui = shared.clone();
    h.clock
        .on_sleep(move |_| ui.set_transfer_method(TransferMethod::Standard));

    let report = h.orchestrator.execute(&h.batch, &shared).await.unwrap();

    assert_eq!(report.completed, vec![first, second]);
    assert_eq!(shared.snapshot().transfer_method, TransferMethod::Standard);
    assert_eq!(h.clock.sleep_log(), vec![Duration::from_secs(5); 3]);

    for call in h.chain.calls_of(ChainOp::DepositForBurn) {
        let ChainCall::DepositForBurn { params, .. } = call else {
            unreachable!()
        };
        assert_eq!(params.min_finality_threshold, FinalityThreshold::Fast);
    }
    assert_eq!(
        h.batch.get(second).unwrap().method,
        Some(TransferMethod::Fast)
    );
}

#[tokio::test]
async fn test_each_burn_polls_with_its_own_method() {
    let h = Harness::on(BASE);
    let fast = h.add(ALICE, ARBITRUM, 10);
    h.attestations
        .script_recipient(ALICE, vec![FakeAttestation::Pending, FakeAttestation::Complete]);
    h.orchestrator
        .run(&h.batch, &settings(TransferMethod::Fast))
        .await
        .unwrap();

    h.wallet.switch_network(BASE).await.unwrap();
    let standard = h.add(BOB, ARBITRUM, 10);
    h.attestations
        .script_recipient(BOB, vec![FakeAttestation::Pending, FakeAttestation::Complete]);
    h.orchestrator
        .run(&h.batch, &settings(TransferMethod::Standard))
        .await
        .unwrap();

    assert_eq!(
        h.clock.sleep_log(),
        vec![Duration::from_secs(5), Duration::from_secs(30)]
    );
    assert_eq!(h.batch.get(fast).unwrap().method, Some(TransferMethod::Fast));
    assert_eq!(
        h.batch.get(standard).unwrap().method,
        Some(TransferMethod::Standard)
    );

    let burns = h.chain.calls_of(ChainOp::DepositForBurn);
    let ChainCall::DepositForBurn { params: fast_burn, .. } = &burns[0] else {
        unreachable!()
    };
    let ChainCall::DepositForBurn { params: standard_burn, .. } = &burns[1] else {
        unreachable!()
    };
    // 10 USDC at 14 bps
    assert_eq!(fast_burn.max_fee, UsdcAmount::from_atomic(U256::from(14_000u64)));
    assert!(standard_burn.max_fee.is_zero());
    assert_eq!(standard_burn.min_finality_threshold, FinalityThreshold::Standard);
}

#[tokio::test]
async fn test_rejected_burn_returns_recipient_to_ready() {
    let h = Harness::on(BASE);
    let id = h.add(ALICE, ARBITRUM, 25);
    h.chain.reject_next(ChainOp::DepositForBurn);

    let report = h
        .orchestrator
        .run(&h.batch, &settings(TransferMethod::Fast))
        .await
        .unwrap();

    assert_eq!(report.reset, vec![id]);
    let recipient = h.batch.get(id).unwrap();
    assert_eq!(recipient.status, RecipientStatus::Ready);
    assert_eq!(recipient.error, None);
    assert_eq!(recipient.method, None);
    assert!(h.batch.transactions().is_empty());

    // Eligible again on the next run; the earlier approval is reused
    let report = h
        .orchestrator
        .run(&h.batch, &settings(TransferMethod::Fast))
        .await
        .unwrap();
    assert_eq!(report.completed, vec![id]);
    assert_eq!(h.chain.calls_of(ChainOp::Approve).len(), 1);
    assert_eq!(h.chain.calls_of(ChainOp::DepositForBurn).len(), 2);
    assert_eq!(h.wallet.balance(ARBITRUM, ALICE), UsdcAmount::whole(25));
}

#[tokio::test]
async fn test_rejected_approval_returns_recipient_to_ready() {
    let h = Harness::on(BASE);
    let id = h.add(ALICE, ARBITRUM, 25);
    h.chain.reject_next(ChainOp::Approve);

    let report = h
        .orchestrator
        .run(&h.batch, &settings(TransferMethod::Standard))
        .await
        .unwrap();

    assert_eq!(report.reset, vec![id]);
    assert_eq!(h.status(id), RecipientStatus::Ready);
    assert!(h.chain.calls_of(ChainOp::DepositForBurn).is_empty());
}

#[tokio::test]
async fn test_same_chain_payout() {
    let h = Harness::on(BASE);
    let local = h.add(ALICE, BASE, 40);
    let remote = h.add(BOB, ARBITRUM, 10);
    let mut events = h.batch.subscribe();

    let report = h
        .orchestrator
        .run(&h.batch, &settings(TransferMethod::SameChain))
        .await
        .unwrap();

    assert_eq!(report.completed, vec![local]);
    assert_eq!(report.untouched, vec![remote]);
    assert_eq!(h.status(remote), RecipientStatus::Ready);
    assert_eq!(h.kinds_for(local), vec![TransactionKind::Transfer]);
    assert_eq!(h.wallet.balance(BASE, ALICE), UsdcAmount::whole(40));
    assert!(h.wallet.switch_log().is_empty());

    let mut path = Vec::new();
    while let Ok(change) = events.try_recv() {
        assert_eq!(change.recipient, local);
        path.push((change.from, change.to));
    }
    assert_eq!(
        path,
        vec![
            (RecipientStatus::Ready, RecipientStatus::Pending),
            (RecipientStatus::Pending, RecipientStatus::Transferring),
            (RecipientStatus::Transferring, RecipientStatus::Completed),
        ]
    );
}

#[tokio::test]
async fn test_cross_chain_run_leaves_same_chain_recipients_alone() {
    let h = Harness::on(BASE);
    let local = h.add(ALICE, BASE, 40);
    let remote = h.add(BOB, ARBITRUM, 10);

    let report = h
        .orchestrator
        .run(&h.batch, &settings(TransferMethod::Fast))
        .await
        .unwrap();

    assert_eq!(report.completed, vec![remote]);
    assert_eq!(report.untouched, vec![local]);
    assert!(h.chain.calls_of(ChainOp::Transfer).is_empty());
}

#[tokio::test]
async fn test_insufficient_balance_fails_before_any_transaction() {
    let h = Harness::on(BASE);
    let id = h.add(ALICE, ARBITRUM, 5_000);

    let report = h
        .orchestrator
        .run(&h.batch, &settings(TransferMethod::Fast))
        .await
        .unwrap();

    assert_eq!(report.failed, vec![id]);
    assert_eq!(
        h.error(id).as_deref(),
        Some("Insufficient USDC balance. You have 1000 USDC but need 5000 USDC")
    );
    assert!(h.chain.calls().is_empty());
}

#[tokio::test]
async fn test_mint_revert_fails_recipient_after_burn() {
    let h = Harness::on(BASE);
    let id = h.add(ALICE, ARBITRUM, 10);
    h.chain.revert_next(ChainOp::ReceiveMessage, "Nonce already used");

    let report = h
        .orchestrator
        .run(&h.batch, &settings(TransferMethod::Fast))
        .await
        .unwrap();

    assert_eq!(report.failed, vec![id]);
    let recipient = h.batch.get(id).unwrap();
    assert_eq!(
        recipient.error.as_deref(),
        Some("Chain operation failed: Nonce already used")
    );
    assert!(recipient.attestation.is_some());
    assert_eq!(recipient.tx_hash, h.chain.unminted_burns().first().copied());
    assert_eq!(h.kinds_for(id), vec![TransactionKind::Burn]);
}

#[tokio::test]
async fn test_failed_network_switch_fails_the_mint() {
    let h = Harness::on(BASE);
    let id = h.add(ALICE, ARBITRUM, 10);
    h.wallet.fail_switch_to(ARBITRUM);

    h.orchestrator
        .run(&h.batch, &settings(TransferMethod::Fast))
        .await
        .unwrap();

    assert_eq!(h.status(id), RecipientStatus::Failed);
    assert!(h
        .error(id)
        .unwrap()
        .starts_with("Failed to switch to chain 42161"));
    assert!(h.chain.calls_of(ChainOp::ReceiveMessage).is_empty());
}

#[tokio::test]
async fn test_same_domain_destination_fails_without_chain_calls() {
    let builtin = ChainRegistry::builtin();
    let mainnet = builtin.chains(NetworkMode::Mainnet).to_vec();
    let base = builtin.get(BASE, NetworkMode::Mainnet).unwrap().clone();
    let fork = Chain {
        id: 999_8453,
        name: "Base Fork",
        ..base
    };
    let registry = ChainRegistry::new(
        mainnet.into_iter().chain([fork.clone()]).collect(),
        builtin.chains(NetworkMode::Testnet).to_vec(),
    );

    let h = Harness::with_registry(BASE, registry);
    let id = h.add(ALICE, fork.id, 10);

    let report = h
        .orchestrator
        .run(&h.batch, &settings(TransferMethod::Fast))
        .await
        .unwrap();

    assert_eq!(report.failed, vec![id]);
    assert_eq!(
        h.error(id).as_deref(),
        Some("Source and destination share CCTP domain 6")
    );
    assert!(h.chain.calls().is_empty());
}

#[tokio::test]
async fn test_batch_level_failures_touch_no_recipient() {
    let h = Harness::on(BASE);
    let id = h.add(ALICE, ARBITRUM, 10);

    // Wallet sitting on a testnet while the operator works on mainnet
    h.wallet.set_active_chain(84532);
    let err = h
        .orchestrator
        .run(&h.batch, &settings(TransferMethod::Fast))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BulkPayError::NetworkMismatch {
            chain_id: 84532,
            ..
        }
    ));

    h.wallet.set_active_chain(56);
    let err = h
        .orchestrator
        .run(&h.batch, &settings(TransferMethod::Fast))
        .await
        .unwrap_err();
    assert!(matches!(err, BulkPayError::UnsupportedChain { chain_id: 56 }));

    assert_eq!(h.status(id), RecipientStatus::Ready);
    assert!(h.batch.status_events().is_empty());
}

#[tokio::test]
async fn test_disconnected_wallet_cannot_run() {
    let wallet = FakeWallet::disconnected(BASE);
    let chain = FakeChainClient::new(wallet.clone());
    let orchestrator = Orchestrator::builder()
        .wallet(wallet)
        .attestations(FakeAttestationService::new(&chain))
        .chain(chain)
        .clock(FakeClock::new())
        .build();

    let err = orchestrator
        .run(&RecipientBatch::new(), &Settings::default())
        .await
        .unwrap_err();
    assert!(matches!(err, BulkPayError::WalletNotConnected));
}

#[tokio::test]
async fn test_concurrent_runs_pay_each_recipient_once() {
    let h = Harness::on(BASE);
    let ids: Vec<_> = [ALICE, BOB, CAROL]
        .into_iter()
        .map(|address| h.add(address, ARBITRUM, 10))
        .collect();

    let fast = settings(TransferMethod::Fast);
    let (a, b) = tokio::join!(
        h.orchestrator.run(&h.batch, &fast),
        h.orchestrator.run(&h.batch, &fast)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    let mut completed: Vec<_> = a.completed.into_iter().chain(b.completed).collect();
    completed.sort();
    assert_eq!(completed, ids);
    assert_eq!(h.chain.calls_of(ChainOp::DepositForBurn).len(), 3);
    assert_eq!(h.chain.calls_of(ChainOp::ReceiveMessage).len(), 3);
}

#[tokio::test]
async fn test_reset_failed_recipients_are_retried() {
    let h = Harness::on(BASE);
    let id = h.add(ALICE, ARBITRUM, 10);
    h.chain.revert_next(ChainOp::DepositForBurn, "execution reverted");

    h.orchestrator
        .run(&h.batch, &settings(TransferMethod::Fast))
        .await
        .unwrap();
    assert_eq!(h.status(id), RecipientStatus::Failed);

    assert_eq!(h.batch.reset_failed(), 1);
    let report = h
        .orchestrator
        .run(&h.batch, &settings(TransferMethod::Fast))
        .await
        .unwrap();

    assert_eq!(report.completed, vec![id]);
    assert_eq!(h.error(id), None);
}

#[tokio::test]
async fn test_fee_outage_falls_back() {
    let h = Harness::on(BASE);
    h.add(ALICE, ARBITRUM, 10);
    h.attestations.set_fee_outage(true);

    let estimate = h
        .orchestrator
        .estimate_fees(&h.batch, &settings(TransferMethod::Fast))
        .await;

    assert_eq!(estimate.source, FeeSource::Fallback);
    assert_eq!(estimate.total, UsdcAmount::whole(20));
    assert_eq!(h.attestations.fee_queries(), vec![(6, 3)]);
}

#[tokio::test]
async fn test_estimate_on_other_network_mode_falls_back() {
    let h = Harness::on(BASE);
    h.add(ALICE, ARBITRUM, 10);
    // Operator moves the wallet to Sepolia while the batch is mainnet
    h.wallet.set_active_chain(11_155_111);

    let estimate = h
        .orchestrator
        .estimate_fees(&h.batch, &settings(TransferMethod::Fast))
        .await;

    assert_eq!(estimate, h.orchestrator.config().fees.fallback(TransferMethod::Fast));
    assert_eq!(estimate.source, FeeSource::Fallback);
    assert!(h.attestations.fee_queries().is_empty());
}

#[tokio::test]
async fn test_estimate_without_usable_wallet_falls_back() {
    let h = Harness::on(BASE);
    h.add(ALICE, BASE, 10);

    h.wallet.set_active_chain(999_999);
    let unsupported = h
        .orchestrator
        .estimate_fees(&h.batch, &settings(TransferMethod::SameChain))
        .await;
    assert_eq!(unsupported.source, FeeSource::Fallback);
    assert_eq!(unsupported.total, UsdcAmount::whole(5));

    let disconnected = Orchestrator::builder()
        .wallet(FakeWallet::disconnected(BASE))
        .chain(h.chain.clone())
        .attestations(h.attestations.clone())
        .clock(FakeClock::new())
        .build();
    let estimate = disconnected
        .estimate_fees(&h.batch, &settings(TransferMethod::Standard))
        .await;
    assert_eq!(estimate.source, FeeSource::Fallback);
    assert_eq!(estimate.total, UsdcAmount::whole(15));
}

#[tokio::test]
async fn test_status_events_use_orchestrator_clock() {
    let h = Harness::on(BASE);
    let id = h.add(ALICE, ARBITRUM, 10);
    h.clock.advance(Duration::from_secs(60));

    h.orchestrator
        .run(&h.batch, &settings(TransferMethod::Fast))
        .await
        .unwrap();

    let events = h.batch.status_events();
    assert_eq!(events[0].to, RecipientStatus::Pending);
    assert_eq!(events[0].at_millis, FakeClock::START_UNIX_MILLIS + 60_000);
    assert!(events.windows(2).all(|w| w[0].at_millis <= w[1].at_millis));

    let completed = events.last().unwrap();
    assert_eq!((completed.recipient, completed.to), (id, RecipientStatus::Completed));
    let mint = h.batch.transactions().pop().unwrap();
    assert_eq!(mint.kind, TransactionKind::Mint);
    assert_eq!(completed.at_millis, mint.timestamp);
}
