//! A complete payout against the in-memory fakes
//!
//! Imports the sample CSV, estimates fees, pays everyone from Ethereum and
//! prints the exported result. One recipient's attestation never arrives, so
//! the run shows a timeout alongside successful transfers.
//!
//! Run with: `RUST_LOG=cctp_bulk_pay=info cargo run --example simulated_payout`

use cctp_bulk_pay::importer::{export_csv, parse_csv, sample_csv};
use cctp_bulk_pay::testing::{FakeAttestationService, FakeChainClient, FakeClock, FakeWallet};
use cctp_bulk_pay::{
    ChainRegistry, NetworkMode, Orchestrator, RecipientBatch, Settings, TransferMethod,
    UsdcAmount,
};
use tracing_subscriber::EnvFilter;

const ETHEREUM: u64 = 1;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let registry = ChainRegistry::builtin();
    let batch = RecipientBatch::new();
    let drafts = parse_csv(&sample_csv(), &registry, NetworkMode::Mainnet)?;
    batch.add_all(drafts, Some(ETHEREUM));

    let wallet = FakeWallet::connected(ETHEREUM);
    wallet.fund(ETHEREUM, FakeWallet::ACCOUNT, UsdcAmount::whole(1_000));
    let chain = FakeChainClient::new(wallet.clone());
    let attestations = FakeAttestationService::new(&chain);
    let stuck = batch.snapshot()[2].address;
    attestations.always_pending_for(stuck);

    let clock = FakeClock::new();
    let orchestrator = Orchestrator::builder()
        .wallet(wallet.clone())
        .chain(chain)
        .attestations(attestations)
        .clock(clock.clone())
        .registry(registry)
        .build();

    for method in [TransferMethod::SameChain, TransferMethod::Fast] {
        let settings = Settings {
            transfer_method: method,
            ..Settings::default()
        };
        let estimate = orchestrator.estimate_fees(&batch, &settings).await;
        println!(
            "{method}: estimated {} USDC ({:?})",
            estimate.total, estimate.source
        );

        let report = orchestrator.run(&batch, &settings).await?;
        println!(
            "{method}: {} completed, {} failed, {} untouched",
            report.completed.len(),
            report.failed.len(),
            report.untouched.len()
        );
    }

    println!("simulated waiting: {:?}", clock.total_sleep_time());
    println!(
        "operator balance left on Ethereum: {} USDC",
        wallet.balance(ETHEREUM, FakeWallet::ACCOUNT)
    );
    println!("\n{}", export_csv(&batch.snapshot()));
    for record in batch.transactions() {
        println!("{} {} on chain {}", record.id, record.tx_hash, record.chain_id);
    }

    Ok(())
}
