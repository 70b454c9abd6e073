//! # cctp-bulk-pay
//!
//! Bulk USDC payouts from one operator wallet to many recipients across EVM
//! chains, using Circle's Cross-Chain Transfer Protocol (CCTP v2).
//!
//! Recipients on the wallet's connected chain are paid with a plain ERC-20
//! transfer. Everyone else is paid by burning USDC on the connected chain,
//! waiting for Circle's attestation and minting on the recipient's chain.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use alloy_primitives::address;
//! use alloy_provider::ProviderBuilder;
//! use cctp_bulk_pay::providers::{AlloySession, IrisClient, TokioClock};
//! use cctp_bulk_pay::traits::Wallet;
//! use cctp_bulk_pay::{importer, BulkPayConfig, ChainRegistry, NetworkMode, Orchestrator, RecipientBatch, Settings};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BulkPayConfig::from_env()?;
//! let registry = ChainRegistry::builtin();
//! let mode = NetworkMode::Testnet;
//!
//! let base = registry.get(84532, mode)?.clone();
//! let arbitrum = registry.get(421614, mode)?.clone();
//! let session = Arc::new(
//!     AlloySession::new(address!("742d35Cc6634C0532925a3b844Bc454e4438f44e"), base.id)
//!         .with_chain(base.clone(), ProviderBuilder::new().connect(base.rpc_url).await?)
//!         .with_chain(arbitrum.clone(), ProviderBuilder::new().connect(arbitrum.rpc_url).await?),
//! );
//! session.connect().await?;
//!
//! let batch = RecipientBatch::new();
//! let csv = std::fs::read_to_string("payouts.csv")?;
//! batch.add_all(importer::parse_csv(&csv, &registry, mode)?, Some(base.id));
//!
//! let orchestrator = Orchestrator::builder()
//!     .wallet(session.clone())
//!     .chain(session)
//!     .attestations(IrisClient::new(config.iris_url(mode)))
//!     .clock(TokioClock::new())
//!     .registry(registry)
//!     .config(config)
//!     .build();
//!
//! let settings = Settings { network_mode: mode, ..Settings::default() };
//! let estimate = orchestrator.estimate_fees(&batch, &settings).await;
//! println!("estimated cost: {} USDC", estimate.total);
//!
//! let report = orchestrator.run(&batch, &settings).await?;
//! println!("{} paid, {} failed", report.completed.len(), report.failed.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Public API
//!
//! - [`RecipientBatch`] - recipients, their status machine and the transaction log
//! - [`Orchestrator`] - executes a batch with a [`TransferMethod`]
//! - [`FeeEstimator`] - live and fallback cost estimates
//! - [`importer`] - CSV import and export
//! - [`ChainRegistry`] - supported chains per [`NetworkMode`]
//! - [`traits`] - wallet, chain, attestation and clock seams, with production
//!   implementations in [`providers`] and fakes in [`testing`]

mod batch;
mod chain;
mod contracts;
mod error;
mod fees;
mod orchestrator;
mod protocol;
mod settings;

pub mod config;
pub mod importer;
pub mod providers;
pub mod testing;
pub mod traits;

pub use batch::{
    Recipient, RecipientBatch, RecipientDraft, RecipientId, RecipientStatus, StatusChange,
    TransactionKind, TransactionRecord, TransactionStatus,
};
pub use chain::addresses::{
    CCTP_V2_MESSAGE_TRANSMITTER_MAINNET, CCTP_V2_MESSAGE_TRANSMITTER_TESTNET,
    CCTP_V2_TOKEN_MESSENGER_MAINNET, CCTP_V2_TOKEN_MESSENGER_TESTNET,
};
pub use chain::{Chain, ChainRegistry, NetworkMode};
pub use config::BulkPayConfig;
pub use contracts::{MessageTransmitterV2Contract, TokenMessengerV2Contract, UsdcContract};
pub use error::{BulkPayError, ImportLineError, Result};
pub use fees::{FallbackFees, FeeConfig, FeeEstimate, FeeEstimator, FeeSource};
pub use orchestrator::{AttestationPoller, Orchestrator, PollingConfig, RunReport, TransferMethod};
pub use protocol::{
    AttestationStatus, BurnParams, DomainId, FeeScheduleEntry, FinalityThreshold,
    MessagesResponse, SignedMessage, UsdcAmount, DEFAULT_FAST_MAX_FEE_BPS, USDC_DECIMALS,
};
pub use settings::{JsonFileStore, PersistedState, Settings, SharedSettings, StateStore};

// Public module for advanced users who need custom instrumentation
pub mod spans;
