//! Collaborator seams of the orchestrator
//!
//! The orchestrator never talks to a wallet, an RPC node or Circle's API
//! directly. It goes through these traits, so tests can drive every failure
//! mode (rejected prompts, reverts, outages, slow attestations) with the fakes
//! in [`crate::testing`] and without waiting on real time.
//!
//! Production implementations live in [`crate::providers`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy_primitives::{Address, TxHash};
use async_trait::async_trait;

use crate::chain::Chain;
use crate::error::Result;
use crate::protocol::{BurnParams, FeeScheduleEntry, MessagesResponse, SignedMessage, UsdcAmount};

/// What a wallet reports right after connecting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletSession {
    pub address: Address,
    pub chain_id: u64,
    /// USDC held on `chain_id`
    pub balance: UsdcAmount,
}

/// The operator's wallet: account and active chain context
///
/// The active chain is process-wide state shared with the [`ChainClient`];
/// every transaction is signed on whatever chain the wallet currently points
/// at.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Requests account access.
    ///
    /// # Errors
    ///
    /// [`WalletNotInstalled`](crate::BulkPayError::WalletNotInstalled) when no
    /// wallet is available, [`UserRejected`](crate::BulkPayError::UserRejected)
    /// when the operator declines.
    async fn connect(&self) -> Result<WalletSession>;

    /// Connected account, if any
    fn address(&self) -> Option<Address>;

    async fn active_chain_id(&self) -> Result<u64>;

    /// Points the wallet at `chain_id` and returns once the switch is complete.
    ///
    /// # Errors
    ///
    /// [`NetworkSwitchFailed`](crate::BulkPayError::NetworkSwitchFailed) or
    /// [`UserRejected`](crate::BulkPayError::UserRejected).
    async fn switch_network(&self, chain_id: u64) -> Result<()>;

    /// USDC balance of `owner` on the active chain
    async fn usdc_balance(&self, owner: Address) -> Result<UsdcAmount>;
}

/// Token and CCTP contract calls
///
/// Mutating calls are signed by the connected wallet on its active chain and
/// return only after the transaction has confirmed. A revert or a failed gas
/// estimate surfaces as
/// [`ChainOperationFailed`](crate::BulkPayError::ChainOperationFailed).
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn balance_of(&self, chain: &Chain, owner: Address) -> Result<UsdcAmount>;

    async fn allowance(&self, chain: &Chain, owner: Address, spender: Address)
        -> Result<UsdcAmount>;

    async fn approve(&self, chain: &Chain, spender: Address, amount: UsdcAmount) -> Result<TxHash>;

    /// Plain USDC transfer on `chain`
    async fn transfer(&self, chain: &Chain, to: Address, amount: UsdcAmount) -> Result<TxHash>;

    /// TokenMessengerV2 `depositForBurn` on the source `chain`
    async fn deposit_for_burn(&self, chain: &Chain, params: &BurnParams) -> Result<TxHash>;

    /// MessageTransmitterV2 `receiveMessage` on the destination `chain`
    async fn receive_message(&self, chain: &Chain, signed: &SignedMessage) -> Result<TxHash>;

    /// Current gas price on `chain`, in wei
    async fn gas_price(&self, chain: &Chain) -> Result<u128>;
}

/// Circle's attestation and fee service
#[async_trait]
pub trait AttestationService: Send + Sync {
    /// Messages emitted by the burn `tx_hash` on `source_domain`.
    ///
    /// # Errors
    ///
    /// An error usually means the service has not indexed the transaction yet;
    /// the poller treats it as "not ready".
    async fn messages(&self, source_domain: u32, tx_hash: TxHash) -> Result<MessagesResponse>;

    /// Fee schedule for burns from `source_domain` to `destination_domain`
    async fn fees(&self, source_domain: u32, destination_domain: u32)
        -> Result<Vec<FeeScheduleEntry>>;
}

/// Trait for time-based operations.
///
/// Abstracts sleep and time queries so tests can advance through polling loops
/// instantly.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Asynchronously sleeps for the given duration.
    async fn sleep(&self, duration: Duration);

    /// Returns the current instant in time.
    fn now(&self) -> Instant;

    /// Wall-clock time in unix milliseconds, used for transaction records
    fn unix_millis(&self) -> u64;
}

// One session commonly serves as both wallet and chain client
#[async_trait]
impl<T: Wallet + ?Sized> Wallet for Arc<T> {
    async fn connect(&self) -> Result<WalletSession> {
        (**self).connect().await
    }

    fn address(&self) -> Option<Address> {
        (**self).address()
    }

    async fn active_chain_id(&self) -> Result<u64> {
        (**self).active_chain_id().await
    }

    async fn switch_network(&self, chain_id: u64) -> Result<()> {
        (**self).switch_network(chain_id).await
    }

    async fn usdc_balance(&self, owner: Address) -> Result<UsdcAmount> {
        (**self).usdc_balance(owner).await
    }
}

#[async_trait]
impl<T: ChainClient + ?Sized> ChainClient for Arc<T> {
    async fn balance_of(&self, chain: &Chain, owner: Address) -> Result<UsdcAmount> {
        (**self).balance_of(chain, owner).await
    }

    async fn allowance(
        &self,
        chain: &Chain,
        owner: Address,
        spender: Address,
    ) -> Result<UsdcAmount> {
        (**self).allowance(chain, owner, spender).await
    }

    async fn approve(&self, chain: &Chain, spender: Address, amount: UsdcAmount) -> Result<TxHash> {
        (**self).approve(chain, spender, amount).await
    }

    async fn transfer(&self, chain: &Chain, to: Address, amount: UsdcAmount) -> Result<TxHash> {
        (**self).transfer(chain, to, amount).await
    }

    async fn deposit_for_burn(&self, chain: &Chain, params: &BurnParams) -> Result<TxHash> {
        (**self).deposit_for_burn(chain, params).await
    }

    async fn receive_message(&self, chain: &Chain, signed: &SignedMessage) -> Result<TxHash> {
        (**self).receive_message(chain, signed).await
    }

    async fn gas_price(&self, chain: &Chain) -> Result<u128> {
        (**self).gas_price(chain).await
    }
}
