//! Alloy-backed wallet and chain session

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use alloy_json_rpc::RpcError;
use alloy_network::{Ethereum, ReceiptResponse};
use alloy_primitives::{Address, TxHash};
use alloy_provider::Provider;
use alloy_rpc_types::TransactionRequest;
use alloy_transport::TransportErrorKind;
use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::chain::Chain;
use crate::contracts::{MessageTransmitterV2Contract, TokenMessengerV2Contract, UsdcContract};
use crate::error::{BulkPayError, Result};
use crate::protocol::{BurnParams, SignedMessage, UsdcAmount};
use crate::traits::{ChainClient, Wallet, WalletSession};

/// EIP-1193 "User Rejected Request"
const USER_REJECTED_CODE: i64 = 4001;

#[derive(Debug)]
struct SessionState {
    active_chain_id: u64,
    connected: bool,
}

/// Production [`Wallet`] and [`ChainClient`] over one Alloy provider per chain
///
/// Each provider must be able to sign for `account`, either through a wallet
/// filler or a node-managed account. "Switching network" selects which
/// provider signs; transactions for any other chain are refused.
///
/// # Examples
///
/// ```rust,no_run
/// use alloy_primitives::address;
/// use alloy_provider::ProviderBuilder;
/// use cctp_bulk_pay::providers::AlloySession;
/// use cctp_bulk_pay::{ChainRegistry, NetworkMode};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = ChainRegistry::builtin();
/// let base = registry.get(84532, NetworkMode::Testnet)?.clone();
/// let arbitrum = registry.get(421614, NetworkMode::Testnet)?.clone();
///
/// let session = AlloySession::new(address!("742d35Cc6634C0532925a3b844Bc454e4438f44e"), base.id)
///     .with_chain(base.clone(), ProviderBuilder::new().connect(base.rpc_url).await?)
///     .with_chain(arbitrum.clone(), ProviderBuilder::new().connect(arbitrum.rpc_url).await?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AlloySession<P> {
    account: Address,
    providers: HashMap<u64, (Chain, P)>,
    state: Mutex<SessionState>,
}

impl<P> AlloySession<P>
where
    P: Provider<Ethereum> + Clone,
{
    /// Session for `account`, initially pointed at `initial_chain_id`
    pub fn new(account: Address, initial_chain_id: u64) -> Self {
        Self {
            account,
            providers: HashMap::new(),
            state: Mutex::new(SessionState {
                active_chain_id: initial_chain_id,
                connected: false,
            }),
        }
    }

    /// Registers the provider used for `chain`
    pub fn with_chain(mut self, chain: Chain, provider: P) -> Self {
        self.providers.insert(chain.id, (chain, provider));
        self
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn active(&self) -> Result<&(Chain, P)> {
        let chain_id = self.state().active_chain_id;
        self.providers.get(&chain_id).ok_or(BulkPayError::UnsupportedChain { chain_id })
    }

    /// Provider for `chain`, which must be the active one
    fn signer_for(&self, chain: &Chain) -> Result<&P> {
        let state = self.state();
        if !state.connected {
            return Err(BulkPayError::WalletNotConnected);
        }
        if state.active_chain_id != chain.id {
            return Err(BulkPayError::ChainOperationFailed(format!(
                "wallet is on chain {}, not {}",
                state.active_chain_id, chain.id
            )));
        }
        self.reader_for(chain)
    }

    fn reader_for(&self, chain: &Chain) -> Result<&P> {
        self.providers
            .get(&chain.id)
            .map(|(_, provider)| provider)
            .ok_or(BulkPayError::UnsupportedChain { chain_id: chain.id })
    }

    /// Sends `tx` and waits for it to be mined successfully
    async fn send(&self, provider: &P, tx: TransactionRequest, what: &'static str) -> Result<TxHash> {
        let pending = provider.send_transaction(tx).await.map_err(rpc_error)?;
        let tx_hash = *pending.tx_hash();
        info!(tx_hash = %tx_hash, kind = what, event = "transaction_sent");

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| BulkPayError::ChainOperationFailed(e.to_string()))?;

        if !receipt.status() {
            warn!(tx_hash = %tx_hash, kind = what, event = "transaction_reverted");
            return Err(BulkPayError::ChainOperationFailed(format!(
                "{what} transaction {tx_hash} reverted"
            )));
        }

        info!(
            tx_hash = %tx_hash,
            kind = what,
            block_number = ?receipt.block_number(),
            event = "transaction_confirmed"
        );
        Ok(tx_hash)
    }
}

fn rpc_error(err: RpcError<TransportErrorKind>) -> BulkPayError {
    if let RpcError::ErrorResp(payload) = &err {
        let message = payload.message.to_lowercase();
        if payload.code == USER_REJECTED_CODE
            || message.contains("user rejected")
            || message.contains("user denied")
        {
            return BulkPayError::UserRejected;
        }
        if message.contains("network changed") {
            return BulkPayError::NetworkChanged;
        }
        return BulkPayError::ChainOperationFailed(payload.message.to_string());
    }
    BulkPayError::Rpc(err)
}

fn contract_error(err: alloy_contract::Error) -> BulkPayError {
    match err {
        alloy_contract::Error::TransportError(e) => rpc_error(e),
        other => BulkPayError::ChainOperationFailed(other.to_string()),
    }
}

#[async_trait]
impl<P> Wallet for AlloySession<P>
where
    P: Provider<Ethereum> + Clone + Send + Sync,
{
    async fn connect(&self) -> Result<WalletSession> {
        if self.providers.is_empty() {
            return Err(BulkPayError::WalletNotInstalled);
        }
        let (chain, _) = self.active()?;
        let chain_id = chain.id;
        self.state().connected = true;

        let balance = self.usdc_balance(self.account).await?;
        info!(account = %self.account, chain_id, balance = %balance, event = "wallet_connected");
        Ok(WalletSession {
            address: self.account,
            chain_id,
            balance,
        })
    }

    fn address(&self) -> Option<Address> {
        self.state().connected.then_some(self.account)
    }

    async fn active_chain_id(&self) -> Result<u64> {
        Ok(self.state().active_chain_id)
    }

    async fn switch_network(&self, chain_id: u64) -> Result<()> {
        if !self.providers.contains_key(&chain_id) {
            return Err(BulkPayError::NetworkSwitchFailed {
                chain_id,
                reason: "no provider configured for chain".to_string(),
            });
        }

        let mut state = self.state();
        let previous = state.active_chain_id;
        state.active_chain_id = chain_id;
        info!(from_chain_id = previous, to_chain_id = chain_id, event = "network_switched");
        Ok(())
    }

    async fn usdc_balance(&self, owner: Address) -> Result<UsdcAmount> {
        let (chain, provider) = self.active()?;
        self.balance_of_with(chain, provider, owner).await
    }
}

impl<P> AlloySession<P>
where
    P: Provider<Ethereum> + Clone,
{
    async fn balance_of_with(&self, chain: &Chain, provider: &P, owner: Address) -> Result<UsdcAmount> {
        let balance = UsdcContract::new(chain.usdc, provider.clone())
            .balance_of(owner)
            .await
            .map_err(contract_error)?;
        Ok(UsdcAmount::from_atomic(balance))
    }
}

#[async_trait]
impl<P> ChainClient for AlloySession<P>
where
    P: Provider<Ethereum> + Clone + Send + Sync,
{
    async fn balance_of(&self, chain: &Chain, owner: Address) -> Result<UsdcAmount> {
        let provider = self.reader_for(chain)?;
        self.balance_of_with(chain, provider, owner).await
    }

    async fn allowance(
        &self,
        chain: &Chain,
        owner: Address,
        spender: Address,
    ) -> Result<UsdcAmount> {
        let provider = self.reader_for(chain)?;
        let allowance = UsdcContract::new(chain.usdc, provider.clone())
            .allowance(owner, spender)
            .await
            .map_err(contract_error)?;
        Ok(UsdcAmount::from_atomic(allowance))
    }

    #[instrument(skip(self, chain), fields(chain_id = chain.id))]
    async fn approve(&self, chain: &Chain, spender: Address, amount: UsdcAmount) -> Result<TxHash> {
        let provider = self.signer_for(chain)?;
        let tx = UsdcContract::new(chain.usdc, provider.clone()).approve_transaction(
            self.account,
            spender,
            amount.atomic(),
        );
        self.send(provider, tx, "approve").await
    }

    #[instrument(skip(self, chain), fields(chain_id = chain.id))]
    async fn transfer(&self, chain: &Chain, to: Address, amount: UsdcAmount) -> Result<TxHash> {
        let provider = self.signer_for(chain)?;
        let tx = UsdcContract::new(chain.usdc, provider.clone()).transfer_transaction(
            self.account,
            to,
            amount.atomic(),
        );
        self.send(provider, tx, "transfer").await
    }

    #[instrument(skip(self, chain, params), fields(chain_id = chain.id))]
    async fn deposit_for_burn(&self, chain: &Chain, params: &BurnParams) -> Result<TxHash> {
        let provider = self.signer_for(chain)?;
        let tx = TokenMessengerV2Contract::new(chain.token_messenger(), provider.clone())
            .deposit_for_burn_transaction(self.account, params);
        self.send(provider, tx, "burn").await
    }

    #[instrument(skip(self, chain, signed), fields(chain_id = chain.id))]
    async fn receive_message(&self, chain: &Chain, signed: &SignedMessage) -> Result<TxHash> {
        let provider = self.signer_for(chain)?;
        let tx = MessageTransmitterV2Contract::new(chain.message_transmitter(), provider.clone())
            .receive_message_transaction(self.account, signed);
        self.send(provider, tx, "mint").await
    }

    async fn gas_price(&self, chain: &Chain) -> Result<u128> {
        let gas_price = self
            .reader_for(chain)?
            .get_gas_price()
            .await
            .map_err(rpc_error)?;
        debug!(chain_id = chain.id, gas_price, event = "gas_price_retrieved");
        Ok(gas_price)
    }
}
