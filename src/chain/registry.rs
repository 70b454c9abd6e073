use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use alloy_chains::NamedChain;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use super::addresses::*;
use crate::error::{BulkPayError, Result};
use crate::protocol::DomainId;

/// Which of the two disjoint chain sets is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    #[default]
    Mainnet,
    Testnet,
}

impl NetworkMode {
    pub fn is_testnet(self) -> bool {
        matches!(self, Self::Testnet)
    }

    /// Circle Iris API base URL for this environment
    ///
    /// See <https://developers.circle.com/stablecoins/cctp-apis>
    pub fn iris_api_url(self) -> &'static str {
        match self {
            Self::Mainnet => "https://iris-api.circle.com",
            Self::Testnet => "https://iris-api-sandbox.circle.com",
        }
    }

    pub fn token_messenger(self) -> Address {
        match self {
            Self::Mainnet => CCTP_V2_TOKEN_MESSENGER_MAINNET,
            Self::Testnet => CCTP_V2_TOKEN_MESSENGER_TESTNET,
        }
    }

    pub fn message_transmitter(self) -> Address {
        match self {
            Self::Mainnet => CCTP_V2_MESSAGE_TRANSMITTER_MAINNET,
            Self::Testnet => CCTP_V2_MESSAGE_TRANSMITTER_TESTNET,
        }
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
        })
    }
}

/// A chain a payout can originate from or land on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub id: u64,
    pub name: &'static str,
    /// Native gas token symbol
    pub symbol: &'static str,
    pub usdc: Address,
    pub domain: DomainId,
    pub rpc_url: &'static str,
    pub explorer: &'static str,
    pub network: NetworkMode,
}

impl Chain {
    pub fn token_messenger(&self) -> Address {
        self.network.token_messenger()
    }

    pub fn message_transmitter(&self) -> Address {
        self.network.message_transmitter()
    }

    /// Link to a transaction on the chain's block explorer
    pub fn explorer_tx_url(&self, tx_hash: impl fmt::Display) -> String {
        format!("{}/tx/{tx_hash}", self.explorer)
    }
}

#[allow(clippy::too_many_arguments)]
const fn chain(
    id: u64,
    name: &'static str,
    symbol: &'static str,
    usdc: Address,
    domain: DomainId,
    rpc_url: &'static str,
    explorer: &'static str,
    network: NetworkMode,
) -> Chain {
    Chain {
        id,
        name,
        symbol,
        usdc,
        domain,
        rpc_url,
        explorer,
        network,
    }
}

fn mainnet_chains() -> Vec<Chain> {
    use NetworkMode::Mainnet;

    vec![
        chain(1, "Ethereum", "ETH", ETHEREUM_USDC, DomainId::Ethereum, "https://ethereum-rpc.publicnode.com", "https://etherscan.io", Mainnet),
        chain(137, "Polygon", "MATIC", POLYGON_USDC, DomainId::Polygon, "https://polygon-rpc.com", "https://polygonscan.com", Mainnet),
        chain(42161, "Arbitrum", "ETH", ARBITRUM_USDC, DomainId::Arbitrum, "https://arb1.arbitrum.io/rpc", "https://arbiscan.io", Mainnet),
        chain(8453, "Base", "ETH", BASE_USDC, DomainId::Base, "https://mainnet.base.org", "https://basescan.org", Mainnet),
        chain(10, "OP Mainnet", "ETH", OPTIMISM_USDC, DomainId::Optimism, "https://mainnet.optimism.io", "https://optimistic.etherscan.io", Mainnet),
        chain(43114, "Avalanche", "AVAX", AVALANCHE_USDC, DomainId::Avalanche, "https://api.avax.network/ext/bc/C/rpc", "https://snowtrace.io", Mainnet),
        chain(59144, "Linea", "ETH", LINEA_USDC, DomainId::Linea, "https://rpc.linea.build", "https://lineascan.build", Mainnet),
    ]
}

fn testnet_chains() -> Vec<Chain> {
    use NetworkMode::Testnet;

    vec![
        chain(11155111, "Sepolia", "ETH", SEPOLIA_USDC, DomainId::Ethereum, "https://ethereum-sepolia-rpc.publicnode.com", "https://sepolia.etherscan.io", Testnet),
        chain(421614, "Arbitrum Sepolia", "ETH", ARBITRUM_SEPOLIA_USDC, DomainId::Arbitrum, "https://sepolia-rollup.arbitrum.io/rpc", "https://sepolia.arbiscan.io", Testnet),
        chain(84532, "Base Sepolia", "ETH", BASE_SEPOLIA_USDC, DomainId::Base, "https://sepolia.base.org", "https://sepolia.basescan.org", Testnet),
        chain(11155420, "OP Sepolia", "ETH", OPTIMISM_SEPOLIA_USDC, DomainId::Optimism, "https://sepolia.optimism.io", "https://sepolia-optimism.etherscan.io", Testnet),
        chain(43113, "Avalanche Fuji", "AVAX", AVALANCHE_FUJI_USDC, DomainId::Avalanche, "https://api.avax-test.network/ext/bc/C/rpc", "https://testnet.snowtrace.io", Testnet),
        chain(80002, "Polygon Amoy", "POL", POLYGON_AMOY_USDC, DomainId::Polygon, "https://rpc-amoy.polygon.technology", "https://amoy.polygonscan.com", Testnet),
        chain(59141, "Linea Sepolia", "ETH", LINEA_SEPOLIA_USDC, DomainId::Linea, "https://rpc.sepolia.linea.build", "https://sepolia.lineascan.build", Testnet),
    ]
}

#[derive(Debug)]
struct ChainSet {
    chains: Vec<Chain>,
    by_id: HashMap<u64, usize>,
}

impl ChainSet {
    fn new(chains: Vec<Chain>) -> Self {
        let by_id = chains
            .iter()
            .enumerate()
            .map(|(index, chain)| (chain.id, index))
            .collect();
        Self { chains, by_id }
    }

    fn get(&self, id: u64) -> Option<&Chain> {
        self.by_id.get(&id).map(|&index| &self.chains[index])
    }
}

/// Static table of supported chains, indexed by chain id
///
/// Cloning is cheap; the tables are shared.
///
/// ```rust
/// use cctp_bulk_pay::{ChainRegistry, NetworkMode};
///
/// let registry = ChainRegistry::builtin();
/// let base = registry.get(8453, NetworkMode::Mainnet).unwrap();
/// assert_eq!(base.name, "Base");
/// assert!(registry.get(8453, NetworkMode::Testnet).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    mainnet: Arc<ChainSet>,
    testnet: Arc<ChainSet>,
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ChainRegistry {
    /// The chains this crate ships with
    pub fn builtin() -> Self {
        Self::new(mainnet_chains(), testnet_chains())
    }

    /// Build a registry from custom tables, e.g. pointing at local forks
    pub fn new(mainnet: Vec<Chain>, testnet: Vec<Chain>) -> Self {
        Self {
            mainnet: Arc::new(ChainSet::new(mainnet)),
            testnet: Arc::new(ChainSet::new(testnet)),
        }
    }

    fn set(&self, mode: NetworkMode) -> &ChainSet {
        match mode {
            NetworkMode::Mainnet => &self.mainnet,
            NetworkMode::Testnet => &self.testnet,
        }
    }

    /// All chains of one set, in table order
    pub fn chains(&self, mode: NetworkMode) -> &[Chain] {
        &self.set(mode).chains
    }

    pub fn get(&self, chain_id: u64, mode: NetworkMode) -> Result<&Chain> {
        self.set(mode)
            .get(chain_id)
            .ok_or(BulkPayError::UnsupportedChain { chain_id })
    }

    /// Exact, case-insensitive match on chain name or native symbol
    ///
    /// Symbols are shared by several chains; the first chain in table order wins.
    pub fn find_by_name_or_symbol(&self, query: &str, mode: NetworkMode) -> Option<&Chain> {
        let query = query.trim();
        self.chains(mode).iter().find(|chain| {
            chain.name.eq_ignore_ascii_case(query) || chain.symbol.eq_ignore_ascii_case(query)
        })
    }

    /// Mainnet/testnet class of an arbitrary chain id, if known at all
    pub fn network_mode_of(&self, chain_id: u64) -> Option<NetworkMode> {
        if self.mainnet.get(chain_id).is_some() {
            return Some(NetworkMode::Mainnet);
        }
        if self.testnet.get(chain_id).is_some() {
            return Some(NetworkMode::Testnet);
        }

        NamedChain::try_from(chain_id).ok().map(|named| {
            if named.is_testnet() {
                NetworkMode::Testnet
            } else {
                NetworkMode::Mainnet
            }
        })
    }

    /// Resolve the chain a wallet is connected to against the configured mode
    ///
    /// Raises [`BulkPayError::NetworkMismatch`] when the id belongs to the
    /// other class and [`BulkPayError::UnsupportedChain`] when it is unknown.
    pub fn resolve_connected(&self, chain_id: u64, mode: NetworkMode) -> Result<&Chain> {
        if let Ok(chain) = self.get(chain_id, mode) {
            return Ok(chain);
        }

        match self.network_mode_of(chain_id) {
            Some(actual) if actual != mode => Err(BulkPayError::NetworkMismatch {
                chain_id,
                expected: mode.to_string(),
            }),
            _ => Err(BulkPayError::UnsupportedChain { chain_id }),
        }
    }

    /// Fails with [`BulkPayError::SameDomainTransfer`] unless a CCTP burn from
    /// `source` can mint on `destination`
    pub fn ensure_cross_domain(&self, source: &Chain, destination: &Chain) -> Result<()> {
        if source.domain == destination.domain {
            return Err(BulkPayError::SameDomainTransfer {
                domain: source.domain.as_u32(),
            });
        }
        Ok(())
    }

    /// Whether `destination` may be offered as a payout target from `source`
    ///
    /// The source chain itself is valid (direct transfer); any other chain
    /// must sit in a different CCTP domain.
    pub fn is_valid_destination(&self, source: &Chain, destination: &Chain) -> bool {
        source.id == destination.id || source.domain != destination.domain
    }
}
