//! Supported chains and their CCTP wiring
//!
//! The registry holds two disjoint chain sets, mainnet and testnet. Every
//! lookup names the set it expects so a testnet id can never resolve while
//! the operator is configured for mainnet.

pub mod addresses;
mod registry;

pub use registry::{Chain, ChainRegistry, NetworkMode};
