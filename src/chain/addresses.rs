// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! Contract addresses used by bulk payouts
//!
//! CCTP v2 deploys TokenMessengerV2 and MessageTransmitterV2 at one address
//! per environment, so only the USDC token differs from chain to chain.
//!
//! Reference: <https://developers.circle.com/cctp/evm-smart-contracts>

use alloy_primitives::{address, Address};

/// CCTP V2 TokenMessenger address (all mainnets)
pub const CCTP_V2_TOKEN_MESSENGER_MAINNET: Address =
    address!("28b5a0e9C621a5BadaA536219b3a228C8168cf5d");

/// CCTP V2 MessageTransmitter address (all mainnets)
pub const CCTP_V2_MESSAGE_TRANSMITTER_MAINNET: Address =
    address!("81D40F21F12A8F0E3252Bccb954D722d4c464B64");

/// CCTP V2 TokenMessenger address (all testnets)
pub const CCTP_V2_TOKEN_MESSENGER_TESTNET: Address =
    address!("8FE6B999Dc680CcFDD5Bf7EB0974218be2542DAA");

/// CCTP V2 MessageTransmitter address (all testnets)
pub const CCTP_V2_MESSAGE_TRANSMITTER_TESTNET: Address =
    address!("E737e5cEBEEBa77EFE34D4aa090756590b1CE275");

// USDC token addresses, mainnet

/// <https://etherscan.io/token/0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48>
pub const ETHEREUM_USDC: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");

/// <https://polygonscan.com/token/0x3c499c542cef5e3811e1192ce70d8cc03d5c3359>
pub const POLYGON_USDC: Address = address!("3c499c542cEF5E3811e1192ce70d8cC03d5c3359");

/// <https://arbiscan.io/token/0xaf88d065e77c8cc2239327c5edb3a432268e5831>
pub const ARBITRUM_USDC: Address = address!("af88d065e77c8cC2239327C5EDb3A432268e5831");

/// <https://basescan.org/token/0x833589fcd6edb6e08f4c7c32d4f71b54bda02913>
pub const BASE_USDC: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

/// <https://optimistic.etherscan.io/token/0x0b2c639c533813f4aa9d7837caf62653d097ff85>
pub const OPTIMISM_USDC: Address = address!("0b2C639c533813f4Aa9D7837CAf62653d097Ff85");

/// <https://snowtrace.io/token/0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E>
pub const AVALANCHE_USDC: Address = address!("B97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E");

/// <https://lineascan.build/token/0x176211869ca2b568f2a7d4ee941e073a821ee1ff>
pub const LINEA_USDC: Address = address!("176211869cA2b568f2A7D4EE941E073a821EE1ff");

// USDC token addresses, testnet

pub const SEPOLIA_USDC: Address = address!("1c7D4B196Cb0C7B01d743Fbc6116a902379C7238");

pub const ARBITRUM_SEPOLIA_USDC: Address = address!("75faf114eafb1BDbe2F0316DF893fd58CF46854E");

pub const BASE_SEPOLIA_USDC: Address = address!("036CbD53842c5426634e7929541eC2318f3dCF7e");

pub const OPTIMISM_SEPOLIA_USDC: Address = address!("5fd84259d66Cd46123540766Be93DFE6D43130D7");

pub const AVALANCHE_FUJI_USDC: Address = address!("5425890298aed601595a70AB815c96711a31Bc65");

pub const POLYGON_AMOY_USDC: Address = address!("41E94Eb019C0762f9Bfcf9Fb1E58725BfB0e7582");

pub const LINEA_SEPOLIA_USDC: Address = address!("FEce4462D57bD51A6A552365A011b95f0E16d9B7");
