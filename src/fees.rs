//! Best-effort cost estimates for a payout
//!
//! Estimation never fails. When the gas price or the CCTP fee schedule cannot
//! be read, the estimator substitutes a fixed per-method fallback and marks the
//! estimate as such.

use std::collections::BTreeMap;

use alloy_primitives::U256;
use bon::Builder;
use serde::Serialize;
use tracing::{debug, warn, Instrument};

use crate::batch::{Recipient, RecipientStatus};
use crate::chain::{Chain, ChainRegistry};
use crate::error::{BulkPayError, Result};
use crate::orchestrator::TransferMethod;
use crate::protocol::{UsdcAmount, DEFAULT_FAST_MAX_FEE_BPS};
use crate::spans;
use crate::traits::{AttestationService, ChainClient};

/// Gas budgeted per CCTP burn
pub const CROSS_CHAIN_GAS_PER_TRANSFER: u64 = 150_000;
/// Gas budgeted per ERC-20 transfer
pub const SAME_CHAIN_GAS_PER_TRANSFER: u64 = 65_000;

const WEI_PER_NATIVE: u128 = 1_000_000_000_000_000_000;

/// Where an estimate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeSource {
    Live,
    Fallback,
}

/// Estimated cost of paying a batch with one transfer method
///
/// Replaced wholesale on every estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeEstimate {
    pub network_fees: UsdcAmount,
    pub cctp_fees: UsdcAmount,
    pub total: UsdcAmount,
    pub source: FeeSource,
}

impl FeeEstimate {
    fn new(network_fees: UsdcAmount, cctp_fees: UsdcAmount, source: FeeSource) -> Self {
        Self {
            network_fees,
            cctp_fees,
            total: network_fees + cctp_fees,
            source,
        }
    }
}

/// Fallback fees for one method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackFees {
    pub network_fees: UsdcAmount,
    pub cctp_fees: UsdcAmount,
}

impl FallbackFees {
    pub fn new(network_fees: UsdcAmount, cctp_fees: UsdcAmount) -> Self {
        Self {
            network_fees,
            cctp_fees,
        }
    }
}

/// Constants behind fee estimates and fast-burn fee allowances
///
/// ```rust
/// use cctp_bulk_pay::{FeeConfig, UsdcAmount};
///
/// let config = FeeConfig::builder()
///     .native_usd_price(UsdcAmount::whole(3_000))
///     .build();
/// assert_eq!(config.fast_max_fee_bps, 14);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder)]
pub struct FeeConfig {
    #[builder(default = FallbackFees::new(UsdcAmount::whole(5), UsdcAmount::ZERO))]
    pub same_chain_fallback: FallbackFees,
    #[builder(default = FallbackFees::new(UsdcAmount::whole(15), UsdcAmount::whole(5)))]
    pub fast_fallback: FallbackFees,
    #[builder(default = FallbackFees::new(UsdcAmount::whole(15), UsdcAmount::ZERO))]
    pub standard_fallback: FallbackFees,
    #[builder(default = CROSS_CHAIN_GAS_PER_TRANSFER)]
    pub cross_chain_gas: u64,
    #[builder(default = SAME_CHAIN_GAS_PER_TRANSFER)]
    pub same_chain_gas: u64,
    /// USD price of one unit of the source chain's gas token
    #[builder(default = UsdcAmount::whole(2_000))]
    pub native_usd_price: UsdcAmount,
    /// Fee allowance of fast burns, in basis points of the amount
    #[builder(default = DEFAULT_FAST_MAX_FEE_BPS)]
    pub fast_max_fee_bps: u32,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl FeeConfig {
    pub fn fallback(&self, method: TransferMethod) -> FeeEstimate {
        let fees = match method {
            TransferMethod::SameChain => self.same_chain_fallback,
            TransferMethod::Fast => self.fast_fallback,
            TransferMethod::Standard => self.standard_fallback,
        };
        FeeEstimate::new(fees.network_fees, fees.cctp_fees, FeeSource::Fallback)
    }

    fn gas_per_transfer(&self, method: TransferMethod) -> u64 {
        if method.is_cross_chain() {
            self.cross_chain_gas
        } else {
            self.same_chain_gas
        }
    }

    /// Converts a wei amount of the gas token to USDC at `native_usd_price`
    fn wei_to_usdc(&self, wei: U256) -> UsdcAmount {
        let usdc = wei.saturating_mul(self.native_usd_price.atomic()) / U256::from(WEI_PER_NATIVE);
        UsdcAmount::from_atomic(usdc)
    }
}

/// Computes [`FeeEstimate`]s from live gas prices and Circle's fee schedule
#[derive(Debug)]
pub struct FeeEstimator<'a, C, A> {
    chain: &'a C,
    attestations: &'a A,
    registry: &'a ChainRegistry,
    config: &'a FeeConfig,
}

impl<'a, C, A> FeeEstimator<'a, C, A>
where
    C: ChainClient,
    A: AttestationService,
{
    pub fn new(
        chain: &'a C,
        attestations: &'a A,
        registry: &'a ChainRegistry,
        config: &'a FeeConfig,
    ) -> Self {
        Self {
            chain,
            attestations,
            registry,
            config,
        }
    }

    /// Estimates the cost of paying the `ready` recipients that `method`
    /// would process from `source`
    pub async fn estimate(
        &self,
        recipients: &[Recipient],
        method: TransferMethod,
        source: &Chain,
    ) -> FeeEstimate {
        let eligible: Vec<&Recipient> = recipients
            .iter()
            .filter(|r| r.status == RecipientStatus::Ready && method.accepts(r.is_same_chain))
            .collect();
        let span = spans::estimate_fees(method, source.id, eligible.len());

        async {
            let estimate = match self.live(&eligible, method, source).await {
                Ok(estimate) => estimate,
                Err(e) if e.is_network_change() => {
                    debug!(error = %e, method = %method, event = "fee_estimate_network_changed");
                    self.config.fallback(method)
                }
                Err(e) => {
                    warn!(error = %e, method = %method, event = "fee_estimate_fallback");
                    self.config.fallback(method)
                }
            };

            tracing::Span::current().record(
                "fee_source",
                match estimate.source {
                    FeeSource::Live => "live",
                    FeeSource::Fallback => "fallback",
                },
            );
            debug!(
                network_fees = %estimate.network_fees,
                cctp_fees = %estimate.cctp_fees,
                total = %estimate.total,
                event = "fee_estimate_ready"
            );
            estimate
        }
        .instrument(span)
        .await
    }

    async fn live(
        &self,
        recipients: &[&Recipient],
        method: TransferMethod,
        source: &Chain,
    ) -> Result<FeeEstimate> {
        if recipients.is_empty() {
            return Ok(FeeEstimate::new(
                UsdcAmount::ZERO,
                UsdcAmount::ZERO,
                FeeSource::Live,
            ));
        }

        let gas_price = self.chain.gas_price(source).await?;
        let gas = U256::from(self.config.gas_per_transfer(method))
            .saturating_mul(U256::from(recipients.len()));
        let network_fees = self
            .config
            .wei_to_usdc(U256::from(gas_price).saturating_mul(gas));

        let cctp_fees = if method == TransferMethod::Fast {
            self.cctp_fees(recipients, method, source).await?
        } else {
            UsdcAmount::ZERO
        };

        Ok(FeeEstimate::new(network_fees, cctp_fees, FeeSource::Live))
    }

    /// One fee-schedule query per destination, times the recipients headed there
    async fn cctp_fees(
        &self,
        recipients: &[&Recipient],
        method: TransferMethod,
        source: &Chain,
    ) -> Result<UsdcAmount> {
        let mut per_destination: BTreeMap<u64, u64> = BTreeMap::new();
        for recipient in recipients {
            *per_destination.entry(recipient.chain_id).or_default() += 1;
        }

        let mut total = UsdcAmount::ZERO;
        for (chain_id, count) in per_destination {
            let destination = self.registry.get(chain_id, source.network)?;
            let (src, dst) = (source.domain.as_u32(), destination.domain.as_u32());

            let fee = self
                .attestations
                .fees(src, dst)
                .await?
                .into_iter()
                .find(|entry| entry.fee_type.eq_ignore_ascii_case(method.as_str()))
                .ok_or_else(|| BulkPayError::FeeUnavailable {
                    fee_type: method.to_string(),
                    source_domain: src,
                    destination_domain: dst,
                })?
                .fee;

            total = total + fee.saturating_mul(count);
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::RecipientId;
    use crate::chain::NetworkMode;
    use crate::protocol::FeeScheduleEntry;
    use crate::testing::{FakeAttestationService, FakeChainClient, FakeWallet};
    use alloy_primitives::address;
    use rstest::rstest;

    fn recipient(id: u64, chain_id: u64, same_chain: bool) -> Recipient {
        Recipient {
            id: RecipientId(id),
            address: address!("742d35Cc6634C0532925a3b844Bc454e4438f44e"),
            chain_id,
            chain_name: String::new(),
            amount: UsdcAmount::whole(100),
            is_same_chain: same_chain,
            status: RecipientStatus::Ready,
            method: None,
            tx_hash: None,
            attestation: None,
            error: None,
        }
    }

    fn fast_fee(fee: UsdcAmount) -> Vec<FeeScheduleEntry> {
        vec![
            FeeScheduleEntry {
                fee_type: "fast".to_string(),
                fee,
            },
            FeeScheduleEntry {
                fee_type: "standard".to_string(),
                fee: UsdcAmount::ZERO,
            },
        ]
    }

    struct Fixture {
        registry: ChainRegistry,
        chain: FakeChainClient,
        service: FakeAttestationService,
        config: FeeConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let chain = FakeChainClient::new(FakeWallet::connected(8453));
            let service = FakeAttestationService::new(&chain);
            Self {
                registry: ChainRegistry::builtin(),
                chain,
                service,
                config: FeeConfig::default(),
            }
        }

        fn base(&self) -> Chain {
            self.registry.get(8453, NetworkMode::Mainnet).unwrap().clone()
        }

        async fn estimate(&self, recipients: &[Recipient], method: TransferMethod) -> FeeEstimate {
            FeeEstimator::new(&self.chain, &self.service, &self.registry, &self.config)
                .estimate(recipients, method, &self.base())
                .await
        }
    }

    #[tokio::test]
    async fn test_fast_estimate_sums_per_destination() {
        let fixture = Fixture::new();
        // 20 gwei at $2000: 150k gas = 0.003 ETH = $6 per transfer
        fixture.chain.set_gas_price(8453, 20_000_000_000);
        fixture.service.set_fees(6, 3, fast_fee(UsdcAmount::cents(50)));
        fixture.service.set_fees(6, 0, fast_fee(UsdcAmount::cents(125)));

        let recipients = vec![
            recipient(1, 42161, false),
            recipient(2, 42161, false),
            recipient(3, 1, false),
            recipient(4, 8453, true),
        ];
        let estimate = fixture.estimate(&recipients, TransferMethod::Fast).await;

        assert_eq!(estimate.source, FeeSource::Live);
        assert_eq!(estimate.network_fees, UsdcAmount::whole(18));
        assert_eq!(estimate.cctp_fees, UsdcAmount::cents(225));
        assert_eq!(estimate.total, UsdcAmount::cents(2025));
        // One query per unique destination
        assert_eq!(fixture.service.fee_queries(), vec![(6, 0), (6, 3)]);
    }

    #[tokio::test]
    async fn test_standard_estimate_has_no_protocol_fee() {
        let fixture = Fixture::new();
        fixture.chain.set_gas_price(8453, 20_000_000_000);

        let estimate = fixture
            .estimate(&[recipient(1, 42161, false)], TransferMethod::Standard)
            .await;

        assert_eq!(estimate.source, FeeSource::Live);
        assert_eq!(estimate.network_fees, UsdcAmount::whole(6));
        assert!(estimate.cctp_fees.is_zero());
        assert!(fixture.service.fee_queries().is_empty());
    }

    #[tokio::test]
    async fn test_same_chain_estimate_uses_transfer_gas() {
        let fixture = Fixture::new();
        fixture.chain.set_gas_price(8453, 20_000_000_000);

        let estimate = fixture
            .estimate(
                &[recipient(1, 8453, true), recipient(2, 42161, false)],
                TransferMethod::SameChain,
            )
            .await;

        // 65k gas * 20 gwei * $2000
        assert_eq!(estimate.network_fees, UsdcAmount::cents(260));
        assert_eq!(estimate.total, estimate.network_fees);
    }

    #[rstest]
    #[case(TransferMethod::SameChain, 5, 0)]
    #[case(TransferMethod::Fast, 15, 5)]
    #[case(TransferMethod::Standard, 15, 0)]
    #[tokio::test]
    async fn test_gas_price_outage_falls_back(
        #[case] method: TransferMethod,
        #[case] network: u64,
        #[case] cctp: u64,
    ) {
        let fixture = Fixture::new();
        fixture.chain.set_gas_price_unavailable(true);

        let estimate = fixture
            .estimate(
                &[recipient(1, 8453, true), recipient(2, 42161, false)],
                method,
            )
            .await;

        assert_eq!(estimate.source, FeeSource::Fallback);
        assert_eq!(estimate.network_fees, UsdcAmount::whole(network));
        assert_eq!(estimate.cctp_fees, UsdcAmount::whole(cctp));
        assert_eq!(estimate.total, UsdcAmount::whole(network + cctp));
    }

    #[tokio::test]
    async fn test_fee_service_outage_falls_back() {
        let fixture = Fixture::new();
        fixture.service.set_fee_outage(true);

        let estimate = fixture
            .estimate(&[recipient(1, 42161, false)], TransferMethod::Fast)
            .await;

        assert_eq!(estimate, FeeConfig::default().fallback(TransferMethod::Fast));
    }

    #[tokio::test]
    async fn test_network_change_falls_back() {
        let fixture = Fixture::new();
        fixture.service.set_fee_network_changed(true);

        let estimate = fixture
            .estimate(&[recipient(1, 42161, false)], TransferMethod::Fast)
            .await;

        assert_eq!(estimate.source, FeeSource::Fallback);
    }

    #[tokio::test]
    async fn test_missing_fee_entry_falls_back() {
        let fixture = Fixture::new();
        fixture.service.set_fees(
            6,
            3,
            vec![FeeScheduleEntry {
                fee_type: "standard".to_string(),
                fee: UsdcAmount::ZERO,
            }],
        );

        let estimate = fixture
            .estimate(&[recipient(1, 42161, false)], TransferMethod::Fast)
            .await;

        assert_eq!(estimate.source, FeeSource::Fallback);
    }

    #[tokio::test]
    async fn test_empty_partition_costs_nothing() {
        let fixture = Fixture::new();
        fixture.chain.set_gas_price_unavailable(true);

        let estimate = fixture
            .estimate(&[recipient(1, 8453, true)], TransferMethod::Fast)
            .await;

        assert_eq!(estimate.source, FeeSource::Live);
        assert!(estimate.total.is_zero());
    }
}
