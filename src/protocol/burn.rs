use alloy_primitives::{Address, B256};

use super::{DomainId, FinalityThreshold, UsdcAmount};

/// Fast-transfer fee allowance when none is configured, in basis points
pub const DEFAULT_FAST_MAX_FEE_BPS: u32 = 14;

/// Arguments of a TokenMessengerV2 `depositForBurn` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnParams {
    pub amount: UsdcAmount,
    pub destination_domain: DomainId,
    /// Recipient address left-padded to 32 bytes
    pub mint_recipient: B256,
    /// USDC on the source chain
    pub burn_token: Address,
    /// Zero lets anyone relay the mint
    pub destination_caller: B256,
    pub max_fee: UsdcAmount,
    pub min_finality_threshold: FinalityThreshold,
}

impl BurnParams {
    /// Parameters for paying `amount` to `recipient`
    ///
    /// Fast burns allow a fee of `fast_max_fee_bps` of the amount, rounded up;
    /// standard burns allow none.
    pub fn new(
        amount: UsdcAmount,
        recipient: Address,
        destination_domain: DomainId,
        burn_token: Address,
        finality: FinalityThreshold,
        fast_max_fee_bps: u32,
    ) -> Self {
        let max_fee = match finality {
            FinalityThreshold::Fast => amount.bps_ceil(fast_max_fee_bps),
            FinalityThreshold::Standard => UsdcAmount::ZERO,
        };

        Self {
            amount,
            destination_domain,
            mint_recipient: recipient.into_word(),
            burn_token,
            destination_caller: B256::ZERO,
            max_fee,
            min_finality_threshold: finality,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, U256};

    const RECIPIENT: Address = address!("742d35Cc6634C0532925a3b844Bc454e4438f44e");
    const USDC: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

    #[test]
    fn test_fast_burn_allows_fee() {
        let params = BurnParams::new(
            UsdcAmount::whole(100),
            RECIPIENT,
            DomainId::Arbitrum,
            USDC,
            FinalityThreshold::Fast,
            DEFAULT_FAST_MAX_FEE_BPS,
        );

        assert_eq!(params.min_finality_threshold.as_u32(), 1000);
        assert_eq!(params.max_fee, UsdcAmount::cents(14));
        assert_eq!(params.destination_caller, B256::ZERO);
        assert_eq!(&params.mint_recipient[..12], &[0u8; 12]);
        assert_eq!(&params.mint_recipient[12..], RECIPIENT.as_slice());
    }

    #[test]
    fn test_fast_fee_rounds_up() {
        // 1 atomic unit * 14 bps is a fraction of a unit
        let params = BurnParams::new(
            UsdcAmount::from_atomic(U256::from(1u8)),
            RECIPIENT,
            DomainId::Base,
            USDC,
            FinalityThreshold::Fast,
            DEFAULT_FAST_MAX_FEE_BPS,
        );
        assert_eq!(params.max_fee.atomic(), U256::from(1u8));
    }

    #[test]
    fn test_standard_burn_has_no_fee() {
        let params = BurnParams::new(
            UsdcAmount::whole(100),
            RECIPIENT,
            DomainId::Ethereum,
            USDC,
            FinalityThreshold::Standard,
            DEFAULT_FAST_MAX_FEE_BPS,
        );

        assert_eq!(params.min_finality_threshold.as_u32(), 2000);
        assert!(params.max_fee.is_zero());
    }
}
