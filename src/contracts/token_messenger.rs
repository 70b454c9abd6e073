//! TokenMessengerV2 bindings
//!
//! Only `depositForBurn` is needed: payouts never use hooks.

use alloy_network::Ethereum;
use alloy_primitives::Address;
use alloy_provider::Provider;
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::sol;
use tracing::info;

use crate::protocol::BurnParams;
use TokenMessengerV2::TokenMessengerV2Instance;

pub struct TokenMessengerV2Contract<P: Provider<Ethereum>> {
    instance: TokenMessengerV2Instance<P>,
}

impl<P: Provider<Ethereum>> TokenMessengerV2Contract<P> {
    pub fn new(address: Address, provider: P) -> Self {
        Self {
            instance: TokenMessengerV2Instance::new(address, provider),
        }
    }

    /// `depositForBurn` request for `params`, signed by `from`
    pub fn deposit_for_burn_transaction(
        &self,
        from: Address,
        params: &BurnParams,
    ) -> TransactionRequest {
        info!(
            from_address = %from,
            mint_recipient = %params.mint_recipient,
            destination_domain = params.destination_domain.as_u32(),
            amount = %params.amount,
            max_fee = %params.max_fee,
            min_finality_threshold = params.min_finality_threshold.as_u32(),
            contract_address = %self.instance.address(),
            event = "deposit_for_burn_transaction_created"
        );

        self.instance
            .depositForBurn(
                params.amount.atomic(),
                params.destination_domain.as_u32(),
                params.mint_recipient,
                params.burn_token,
                params.destination_caller,
                params.max_fee.atomic(),
                params.min_finality_threshold.as_u32(),
            )
            .from(from)
            .into_transaction_request()
    }
}

sol!(
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract TokenMessengerV2 {
        function depositForBurn(
            uint256 amount,
            uint32 destinationDomain,
            bytes32 mintRecipient,
            address burnToken,
            bytes32 destinationCaller,
            uint256 maxFee,
            uint32 minFinalityThreshold
        ) external;
    }
);
