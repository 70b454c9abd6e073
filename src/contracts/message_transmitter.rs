//! MessageTransmitterV2 bindings

use alloy_network::Ethereum;
use alloy_primitives::Address;
use alloy_provider::Provider;
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::sol;
use tracing::info;

use crate::protocol::SignedMessage;
use MessageTransmitterV2::MessageTransmitterV2Instance;

pub struct MessageTransmitterV2Contract<P: Provider<Ethereum>> {
    instance: MessageTransmitterV2Instance<P>,
}

impl<P: Provider<Ethereum>> MessageTransmitterV2Contract<P> {
    pub fn new(address: Address, provider: P) -> Self {
        Self {
            instance: MessageTransmitterV2Instance::new(address, provider),
        }
    }

    /// `receiveMessage` request minting the attested burn, signed by `from`
    pub fn receive_message_transaction(
        &self,
        from: Address,
        signed: &SignedMessage,
    ) -> TransactionRequest {
        info!(
            message_len = signed.message.len(),
            attestation_len = signed.attestation.len(),
            from_address = %from,
            contract_address = %self.instance.address(),
            event = "receive_message_transaction_created"
        );

        self.instance
            .receiveMessage(signed.message.clone(), signed.attestation.clone())
            .from(from)
            .into_transaction_request()
    }
}

sol!(
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract MessageTransmitterV2 {
        function receiveMessage(bytes calldata message, bytes calldata attestation)
            external
            returns (bool success);
    }
);
