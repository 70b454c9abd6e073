//! Contract bindings used by the production chain session
//!
//! Each wrapper builds `TransactionRequest`s and performs view calls; sending
//! and confirming transactions is left to [`AlloySession`](crate::providers::AlloySession).

mod erc20;
mod message_transmitter;
mod token_messenger;

pub use erc20::UsdcContract;
pub use message_transmitter::MessageTransmitterV2Contract;
pub use token_messenger::TokenMessengerV2Contract;
