//! Production implementations of the traits in [`crate::traits`]
//!
//! Tests use the fakes in [`crate::testing`] instead.

mod alloy;
mod iris;
mod tokio_clock;

pub use self::alloy::AlloySession;
pub use self::iris::IrisClient;
pub use self::tokio_clock::TokioClock;
