use async_trait::async_trait;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::traits::Clock;

/// Production [`Clock`] on tokio's timer and the system clock
///
/// ```rust
/// use cctp_bulk_pay::providers::TokioClock;
/// use cctp_bulk_pay::traits::Clock;
///
/// assert!(TokioClock::new().unix_millis() > 0);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl TokioClock {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }
}
