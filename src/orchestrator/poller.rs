use alloy_primitives::TxHash;
use tracing::{debug, info, warn, Instrument};

use super::PollingConfig;
use crate::error::{BulkPayError, Result};
use crate::protocol::{DomainId, SignedMessage};
use crate::spans;
use crate::traits::{AttestationService, Clock};

/// Waits for Circle to attest a burn
///
/// The poller only reads from the attestation service; it never touches the
/// batch. Every query that does not yield a signed message, including a
/// failed query, consumes one attempt and is followed by one poll interval of
/// sleep.
#[derive(Debug)]
pub struct AttestationPoller<'a, A, K> {
    service: &'a A,
    clock: &'a K,
}

impl<'a, A, K> AttestationPoller<'a, A, K>
where
    A: AttestationService,
    K: Clock,
{
    pub fn new(service: &'a A, clock: &'a K) -> Self {
        Self { service, clock }
    }

    /// Polls until the burn `tx_hash` on `source_domain` is attested
    ///
    /// # Errors
    ///
    /// [`BulkPayError::AttestationTimeout`] once `polling.max_attempts`
    /// queries have gone by without a signed message.
    pub async fn poll(
        &self,
        tx_hash: TxHash,
        source_domain: DomainId,
        polling: PollingConfig,
    ) -> Result<SignedMessage> {
        let span = spans::poll_attestation(
            tx_hash,
            source_domain.as_u32(),
            polling.max_attempts,
            polling.poll_interval_secs,
        );

        async move {
            let started = self.clock.now();

            for attempt in 1..=polling.max_attempts {
                let response = self
                    .service
                    .messages(source_domain.as_u32(), tx_hash)
                    .instrument(spans::attestation_attempt(attempt))
                    .await;

                match response {
                    Ok(response) => {
                        if let Some(signed) = response.signed() {
                            info!(
                                tx_hash = %tx_hash,
                                attempt = attempt,
                                elapsed_secs = self.clock.now().duration_since(started).as_secs(),
                                attestation_length_bytes = signed.attestation.len(),
                                event = "attestation_complete"
                            );
                            return Ok(signed);
                        }

                        debug!(
                            tx_hash = %tx_hash,
                            attempt = attempt,
                            max_attempts = polling.max_attempts,
                            status = ?response.messages.first().map(|m| m.status),
                            event = "attestation_pending"
                        );
                    }
                    Err(e) => {
                        debug!(
                            tx_hash = %tx_hash,
                            attempt = attempt,
                            max_attempts = polling.max_attempts,
                            error = %e,
                            event = "attestation_not_ready"
                        );
                    }
                }

                self.clock.sleep(polling.interval()).await;
            }

            let error = BulkPayError::AttestationTimeout {
                attempts: polling.max_attempts,
            };
            spans::record_error(&error);
            warn!(
                tx_hash = %tx_hash,
                attempts = polling.max_attempts,
                total_timeout_secs = polling.total_timeout_secs(),
                event = "attestation_timeout"
            );
            Err(error)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAttestation, FakeAttestationService, FakeClock, FAKE_ATTESTATION};
    use std::time::Duration;

    fn tx() -> TxHash {
        TxHash::repeat_byte(0x42)
    }

    #[tokio::test]
    async fn test_complete_on_first_attempt_does_not_sleep() {
        let service = FakeAttestationService::default();
        service.script(tx(), vec![FakeAttestation::Complete]);
        let clock = FakeClock::new();

        let signed = AttestationPoller::new(&service, &clock)
            .poll(tx(), DomainId::Base, PollingConfig::fast())
            .await
            .unwrap();

        assert_eq!(signed.attestation.as_ref(), FAKE_ATTESTATION.as_slice());
        assert_eq!(signed.message.as_ref(), tx().as_slice());
        assert_eq!(clock.sleep_count(), 0);
    }

    #[tokio::test]
    async fn test_progression_to_complete() {
        let service = FakeAttestationService::default();
        service.script(
            tx(),
            vec![
                FakeAttestation::NotFound,
                FakeAttestation::Pending,
                FakeAttestation::PendingConfirmations,
                FakeAttestation::CompleteWithoutAttestation,
                FakeAttestation::Complete,
            ],
        );
        let clock = FakeClock::new();

        let result = AttestationPoller::new(&service, &clock)
            .poll(tx(), DomainId::Ethereum, PollingConfig::fast())
            .await;

        assert!(result.is_ok());
        assert_eq!(service.message_queries(tx()), 5);
        assert_eq!(clock.sleep_count(), 4);
        assert_eq!(clock.total_sleep_time(), Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_fast_timeout_after_ten_attempts() {
        let service = FakeAttestationService::default();
        service.script(tx(), vec![FakeAttestation::Pending]);
        let clock = FakeClock::new();

        let result = AttestationPoller::new(&service, &clock)
            .poll(tx(), DomainId::Base, PollingConfig::fast())
            .await;

        assert!(matches!(
            result,
            Err(BulkPayError::AttestationTimeout { attempts: 10 })
        ));
        assert_eq!(service.message_queries(tx()), 10);
        assert_eq!(clock.sleep_count(), 10);
        assert_eq!(clock.total_sleep_time(), Duration::from_secs(50));
    }

    #[tokio::test]
    async fn test_standard_schedule() {
        let service = FakeAttestationService::default();
        service.script(tx(), vec![FakeAttestation::Unavailable]);
        let clock = FakeClock::new();

        let result = AttestationPoller::new(&service, &clock)
            .poll(tx(), DomainId::Arbitrum, PollingConfig::standard())
            .await;

        assert!(matches!(
            result,
            Err(BulkPayError::AttestationTimeout { attempts: 60 })
        ));
        assert!(clock
            .sleep_log()
            .iter()
            .all(|d| *d == Duration::from_secs(30)));
        assert_eq!(clock.total_sleep_time(), Duration::from_secs(30 * 60));
    }
}
