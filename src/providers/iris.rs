//! Circle Iris API client

use alloy_primitives::TxHash;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, instrument, trace};

use crate::chain::NetworkMode;
use crate::error::{BulkPayError, Result};
use crate::protocol::{FeeScheduleEntry, MessagesResponse};
use crate::traits::AttestationService;

/// Seconds to back off when a 429 carries no usable `Retry-After`
const DEFAULT_RETRY_AFTER_SECS: u64 = 300;

/// Production [`AttestationService`] backed by Circle's Iris API
///
/// # Examples
///
/// ```rust,no_run
/// use cctp_bulk_pay::providers::IrisClient;
/// use cctp_bulk_pay::traits::AttestationService;
/// use cctp_bulk_pay::NetworkMode;
/// use alloy_primitives::TxHash;
///
/// # async fn example() -> cctp_bulk_pay::Result<()> {
/// let iris = IrisClient::for_mode(NetworkMode::Testnet);
/// let response = iris.messages(6, TxHash::ZERO).await?;
/// println!("{:?}", response.signed());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct IrisClient {
    base_url: String,
    client: Client,
}

impl IrisClient {
    /// `base_url` without a trailing slash, e.g. <https://iris-api.circle.com>
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub fn for_mode(mode: NetworkMode) -> Self {
        Self::new(mode.iris_api_url())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn messages_url(&self, source_domain: u32, tx_hash: TxHash) -> String {
        format!(
            "{}/v2/messages/{source_domain}?transactionHash={tx_hash}",
            self.base_url
        )
    }

    fn fees_url(&self, source_domain: u32, destination_domain: u32) -> String {
        format!(
            "{}/v2/burn/USDC/fees/{source_domain}/{destination_domain}",
            self.base_url
        )
    }

    async fn get(&self, url: &str) -> Result<Response> {
        trace!(url = %url, event = "iris_request", "Requesting Iris API");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        trace!(status_code = %status, event = "iris_response", "Received response from Iris API");

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);

            debug!(
                retry_after_seconds = retry_after,
                event = "iris_rate_limited",
                "Rate limit exceeded"
            );
            return Err(BulkPayError::RateLimitExceeded {
                retry_after_seconds: retry_after,
            });
        }

        // Iris answers 404 until it has indexed the burn
        if status == StatusCode::NOT_FOUND {
            return Err(BulkPayError::AttestationNotFound);
        }

        if status.is_server_error() {
            return Err(BulkPayError::ServiceUnavailable(status.to_string()));
        }

        response.error_for_status_ref()?;
        Ok(response)
    }
}

#[async_trait]
impl AttestationService for IrisClient {
    #[instrument(skip(self), fields(tx_hash = %tx_hash))]
    async fn messages(&self, source_domain: u32, tx_hash: TxHash) -> Result<MessagesResponse> {
        let response = self.get(&self.messages_url(source_domain, tx_hash)).await?;
        let body = response.text().await?;
        let messages: MessagesResponse = serde_json::from_str(&body)?;

        debug!(
            messages = messages.messages.len(),
            status = ?messages.messages.first().map(|m| m.status),
            event = "iris_messages_parsed",
            "Messages response parsed"
        );
        Ok(messages)
    }

    #[instrument(skip(self))]
    async fn fees(
        &self,
        source_domain: u32,
        destination_domain: u32,
    ) -> Result<Vec<FeeScheduleEntry>> {
        let response = self
            .get(&self.fees_url(source_domain, destination_domain))
            .await?;
        let body = response.text().await?;
        let entries: Vec<FeeScheduleEntry> = serde_json::from_str(&body)?;

        debug!(entries = entries.len(), event = "iris_fees_parsed", "Fee schedule parsed");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;

    #[test]
    fn test_urls() {
        let iris = IrisClient::new("https://iris-api-sandbox.circle.com/");
        let tx = TxHash::from(b256!(
            "00000000000000000000000000000000000000000000000000000000000000ab"
        ));

        assert_eq!(
            iris.messages_url(6, tx),
            "https://iris-api-sandbox.circle.com/v2/messages/6?transactionHash=0x00000000000000000000000000000000000000000000000000000000000000ab"
        );
        assert_eq!(
            iris.fees_url(0, 3),
            "https://iris-api-sandbox.circle.com/v2/burn/USDC/fees/0/3"
        );
    }

    #[tokio::test]
    async fn test_request_logs_carry_event() {
        use std::sync::{Arc, Mutex};

        #[derive(Clone, Default)]
        struct Captured(Arc<Mutex<Vec<u8>>>);

        impl std::io::Write for Captured {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        // Nothing listens on port 1, so the request fails before any response
        let iris = IrisClient::new("http://127.0.0.1:1");
        assert!(iris.messages(0, TxHash::ZERO).await.is_err());

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Requesting Iris API"), "{output}");
        assert!(output.contains("event=\"iris_request\""), "{output}");
    }

    #[test]
    fn test_for_mode() {
        assert_eq!(
            IrisClient::for_mode(NetworkMode::Mainnet).base_url(),
            "https://iris-api.circle.com"
        );
    }
}
