use alloy_primitives::{hex::FromHex, Bytes};
use serde::{Deserialize, Deserializer};

use super::UsdcAmount;

/// Response of `GET /v2/messages/{sourceDomain}?transactionHash={tx}`
///
/// A single burn transaction can emit several `MessageSent` events, so the
/// API wraps them in an array. A bulk payout burns once per transaction and
/// only ever reads the first entry.
///
/// ```json
/// {
///   "messages": [
///     { "status": "complete", "message": "0x...", "attestation": "0x..." }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub messages: Vec<SourceMessage>,
}

impl MessagesResponse {
    /// The signed message for the burn, once Circle has attested it
    ///
    /// `None` unless the first message reports `complete` with both the
    /// message and attestation bytes present.
    pub fn signed(&self) -> Option<SignedMessage> {
        let first = self.messages.first()?;
        if first.status != AttestationStatus::Complete {
            return None;
        }

        Some(SignedMessage {
            message: first.message.clone()?,
            attestation: first.attestation.clone()?,
        })
    }
}

/// One message entry in a [`MessagesResponse`]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMessage {
    pub status: AttestationStatus,

    #[serde(default, deserialize_with = "deserialize_optional_bytes_or_pending")]
    pub message: Option<Bytes>,

    #[serde(default, deserialize_with = "deserialize_optional_bytes_or_pending")]
    pub attestation: Option<Bytes>,
}

/// A burn message together with Circle's signature, ready for `receiveMessage`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedMessage {
    pub message: Bytes,
    pub attestation: Bytes,
}

/// Circle sometimes sends the string `"PENDING"` where bytes will later appear.
fn deserialize_optional_bytes_or_pending<'de, D>(deserializer: D) -> Result<Option<Bytes>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;

    match opt {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("pending") => Ok(None),
        Some(s) => {
            let bytes = Bytes::from_hex(s).map_err(serde::de::Error::custom)?;
            Ok(Some(bytes))
        }
    }
}

/// Attestation progress as reported by Iris
///
/// Anything other than `complete` means "not yet"; unknown strings decode as
/// [`AttestationStatus::Pending`].
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttestationStatus {
    Complete,
    PendingConfirmations,
    #[serde(other)]
    Pending,
}

/// One row of `GET /v2/burn/USDC/fees/{sourceDomain}/{destDomain}`
///
/// `fee` is the protocol fee charged per transfer, in USDC. Iris has served
/// it both as a JSON number and as a string.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeeScheduleEntry {
    pub fee_type: String,
    #[serde(deserialize_with = "deserialize_fee")]
    pub fee: UsdcAmount,
}

fn deserialize_fee<'de, D>(deserializer: D) -> Result<UsdcAmount, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    let text = match raw {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        other => {
            return Err(serde::de::Error::custom(format!(
                "expected fee as string or number, got {other}"
            )))
        }
    };
    text.parse().map_err(serde::de::Error::custom)
}
