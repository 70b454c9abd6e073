//! CSV import and export of recipients
//!
//! Import is all-or-nothing: every bad row is reported and no recipient is
//! produced unless all rows are valid. Fields are split on commas with no
//! quoting; addresses and chain names never contain commas.

use alloy_primitives::Address;
use tracing::{debug, info, warn};

use crate::batch::{Recipient, RecipientDraft};
use crate::chain::{ChainRegistry, NetworkMode};
use crate::error::{BulkPayError, ImportLineError, Result};
use crate::protocol::UsdcAmount;
use crate::spans;

pub const EXPORT_HEADER: &str = "Address,Chain,Amount (USDC),Status";

const MISSING_COLUMNS: &str = "CSV must contain columns: Address, Chain, Amount";

struct Columns {
    address: usize,
    chain: usize,
    amount: usize,
}

impl Columns {
    /// First header containing each keyword, case-insensitively
    fn locate(header: &str) -> Option<Self> {
        let headers: Vec<String> = header.split(',').map(|h| h.trim().to_lowercase()).collect();
        let find = |keyword: &str| headers.iter().position(|h| h.contains(keyword));

        Some(Self {
            address: find("address")?,
            chain: find("chain")?,
            amount: find("amount")?,
        })
    }

    fn width(&self) -> usize {
        self.address.max(self.chain).max(self.amount) + 1
    }
}

fn is_address_shaped(s: &str) -> bool {
    s.len() == 42
        && s.starts_with("0x")
        && s[2..].bytes().all(|b| b.is_ascii_hexdigit())
}

fn parse_row(
    fields: &[&str],
    columns: &Columns,
    registry: &ChainRegistry,
    mode: NetworkMode,
) -> std::result::Result<RecipientDraft, String> {
    if fields.len() < columns.width() {
        return Err("Insufficient columns".to_string());
    }

    let raw_address = fields[columns.address];
    let address = is_address_shaped(raw_address)
        .then(|| raw_address.parse::<Address>().ok())
        .flatten()
        .ok_or_else(|| "Invalid address format".to_string())?;

    let chain_name = fields[columns.chain];
    let chain = registry
        .find_by_name_or_symbol(chain_name, mode)
        .ok_or_else(|| format!("Unknown chain \"{chain_name}\""))?;

    let raw_amount = fields[columns.amount];
    let amount = raw_amount
        .parse::<UsdcAmount>()
        .ok()
        .filter(|amount| !amount.is_zero())
        .ok_or_else(|| format!("Invalid amount \"{raw_amount}\""))?;

    Ok(RecipientDraft {
        address,
        chain_id: chain.id,
        chain_name: chain.name.to_string(),
        amount,
    })
}

/// Parses recipients from CSV text, resolving chains against `mode`'s set
///
/// The header row may carry extra columns in any order; the address, chain
/// and amount columns are found by substring. Blank lines are skipped. Line
/// numbers in errors count physical lines, the header being line 1.
///
/// # Errors
///
/// [`BulkPayError::ImportValidationFailed`] listing every rejected line.
pub fn parse_csv(
    text: &str,
    registry: &ChainRegistry,
    mode: NetworkMode,
) -> Result<Vec<RecipientDraft>> {
    let span = spans::import_csv(text.len());
    let _guard = span.enter();

    let mut lines = text.trim().split('\n').map(|l| l.trim_end_matches('\r'));
    let columns = match lines.next().and_then(Columns::locate) {
        Some(columns) => columns,
        None => {
            let error = BulkPayError::ImportValidationFailed {
                errors: vec![ImportLineError {
                    line: 1,
                    reason: MISSING_COLUMNS.to_string(),
                }],
            };
            spans::record_error(&error);
            warn!(event = "csv_missing_columns");
            return Err(error);
        }
    };

    let mut drafts = Vec::new();
    let mut errors = Vec::new();
    for (index, line) in lines.enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        match parse_row(&fields, &columns, registry, mode) {
            Ok(draft) => drafts.push(draft),
            Err(reason) => errors.push(ImportLineError {
                // +1 for the header, +1 for 1-based numbering
                line: index + 2,
                reason,
            }),
        }
    }

    if !errors.is_empty() {
        let error = BulkPayError::ImportValidationFailed { errors };
        spans::record_error(&error);
        warn!(event = "csv_rejected");
        return Err(error);
    }

    span.record("rows", drafts.len());
    info!(rows = drafts.len(), mode = %mode, event = "csv_imported");
    Ok(drafts)
}

/// One row per recipient under [`EXPORT_HEADER`]
///
/// Re-importing the output yields the same address, chain and amount for
/// every row; the status column is informational.
pub fn export_csv(recipients: &[Recipient]) -> String {
    debug!(rows = recipients.len(), event = "csv_exported");
    std::iter::once(EXPORT_HEADER.to_string())
        .chain(recipients.iter().map(|r| {
            format!("{},{},{},{}", r.address, r.chain_name, r.amount, r.status)
        }))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A small template operators can fill in
pub fn sample_csv() -> String {
    [
        "Address,Chain,Amount (USDC)",
        "0x1234567890123456789012345678901234567890,Ethereum,100.00",
        "0x0987654321098765432109876543210987654321,Polygon,250.50",
        "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd,Arbitrum,75.25",
    ]
    .join("\n")
}
