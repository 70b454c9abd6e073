//! CCTP v2 finality thresholds
//!
//! The `minFinalityThreshold` passed to `depositForBurn` decides how soon
//! Circle will attest a burn. Reference: <https://developers.circle.com/cctp/technical-guide>

use std::fmt;

/// Minimum finality a burn asks for before Circle signs it
///
/// ```rust
/// use cctp_bulk_pay::FinalityThreshold;
///
/// assert_eq!(FinalityThreshold::Fast.as_u32(), 1000);
/// assert_eq!(FinalityThreshold::Standard.as_u32(), 2000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum FinalityThreshold {
    /// Attested at the "confirmed" block level, seconds to settle, carries a fee
    Fast = 1000,
    /// Attested once the source block is finalized, minutes to settle, free
    #[default]
    Standard = 2000,
}

impl FinalityThreshold {
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fast => "Fast Transfer",
            Self::Standard => "Standard Transfer",
        }
    }
}

impl From<FinalityThreshold> for u32 {
    #[inline]
    fn from(threshold: FinalityThreshold) -> Self {
        threshold.as_u32()
    }
}

impl fmt::Display for FinalityThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u32())
    }
}
