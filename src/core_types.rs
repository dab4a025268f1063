//! Core types used throughout the system
//!
//! Small enums with stable numeric ids. The numeric ids are what the
//! origin stores persist, so they must never be renumbered.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Origin data store of a raw payout record.
///
/// Every canonical request keeps its provenance tag so mutations can be
/// routed back to the store that owns the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum SourceSystem {
    /// Cross-region payout table, authoritative once reconciled
    CanonicalPayoutStore = 1,
    /// Per-region withdrawal table
    RegionalWithdrawalStore = 2,
    /// Free-text transaction log where withdrawals are implicit debits
    LegacyLedger = 3,
}

impl SourceSystem {
    /// Numeric id for persistence
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(SourceSystem::CanonicalPayoutStore),
            2 => Some(SourceSystem::RegionalWithdrawalStore),
            3 => Some(SourceSystem::LegacyLedger),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceSystem::CanonicalPayoutStore => "CANONICAL",
            SourceSystem::RegionalWithdrawalStore => "REGIONAL",
            SourceSystem::LegacyLedger => "LEDGER",
        }
    }
}

impl fmt::Display for SourceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payout region. Determines currency and withholding rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    /// Home region; points convert 1:1 and withholding applies
    Domestic,
    Japan,
    Us,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::Domestic, Region::Japan, Region::Us];

    pub fn currency(&self) -> Currency {
        match self {
            Region::Domestic => Currency::Krw,
            Region::Japan => Currency::Jpy,
            Region::Us => Currency::Usd,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Domestic => "domestic",
            Region::Japan => "japan",
            Region::Us => "us",
        }
    }

    /// Parse a region name as stored by the origin systems.
    ///
    /// The canonical store still writes `korea` for the home region.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "domestic" | "korea" | "kr" => Some(Region::Domestic),
            "japan" | "jp" => Some(Region::Japan),
            "us" | "usa" => Some(Region::Us),
            _ => None,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payout currency with its minor-unit exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    Krw,
    Jpy,
    Usd,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Krw => "KRW",
            Currency::Jpy => "JPY",
            Currency::Usd => "USD",
        }
    }

    /// Decimal places of the minor unit (cents for USD, none for KRW/JPY)
    pub fn minor_decimals(&self) -> u32 {
        match self {
            Currency::Krw | Currency::Jpy => 0,
            Currency::Usd => 2,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Lifecycle state of a withdrawal request.
///
/// Legal transitions: Pending -> Approved -> Completed, Pending -> Rejected.
/// Rejected and Completed are terminal; a rejected request is never
/// reopened, resubmission creates a new request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum WithdrawalStatus {
    Pending = 1,
    Approved = 2,
    Completed = 3,
    Rejected = 4,
}

impl WithdrawalStatus {
    pub const ALL: [WithdrawalStatus; 4] = [
        WithdrawalStatus::Pending,
        WithdrawalStatus::Approved,
        WithdrawalStatus::Completed,
        WithdrawalStatus::Rejected,
    ];

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(WithdrawalStatus::Pending),
            2 => Some(WithdrawalStatus::Approved),
            3 => Some(WithdrawalStatus::Completed),
            4 => Some(WithdrawalStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Rejected => "rejected",
        }
    }

    /// Parse a status name as stored by the origin systems.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(WithdrawalStatus::Pending),
            "approved" => Some(WithdrawalStatus::Approved),
            "completed" => Some(WithdrawalStatus::Completed),
            "rejected" => Some(WithdrawalStatus::Rejected),
            _ => None,
        }
    }

    /// Terminal states admit no further transition
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, WithdrawalStatus::Completed | WithdrawalStatus::Rejected)
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operator-assigned batch priority, valid range 0..=10
pub type Priority = u8;

/// Highest legal priority value
pub const MAX_PRIORITY: Priority = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_system_roundtrip() {
        for s in [
            SourceSystem::CanonicalPayoutStore,
            SourceSystem::RegionalWithdrawalStore,
            SourceSystem::LegacyLedger,
        ] {
            assert_eq!(SourceSystem::from_id(s.id()), Some(s));
        }
        assert_eq!(SourceSystem::from_id(0), None);
        assert_eq!(SourceSystem::from_id(4), None);
    }

    #[test]
    fn test_region_parse_accepts_store_names() {
        assert_eq!(Region::parse("korea"), Some(Region::Domestic));
        assert_eq!(Region::parse("JAPAN"), Some(Region::Japan));
        assert_eq!(Region::parse(" us "), Some(Region::Us));
        assert_eq!(Region::parse("mars"), None);
    }

    #[test]
    fn test_status_terminality() {
        assert!(!WithdrawalStatus::Pending.is_terminal());
        assert!(!WithdrawalStatus::Approved.is_terminal());
        assert!(WithdrawalStatus::Completed.is_terminal());
        assert!(WithdrawalStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_status_roundtrip() {
        for s in WithdrawalStatus::ALL {
            assert_eq!(WithdrawalStatus::from_id(s.id()), Some(s));
            assert_eq!(WithdrawalStatus::parse(s.as_str()), Some(s));
        }
    }
}
