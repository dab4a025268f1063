//! Canonical withdrawal model
//!
//! `WithdrawalRequest` is the single representation every source's raw
//! records are normalized into. It lives in memory for the duration of
//! one reconciliation pass and is written back to its origin store on
//! mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::core_types::{Priority, Region, SourceSystem, WithdrawalStatus};

/// Request ID - opaque, stable within the origin store.
///
/// Records imported from a store keep that store's primary key; candidates
/// promoted out of the legacy ledger are minted a fresh ULID (sortable,
/// no coordination needed).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Mint a new unique id for a promoted candidate
    pub fn mint() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ciphertext holder for the national identification number.
///
/// The plaintext never appears outside the export path; Debug output is
/// redacted so the value cannot leak through logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedString(String);

impl EncryptedString {
    pub fn new(ciphertext: impl Into<String>) -> Self {
        Self(ciphertext.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for EncryptedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedString(***)")
    }
}

/// Raw record as returned by a source adapter.
///
/// `payload` keeps the source-specific shape; only the Normalizer knows
/// the per-source field names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    /// Primary key within the origin store
    pub id: String,
    /// Provenance tag
    pub source: SourceSystem,
    /// Region of the store itself, for region-scoped stores
    pub region: Option<Region>,
    /// Source-specific fields
    pub payload: serde_json::Value,
}

/// How the payout is disbursed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayoutMethod {
    BankTransfer {
        bank_name: String,
        account_number: String,
        account_holder: String,
        /// Encrypted national identification number, backfilled by the
        /// PII enricher when the intake table has a match
        national_id: Option<EncryptedString>,
    },
    ExternalWallet {
        email: String,
    },
}

impl PayoutMethod {
    pub fn empty_bank_transfer() -> Self {
        PayoutMethod::BankTransfer {
            bank_name: String::new(),
            account_number: String::new(),
            account_holder: String::new(),
            national_id: None,
        }
    }

    /// A bank transfer parsed out of free text may be missing fields;
    /// such requests are surfaced to operators as incomplete.
    pub fn is_complete(&self) -> bool {
        match self {
            PayoutMethod::BankTransfer {
                bank_name,
                account_number,
                account_holder,
                ..
            } => !bank_name.is_empty() && !account_number.is_empty() && !account_holder.is_empty(),
            PayoutMethod::ExternalWallet { email } => !email.is_empty(),
        }
    }

    pub fn national_id(&self) -> Option<&EncryptedString> {
        match self {
            PayoutMethod::BankTransfer { national_id, .. } => national_id.as_ref(),
            PayoutMethod::ExternalWallet { .. } => None,
        }
    }
}

/// Canonical withdrawal request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: RequestId,
    /// Origin store, required for write-back routing
    pub source: SourceSystem,
    /// Primary key of the raw record this request was derived from
    pub origin_key: String,
    pub region: Region,
    pub creator_id: String,
    pub creator_name: String,
    /// Gross amount in points (minor units of the region's currency for
    /// the home region, 1:1 by convention)
    pub requested_amount: i64,
    pub payout_method: PayoutMethod,
    pub status: WithdrawalStatus,
    /// Operator-assigned at approval, only used for batch ordering
    pub priority: Priority,
    /// Derived withholding, in points. Never set independently.
    pub tax_amount: i64,
    /// Derived net payout in the region currency's minor unit.
    /// Never set independently.
    pub net_amount: i64,
    pub admin_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Marker placed on the origin raw record once a canonical request
    /// exists for it; prevents re-import on the next pass
    pub origin_processed_marker: Option<String>,
    /// Set exactly once when the rejection refund is issued; presence
    /// makes repeated rejections refund-idempotent
    pub refund_ledger_entry_id: Option<Uuid>,
}

impl WithdrawalRequest {
    /// Contact handle for notifications, when the request carries one
    pub fn contact(&self) -> Option<&str> {
        match &self.payout_method {
            PayoutMethod::ExternalWallet { email } if !email.is_empty() => Some(email),
            _ => None,
        }
    }
}

impl fmt::Display for WithdrawalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Withdrawal[{}] {} {} creator={} amount={} status={}",
            self.id, self.source, self.region, self.creator_id, self.requested_amount, self.status
        )
    }
}

/// Condition surfaced to operators instead of being auto-corrected.
///
/// The pipeline and the approval engine both accumulate these; a pass is
/// never aborted for one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// A source adapter failed; the pass continued with the rest
    SourceSkipped {
        source: SourceSystem,
        reason: String,
    },
    /// A ledger withdrawal entry whose description did not yield the
    /// full bank details; the request was kept with empty fields
    LedgerParseFailure {
        origin_key: String,
        description: String,
    },
    /// The heuristic (creator, amount, day) key merged a legacy entry
    /// into an existing request; a genuine same-day same-amount pair
    /// would be wrongly collapsed, so every merge is reviewable
    HeuristicMerge {
        kept: RequestId,
        discarded_origin: String,
    },
    /// No intake-table match for the bank identity; payout proceeds
    /// with the national id unregistered
    UnregisteredPii {
        id: RequestId,
        creator_name: String,
    },
    /// Status write succeeded but the refund is not recorded yet;
    /// requires manual reconciliation, never silent retry
    RefundPending {
        id: RequestId,
        reason: String,
    },
    /// Origin-store write-back failed after the in-memory transition
    WriteBackPending {
        id: RequestId,
        source: SourceSystem,
        reason: String,
    },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::SourceSkipped { source, reason } => {
                write!(f, "source {} skipped: {}", source, reason)
            }
            Anomaly::LedgerParseFailure { origin_key, .. } => {
                write!(f, "ledger entry {} has unparseable bank details", origin_key)
            }
            Anomaly::HeuristicMerge {
                kept,
                discarded_origin,
            } => write!(
                f,
                "ledger entry {} merged into {} by heuristic key",
                discarded_origin, kept
            ),
            Anomaly::UnregisteredPii { id, creator_name } => {
                write!(f, "request {} ({}) has no registered national id", id, creator_name)
            }
            Anomaly::RefundPending { id, reason } => {
                write!(f, "request {} rejected but refund not recorded: {}", id, reason)
            }
            Anomaly::WriteBackPending { id, source, reason } => {
                write!(f, "request {} not written back to {}: {}", id, source, reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_mint_is_unique() {
        let a = RequestId::mint();
        let b = RequestId::mint();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 26); // ULID text form
    }

    #[test]
    fn test_encrypted_string_debug_redacted() {
        let s = EncryptedString::new("c2VjcmV0");
        assert_eq!(format!("{:?}", s), "EncryptedString(***)");
    }

    #[test]
    fn test_payout_method_completeness() {
        assert!(!PayoutMethod::empty_bank_transfer().is_complete());

        let full = PayoutMethod::BankTransfer {
            bank_name: "BankX".into(),
            account_number: "1002941050782".into(),
            account_holder: "HolderName".into(),
            national_id: None,
        };
        assert!(full.is_complete());

        let wallet = PayoutMethod::ExternalWallet {
            email: "creator@example.com".into(),
        };
        assert!(wallet.is_complete());
    }
}
