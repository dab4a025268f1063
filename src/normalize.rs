//! Normalizer
//!
//! Maps every adapter's raw shape into the canonical `WithdrawalRequest`.
//! The per-source field names live here and nowhere else, so a store
//! migration only ever touches one mapping function.
//!
//! The legacy ledger is the awkward one: withdrawals exist only as debit
//! entries whose description packs the bank details into free text. The
//! format is not versioned; parsing is tolerant and a failed parse keeps
//! the record (with empty payout fields) rather than dropping it.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::FxTable;
use crate::core_types::{Region, SourceSystem, WithdrawalStatus};
use crate::models::{Anomaly, EncryptedString, PayoutMethod, RawRecord, RequestId, WithdrawalRequest};
use crate::tax;

/// Tag a ledger debit entry carries when it represents a withdrawal
pub const LEDGER_WITHDRAWAL_TAG: &str = "[WITHDRAWAL]";

/// Bank details extracted from a ledger description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBankInfo {
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
}

/// Normalize a full fetch batch.
///
/// Records that are not withdrawals at all (ledger credits, unrelated
/// debits) are dropped; everything else comes out as a canonical request,
/// possibly incomplete, with anomalies describing what went wrong.
pub fn normalize_all(
    records: &[RawRecord],
    fx: &FxTable,
) -> (Vec<WithdrawalRequest>, Vec<Anomaly>) {
    let mut requests = Vec::with_capacity(records.len());
    let mut anomalies = Vec::new();

    for record in records {
        let normalized = match record.source {
            SourceSystem::CanonicalPayoutStore => normalize_canonical(record),
            SourceSystem::RegionalWithdrawalStore => normalize_regional(record),
            SourceSystem::LegacyLedger => normalize_ledger(record, &mut anomalies),
        };
        match normalized {
            Some(mut request) => {
                tax::apply(&mut request, fx);
                requests.push(request);
            }
            None => {
                debug!(source = %record.source, id = %record.id, "record skipped by normalizer");
            }
        }
    }

    (requests, anomalies)
}

/// Canonical store rows map nearly 1:1.
fn normalize_canonical(record: &RawRecord) -> Option<WithdrawalRequest> {
    let p = &record.payload;
    let region = str_field(p, "region")
        .and_then(|s| Region::parse(&s))
        .or(record.region)
        .unwrap_or(Region::Domestic);

    let payout_method = if let Some(email) = non_empty(str_field(p, "paypal_email")) {
        PayoutMethod::ExternalWallet { email }
    } else {
        PayoutMethod::BankTransfer {
            bank_name: str_field(p, "bank_name").unwrap_or_default(),
            account_number: str_field(p, "account_number").unwrap_or_default(),
            account_holder: str_field(p, "account_holder").unwrap_or_default(),
            national_id: non_empty(str_field(p, "resident_registration_number"))
                .map(EncryptedString::new),
        }
    };

    Some(base_request(record, region, payout_method, "requested_points"))
}

/// Regional store rows rename the bank fields; region comes from the
/// store identity, not the row.
fn normalize_regional(record: &RawRecord) -> Option<WithdrawalRequest> {
    let p = &record.payload;
    let region = record
        .region
        .or_else(|| str_field(p, "region").and_then(|s| Region::parse(&s)))
        .unwrap_or(Region::Domestic);

    let payout_method = if let Some(email) = non_empty(str_field(p, "paypal_email")) {
        PayoutMethod::ExternalWallet { email }
    } else {
        PayoutMethod::BankTransfer {
            bank_name: str_field(p, "bank").unwrap_or_default(),
            account_number: str_field(p, "account_no").unwrap_or_default(),
            account_holder: str_field(p, "holder").unwrap_or_default(),
            national_id: non_empty(str_field(p, "resident_registration_number"))
                .map(EncryptedString::new),
        }
    };

    Some(base_request(record, region, payout_method, "points"))
}

/// Ledger debit entries become Pending candidates.
///
/// Returns `None` for entries that are not withdrawals (credits, or
/// debits without the tag). Amounts are debits, so the sign inverts.
fn normalize_ledger(record: &RawRecord, anomalies: &mut Vec<Anomaly>) -> Option<WithdrawalRequest> {
    let p = &record.payload;
    let amount = i64_field(p, "amount")?;
    let description = str_field(p, "description").unwrap_or_default();

    if amount >= 0 || !description.trim_start().starts_with(LEDGER_WITHDRAWAL_TAG) {
        return None;
    }

    let payout_method = match parse_withdrawal_description(&description) {
        Some(info) => PayoutMethod::BankTransfer {
            bank_name: info.bank_name,
            account_number: info.account_number,
            account_holder: info.account_holder,
            national_id: None,
        },
        None => {
            warn!(id = %record.id, "ledger withdrawal entry has unparseable description");
            anomalies.push(Anomaly::LedgerParseFailure {
                origin_key: record.id.clone(),
                description: description.clone(),
            });
            PayoutMethod::empty_bank_transfer()
        }
    };

    Some(WithdrawalRequest {
        id: RequestId::mint(),
        source: SourceSystem::LegacyLedger,
        origin_key: record.id.clone(),
        region: record.region.unwrap_or(Region::Domestic),
        creator_id: str_field(p, "user_id").unwrap_or_default(),
        creator_name: str_field(p, "user_name").unwrap_or_default(),
        requested_amount: -amount,
        payout_method,
        status: WithdrawalStatus::Pending,
        priority: 0,
        tax_amount: 0,
        net_amount: 0,
        admin_notes: None,
        rejection_reason: None,
        created_at: timestamp_field(p, "created_at").unwrap_or_else(Utc::now),
        processed_at: None,
        completed_at: None,
        origin_processed_marker: non_empty(str_field(p, "migrated_withdrawal_id")),
        refund_ledger_entry_id: None,
    })
}

/// Shared mapping for the two structured stores.
fn base_request(
    record: &RawRecord,
    region: Region,
    payout_method: PayoutMethod,
    amount_field: &str,
) -> WithdrawalRequest {
    let p = &record.payload;
    WithdrawalRequest {
        id: record.id.as_str().into(),
        source: record.source,
        origin_key: record.id.clone(),
        region,
        creator_id: str_field(p, "creator_id").unwrap_or_default(),
        creator_name: str_field(p, "creator_name")
            .or_else(|| str_field(p, "channel_name"))
            .unwrap_or_default(),
        requested_amount: i64_field(p, amount_field).unwrap_or(0),
        payout_method,
        status: str_field(p, "status")
            .and_then(|s| WithdrawalStatus::parse(&s))
            .unwrap_or(WithdrawalStatus::Pending),
        priority: i64_field(p, "priority").unwrap_or(0).clamp(0, 10) as u8,
        tax_amount: 0,
        net_amount: 0,
        admin_notes: non_empty(str_field(p, "admin_notes")),
        rejection_reason: non_empty(str_field(p, "rejection_reason")),
        created_at: timestamp_field(p, "created_at").unwrap_or_else(Utc::now),
        processed_at: timestamp_field(p, "processed_at"),
        completed_at: timestamp_field(p, "completed_at"),
        origin_processed_marker: None,
        refund_ledger_entry_id: str_field(p, "refund_ledger_entry_id")
            .and_then(|s| Uuid::parse_str(&s).ok()),
    }
}

/// Extract bank details from `"[WITHDRAWAL] 10,000 | BankX 1002941050782 (HolderName)"`.
///
/// The amount before the `|` is display text only; the authoritative
/// amount is the entry's numeric field. Returns `None` unless bank name,
/// account number and holder all come out non-empty.
pub fn parse_withdrawal_description(description: &str) -> Option<ParsedBankInfo> {
    let rest = description.trim_start().strip_prefix(LEDGER_WITHDRAWAL_TAG)?;
    let (_, bank_part) = rest.split_once('|')?;

    let (account_part, holder_part) = bank_part.rsplit_once('(')?;
    let account_holder = holder_part.trim_end().trim_end_matches(')').trim().to_string();

    let mut tokens: Vec<&str> = account_part.split_whitespace().collect();
    let account_number = match tokens.pop() {
        Some(t) if t.chars().all(|c| c.is_ascii_digit()) && !t.is_empty() => t.to_string(),
        _ => return None,
    };
    let bank_name = tokens.join(" ");

    if bank_name.is_empty() || account_holder.is_empty() {
        return None;
    }

    Some(ParsedBankInfo {
        bank_name,
        account_number,
        account_holder,
    })
}

// ------------------------------------------------------------
// Payload field helpers
// ------------------------------------------------------------

fn str_field(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn i64_field(payload: &Value, key: &str) -> Option<i64> {
    match payload.get(key) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

fn timestamp_field(payload: &Value, key: &str) -> Option<DateTime<Utc>> {
    let raw = str_field(payload, key)?;
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Some stores only keep a date
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ledger_record(id: &str, amount: i64, description: &str) -> RawRecord {
        RawRecord {
            id: id.to_string(),
            source: SourceSystem::LegacyLedger,
            region: Some(Region::Domestic),
            payload: json!({
                "user_id": "c-1",
                "user_name": "HolderName",
                "amount": amount,
                "description": description,
                "created_at": "2026-08-03T09:30:00Z",
            }),
        }
    }

    #[test]
    fn test_parse_description_happy_path() {
        let info =
            parse_withdrawal_description("[WITHDRAWAL] 10,000 | BankX 1002941050782 (HolderName)")
                .unwrap();
        assert_eq!(info.bank_name, "BankX");
        assert_eq!(info.account_number, "1002941050782");
        assert_eq!(info.account_holder, "HolderName");
    }

    #[test]
    fn test_parse_description_multi_word_bank() {
        let info = parse_withdrawal_description(
            "[WITHDRAWAL] 50,000 | First National Bank 12345678 (Jane Doe)",
        )
        .unwrap();
        assert_eq!(info.bank_name, "First National Bank");
        assert_eq!(info.account_number, "12345678");
        assert_eq!(info.account_holder, "Jane Doe");
    }

    #[test]
    fn test_parse_description_tolerates_nothing_else() {
        assert!(parse_withdrawal_description("[WITHDRAWAL] 10,000").is_none());
        assert!(parse_withdrawal_description("[WITHDRAWAL] 10,000 | BankX (NoAccount)").is_none());
        assert!(parse_withdrawal_description("[WITHDRAWAL] 10,000 | 12345 (NoBank)").is_none());
        assert!(parse_withdrawal_description("campaign reward").is_none());
    }

    #[test]
    fn test_ledger_debit_becomes_pending_candidate() {
        let record = ledger_record(
            "tx-1",
            -10_000,
            "[WITHDRAWAL] 10,000 | BankX 1002941050782 (HolderName)",
        );
        let (requests, anomalies) = normalize_all(std::slice::from_ref(&record), &FxTable::default());

        assert!(anomalies.is_empty());
        assert_eq!(requests.len(), 1);
        let r = &requests[0];
        assert_eq!(r.source, SourceSystem::LegacyLedger);
        assert_eq!(r.origin_key, "tx-1");
        assert_eq!(r.requested_amount, 10_000);
        assert_eq!(r.status, WithdrawalStatus::Pending);
        assert_eq!(r.tax_amount, 330);
        assert_eq!(r.net_amount, 9_670);
        assert!(r.payout_method.is_complete());
    }

    #[test]
    fn test_ledger_parse_failure_keeps_record() {
        let record = ledger_record("tx-2", -5_000, "[WITHDRAWAL] manual payout, see notes");
        let (requests, anomalies) = normalize_all(std::slice::from_ref(&record), &FxTable::default());

        assert_eq!(requests.len(), 1);
        assert!(!requests[0].payout_method.is_complete());
        assert_eq!(requests[0].requested_amount, 5_000);
        assert!(matches!(&anomalies[0], Anomaly::LedgerParseFailure { origin_key, .. } if origin_key == "tx-2"));
    }

    #[test]
    fn test_ledger_credits_and_untagged_debits_skipped() {
        let credit = ledger_record("tx-3", 7_000, "campaign reward");
        let untagged = ledger_record("tx-4", -3_000, "admin deduction");
        let (requests, anomalies) = normalize_all(&[credit, untagged], &FxTable::default());
        assert!(requests.is_empty());
        assert!(anomalies.is_empty());
    }

    #[test]
    fn test_canonical_record_maps_one_to_one() {
        let record = RawRecord {
            id: "w-10".to_string(),
            source: SourceSystem::CanonicalPayoutStore,
            region: None,
            payload: json!({
                "creator_id": "c-7",
                "channel_name": "Creator Seven",
                "region": "korea",
                "requested_points": 20_000,
                "bank_name": "BankY",
                "account_number": "110-22-33",
                "account_holder": "Creator Seven",
                "resident_registration_number": "enc:abc",
                "status": "approved",
                "priority": 3,
                "admin_notes": "rush batch",
                "created_at": "2026-08-01T00:00:00Z",
                "processed_at": "2026-08-02T10:00:00Z",
            }),
        };
        let (requests, anomalies) = normalize_all(std::slice::from_ref(&record), &FxTable::default());
        assert!(anomalies.is_empty());
        let r = &requests[0];
        assert_eq!(r.id.as_str(), "w-10");
        assert_eq!(r.region, Region::Domestic);
        assert_eq!(r.creator_name, "Creator Seven");
        assert_eq!(r.status, WithdrawalStatus::Approved);
        assert_eq!(r.priority, 3);
        assert_eq!(r.admin_notes.as_deref(), Some("rush batch"));
        assert!(r.processed_at.is_some());
        assert!(r.payout_method.national_id().is_some());
    }

    #[test]
    fn test_regional_record_renamed_fields_and_store_region() {
        let record = RawRecord {
            id: "jp-4".to_string(),
            source: SourceSystem::RegionalWithdrawalStore,
            region: Some(Region::Japan),
            payload: json!({
                "creator_id": "c-9",
                "creator_name": "クリエイター",
                "points": 10_000,
                "paypal_email": "creator@example.jp",
                "status": "pending",
                "created_at": "2026-08-04",
            }),
        };
        let (requests, _) = normalize_all(std::slice::from_ref(&record), &FxTable::default());
        let r = &requests[0];
        assert_eq!(r.region, Region::Japan);
        assert_eq!(r.tax_amount, 0);
        assert_eq!(r.net_amount, 90_000);
        assert!(matches!(&r.payout_method, PayoutMethod::ExternalWallet { email } if email == "creator@example.jp"));
    }
}
