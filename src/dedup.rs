//! Deduplicator
//!
//! The same physical withdrawal can surface from more than one store: a
//! ledger entry already promoted into the canonical store, or a regional
//! row mirrored cross-region. This pass collapses those to exactly one
//! canonical request.
//!
//! Legacy entries with no explicit cross-reference fall back to the
//! heuristic `(creator, amount, calendar day)` key. That key is not a
//! real foreign key: two genuine same-day requests for the same amount
//! collapse into one. Every heuristic merge is therefore reported as an
//! anomaly for operator review instead of being trusted silently.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::core_types::SourceSystem;
use crate::models::{Anomaly, RequestId, WithdrawalRequest};

type DedupKey = (String, i64, chrono::NaiveDate);

fn dedup_key(request: &WithdrawalRequest) -> DedupKey {
    (
        request.creator_id.clone(),
        request.requested_amount,
        request.created_at.date_naive(),
    )
}

/// Collapse duplicates across sources.
pub fn dedup(requests: Vec<WithdrawalRequest>) -> (Vec<WithdrawalRequest>, Vec<Anomaly>) {
    let mut anomalies = Vec::new();

    // Structured-store records are authoritative; index them by the
    // heuristic key before looking at legacy candidates.
    let mut key_to_id: FxHashMap<DedupKey, RequestId> = FxHashMap::default();
    for request in &requests {
        if request.source != SourceSystem::LegacyLedger {
            key_to_id
                .entry(dedup_key(request))
                .or_insert_with(|| request.id.clone());
        }
    }

    let mut seen_ids: FxHashSet<RequestId> = FxHashSet::default();
    let mut kept = Vec::with_capacity(requests.len());

    for request in requests {
        if request.source == SourceSystem::LegacyLedger {
            // Explicit cross-reference: this entry was already promoted
            if request.origin_processed_marker.is_some() {
                debug!(origin = %request.origin_key, "legacy entry already migrated, dropped");
                continue;
            }
            // Heuristic match against a structured-store record
            if let Some(existing) = key_to_id.get(&dedup_key(&request)) {
                anomalies.push(Anomaly::HeuristicMerge {
                    kept: existing.clone(),
                    discarded_origin: request.origin_key.clone(),
                });
                continue;
            }
        }

        // Guard against an adapter returning its own record twice
        if !seen_ids.insert(request.id.clone()) {
            debug!(id = %request.id, "duplicate canonical id dropped");
            continue;
        }
        kept.push(request);
    }

    (kept, anomalies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FxTable;
    use crate::core_types::{Region, WithdrawalStatus};
    use crate::models::PayoutMethod;
    use crate::tax;
    use chrono::{TimeZone, Utc};

    fn request(
        id: &str,
        source: SourceSystem,
        creator: &str,
        amount: i64,
        day: u32,
    ) -> WithdrawalRequest {
        let mut r = WithdrawalRequest {
            id: id.into(),
            source,
            origin_key: id.to_string(),
            region: Region::Domestic,
            creator_id: creator.to_string(),
            creator_name: creator.to_string(),
            requested_amount: amount,
            payout_method: PayoutMethod::empty_bank_transfer(),
            status: WithdrawalStatus::Pending,
            priority: 0,
            tax_amount: 0,
            net_amount: 0,
            admin_notes: None,
            rejection_reason: None,
            created_at: Utc.with_ymd_and_hms(2026, 8, day, 12, 0, 0).unwrap(),
            processed_at: None,
            completed_at: None,
            origin_processed_marker: None,
            refund_ledger_entry_id: None,
        };
        tax::apply(&mut r, &FxTable::default());
        r
    }

    #[test]
    fn test_migrated_legacy_entry_dropped() {
        let canonical = request("w-1", SourceSystem::CanonicalPayoutStore, "c-1", 10_000, 3);
        let mut legacy = request("tx-1", SourceSystem::LegacyLedger, "c-1", 10_000, 3);
        legacy.origin_processed_marker = Some("w-1".to_string());

        let (kept, anomalies) = dedup(vec![canonical, legacy]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id.as_str(), "w-1");
        assert!(anomalies.is_empty());
    }

    #[test]
    fn test_heuristic_merge_flags_anomaly() {
        let canonical = request("w-2", SourceSystem::CanonicalPayoutStore, "c-1", 10_000, 3);
        let legacy = request("tx-2", SourceSystem::LegacyLedger, "c-1", 10_000, 3);

        let (kept, anomalies) = dedup(vec![canonical, legacy]);
        assert_eq!(kept.len(), 1);
        assert_eq!(anomalies.len(), 1);
        assert!(matches!(
            &anomalies[0],
            Anomaly::HeuristicMerge { kept, discarded_origin }
                if kept.as_str() == "w-2" && discarded_origin == "tx-2"
        ));
    }

    #[test]
    fn test_unmatched_legacy_entry_becomes_candidate() {
        let canonical = request("w-3", SourceSystem::CanonicalPayoutStore, "c-1", 10_000, 3);
        // Different day, so the heuristic key does not collide
        let legacy = request("tx-3", SourceSystem::LegacyLedger, "c-1", 10_000, 4);

        let (kept, anomalies) = dedup(vec![canonical, legacy]);
        assert_eq!(kept.len(), 2);
        assert!(anomalies.is_empty());
        assert!(kept.iter().any(|r| r.source == SourceSystem::LegacyLedger
            && r.status == WithdrawalStatus::Pending));
    }

    #[test]
    fn test_identity_dedup_guards_double_fetch() {
        let a = request("w-4", SourceSystem::CanonicalPayoutStore, "c-2", 5_000, 1);
        let b = request("w-4", SourceSystem::CanonicalPayoutStore, "c-2", 5_000, 1);
        let (kept, _) = dedup(vec![a, b]);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_regional_mirror_collapses_by_identity() {
        // A row mirrored from the regional store into the canonical
        // store keeps its id, so the identity pass collapses the pair;
        // the ledger copy merges by the heuristic key on top.
        let canonical = request("w-5", SourceSystem::CanonicalPayoutStore, "c-3", 8_000, 2);
        let regional = request("w-5", SourceSystem::RegionalWithdrawalStore, "c-3", 8_000, 2);
        let legacy = request("tx-5", SourceSystem::LegacyLedger, "c-3", 8_000, 2);

        let (kept, anomalies) = dedup(vec![canonical, regional, legacy]);
        assert_eq!(kept.len(), 1);
        assert_eq!(anomalies.len(), 1);
    }
}
