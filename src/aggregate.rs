//! Aggregator
//!
//! Per-region, per-status counts and running totals for the operator
//! dashboard. Recomputed on demand from the in-memory canonical set;
//! nothing here is persisted.

use rustc_hash::FxHashMap;

use crate::core_types::{Region, WithdrawalStatus};
use crate::models::WithdrawalRequest;

/// Count and sum for one `(region, status)` cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSlice {
    pub count: usize,
    pub total_requested: i64,
}

/// Running totals for one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionSummary {
    pub region: Region,
    /// Sum over non-rejected requests
    pub total_requested: i64,
    /// Sum over completed requests
    pub total_completed: i64,
    /// `total_requested - total_completed`
    pub remaining: i64,
}

/// Dashboard snapshot.
#[derive(Debug, Clone)]
pub struct AggregateReport {
    /// Non-empty cells, ordered by region then status
    pub by_region_status: Vec<(Region, WithdrawalStatus, StatusSlice)>,
    pub regions: Vec<RegionSummary>,
    pub pending_count: usize,
    pub approved_count: usize,
    pub completed_count: usize,
    /// Total requested amount actually disbursed
    pub total_paid_out: i64,
}

pub fn aggregate(requests: &[WithdrawalRequest]) -> AggregateReport {
    let mut cells: FxHashMap<(Region, WithdrawalStatus), StatusSlice> = FxHashMap::default();
    for r in requests {
        let slice = cells.entry((r.region, r.status)).or_default();
        slice.count += 1;
        slice.total_requested += r.requested_amount;
    }

    let mut by_region_status: Vec<(Region, WithdrawalStatus, StatusSlice)> = cells
        .iter()
        .map(|(&(region, status), &slice)| (region, status, slice))
        .collect();
    by_region_status.sort_by_key(|(region, status, _)| (*region, *status));

    let regions = Region::ALL
        .iter()
        .map(|&region| {
            let total_requested: i64 = requests
                .iter()
                .filter(|r| r.region == region && r.status != WithdrawalStatus::Rejected)
                .map(|r| r.requested_amount)
                .sum();
            let total_completed: i64 = requests
                .iter()
                .filter(|r| r.region == region && r.status == WithdrawalStatus::Completed)
                .map(|r| r.requested_amount)
                .sum();
            RegionSummary {
                region,
                total_requested,
                total_completed,
                remaining: total_requested - total_completed,
            }
        })
        .collect();

    let count_of = |status: WithdrawalStatus| requests.iter().filter(|r| r.status == status).count();

    AggregateReport {
        by_region_status,
        regions,
        pending_count: count_of(WithdrawalStatus::Pending),
        approved_count: count_of(WithdrawalStatus::Approved),
        completed_count: count_of(WithdrawalStatus::Completed),
        total_paid_out: requests
            .iter()
            .filter(|r| r.status == WithdrawalStatus::Completed)
            .map(|r| r.requested_amount)
            .sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::SourceSystem;
    use crate::models::PayoutMethod;
    use chrono::Utc;

    fn request(region: Region, status: WithdrawalStatus, amount: i64) -> WithdrawalRequest {
        WithdrawalRequest {
            id: crate::models::RequestId::mint(),
            source: SourceSystem::CanonicalPayoutStore,
            origin_key: String::new(),
            region,
            creator_id: "c".to_string(),
            creator_name: "c".to_string(),
            requested_amount: amount,
            payout_method: PayoutMethod::empty_bank_transfer(),
            status,
            priority: 0,
            tax_amount: 0,
            net_amount: 0,
            admin_notes: None,
            rejection_reason: None,
            created_at: Utc::now(),
            processed_at: None,
            completed_at: None,
            origin_processed_marker: None,
            refund_ledger_entry_id: None,
        }
    }

    #[test]
    fn test_region_totals_exclude_rejected() {
        let requests = vec![
            request(Region::Domestic, WithdrawalStatus::Pending, 10_000),
            request(Region::Domestic, WithdrawalStatus::Completed, 20_000),
            request(Region::Domestic, WithdrawalStatus::Rejected, 5_000),
            request(Region::Japan, WithdrawalStatus::Approved, 7_000),
        ];
        let report = aggregate(&requests);

        let domestic = report
            .regions
            .iter()
            .find(|s| s.region == Region::Domestic)
            .unwrap();
        assert_eq!(domestic.total_requested, 30_000);
        assert_eq!(domestic.total_completed, 20_000);
        assert_eq!(domestic.remaining, 10_000);

        assert_eq!(report.pending_count, 1);
        assert_eq!(report.approved_count, 1);
        assert_eq!(report.completed_count, 1);
        assert_eq!(report.total_paid_out, 20_000);
    }

    #[test]
    fn test_cells_count_and_sum() {
        let requests = vec![
            request(Region::Domestic, WithdrawalStatus::Pending, 1_000),
            request(Region::Domestic, WithdrawalStatus::Pending, 2_000),
        ];
        let report = aggregate(&requests);
        assert_eq!(report.by_region_status.len(), 1);
        let (region, status, slice) = report.by_region_status[0];
        assert_eq!(region, Region::Domestic);
        assert_eq!(status, WithdrawalStatus::Pending);
        assert_eq!(slice.count, 2);
        assert_eq!(slice.total_requested, 3_000);
    }

    #[test]
    fn test_empty_set() {
        let report = aggregate(&[]);
        assert!(report.by_region_status.is_empty());
        assert_eq!(report.total_paid_out, 0);
        assert!(report.regions.iter().all(|r| r.remaining == 0));
    }
}
