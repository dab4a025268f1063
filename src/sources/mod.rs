//! Source adapters
//!
//! One adapter per origin data store. An adapter only knows how to fetch
//! its raw records and apply write-back patches; it carries no business
//! logic. Fetches run concurrently and a failing source never aborts the
//! reconciliation pass - it is logged, surfaced as an anomaly and the
//! pass continues with the remaining sources.

pub mod error;
pub mod memory;

pub use error::SourceError;
pub use memory::MemorySource;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core_types::{Priority, Region, SourceSystem, WithdrawalStatus};
use crate::models::{Anomaly, RawRecord, RequestId, WithdrawalRequest};

/// Mutation applied to an origin store row.
#[derive(Debug, Clone)]
pub enum WriteBackPatch {
    /// Update lifecycle fields after an operator transition
    Status {
        status: WithdrawalStatus,
        priority: Option<Priority>,
        admin_notes: Option<String>,
        rejection_reason: Option<String>,
        processed_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
        refund_ledger_entry_id: Option<Uuid>,
    },
    /// Stamp the origin row as migrated so the next pass skips it
    MarkMigrated { canonical_id: RequestId },
    /// Insert a promoted candidate as a first-class record
    Insert { request: WithdrawalRequest },
}

/// Contract every origin store adapter implements.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Provenance tag for records of this adapter
    fn source(&self) -> SourceSystem;

    /// Region of the store itself, for region-scoped stores
    fn region_hint(&self) -> Option<Region> {
        None
    }

    /// Fetch all raw records currently in the store
    async fn fetch(&self) -> Result<Vec<RawRecord>, SourceError>;

    /// Apply a patch to the record identified by `record_id`.
    ///
    /// For [`WriteBackPatch::Insert`] the id is the new record's key.
    /// Must be idempotent: applying the same patch twice leaves the
    /// store in the same state.
    async fn write_back(&self, record_id: &str, patch: WriteBackPatch) -> Result<(), SourceError>;
}

/// Fetch from every adapter concurrently, degrading per source.
///
/// Returns all records that could be fetched plus one anomaly per
/// source that failed.
pub async fn fetch_all(adapters: &[Arc<dyn SourceAdapter>]) -> (Vec<RawRecord>, Vec<Anomaly>) {
    let fetches = adapters.iter().map(|a| {
        let adapter = Arc::clone(a);
        async move { (adapter.source(), adapter.fetch().await) }
    });

    let mut records = Vec::new();
    let mut anomalies = Vec::new();

    for (source, result) in futures::future::join_all(fetches).await {
        match result {
            Ok(mut batch) => {
                info!(source = %source, count = batch.len(), "source fetched");
                records.append(&mut batch);
            }
            Err(e) => {
                warn!(source = %source, error = %e, "source fetch failed, continuing without it");
                anomalies.push(Anomaly::SourceSkipped {
                    source,
                    reason: e.to_string(),
                });
            }
        }
    }

    (records, anomalies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fetch_all_degrades_on_source_failure() {
        let healthy = Arc::new(MemorySource::with_records(
            SourceSystem::CanonicalPayoutStore,
            None,
            vec![("w-1".to_string(), json!({"creator_id": "c-1"}))],
        ));
        let broken = Arc::new(MemorySource::new(SourceSystem::LegacyLedger, Some(Region::Domestic)));
        broken.set_fail_fetch(true);

        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![healthy, broken];
        let (records, anomalies) = fetch_all(&adapters).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, SourceSystem::CanonicalPayoutStore);
        assert_eq!(anomalies.len(), 1);
        assert!(matches!(
            anomalies[0],
            Anomaly::SourceSkipped {
                source: SourceSystem::LegacyLedger,
                ..
            }
        ));
    }
}
