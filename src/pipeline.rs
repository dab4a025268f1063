//! Reconciliation pass
//!
//! One pass pulls every source, funnels the raw records through
//! normalize -> dedup -> enrich and hands the resulting canonical
//! snapshot to the approval engine, aggregator and exporter. All lookup
//! state is local to the pass, so runs are independent and re-entrant.

use std::sync::Arc;
use tracing::info;

use crate::config::FxTable;
use crate::dedup;
use crate::enrich::{self, IntakeRecord, PiiDirectory};
use crate::models::{Anomaly, WithdrawalRequest};
use crate::normalize;
use crate::sources::{self, SourceAdapter};

/// Result of one reconciliation pass.
#[derive(Debug)]
pub struct PassOutcome {
    /// Canonical set: exactly one request per physical withdrawal
    pub requests: Vec<WithdrawalRequest>,
    /// Everything an operator should look at, in detection order
    pub anomalies: Vec<Anomaly>,
}

impl PassOutcome {
    /// Requests whose payout method is missing fields (unparseable
    /// ledger descriptions); shown to operators as incomplete
    pub fn incomplete(&self) -> impl Iterator<Item = &WithdrawalRequest> {
        self.requests
            .iter()
            .filter(|r| !r.payout_method.is_complete())
    }
}

pub struct Reconciler {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    fx: FxTable,
}

impl Reconciler {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, fx: FxTable) -> Self {
        Self { adapters, fx }
    }

    pub fn adapters(&self) -> &[Arc<dyn SourceAdapter>] {
        &self.adapters
    }

    pub fn fx(&self) -> &FxTable {
        &self.fx
    }

    /// Run one full pass.
    ///
    /// Sources fetch concurrently; a failing source is skipped and
    /// reported, never fatal. The intake records feed the PII backfill.
    pub async fn run_pass(&self, intake: &[IntakeRecord]) -> PassOutcome {
        let (raw, mut anomalies) = sources::fetch_all(&self.adapters).await;
        info!(records = raw.len(), skipped_sources = anomalies.len(), "fetch stage done");

        let (normalized, mut normalize_anomalies) = normalize::normalize_all(&raw, &self.fx);
        anomalies.append(&mut normalize_anomalies);
        info!(requests = normalized.len(), "normalize stage done");

        let (mut requests, mut dedup_anomalies) = dedup::dedup(normalized);
        anomalies.append(&mut dedup_anomalies);
        info!(requests = requests.len(), "dedup stage done");

        let directory = PiiDirectory::from_intake(intake);
        let mut enrich_anomalies = enrich::enrich(&mut requests, &directory);
        anomalies.append(&mut enrich_anomalies);
        info!(
            directory = directory.len(),
            anomalies = anomalies.len(),
            "enrich stage done, pass complete"
        );

        PassOutcome { requests, anomalies }
    }
}
