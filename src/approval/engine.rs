//! Approval engine
//!
//! Drives the Pending -> Approved -> Completed / Pending -> Rejected
//! transitions over the pass's canonical set. The in-memory transition is
//! the serialization point (optimistic precondition re-checked under the
//! lock); every downstream effect is an idempotent step that can be
//! re-run after a crash.

use chrono::Utc;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::error::ApprovalError;
use super::services::{Notifier, RefundLedger};
use crate::core_types::{MAX_PRIORITY, Priority, SourceSystem, WithdrawalStatus};
use crate::models::{Anomaly, RequestId, WithdrawalRequest};
use crate::sources::{SourceAdapter, WriteBackPatch};

pub struct ApprovalEngine {
    requests: Mutex<FxHashMap<RequestId, WithdrawalRequest>>,
    adapters: FxHashMap<SourceSystem, Arc<dyn SourceAdapter>>,
    refund_ledger: Arc<dyn RefundLedger>,
    notifier: Arc<dyn Notifier>,
    anomalies: Mutex<Vec<Anomaly>>,
}

impl ApprovalEngine {
    pub fn new(
        requests: Vec<WithdrawalRequest>,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        refund_ledger: Arc<dyn RefundLedger>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let requests = requests
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect::<FxHashMap<_, _>>();
        let adapters = adapters
            .into_iter()
            .map(|a| (a.source(), a))
            .collect::<FxHashMap<_, _>>();
        Self {
            requests: Mutex::new(requests),
            adapters,
            refund_ledger,
            notifier,
            anomalies: Mutex::new(Vec::new()),
        }
    }

    pub fn get(&self, id: &RequestId) -> Option<WithdrawalRequest> {
        self.requests.lock().unwrap().get(id).cloned()
    }

    /// Snapshot of the canonical set for the aggregator and exporter
    pub fn snapshot(&self) -> Vec<WithdrawalRequest> {
        self.requests.lock().unwrap().values().cloned().collect()
    }

    /// Inconsistencies accumulated by side-effect failures
    pub fn anomalies(&self) -> Vec<Anomaly> {
        self.anomalies.lock().unwrap().clone()
    }

    /// Approve a pending request.
    ///
    /// Legacy-ledger requests are promoted here: a first-class record is
    /// inserted into the regional store and the origin ledger entry is
    /// stamped so the next pass does not reimport it.
    pub async fn approve(
        &self,
        id: &RequestId,
        priority: Priority,
        notes: Option<String>,
    ) -> Result<WithdrawalRequest, ApprovalError> {
        if priority > MAX_PRIORITY {
            return Err(ApprovalError::PriorityOutOfRange(priority));
        }

        let approved = self.transition(id, WithdrawalStatus::Pending, |r| {
            r.status = WithdrawalStatus::Approved;
            r.priority = priority;
            r.admin_notes = notes.clone();
            r.processed_at = Some(Utc::now());
        })?;
        info!(id = %id, priority, "request approved");

        if approved.source == SourceSystem::LegacyLedger {
            self.promote(&approved).await;
        } else {
            self.write_back_status(&approved).await;
        }

        Ok(self.get(id).unwrap_or(approved))
    }

    /// Reject a pending request. `reason` is mandatory and non-empty.
    ///
    /// Issues the refund exactly once (keyed by request id) and fires a
    /// best-effort rejection notice. A refund failure after the status
    /// write is surfaced as an anomaly for manual reconciliation.
    pub async fn reject(
        &self,
        id: &RequestId,
        reason: &str,
    ) -> Result<WithdrawalRequest, ApprovalError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ApprovalError::MissingReason);
        }

        let rejected = self.transition(id, WithdrawalStatus::Pending, |r| {
            r.status = WithdrawalStatus::Rejected;
            r.rejection_reason = Some(reason.to_string());
            r.processed_at = Some(Utc::now());
        })?;
        info!(id = %id, reason, "request rejected");

        let rejected = self.settle_refund(rejected).await;
        self.write_back_status(&rejected).await;

        match rejected.contact() {
            Some(contact) => {
                if let Err(e) = self
                    .notifier
                    .send_rejection_notice(contact, &rejected.creator_name, reason)
                    .await
                {
                    // Best effort: the rejection stands either way
                    warn!(id = %id, error = %e, "rejection notice delivery failed");
                }
            }
            None => debug!(id = %id, "no contact on record, rejection notice skipped"),
        }

        Ok(rejected)
    }

    /// Confirm disbursement of an approved request. Terminal.
    pub async fn complete(&self, id: &RequestId) -> Result<WithdrawalRequest, ApprovalError> {
        let completed = self.transition(id, WithdrawalStatus::Approved, |r| {
            r.status = WithdrawalStatus::Completed;
            r.completed_at = Some(Utc::now());
        })?;
        info!(id = %id, "request completed");

        self.write_back_status(&completed).await;
        Ok(completed)
    }

    /// Re-issue the refund for a rejected request whose refund never got
    /// recorded (crash between steps). No-op when the entry id is
    /// already set; the idempotency key makes a duplicate credit
    /// impossible even if the original call did land.
    pub async fn retry_refund(&self, id: &RequestId) -> Result<WithdrawalRequest, ApprovalError> {
        let request = self
            .get(id)
            .ok_or_else(|| ApprovalError::NotFound(id.clone()))?;
        if request.status != WithdrawalStatus::Rejected {
            return Err(ApprovalError::Conflict {
                id: id.clone(),
                expected: WithdrawalStatus::Rejected,
                actual: request.status,
            });
        }
        if request.refund_ledger_entry_id.is_some() {
            return Ok(request);
        }
        let request = self.settle_refund(request).await;
        self.write_back_status(&request).await;
        Ok(request)
    }

    /// Serialized in-memory transition with optimistic precondition.
    ///
    /// The status is re-checked under the lock, so a concurrent operator
    /// action on the same id fails cleanly with a conflict instead of
    /// corrupting state. Nothing is mutated on a failed check.
    fn transition(
        &self,
        id: &RequestId,
        expected: WithdrawalStatus,
        mutate: impl FnOnce(&mut WithdrawalRequest),
    ) -> Result<WithdrawalRequest, ApprovalError> {
        let mut requests = self.requests.lock().unwrap();
        let request = requests
            .get_mut(id)
            .ok_or_else(|| ApprovalError::NotFound(id.clone()))?;
        if request.status != expected {
            return Err(ApprovalError::Conflict {
                id: id.clone(),
                expected,
                actual: request.status,
            });
        }
        mutate(request);
        Ok(request.clone())
    }

    /// Issue the rejection refund if it is not recorded yet.
    async fn settle_refund(&self, request: WithdrawalRequest) -> WithdrawalRequest {
        if request.refund_ledger_entry_id.is_some() {
            return request;
        }

        let reason = request.rejection_reason.clone().unwrap_or_default();
        let idempotency_key = format!("refund-{}", request.id);
        match self
            .refund_ledger
            .record_refund(
                &request.creator_id,
                request.requested_amount,
                &reason,
                &idempotency_key,
            )
            .await
        {
            Ok(entry_id) => {
                let mut requests = self.requests.lock().unwrap();
                if let Some(stored) = requests.get_mut(&request.id) {
                    stored.refund_ledger_entry_id = Some(entry_id);
                    return stored.clone();
                }
                request
            }
            Err(e) => {
                warn!(id = %request.id, error = %e, "refund not recorded, flagged for manual reconciliation");
                self.push_anomaly(Anomaly::RefundPending {
                    id: request.id.clone(),
                    reason: e.to_string(),
                });
                request
            }
        }
    }

    /// Promote an approved legacy candidate into the regional store and
    /// stamp the origin ledger entry. Both patches are idempotent, so a
    /// partially applied promotion is safe to re-run.
    async fn promote(&self, request: &WithdrawalRequest) {
        let canonical_id = request.id.clone();

        if let Some(regional) = self.adapters.get(&SourceSystem::RegionalWithdrawalStore) {
            if let Err(e) = regional
                .write_back(
                    canonical_id.as_str(),
                    WriteBackPatch::Insert {
                        request: request.clone(),
                    },
                )
                .await
            {
                warn!(id = %canonical_id, error = %e, "promotion insert failed");
                self.push_anomaly(Anomaly::WriteBackPending {
                    id: canonical_id.clone(),
                    source: SourceSystem::RegionalWithdrawalStore,
                    reason: e.to_string(),
                });
                return;
            }
        }

        if let Some(ledger) = self.adapters.get(&SourceSystem::LegacyLedger) {
            match ledger
                .write_back(
                    &request.origin_key,
                    WriteBackPatch::MarkMigrated {
                        canonical_id: canonical_id.clone(),
                    },
                )
                .await
            {
                Ok(()) => {
                    let mut requests = self.requests.lock().unwrap();
                    if let Some(stored) = requests.get_mut(&canonical_id) {
                        stored.source = SourceSystem::RegionalWithdrawalStore;
                        stored.origin_key = canonical_id.as_str().to_string();
                        stored.origin_processed_marker = Some(canonical_id.as_str().to_string());
                    }
                    info!(id = %canonical_id, "legacy entry promoted to regional store");
                }
                Err(e) => {
                    warn!(id = %canonical_id, error = %e, "origin marker write failed");
                    self.push_anomaly(Anomaly::WriteBackPending {
                        id: canonical_id.clone(),
                        source: SourceSystem::LegacyLedger,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    /// Write the transition back to the origin store.
    async fn write_back_status(&self, request: &WithdrawalRequest) {
        let Some(adapter) = self.adapters.get(&request.source) else {
            debug!(id = %request.id, source = %request.source, "no adapter registered for write-back");
            return;
        };

        let patch = WriteBackPatch::Status {
            status: request.status,
            priority: Some(request.priority),
            admin_notes: request.admin_notes.clone(),
            rejection_reason: request.rejection_reason.clone(),
            processed_at: request.processed_at,
            completed_at: request.completed_at,
            refund_ledger_entry_id: request.refund_ledger_entry_id,
        };
        if let Err(e) = adapter.write_back(&request.origin_key, patch).await {
            warn!(id = %request.id, source = %request.source, error = %e, "status write-back failed");
            self.push_anomaly(Anomaly::WriteBackPending {
                id: request.id.clone(),
                source: request.source,
                reason: e.to_string(),
            });
        }
    }

    fn push_anomaly(&self, anomaly: Anomaly) {
        self.anomalies.lock().unwrap().push(anomaly);
    }
}
