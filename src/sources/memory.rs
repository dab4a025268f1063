//! In-memory source adapter
//!
//! Backs the test suite and the fixture demo. Doubles as the reference
//! for write-back semantics: patches mutate the held payloads the same
//! way a real store adapter would mutate its rows, and every applied
//! patch is kept for assertions.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{SourceAdapter, SourceError, WriteBackPatch};
use crate::core_types::{Region, SourceSystem};
use crate::models::{PayoutMethod, RawRecord, WithdrawalRequest};

pub struct MemorySource {
    source: SourceSystem,
    region: Option<Region>,
    records: Mutex<Vec<RawRecord>>,
    applied: Mutex<Vec<(String, WriteBackPatch)>>,
    fail_fetch: AtomicBool,
}

impl MemorySource {
    pub fn new(source: SourceSystem, region: Option<Region>) -> Self {
        Self {
            source,
            region,
            records: Mutex::new(Vec::new()),
            applied: Mutex::new(Vec::new()),
            fail_fetch: AtomicBool::new(false),
        }
    }

    pub fn with_records(
        source: SourceSystem,
        region: Option<Region>,
        rows: Vec<(String, serde_json::Value)>,
    ) -> Self {
        let adapter = Self::new(source, region);
        {
            let mut records = adapter.records.lock().unwrap();
            for (id, payload) in rows {
                records.push(RawRecord {
                    id,
                    source,
                    region,
                    payload,
                });
            }
        }
        adapter
    }

    pub fn push(&self, id: impl Into<String>, payload: serde_json::Value) {
        self.records.lock().unwrap().push(RawRecord {
            id: id.into(),
            source: self.source,
            region: self.region,
            payload,
        });
    }

    /// Simulate an outage on the next fetches
    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Patches applied so far, in order
    pub fn applied_patches(&self) -> Vec<(String, WriteBackPatch)> {
        self.applied.lock().unwrap().clone()
    }

    /// Current raw rows
    pub fn rows(&self) -> Vec<RawRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Payload a promoted request is stored under, in this store's own
    /// field names (the regional table's shape)
    fn promoted_payload(request: &WithdrawalRequest) -> serde_json::Value {
        let mut payload = json!({
            "creator_id": request.creator_id,
            "creator_name": request.creator_name,
            "points": request.requested_amount,
            "status": request.status.as_str(),
            "priority": request.priority,
            "created_at": request.created_at.to_rfc3339(),
        });
        if let PayoutMethod::BankTransfer {
            bank_name,
            account_number,
            account_holder,
            national_id,
        } = &request.payout_method
        {
            payload["bank"] = json!(bank_name);
            payload["account_no"] = json!(account_number);
            payload["holder"] = json!(account_holder);
            if let Some(enc) = national_id {
                payload["resident_registration_number"] = json!(enc.as_str());
            }
        }
        if let Some(notes) = &request.admin_notes {
            payload["admin_notes"] = json!(notes);
        }
        if let Some(at) = request.processed_at {
            payload["processed_at"] = json!(at.to_rfc3339());
        }
        payload
    }
}

#[async_trait]
impl SourceAdapter for MemorySource {
    fn source(&self) -> SourceSystem {
        self.source
    }

    fn region_hint(&self) -> Option<Region> {
        self.region
    }

    async fn fetch(&self) -> Result<Vec<RawRecord>, SourceError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable(
                self.source,
                "simulated outage".to_string(),
            ));
        }
        Ok(self.records.lock().unwrap().clone())
    }

    async fn write_back(&self, record_id: &str, patch: WriteBackPatch) -> Result<(), SourceError> {
        let mut records = self.records.lock().unwrap();

        match &patch {
            WriteBackPatch::Insert { request } => {
                // Idempotent: a re-run with the same id overwrites
                let payload = Self::promoted_payload(request);
                if let Some(existing) = records.iter_mut().find(|r| r.id == record_id) {
                    existing.payload = payload;
                } else {
                    records.push(RawRecord {
                        id: record_id.to_string(),
                        source: self.source,
                        region: self.region,
                        payload,
                    });
                }
            }
            WriteBackPatch::MarkMigrated { canonical_id } => {
                let record = records
                    .iter_mut()
                    .find(|r| r.id == record_id)
                    .ok_or_else(|| {
                        SourceError::RecordNotFound(self.source, record_id.to_string())
                    })?;
                record.payload["migrated_withdrawal_id"] = json!(canonical_id.as_str());
            }
            WriteBackPatch::Status {
                status,
                priority,
                admin_notes,
                rejection_reason,
                processed_at,
                completed_at,
                refund_ledger_entry_id,
            } => {
                let record = records
                    .iter_mut()
                    .find(|r| r.id == record_id)
                    .ok_or_else(|| {
                        SourceError::RecordNotFound(self.source, record_id.to_string())
                    })?;
                record.payload["status"] = json!(status.as_str());
                if let Some(p) = priority {
                    record.payload["priority"] = json!(p);
                }
                if let Some(notes) = admin_notes {
                    record.payload["admin_notes"] = json!(notes);
                }
                if let Some(reason) = rejection_reason {
                    record.payload["rejection_reason"] = json!(reason);
                }
                if let Some(at) = processed_at {
                    record.payload["processed_at"] = json!(at.to_rfc3339());
                }
                if let Some(at) = completed_at {
                    record.payload["completed_at"] = json!(at.to_rfc3339());
                }
                if let Some(entry) = refund_ledger_entry_id {
                    record.payload["refund_ledger_entry_id"] = json!(entry.to_string());
                }
            }
        }

        drop(records);
        self.applied
            .lock()
            .unwrap()
            .push((record_id.to_string(), patch));
        Ok(())
    }
}
