//! External collaborators of the state machine
//!
//! The refund ledger and the notification service are separate systems;
//! only their call contracts live here, plus in-memory implementations
//! for tests and the fixture demo.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("refund ledger unavailable: {0}")]
    Unavailable(String),

    #[error("refund rejected by ledger: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notice delivery failed: {0}")]
    Delivery(String),
}

/// Credit ledger that receives rejection refunds.
///
/// `record_refund` must be safe to call twice with the same
/// `idempotency_key` without double-crediting the creator.
#[async_trait]
pub trait RefundLedger: Send + Sync {
    async fn record_refund(
        &self,
        creator_id: &str,
        amount: i64,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<Uuid, LedgerError>;
}

/// Best-effort rejection notice dispatch; failures never roll back the
/// rejection itself.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_rejection_notice(
        &self,
        contact: &str,
        creator_name: &str,
        reason: &str,
    ) -> Result<(), NotifyError>;
}

/// One credited refund.
#[derive(Debug, Clone)]
pub struct RefundEntry {
    pub entry_id: Uuid,
    pub creator_id: String,
    pub amount: i64,
    pub reason: String,
}

/// In-memory refund ledger keyed by idempotency key.
pub struct MemoryRefundLedger {
    entries: Mutex<FxHashMap<String, RefundEntry>>,
    fail: AtomicBool,
}

impl MemoryRefundLedger {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
            fail: AtomicBool::new(false),
        }
    }

    /// Simulate an outage on subsequent calls
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn entries(&self) -> Vec<RefundEntry> {
        self.entries.lock().unwrap().values().cloned().collect()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

impl Default for MemoryRefundLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RefundLedger for MemoryRefundLedger {
    async fn record_refund(
        &self,
        creator_id: &str,
        amount: i64,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<Uuid, LedgerError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("simulated outage".to_string()));
        }
        let mut entries = self.entries.lock().unwrap();
        // Second call with the same key returns the original entry
        let entry = entries
            .entry(idempotency_key.to_string())
            .or_insert_with(|| RefundEntry {
                entry_id: Uuid::new_v4(),
                creator_id: creator_id.to_string(),
                amount,
                reason: reason.to_string(),
            });
        Ok(entry.entry_id)
    }
}

/// Notifier that only logs; stands in for the real dispatch transport.
pub struct LogNotifier {
    fail: AtomicBool,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self {
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_rejection_notice(
        &self,
        contact: &str,
        creator_name: &str,
        reason: &str,
    ) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery("simulated outage".to_string()));
        }
        info!(contact, creator = creator_name, reason, "rejection notice sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refund_ledger_idempotency_key() {
        let ledger = MemoryRefundLedger::new();
        let first = ledger
            .record_refund("c-1", 10_000, "invalid account", "refund-w-1")
            .await
            .unwrap();
        let second = ledger
            .record_refund("c-1", 10_000, "invalid account", "refund-w-1")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(ledger.entry_count(), 1);
        assert_eq!(ledger.entries()[0].amount, 10_000);
    }
}
