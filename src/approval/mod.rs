//! Approval state machine
//!
//! Operator-triggered transitions over the reconciled canonical set:
//! approve, reject, complete. Each transition is an optimistic
//! precondition check plus a sequence of idempotent side effects
//! (refund issuance, origin write-back, notification). There is no
//! distributed transaction across the stores; a crash between steps
//! leaves a detectable inconsistency that is surfaced to an operator,
//! never silently auto-corrected.

pub mod engine;
pub mod error;
pub mod services;

pub use engine::ApprovalEngine;
pub use error::ApprovalError;
pub use services::{
    LedgerError, LogNotifier, MemoryRefundLedger, Notifier, NotifyError, RefundEntry, RefundLedger,
};
