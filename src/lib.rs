//! payout_recon - Withdrawal Reconciliation and Approval Engine
//!
//! Turns creator payout requests recorded inconsistently across several
//! independently-operated stores into a single auditable approval
//! workflow with tax computation, deduplication and idempotent refunds.
//!
//! # Modules
//!
//! - [`core_types`] - Region / status / provenance enums
//! - [`models`] - Canonical `WithdrawalRequest` and raw records
//! - [`sources`] - Source adapter contract plus concurrent fetch
//! - [`normalize`] - Per-source raw-to-canonical mapping
//! - [`dedup`] - Cross-source duplicate collapse
//! - [`enrich`] - Best-effort national-id backfill
//! - [`approval`] - Operator state machine with idempotent side effects
//! - [`tax`] - Withholding and fixed-rate FX payout math
//! - [`aggregate`] - Dashboard counts and running totals
//! - [`export`] - Tax-office extract (CSV, BOM, decrypt-with-marker)
//! - [`pipeline`] - One reconciliation pass end to end
//! - [`crypto`] - Encryption service contract, masking, validation

pub mod aggregate;
pub mod approval;
pub mod config;
pub mod core_types;
pub mod crypto;
pub mod dedup;
pub mod enrich;
pub mod export;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod sources;
pub mod tax;

// Convenient re-exports at crate root
pub use aggregate::{AggregateReport, RegionSummary, StatusSlice, aggregate};
pub use approval::{ApprovalEngine, ApprovalError, Notifier, RefundLedger};
pub use config::{AppConfig, FxTable};
pub use core_types::{Currency, MAX_PRIORITY, Priority, Region, SourceSystem, WithdrawalStatus};
pub use crypto::{EncryptionService, KeyedCipher, mask_national_id, validate_national_id};
pub use enrich::{IntakeRecord, PiiDirectory};
pub use export::{DECRYPTION_FAILED_MARKER, ExportWindow, export_to_file, write_extract};
pub use models::{
    Anomaly, EncryptedString, PayoutMethod, RawRecord, RequestId, WithdrawalRequest,
};
pub use pipeline::{PassOutcome, Reconciler};
pub use sources::{MemorySource, SourceAdapter, SourceError, WriteBackPatch};
