//! payout_recon - fixture-driven demo run
//!
//! Loads raw records for each source from JSON fixtures, runs one
//! reconciliation pass, prints the dashboard summary and anomaly list,
//! then writes the weekly extract.
//!
//! ```text
//! ┌──────────┐    ┌────────────┐    ┌───────────┐    ┌──────────┐
//! │ Fixtures │───▶│ Reconciler │───▶│ Aggregate │───▶│  Export  │
//! │  (JSON)  │    │ (3 stages) │    │ (summary) │    │ (CSV+BOM)│
//! └──────────┘    └────────────┘    └───────────┘    └──────────┘
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use payout_recon::approval::{LogNotifier, MemoryRefundLedger};
use payout_recon::config::AppConfig;
use payout_recon::core_types::{Region, SourceSystem};
use payout_recon::crypto::KeyedCipher;
use payout_recon::enrich::IntakeRecord;
use payout_recon::export::{ExportWindow, export_to_file};
use payout_recon::logging::init_logging;
use payout_recon::pipeline::Reconciler;
use payout_recon::sources::{MemorySource, SourceAdapter};
use payout_recon::aggregate;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// One raw row in a source fixture file
#[derive(Debug, Deserialize)]
struct FixtureRow {
    id: String,
    payload: serde_json::Value,
}

fn load_source(
    dir: &Path,
    file: &str,
    source: SourceSystem,
    region: Option<Region>,
) -> Result<Arc<MemorySource>> {
    let path = dir.join(file);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read fixture {}", path.display()))?;
    let rows: Vec<FixtureRow> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid fixture {}", path.display()))?;
    let store = MemorySource::new(source, region);
    let count = rows.len();
    for row in rows {
        store.push(row.id, row.payload);
    }
    println!("Loaded {} records from {}", count, path.display());
    Ok(Arc::new(store))
}

fn load_intake(dir: &Path) -> Result<Vec<IntakeRecord>> {
    let path = dir.join("intake.json");
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read fixture {}", path.display()))?;
    let records: Vec<IntakeRecord> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid fixture {}", path.display()))?;
    println!("Loaded {} intake records from {}", records.len(), path.display());
    Ok(records)
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env);
    let _guard = init_logging(&config);
    info!(env = %env, git = env!("GIT_HASH"), "payout_recon starting");

    let fixture_dir = PathBuf::from(&config.fixture_dir);
    let canonical = load_source(
        &fixture_dir,
        "canonical.json",
        SourceSystem::CanonicalPayoutStore,
        None,
    )?;
    let regional = load_source(
        &fixture_dir,
        "regional.json",
        SourceSystem::RegionalWithdrawalStore,
        Some(Region::Japan),
    )?;
    let ledger = load_source(
        &fixture_dir,
        "ledger.json",
        SourceSystem::LegacyLedger,
        Some(Region::Domestic),
    )?;
    let intake = load_intake(&fixture_dir)?;

    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![canonical, regional, ledger];
    let reconciler = Reconciler::new(adapters.clone(), config.fx.clone());
    let outcome = reconciler.run_pass(&intake).await;

    println!("\nReconciled {} withdrawal requests", outcome.requests.len());

    let report = aggregate::aggregate(&outcome.requests);
    println!(
        "Pending: {}  Approved: {}  Completed: {}  Paid out: {}",
        report.pending_count, report.approved_count, report.completed_count, report.total_paid_out
    );
    for summary in &report.regions {
        println!(
            "  {:<8} requested={:<12} completed={:<12} remaining={}",
            summary.region, summary.total_requested, summary.total_completed, summary.remaining
        );
    }

    if !outcome.anomalies.is_empty() {
        println!("\n{} condition(s) need operator review:", outcome.anomalies.len());
        for anomaly in &outcome.anomalies {
            println!("  - {}", anomaly);
        }
    }

    // Operator actions run against this engine; the demo only needs its
    // snapshot for the extracts below.
    let engine = payout_recon::ApprovalEngine::new(
        outcome.requests.clone(),
        adapters,
        Arc::new(MemoryRefundLedger::new()),
        Arc::new(LogNotifier::new()),
    );

    let cipher = KeyedCipher::new(config.encryption_key.as_deref().unwrap_or("payout-recon-dev-key"));
    let export_dir = PathBuf::from(&config.export_dir);
    let today = Utc::now().date_naive();

    let weekly_path = export_dir.join(format!("weekly_{}.csv", today.format("%Y%m%d")));
    let rows = export_to_file(
        &weekly_path,
        &engine.snapshot(),
        ExportWindow::week_of(today),
        Region::Domestic,
        &cipher,
        &config.fx,
    )?;
    println!("\nWrote weekly extract: {} rows to {}", rows, weekly_path.display());

    let full_path = export_dir.join("full_history.csv");
    let rows = export_to_file(
        &full_path,
        &engine.snapshot(),
        ExportWindow::Full,
        Region::Domestic,
        &cipher,
        &config.fx,
    )?;
    println!("Wrote full extract: {} rows to {}", rows, full_path.display());

    Ok(())
}
