//! Exporter
//!
//! Produces the tabular extract handed to downstream bulk payment
//! processing: one row per Pending/Approved request in the window, with
//! the decrypted national id and the full tax breakdown. Output is CSV,
//! UTF-8 with a byte-order mark so spreadsheet imports keep non-ASCII
//! names intact.
//!
//! Decryption happens only here, and only for this authorized output. A
//! failed decryption marks the field and keeps the row; it never fails
//! the extract.

use chrono::{Datelike, Duration, NaiveDate};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::config::FxTable;
use crate::core_types::{Region, WithdrawalStatus};
use crate::crypto::EncryptionService;
use crate::models::{PayoutMethod, WithdrawalRequest};
use crate::tax;

/// Marker written into the national-id column when the ciphertext cannot
/// be decrypted
pub const DECRYPTION_FAILED_MARKER: &str = "DECRYPTION-FAILED";

const HEADER: &str =
    "month,day,name,national_id,gross_amount,income_tax,resident_surtax,net_amount,bank_name,account_number,notes";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Time window of the extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportWindow {
    /// Calendar week, Monday through Sunday
    Week { monday: NaiveDate },
    /// Full history
    Full,
}

impl ExportWindow {
    /// The Monday-Sunday week containing `date`
    pub fn week_of(date: NaiveDate) -> Self {
        let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
        ExportWindow::Week { monday }
    }

    fn contains(&self, date: NaiveDate) -> bool {
        match self {
            ExportWindow::Full => true,
            ExportWindow::Week { monday } => {
                date >= *monday && date < *monday + Duration::days(7)
            }
        }
    }
}

/// Write the extract to `out`. Returns the number of data rows.
pub fn write_extract<W: Write>(
    out: &mut W,
    requests: &[WithdrawalRequest],
    window: ExportWindow,
    region: Region,
    crypto: &dyn EncryptionService,
    fx: &FxTable,
) -> Result<usize, ExportError> {
    let mut rows: Vec<&WithdrawalRequest> = requests
        .iter()
        .filter(|r| r.region == region)
        .filter(|r| {
            matches!(
                r.status,
                WithdrawalStatus::Pending | WithdrawalStatus::Approved
            )
        })
        .filter(|r| window.contains(r.created_at.date_naive()))
        .collect();
    // Batch order: operator priority first, then submission order
    rows.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.created_at.cmp(&b.created_at))
    });

    // Byte-order mark keeps non-ASCII names intact in spreadsheet imports
    write!(out, "\u{feff}")?;
    writeln!(out, "{}", HEADER)?;

    for request in &rows {
        let assessment = tax::assess(request.region, request.requested_amount, fx);

        let national_id = match request.payout_method.national_id() {
            Some(ciphertext) => match crypto.decrypt(ciphertext) {
                Ok(plaintext) => plaintext,
                Err(e) => {
                    warn!(id = %request.id, error = %e, "national id decryption failed, row kept");
                    DECRYPTION_FAILED_MARKER.to_string()
                }
            },
            None => String::new(),
        };

        let (bank_name, account_number) = match &request.payout_method {
            PayoutMethod::BankTransfer {
                bank_name,
                account_number,
                ..
            } => (bank_name.clone(), account_number.clone()),
            PayoutMethod::ExternalWallet { email } => (String::new(), email.clone()),
        };

        let created = request.created_at.date_naive();
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{}",
            created.month(),
            created.day(),
            csv_field(&request.creator_name),
            csv_field(&national_id),
            assessment.gross,
            assessment.income_tax,
            assessment.resident_surtax,
            assessment.net,
            csv_field(&bank_name),
            csv_field(&account_number),
            csv_field(request.admin_notes.as_deref().unwrap_or("")),
        )?;
    }

    Ok(rows.len())
}

/// Write the extract to a file, creating parent directories as needed.
pub fn export_to_file(
    path: &Path,
    requests: &[WithdrawalRequest],
    window: ExportWindow,
    region: Region,
    crypto: &dyn EncryptionService,
    fx: &FxTable,
) -> Result<usize, ExportError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    let rows = write_extract(&mut out, requests, window, region, crypto, fx)?;
    out.flush()?;
    Ok(rows)
}

/// Quote a field when it contains the delimiter, a quote or a newline.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
