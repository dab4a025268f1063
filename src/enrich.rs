//! PII enricher
//!
//! The national id lives in the application-intake table, filled at
//! profile submission, not at withdrawal time. This pass backfills it by
//! matching bank account identity. Best effort only: an unmatched request
//! proceeds with the field empty and is surfaced as unregistered, never
//! blocking the pipeline.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{Anomaly, EncryptedString, PayoutMethod, WithdrawalRequest};

/// One row of the profile-intake table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeRecord {
    pub holder_name: String,
    pub account_number: String,
    /// Already-encrypted national id, stored as ciphertext at intake time
    pub national_id: EncryptedString,
}

/// Pass-scoped lookup built once per reconciliation run.
pub struct PiiDirectory {
    by_identity: FxHashMap<(String, String), EncryptedString>,
}

/// Match key: case-folded holder name plus digits-only account number,
/// so formatting differences between stores do not break the join.
fn identity_key(holder: &str, account: &str) -> (String, String) {
    (
        holder.trim().to_lowercase(),
        account.chars().filter(|c| c.is_ascii_digit()).collect(),
    )
}

impl PiiDirectory {
    pub fn from_intake(records: &[IntakeRecord]) -> Self {
        let mut by_identity = FxHashMap::default();
        for record in records {
            if record.national_id.is_empty() {
                continue;
            }
            by_identity
                .entry(identity_key(&record.holder_name, &record.account_number))
                .or_insert_with(|| record.national_id.clone());
        }
        Self { by_identity }
    }

    pub fn lookup(&self, holder: &str, account: &str) -> Option<&EncryptedString> {
        self.by_identity.get(&identity_key(holder, account))
    }

    pub fn len(&self) -> usize {
        self.by_identity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_identity.is_empty()
    }
}

/// Backfill missing national ids in place.
///
/// Returns one anomaly per bank-transfer request that stays unregistered.
/// Wallet payouts carry no national id and are not flagged.
pub fn enrich(requests: &mut [WithdrawalRequest], directory: &PiiDirectory) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    for request in requests.iter_mut() {
        let PayoutMethod::BankTransfer {
            account_number,
            account_holder,
            national_id,
            ..
        } = &mut request.payout_method
        else {
            continue;
        };
        if national_id.is_some() {
            continue;
        }

        match directory.lookup(account_holder, account_number) {
            Some(found) => {
                debug!(id = %request.id, "national id backfilled from intake table");
                *national_id = Some(found.clone());
            }
            None => {
                anomalies.push(Anomaly::UnregisteredPii {
                    id: request.id.clone(),
                    creator_name: request.creator_name.clone(),
                });
            }
        }
    }

    anomalies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{Region, SourceSystem, WithdrawalStatus};
    use chrono::Utc;

    fn bank_request(id: &str, holder: &str, account: &str) -> WithdrawalRequest {
        WithdrawalRequest {
            id: id.into(),
            source: SourceSystem::CanonicalPayoutStore,
            origin_key: id.to_string(),
            region: Region::Domestic,
            creator_id: "c-1".to_string(),
            creator_name: holder.to_string(),
            requested_amount: 10_000,
            payout_method: PayoutMethod::BankTransfer {
                bank_name: "BankX".to_string(),
                account_number: account.to_string(),
                account_holder: holder.to_string(),
                national_id: None,
            },
            status: WithdrawalStatus::Pending,
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

    fn intake(holder: &str, account: &str) -> IntakeRecord {
        IntakeRecord {
            holder_name: holder.to_string(),
            account_number: account.to_string(),
            national_id: EncryptedString::new("enc:id"),
        }
    }

    #[test]
    fn test_backfill_matches_across_formatting() {
        // Store keeps dashes, intake does not; holder case differs
        let directory = PiiDirectory::from_intake(&[intake("holder name", "1102233")]);
        let mut requests = vec![bank_request("w-1", "Holder Name", "110-22-33")];

        let anomalies = enrich(&mut requests, &directory);
        assert!(anomalies.is_empty());
        assert!(requests[0].payout_method.national_id().is_some());
    }

    #[test]
    fn test_unmatched_request_flagged_not_blocked() {
        let directory = PiiDirectory::from_intake(&[]);
        let mut requests = vec![bank_request("w-2", "Holder Name", "110-22-33")];

        let anomalies = enrich(&mut requests, &directory);
        assert_eq!(anomalies.len(), 1);
        assert!(matches!(&anomalies[0], Anomaly::UnregisteredPii { id, .. } if id.as_str() == "w-2"));
        assert!(requests[0].payout_method.national_id().is_none());
    }

    #[test]
    fn test_existing_national_id_untouched() {
        let directory = PiiDirectory::from_intake(&[intake("Holder Name", "1102233")]);
        let mut requests = vec![bank_request("w-3", "Holder Name", "1102233")];
        if let PayoutMethod::BankTransfer { national_id, .. } = &mut requests[0].payout_method {
            *national_id = Some(EncryptedString::new("enc:original"));
        }

        let anomalies = enrich(&mut requests, &directory);
        assert!(anomalies.is_empty());
        assert_eq!(
            requests[0].payout_method.national_id().unwrap().as_str(),
            "enc:original"
        );
    }

    #[test]
    fn test_wallet_payouts_not_flagged() {
        let directory = PiiDirectory::from_intake(&[]);
        let mut request = bank_request("w-4", "x", "1");
        request.payout_method = PayoutMethod::ExternalWallet {
            email: "creator@example.com".to_string(),
        };
        let anomalies = enrich(&mut [request], &directory);
        assert!(anomalies.is_empty());
    }
}
