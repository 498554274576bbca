//! In-process stand-in for the policy backend: accepts quote and claim
//! records and keeps them for lookup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use form_flow::{Flow, FormRecord, InsuranceType, SubmitOutcome, Submitter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSubmission {
    pub id: String,
    pub flow: Flow,
    pub insurance_type: InsuranceType,
    pub record: FormRecord,
    pub received_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct SubmissionStore {
    submissions: Arc<DashMap<String, StoredSubmission>>,
}

impl SubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an accepted record and return its id.
    pub fn accept(&self, record: FormRecord) -> StoredSubmission {
        let prefix = match record.flow() {
            Flow::Quote => "Q",
            Flow::Claim => "C",
        };
        let id = format!("{prefix}-{}", Uuid::new_v4().simple());
        let submission = StoredSubmission {
            id: id.clone(),
            flow: record.flow(),
            insurance_type: record.insurance_type(),
            record,
            received_at: Utc::now(),
        };
        info!(
            submission_id = %id,
            flow = %submission.flow,
            insurance = %submission.insurance_type,
            "submission stored"
        );
        self.submissions.insert(id, submission.clone());
        submission
    }

    pub fn get(&self, id: &str) -> Option<StoredSubmission> {
        self.submissions.get(id).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }
}

#[async_trait]
impl Submitter for SubmissionStore {
    async fn submit(&self, record: FormRecord) -> anyhow::Result<SubmitOutcome> {
        let stored = self.accept(record);
        // No message: the form falls back to the brand's success text.
        Ok(SubmitOutcome::accepted(stored.id, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn accepted_records_can_be_looked_up() {
        let store = SubmissionStore::new();
        let record: FormRecord = serde_json::from_value(json!({
            "insuranceType": "health",
            "policyNumber": "POL-1001",
            "claimType": "pharmacy",
            "personalInfo": {
                "fullName": "Luis Gomez",
                "email": "luis@example.com",
                "phone": "8095550102",
                "idNumber": "00198765432"
            },
            "incidentDate": "2026-09-30",
            "description": "Prescription after a consultation",
            "medicalCenter": "Farmacia Carol",
            "diagnosis": "Bronchitis",
            "amount": 42.5
        }))
        .unwrap();

        let outcome = store.submit(record.clone()).await.unwrap();
        assert!(outcome.ok);
        assert!(outcome.message.is_none());

        let id = outcome.result_id.unwrap();
        assert!(id.starts_with("C-"));
        let stored = store.get(&id).unwrap();
        assert_eq!(stored.record, record);
        assert_eq!(stored.insurance_type, InsuranceType::Health);
        assert_eq!(store.len(), 1);
    }
}
