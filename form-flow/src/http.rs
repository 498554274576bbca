//! [`Submitter`] that forwards validated records to a remote backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FormError;
use crate::host::{SubmitOutcome, Submitter};
use crate::record::FormRecord;

/// What the backend returns for an accepted submission.
#[derive(Debug, Deserialize)]
struct Receipt {
    id: String,
    #[serde(default)]
    message: Option<String>,
}

/// Posts quotes to `{base_url}/quotes` and claims to `{base_url}/claims`.
#[derive(Clone)]
pub struct HttpSubmitter {
    client: Client,
    base_url: String,
}

impl HttpSubmitter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self, record: &FormRecord) -> String {
        format!("{}/{}s", self.base_url, record.flow())
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn submit(&self, record: FormRecord) -> anyhow::Result<SubmitOutcome> {
        let url = self.endpoint(&record);
        debug!(url = %url, insurance = %record.insurance_type(), "posting submission");

        let response = self
            .client
            .post(&url)
            .json(&record)
            .send()
            .await
            .map_err(|e| FormError::SubmissionFailed(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if status.is_client_error() {
            // Rejections carry a reason the person filling in the form can act on.
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let reason = body["error"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Backend rejected the submission ({status})"));
            warn!(url = %url, status = %status, reason = %reason, "submission rejected");
            return Ok(SubmitOutcome::rejected(reason));
        }
        if !status.is_success() {
            return Err(FormError::SubmissionFailed(format!("backend returned {status}")).into());
        }

        let receipt: Receipt = response
            .json()
            .await
            .map_err(|e| FormError::SubmissionFailed(format!("unreadable receipt: {e}")))?;
        Ok(SubmitOutcome::accepted(receipt.id, receipt.message))
    }
}
