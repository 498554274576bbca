//! Host half of the protocol.
//!
//! A [`HostShell`] mounts one form, relays each submission to a
//! [`Submitter`] and always answers it with exactly one `form:result`.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::bus::Port;
use crate::context::FieldStore;
use crate::error::Result;
use crate::protocol::{
    Feature, InsuranceType, Message, ResultMessage, StartMessage, SubmitMessage,
};
use crate::record::FormRecord;

/// What the backend made of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_id: Option<String>,
}

impl SubmitOutcome {
    pub fn accepted(result_id: impl Into<String>, message: Option<String>) -> Self {
        Self {
            ok: true,
            message,
            error: None,
            result_id: Some(result_id.into()),
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

impl From<SubmitOutcome> for ResultMessage {
    fn from(outcome: SubmitOutcome) -> Self {
        ResultMessage {
            ok: outcome.ok,
            message: outcome.message,
            error: outcome.error,
            result_id: outcome.result_id,
        }
    }
}

/// The host application's submit callback.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, record: FormRecord) -> anyhow::Result<SubmitOutcome>;
}

/// Adapts an async closure into a [`Submitter`].
pub struct FnSubmitter<F>(F);

pub fn submitter_fn<F, Fut>(f: F) -> FnSubmitter<F>
where
    F: Fn(FormRecord) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<SubmitOutcome>> + Send,
{
    FnSubmitter(f)
}

#[async_trait]
impl<F, Fut> Submitter for FnSubmitter<F>
where
    F: Fn(FormRecord) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<SubmitOutcome>> + Send,
{
    async fn submit(&self, record: FormRecord) -> anyhow::Result<SubmitOutcome> {
        (self.0)(record).await
    }
}

/// Looks up prefill data for a form by opaque token.
#[async_trait]
pub trait PrefillSource: Send + Sync {
    async fn prefill(&self, token: &str) -> anyhow::Result<Option<Value>>;
}

#[derive(Default)]
pub struct InMemoryPrefill {
    entries: DashMap<String, Value>,
}

impl InMemoryPrefill {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: impl Into<String>, data: Value) {
        self.entries.insert(token.into(), data);
    }
}

#[async_trait]
impl PrefillSource for InMemoryPrefill {
    async fn prefill(&self, token: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.entries.get(token).map(|entry| entry.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    pub brand: String,
    pub feature: Feature,
    #[serde(deserialize_with = "crate::protocol::start_insurance::deserialize")]
    pub insurance: InsuranceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefill_token: Option<String>,
}

impl HostConfig {
    pub fn new(brand: impl Into<String>, feature: Feature, insurance: InsuranceType) -> Self {
        Self {
            brand: brand.into(),
            feature,
            insurance,
            initial_data: None,
            prefill_token: None,
        }
    }
}

pub struct HostShell {
    config: HostConfig,
    submitter: Arc<dyn Submitter>,
    prefill: Option<Arc<dyn PrefillSource>>,
}

impl HostShell {
    pub fn new(config: HostConfig, submitter: Arc<dyn Submitter>) -> Self {
        Self {
            config,
            submitter,
            prefill: None,
        }
    }

    pub fn with_prefill(mut self, prefill: Arc<dyn PrefillSource>) -> Self {
        self.prefill = Some(prefill);
        self
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Compose the `form:start` message. Prefill data is laid over any
    /// configured initial data; a failing prefill lookup only loses the
    /// prefill.
    pub async fn start_message(&self) -> StartMessage {
        let mut start =
            StartMessage::new(&self.config.brand, self.config.feature, self.config.insurance);
        let initial = FieldStore::new();
        if let Some(initial_data) = &self.config.initial_data {
            initial.merge(initial_data.clone());
        }

        if let (Some(token), Some(source)) = (&self.config.prefill_token, &self.prefill) {
            match source.prefill(token).await {
                Ok(Some(data)) => {
                    debug!(brand = %self.config.brand, "prefill found");
                    initial.merge(data);
                }
                Ok(None) => debug!(brand = %self.config.brand, "no prefill for token"),
                Err(e) => warn!(brand = %self.config.brand, error = %e, "prefill lookup failed"),
            }
        }

        if !initial.is_empty() {
            start.initial_data = Some(initial.to_document());
        }
        start
    }

    pub async fn mount(&self, port: &Port) -> Result<()> {
        let start = self.start_message().await;
        info!(
            brand = %start.brand,
            feature = %start.feature,
            insurance = %start.insurance,
            prefilled = start.initial_data.is_some(),
            "mounting form"
        );
        port.send(&Message::Start(start))
    }

    /// Handle one submission: loading on, callback, loading off, result.
    pub async fn relay(&self, port: &Port, record: FormRecord) -> Result<ResultMessage> {
        port.send(&Message::Submit(SubmitMessage::Loading(true)))?;

        let submitter = self.submitter.clone();
        let outcome = tokio::spawn(async move { submitter.submit(record).await }).await;
        let result = match outcome {
            Ok(Ok(outcome)) => ResultMessage::from(outcome),
            Ok(Err(e)) => {
                error!(brand = %self.config.brand, error = %e, "submit callback failed");
                ResultMessage::failure(e.to_string())
            }
            Err(e) => {
                error!(brand = %self.config.brand, error = %e, "submit callback panicked");
                ResultMessage::failure("Submission could not be completed")
            }
        };

        port.send(&Message::Submit(SubmitMessage::Loading(false)))?;
        port.send(&Message::Result(result.clone()))?;
        info!(
            brand = %self.config.brand,
            ok = result.ok,
            result_id = ?result.result_id,
            "submission settled"
        );
        Ok(result)
    }

    /// Mount the form, then relay submissions until the form goes away.
    pub async fn run(self, mut port: Port) -> Result<()> {
        self.mount(&port).await?;
        while let Some(message) = port.recv().await {
            match message {
                Message::Submit(SubmitMessage::Data(record)) => {
                    self.relay(&port, record).await?;
                }
                other => debug!(event = other.name(), "host ignoring message"),
            }
        }
        debug!(brand = %self.config.brand, "form unmounted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::channel;
    use serde_json::json;

    fn health_claim() -> FormRecord {
        serde_json::from_value(json!({
            "insuranceType": "health",
            "policyNumber": "POL-1001",
            "claimType": "emergency",
            "personalInfo": {
                "fullName": "Luis Gomez",
                "email": "luis@example.com",
                "phone": "8095550102",
                "idNumber": "00198765432"
            },
            "incidentDate": "2026-09-30",
            "description": "Emergency room visit for a fracture",
            "medicalCenter": "Centro Medico Real",
            "diagnosis": "Wrist fracture",
            "amount": 250.0
        }))
        .unwrap()
    }

    async fn drain(port: &mut Port, count: usize) -> Vec<Message> {
        let mut messages = Vec::new();
        for _ in 0..count {
            messages.push(port.recv().await.unwrap());
        }
        messages
    }

    #[tokio::test]
    async fn relay_wraps_callback_in_loading_messages() {
        let submitter = Arc::new(submitter_fn(|_record| async {
            anyhow::Ok(SubmitOutcome::accepted("c1", Some("saved".to_string())))
        }));
        let shell = HostShell::new(
            HostConfig::new("LPC001", Feature::Claim, InsuranceType::Health),
            submitter,
        );
        let (host, mut form) = channel();

        let result = shell.relay(&host, health_claim()).await.unwrap();
        assert!(result.ok);

        assert_eq!(
            drain(&mut form, 3).await,
            vec![
                Message::Submit(SubmitMessage::Loading(true)),
                Message::Submit(SubmitMessage::Loading(false)),
                Message::Result(ResultMessage::success(
                    Some("saved".to_string()),
                    Some("c1".to_string())
                )),
            ]
        );
    }

    #[tokio::test]
    async fn callback_errors_become_failed_results() {
        let submitter = Arc::new(submitter_fn(|_record| async {
            Err::<SubmitOutcome, _>(anyhow::anyhow!("network down"))
        }));
        let shell = HostShell::new(
            HostConfig::new("LPC001", Feature::Claim, InsuranceType::Health),
            submitter,
        );
        let (host, _form) = channel();

        let result = shell.relay(&host, health_claim()).await.unwrap();
        assert_eq!(result, ResultMessage::failure("network down"));
    }

    struct PanickingSubmitter;

    #[async_trait]
    impl Submitter for PanickingSubmitter {
        async fn submit(&self, _record: FormRecord) -> anyhow::Result<SubmitOutcome> {
            panic!("backend client bug");
        }
    }

    #[tokio::test]
    async fn callback_panics_still_produce_a_result() {
        let shell = HostShell::new(
            HostConfig::new("LPC001", Feature::Claim, InsuranceType::Health),
            Arc::new(PanickingSubmitter),
        );
        let (host, mut form) = channel();

        let result = shell.relay(&host, health_claim()).await.unwrap();
        assert!(!result.ok);
        let messages = drain(&mut form, 3).await;
        assert!(matches!(messages[2], Message::Result(ResultMessage { ok: false, .. })));
    }

    #[tokio::test]
    async fn start_message_merges_prefill_over_initial_data() {
        let prefill = Arc::new(InMemoryPrefill::new());
        prefill.insert(
            "tok-1",
            json!({ "policyNumber": "POL-77", "personalInfo": { "email": "ana@example.com" } }),
        );

        let mut config = HostConfig::new("LPC001", Feature::Claim, InsuranceType::Vehicle);
        config.initial_data = Some(json!({ "policyNumber": "POL-1", "location": "Santiago" }));
        config.prefill_token = Some("tok-1".to_string());

        let shell = HostShell::new(config, Arc::new(submitter_fn(|_record| async {
            anyhow::Ok(SubmitOutcome::accepted("x", None))
        })))
        .with_prefill(prefill);

        let start = shell.start_message().await;
        assert_eq!(
            start.initial_data,
            Some(json!({
                "policyNumber": "POL-77",
                "location": "Santiago",
                "personalInfo": { "email": "ana@example.com" }
            }))
        );
    }

    #[tokio::test]
    async fn run_stops_when_form_unmounts() {
        let shell = HostShell::new(
            HostConfig::new("LPC001", Feature::Quote, InsuranceType::Health),
            Arc::new(submitter_fn(|_record| async {
                anyhow::Ok(SubmitOutcome::accepted("x", None))
            })),
        );
        let (host, mut form) = channel();
        let task = tokio::spawn(shell.run(host));

        assert!(matches!(form.recv().await, Some(Message::Start(_))));
        drop(form);
        task.await.unwrap().unwrap();
    }
}
