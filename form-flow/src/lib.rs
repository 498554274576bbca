pub mod brand;
pub mod bus;
pub mod context;
pub mod error;
pub mod form;
pub mod host;
#[cfg(feature = "http")]
pub mod http;
pub mod protocol;
pub mod record;
pub mod runner;
pub mod schema;
pub mod storage;

// Re-export commonly used types
pub use brand::{BrandCatalog, BrandCopy};
pub use bus::{Port, Side, channel};
pub use context::FieldStore;
pub use error::{FormError, Result};
pub use form::{
    Clock, FormConfig, FormInstance, FormSnapshot, FormState, Notice, Step, Transition, Trigger,
    UserAction,
};
pub use host::{
    FnSubmitter, HostConfig, HostShell, InMemoryPrefill, PrefillSource, SubmitOutcome, Submitter,
    submitter_fn,
};
#[cfg(feature = "http")]
pub use http::HttpSubmitter;
pub use protocol::{
    FORM_RESULT, FORM_START, FORM_SUBMIT, Feature, Flow, InsuranceType, Message, ResultMessage,
    StartMessage, SubmitMessage, WireEvent,
};
pub use record::{ClaimRecord, FormRecord, QuoteRecord};
pub use runner::{FormHandle, FormRunner, spawn_form};
pub use schema::{Schema, ValidationErrors};
pub use storage::{FormSession, InMemorySessionStorage, SessionStorage};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn runner() -> FormRunner {
        let clock: Clock = Arc::new(|| NaiveDate::from_ymd_opt(2026, 10, 17).unwrap());
        FormRunner::new(Arc::new(BrandCatalog::default())).with_clock(clock)
    }

    async fn set(form: &FormHandle, path: &str, value: serde_json::Value) -> FormSnapshot {
        form.dispatch(UserAction::SetField {
            path: path.to_string(),
            value,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_health_quote_end_to_end() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let host = HostShell::new(
            HostConfig::new("LPC001", Feature::Quote, InsuranceType::Health),
            Arc::new(submitter_fn(move |record: FormRecord| {
                let seen = seen.clone();
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(record.insurance_type(), InsuranceType::Health);
                    anyhow::Ok(SubmitOutcome::accepted("q-42", None))
                }
            })),
        );

        let form = runner().open("test-session", host);
        form.wait_for(|snapshot| snapshot.state == FormState::Ready)
            .await
            .unwrap();

        set(
            &form,
            "personalInfo",
            json!({
                "firstName": "Ana",
                "lastName": "Perez",
                "email": "Ana@Example.com",
                "phone": "8095550101",
                "birthDate": "1988-03-14",
                "idType": "passport",
                "idNumber": "RD1234567"
            }),
        )
        .await;
        set(&form, "acceptTerms", json!(true)).await;
        let snapshot = set(&form, "coverageType", json!("couple")).await;
        assert_eq!(snapshot.visible_sections, vec!["dependents".to_string()]);
        assert!(!snapshot.can_submit);

        let snapshot = set(&form, "dependents", json!(1)).await;
        assert!(snapshot.can_submit);

        let submitting = form.dispatch(UserAction::Submit).await.unwrap();
        assert_eq!(submitting.state, FormState::Submitting);

        let settled = form.wait_for(|snapshot| snapshot.notice.is_some()).await.unwrap();
        assert_eq!(settled.state, FormState::Ready);
        assert!(!settled.is_loading);
        assert!(matches!(
            settled.notice,
            Some(Notice::Success { ref result_id, .. }) if result_id.as_deref() == Some("q-42")
        ));
        assert_eq!(settled.fields["personalInfo"]["firstName"], json!(""));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispatch_after_host_is_gone() {
        let (host, form_port) = channel();
        let form = spawn_form(
            FormInstance::new(Arc::new(BrandCatalog::default())),
            form_port,
            "orphan",
        );
        drop(host);

        form.wait_for(|_| false).await.unwrap_err();
        assert!(matches!(
            form.dispatch(UserAction::Submit).await,
            Err(FormError::ChannelClosed)
        ));
    }

    fn vehicle_claim_host(gate: Arc<Notify>) -> HostShell {
        HostShell::new(
            HostConfig::new("LPC001", Feature::Claim, InsuranceType::Vehicle),
            Arc::new(submitter_fn(move |_record: FormRecord| {
                let gate = gate.clone();
                async move {
                    gate.notified().await;
                    Err::<SubmitOutcome, _>(anyhow::anyhow!("network down"))
                }
            })),
        )
    }

    async fn fill_vehicle_claim(form: &FormHandle) {
        for (path, value) in [
            ("policyNumber", json!("POL-2291")),
            ("claimType", json!("collision")),
            (
                "personalInfo",
                json!({
                    "fullName": "Ana Perez",
                    "email": "ana@example.com",
                    "phone": "8095550101",
                    "idNumber": "00112345678"
                }),
            ),
            ("incidentDate", json!("2026-10-01")),
            ("description", json!("Rear-ended while stopped at a light")),
            ("plateNumber", json!("A123456")),
            ("location", json!("Av. Winston Churchill")),
        ] {
            set(form, path, value).await;
        }
    }

    #[tokio::test]
    async fn test_unwritable_path_keeps_the_form_running() {
        let form = runner().open("far-index", vehicle_claim_host(Arc::new(Notify::new())));
        form.wait_for(|snapshot| snapshot.state == FormState::Ready)
            .await
            .unwrap();

        let refused = form
            .dispatch(UserAction::SetField {
                path: format!("beneficiaries.{}.name", usize::MAX - 1),
                value: json!("Rosa"),
            })
            .await;
        assert!(matches!(refused, Err(FormError::InvalidFieldPath(_))));

        let snapshot = set(&form, "plateNumber", json!("A123456")).await;
        assert_eq!(snapshot.fields["plateNumber"], "A123456");
        assert!(snapshot.fields.get("beneficiaries").is_none());
    }

    #[tokio::test]
    async fn test_edits_during_submission_are_ignored() {
        let gate = Arc::new(Notify::new());
        let form = runner().open("busy", vehicle_claim_host(gate.clone()));
        form.wait_for(|snapshot| snapshot.state == FormState::Ready)
            .await
            .unwrap();
        fill_vehicle_claim(&form).await;
        form.dispatch(UserAction::Submit).await.unwrap();
        form.wait_for(|snapshot| snapshot.is_loading).await.unwrap();

        set(&form, "plateNumber", json!("Z999999")).await;
        set(&form, "policeReport", json!(true)).await;
        let snapshot = set(&form, "policeReportNumber", json!("stale")).await;
        assert_eq!(snapshot.state, FormState::Submitting);
        assert_eq!(snapshot.fields["plateNumber"], "A123456");

        gate.notify_one();
        let settled = form.wait_for(|snapshot| snapshot.notice.is_some()).await.unwrap();
        assert_eq!(settled.fields["plateNumber"], "A123456");
        assert_eq!(settled.fields["policeReport"], false);
        assert!(settled.fields.get("policeReportNumber").is_none());
        assert!(settled.can_submit);
    }

    #[tokio::test]
    async fn test_finished_resolves_once_unmounted() {
        let form = runner().open("short-lived", vehicle_claim_host(Arc::new(Notify::new())));
        form.wait_for(|snapshot| snapshot.state == FormState::Ready)
            .await
            .unwrap();

        let finished = form.finished();
        drop(form);
        tokio::time::timeout(Duration::from_secs(1), finished)
            .await
            .unwrap();
    }
}
