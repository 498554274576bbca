//! Plays the host side of a claim form by hand and prints every event that
//! crosses the channel, in its wire form.
//!
//! Usage:
//!   cargo run --bin claim_walkthrough                # vehicle claim
//!   cargo run --bin claim_walkthrough -- --health    # health claim
//!   cargo run --bin claim_walkthrough -- --reject "Policy is not active"

use clap::Parser;
use form_flow::{
    BrandCatalog, FormInstance, FormState, InsuranceType, Message, ResultMessage, StartMessage,
    SubmitMessage, UserAction, channel, spawn_form,
};
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "claim_walkthrough")]
#[command(about = "Trace the form:start / form:submit / form:result exchange for a claim")]
struct Args {
    /// File a health claim instead of a vehicle claim
    #[arg(long)]
    health: bool,

    /// Answer the submission with this error instead of accepting it
    #[arg(long)]
    reject: Option<String>,
}

fn claim_fields(insurance: InsuranceType) -> Value {
    let mut document = json!({
        "policyNumber": "POL-2291",
        "personalInfo": {
            "fullName": "Ana Perez",
            "email": "ana@example.com",
            "phone": "809-555-0101",
            "idNumber": "00112345678"
        },
        "incidentDate": "2025-11-02"
    });
    let specific = match insurance {
        InsuranceType::Health => json!({
            "claimType": "hospitalization",
            "description": "Two nights of observation after a fall",
            "medicalCenter": "Hospital General Plaza de la Salud",
            "diagnosis": "Concussion",
            "amount": 1850.75
        }),
        _ => json!({
            "claimType": "collision",
            "description": "Side impact at an intersection",
            "plateNumber": "A123456",
            "location": "Av. 27 de Febrero",
            "policeReport": true,
            "policeReportNumber": "AMET-2025-1102"
        }),
    };
    if let (Value::Object(base), Value::Object(extra)) = (&mut document, specific) {
        base.extend(extra);
    }
    document
}

fn trace(direction: &str, message: &Message) -> anyhow::Result<()> {
    let wire = message.to_wire()?;
    println!("{direction} {} {}", wire.event, wire.detail);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "form_flow=warn".into()),
        )
        .init();

    let args = Args::parse();
    let insurance = if args.health {
        InsuranceType::Health
    } else {
        InsuranceType::Vehicle
    };

    let (mut host, form_port) = channel();
    let form = spawn_form(
        FormInstance::new(Arc::new(BrandCatalog::default())),
        form_port,
        "claim-walkthrough",
    );

    let start = Message::Start(StartMessage::new("LPC001", form_flow::Feature::Claim, insurance));
    trace("host ->", &start)?;
    host.send(&start)?;
    form.wait_for(|snapshot| snapshot.state == FormState::Ready)
        .await?;

    if let Value::Object(fields) = claim_fields(insurance) {
        for (path, value) in fields {
            form.dispatch(UserAction::SetField { path, value }).await?;
        }
    }
    form.dispatch(UserAction::Submit).await?;

    let Some(submission) = host.recv().await else {
        anyhow::bail!("form went away before submitting");
    };
    trace("form ->", &submission)?;
    let record = match submission {
        Message::Submit(SubmitMessage::Data(record)) => record,
        other => anyhow::bail!("expected a submission, got {}", other.name()),
    };

    let result = match args.reject {
        Some(reason) => ResultMessage::failure(reason),
        None => ResultMessage::success(
            Some(format!("Claim received for {}", record.email())),
            Some("C-0001".to_string()),
        ),
    };
    for message in [
        Message::Submit(SubmitMessage::Loading(true)),
        Message::Submit(SubmitMessage::Loading(false)),
        Message::Result(result),
    ] {
        trace("host ->", &message)?;
        host.send(&message)?;
    }

    let settled = form
        .wait_for(|snapshot| snapshot.notice.is_some())
        .await?;
    println!(
        "\nform is {:?}; notice: {}",
        settled.state,
        serde_json::to_string(&settled.notice)?
    );
    Ok(())
}
