//! Walks a quote form through the protocol in-process.
//!
//! Usage:
//!   cargo run --bin quote_walkthrough                       # health quote
//!   cargo run --bin quote_walkthrough -- -i life-savings    # other product
//!   cargo run --bin quote_walkthrough -- --fail             # backend failure

use clap::{Parser, ValueEnum};
use form_flow::{
    BrandCatalog, Feature, FormHandle, FormRecord, FormRunner, FormSnapshot, FormState,
    HostConfig, HostShell, InsuranceType, SubmitOutcome, UserAction, submitter_fn,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Product {
    Health,
    Life,
    LifeSavings,
    Vehicle,
}

impl From<Product> for InsuranceType {
    fn from(product: Product) -> Self {
        match product {
            Product::Health => InsuranceType::Health,
            Product::Life => InsuranceType::Life,
            Product::LifeSavings => InsuranceType::LifeSavings,
            Product::Vehicle => InsuranceType::Vehicle,
        }
    }
}

#[derive(Parser)]
#[command(name = "quote_walkthrough")]
#[command(about = "Fill in and submit a quote form without a browser")]
struct Args {
    /// Product to quote
    #[arg(short = 'i', long, value_enum, default_value = "health")]
    insurance: Product,

    /// Brand code sent in form:start
    #[arg(short = 'b', long, default_value = "LPC001")]
    brand: String,

    /// YAML brand catalog
    #[arg(long)]
    brands: Option<std::path::PathBuf>,

    /// Make the submit callback fail
    #[arg(long)]
    fail: bool,
}

fn sample(product: Product) -> Value {
    let mut document = json!({
        "personalInfo": {
            "firstName": "Ana",
            "lastName": "Perez",
            "email": "ana.perez@example.com",
            "phone": "+1 809 555 0101",
            "birthDate": "1988-03-14",
            "idType": "national_id",
            "idNumber": "00112345678"
        },
        "acceptTerms": true
    });
    let product_fields = match product {
        Product::Health => json!({ "coverageType": "family", "dependents": 2, "preExistingConditions": false }),
        Product::Life => json!({
            "coverageAmount": 150000,
            "smoker": false,
            "beneficiaries": [
                { "name": "Luis Perez", "relationship": "spouse", "percentage": 60 },
                { "name": "Sofia Perez", "relationship": "child", "percentage": 40 }
            ]
        }),
        Product::LifeSavings => json!({
            "coverageAmount": 50000,
            "monthlyContribution": 175,
            "termYears": 15,
            "beneficiaries": [{ "name": "Luis Perez", "relationship": "spouse", "percentage": 100 }]
        }),
        Product::Vehicle => json!({
            "vehicleMake": "Toyota",
            "vehicleModel": "RAV4",
            "vehicleYear": 2022,
            "vehicleValue": 32000,
            "plateNumber": "G456789",
            "usage": "personal"
        }),
    };
    if let (Value::Object(base), Value::Object(extra)) = (&mut document, product_fields) {
        base.extend(extra);
    }
    document
}

fn show(label: &str, snapshot: &FormSnapshot) {
    println!("\n== {label} ==");
    println!(
        "state: {:?}  loading: {}  can submit: {}",
        snapshot.state, snapshot.is_loading, snapshot.can_submit
    );
    if !snapshot.visible_sections.is_empty() {
        println!("conditional sections: {}", snapshot.visible_sections.join(", "));
    }
    for (path, message) in snapshot.errors.iter() {
        println!("  ! {path}: {message}");
    }
    if let Some(notice) = &snapshot.notice {
        println!("notice: {}", serde_json::to_string(notice).unwrap_or_default());
    }
}

async fn fill(form: &FormHandle, document: Value) -> anyhow::Result<FormSnapshot> {
    let mut snapshot = form.snapshot();
    if let Value::Object(fields) = document {
        for (path, value) in fields {
            snapshot = form.dispatch(UserAction::SetField { path, value }).await?;
        }
    }
    Ok(snapshot)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "form_flow=info".into()),
        )
        .init();

    let args = Args::parse();
    let brands = match &args.brands {
        Some(path) => BrandCatalog::load(path)?,
        None => BrandCatalog::default(),
    };

    let fail = args.fail;
    let counter = Arc::new(AtomicUsize::new(0));
    let submitter = submitter_fn(move |record: FormRecord| {
        let counter = counter.clone();
        async move {
            if fail {
                anyhow::bail!("network down");
            }
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            println!(
                "\n-> backend received {} quote for {}",
                record.insurance_type(),
                record.email()
            );
            Ok(SubmitOutcome::accepted(format!("Q-{n:04}"), None))
        }
    });

    let config = HostConfig::new(args.brand, Feature::Quote, args.insurance.into());
    let host = HostShell::new(config, Arc::new(submitter));
    let form = FormRunner::new(Arc::new(brands)).open("walkthrough", host);

    let ready = form
        .wait_for(|snapshot| snapshot.state == FormState::Ready)
        .await?;
    show("mounted", &ready);

    let rejected = form.dispatch(UserAction::Submit).await?;
    show("empty submit", &rejected);

    let filled = fill(&form, sample(args.insurance)).await?;
    show("filled in", &filled);

    form.dispatch(UserAction::Submit).await?;
    let settled = form
        .wait_for(|snapshot| snapshot.state == FormState::Ready && snapshot.notice.is_some())
        .await?;
    show("settled", &settled);

    Ok(())
}
