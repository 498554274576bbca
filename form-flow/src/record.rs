//! Typed form records.
//!
//! A [`FormRecord`] only exists once a draft has passed its schema. Quote and
//! claim records are told apart by their fields; inside each flow the
//! `insuranceType` tag selects the variant.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::protocol::{Flow, InsuranceType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormRecord {
    Quote(QuoteRecord),
    Claim(ClaimRecord),
}

impl FormRecord {
    pub fn flow(&self) -> Flow {
        match self {
            FormRecord::Quote(_) => Flow::Quote,
            FormRecord::Claim(_) => Flow::Claim,
        }
    }

    pub fn insurance_type(&self) -> InsuranceType {
        match self {
            FormRecord::Quote(QuoteRecord::Health(_)) | FormRecord::Claim(ClaimRecord::Health(_)) => {
                InsuranceType::Health
            }
            FormRecord::Quote(QuoteRecord::Vehicle(_)) | FormRecord::Claim(ClaimRecord::Vehicle(_)) => {
                InsuranceType::Vehicle
            }
            FormRecord::Quote(QuoteRecord::Life(_)) => InsuranceType::Life,
            FormRecord::Quote(QuoteRecord::LifeSavings(_)) => InsuranceType::LifeSavings,
        }
    }

    /// Contact e-mail of the person behind the record.
    pub fn email(&self) -> &str {
        match self {
            FormRecord::Quote(quote) => &quote.personal_info().email,
            FormRecord::Claim(claim) => &claim.personal_info().email,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "insuranceType", rename_all = "snake_case")]
pub enum QuoteRecord {
    Health(HealthQuote),
    Life(LifeQuote),
    LifeSavings(LifeSavingsQuote),
    Vehicle(VehicleQuote),
}

impl QuoteRecord {
    pub fn personal_info(&self) -> &QuotePersonalInfo {
        match self {
            QuoteRecord::Health(quote) => &quote.personal_info,
            QuoteRecord::Life(quote) => &quote.personal_info,
            QuoteRecord::LifeSavings(quote) => &quote.personal_info,
            QuoteRecord::Vehicle(quote) => &quote.personal_info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "insuranceType", rename_all = "snake_case")]
pub enum ClaimRecord {
    Health(HealthClaim),
    Vehicle(VehicleClaim),
}

impl ClaimRecord {
    pub fn personal_info(&self) -> &ClaimPersonalInfo {
        match self {
            ClaimRecord::Health(claim) => &claim.personal_info,
            ClaimRecord::Vehicle(claim) => &claim.personal_info,
        }
    }

    pub fn policy_number(&self) -> &str {
        match self {
            ClaimRecord::Health(claim) => &claim.policy_number,
            ClaimRecord::Vehicle(claim) => &claim.policy_number,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdType {
    NationalId,
    Passport,
    ResidencePermit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotePersonalInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub birth_date: NaiveDate,
    pub id_type: IdType,
    pub id_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimPersonalInfo {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub id_number: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageType {
    Individual,
    Couple,
    Family,
}

impl CoverageType {
    pub fn has_dependents(self) -> bool {
        matches!(self, CoverageType::Couple | CoverageType::Family)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleUsage {
    Personal,
    Commercial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Beneficiary {
    pub name: String,
    pub relationship: String,
    pub percentage: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthQuote {
    pub personal_info: QuotePersonalInfo,
    pub accept_terms: bool,
    pub coverage_type: CoverageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependents: Option<u32>,
    pub pre_existing_conditions: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifeQuote {
    pub personal_info: QuotePersonalInfo,
    pub accept_terms: bool,
    pub coverage_amount: f64,
    pub smoker: bool,
    pub beneficiaries: Vec<Beneficiary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifeSavingsQuote {
    pub personal_info: QuotePersonalInfo,
    pub accept_terms: bool,
    pub coverage_amount: f64,
    pub monthly_contribution: f64,
    pub term_years: u32,
    pub beneficiaries: Vec<Beneficiary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleQuote {
    pub personal_info: QuotePersonalInfo,
    pub accept_terms: bool,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vehicle_year: i32,
    pub vehicle_value: f64,
    pub plate_number: String,
    pub usage: VehicleUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthClaim {
    pub policy_number: String,
    pub claim_type: String,
    pub personal_info: ClaimPersonalInfo,
    pub incident_date: NaiveDate,
    pub description: String,
    pub medical_center: String,
    pub diagnosis: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleClaim {
    pub policy_number: String,
    pub claim_type: String,
    pub personal_info: ClaimPersonalInfo,
    pub incident_date: NaiveDate,
    pub description: String,
    pub plate_number: String,
    pub location: String,
    pub police_report: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub police_report_number: Option<String>,
}
