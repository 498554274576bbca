//! Quote schemas: shared applicant block plus one product section each.

use serde_json::{Value, json};

use super::{Check, FieldRule, Schema, lookup, percentages_sum_to_100};
use crate::protocol::{Flow, InsuranceType};

const ACCEPT_TERMS: &str = "You must accept the terms and conditions";
const DEPENDENTS_REQUIRED: &str = "Number of dependents is required for couple and family coverage";

const ID_TYPES: &[&str] = &["national_id", "passport", "residence_permit"];
const COVERAGE_TYPES: &[&str] = &["individual", "couple", "family"];
const VEHICLE_USAGES: &[&str] = &["personal", "commercial"];

fn applicant() -> Vec<FieldRule> {
    vec![
        FieldRule::new("personalInfo.firstName", Check::text(2, 60)),
        FieldRule::new("personalInfo.lastName", Check::text(2, 60)),
        FieldRule::new("personalInfo.email", Check::Email),
        FieldRule::new("personalInfo.phone", Check::Phone),
        FieldRule::new(
            "personalInfo.birthDate",
            Check::BirthDate {
                min_age: 18,
                max_age: 100,
            },
        ),
        FieldRule::new("personalInfo.idType", Check::OneOf(ID_TYPES)),
        FieldRule::new("personalInfo.idNumber", Check::text(5, 20)),
        FieldRule::new("acceptTerms", Check::Accepted(ACCEPT_TERMS)).required_message(ACCEPT_TERMS),
    ]
}

fn covers_dependents(document: &Value) -> bool {
    lookup(document, "coverageType")
        .and_then(Value::as_str)
        .is_some_and(|coverage| matches!(coverage, "couple" | "family"))
}

pub(super) fn health() -> Schema {
    Schema::builder(Flow::Quote, InsuranceType::Health)
        .fields(applicant())
        .field(FieldRule::new("coverageType", Check::OneOf(COVERAGE_TYPES)))
        .field(
            FieldRule::new("dependents", Check::integer(1, 10))
                .required_message(DEPENDENTS_REQUIRED)
                .visible_when(covers_dependents),
        )
        .field(FieldRule::new("preExistingConditions", Check::Bool))
        .build()
}

pub(super) fn life() -> Schema {
    Schema::builder(Flow::Quote, InsuranceType::Life)
        .fields(applicant())
        .field(FieldRule::new("coverageAmount", Check::positive_money()))
        .field(FieldRule::new("smoker", Check::Bool))
        .field(FieldRule::new("beneficiaries", Check::Beneficiaries))
        .refine(percentages_sum_to_100)
        .build()
}

pub(super) fn life_savings() -> Schema {
    Schema::builder(Flow::Quote, InsuranceType::LifeSavings)
        .fields(applicant())
        .field(FieldRule::new("coverageAmount", Check::positive_money()))
        .field(FieldRule::new("monthlyContribution", Check::positive_money()))
        .field(FieldRule::new("termYears", Check::integer(5, 40)).default_value(json!(10)))
        .field(FieldRule::new("beneficiaries", Check::Beneficiaries))
        .refine(percentages_sum_to_100)
        .build()
}

pub(super) fn vehicle() -> Schema {
    Schema::builder(Flow::Quote, InsuranceType::Vehicle)
        .fields(applicant())
        .field(FieldRule::new("vehicleMake", Check::text(2, 40)))
        .field(FieldRule::new("vehicleModel", Check::text(1, 40)))
        .field(FieldRule::new(
            "vehicleYear",
            Check::ModelYear {
                min: 1990,
                ahead: 1,
            },
        ))
        .field(FieldRule::new("vehicleValue", Check::money()))
        .field(FieldRule::new("plateNumber", Check::text(2, 12)))
        .field(FieldRule::new("usage", Check::OneOf(VEHICLE_USAGES)))
        .build()
}
