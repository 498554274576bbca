//! Claim schemas.

use serde_json::Value;

use super::{Check, FieldRule, Schema, lookup};
use crate::protocol::{Flow, InsuranceType};

const POLICE_REPORT_REQUIRED: &str = "Police report number is required when a police report was filed";

const HEALTH_CLAIM_TYPES: &[&str] = &[
    "consultation",
    "emergency",
    "hospitalization",
    "surgery",
    "pharmacy",
];
const VEHICLE_CLAIM_TYPES: &[&str] = &[
    "collision",
    "theft",
    "vandalism",
    "glass",
    "natural_disaster",
    "third_party",
];

fn claimant(claim_types: &'static [&'static str]) -> Vec<FieldRule> {
    vec![
        FieldRule::new("policyNumber", Check::text(3, 30)),
        FieldRule::new("claimType", Check::OneOf(claim_types)),
        FieldRule::new("personalInfo.fullName", Check::text(3, 120)),
        FieldRule::new("personalInfo.email", Check::Email),
        FieldRule::new("personalInfo.phone", Check::Phone),
        FieldRule::new("personalInfo.idNumber", Check::text(5, 20)),
        FieldRule::new("incidentDate", Check::PastDate),
        FieldRule::new("description", Check::text(10, 1000)),
    ]
}

fn police_report_filed(document: &Value) -> bool {
    lookup(document, "policeReport").and_then(Value::as_bool) == Some(true)
}

pub(super) fn health() -> Schema {
    Schema::builder(Flow::Claim, InsuranceType::Health)
        .fields(claimant(HEALTH_CLAIM_TYPES))
        .field(FieldRule::new("medicalCenter", Check::text(2, 120)))
        .field(FieldRule::new("diagnosis", Check::text(3, 500)))
        .field(FieldRule::new("amount", Check::money()))
        .build()
}

pub(super) fn vehicle() -> Schema {
    Schema::builder(Flow::Claim, InsuranceType::Vehicle)
        .fields(claimant(VEHICLE_CLAIM_TYPES))
        .field(FieldRule::new("plateNumber", Check::text(2, 12)))
        .field(FieldRule::new("location", Check::text(3, 200)))
        .field(FieldRule::new("policeReport", Check::Bool))
        .field(
            FieldRule::new("policeReportNumber", Check::text(3, 30))
                .required_message(POLICE_REPORT_REQUIRED)
                .visible_when(police_report_filed),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ClaimRecord, FormRecord};
    use chrono::NaiveDate;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    fn vehicle_claim(police_report: bool) -> Value {
        json!({
            "policyNumber": "POL-2291",
            "claimType": "collision",
            "personalInfo": {
                "fullName": "Ana Perez",
                "email": "ana@example.com",
                "phone": "8095550101",
                "idNumber": "00112345678"
            },
            "incidentDate": "2026-10-01",
            "description": "Rear-ended while stopped at a light",
            "plateNumber": "A123456",
            "location": "Av. Winston Churchill",
            "policeReport": police_report
        })
    }

    #[test]
    fn police_report_number_required_when_filed() {
        let schema = vehicle();
        let mut document = vehicle_claim(true);
        let errors = schema.validate_at(&document, today()).unwrap_err();
        assert_eq!(errors.get("policeReportNumber"), Some(POLICE_REPORT_REQUIRED));

        document["policeReportNumber"] = json!("   ");
        assert!(schema.validate_at(&document, today()).is_err());

        document["policeReportNumber"] = json!("PR-7781");
        let FormRecord::Claim(ClaimRecord::Vehicle(claim)) = schema.validate_at(&document, today()).unwrap()
        else {
            panic!("expected a vehicle claim");
        };
        assert_eq!(claim.police_report_number.as_deref(), Some("PR-7781"));
    }

    #[test]
    fn police_report_number_hidden_without_report() {
        let schema = vehicle();
        let document = vehicle_claim(false);
        assert!(schema.visible_sections(&document).is_empty());
        assert_eq!(schema.hidden_fields(&document), vec!["policeReportNumber"]);
        assert!(schema.validate_at(&document, today()).is_ok());
    }

    #[test]
    fn incident_date_cannot_be_in_the_future() {
        let mut document = vehicle_claim(false);
        document["incidentDate"] = json!("2026-10-18");
        let errors = vehicle().validate_at(&document, today()).unwrap_err();
        assert_eq!(errors.get("incidentDate"), Some("Date cannot be in the future"));
    }

    #[test]
    fn health_claim_amount_is_non_negative() {
        let document = json!({
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
            "amount": -25
        });
        let schema = health();
        let errors = schema.validate_at(&document, today()).unwrap_err();
        assert_eq!(errors.get("amount"), Some("Amount cannot be negative"));
        assert_eq!(
            schema.validate_field_at(&document, "amount", today()).as_deref(),
            Some("Amount cannot be negative")
        );
        assert_eq!(schema.validate_field_at(&document, "diagnosis", today()), None);
    }
}
