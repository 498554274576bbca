//! Host/form event contract.
//!
//! Three messages travel between a host and an embedded form: `form:start`,
//! `form:submit` and `form:result`. On the wire each one is a [`WireEvent`]
//! carrying the event name and a JSON `detail`, the same shape a custom DOM
//! event has. `form:submit` is used in both directions and the payload shape
//! tells them apart: `{ "data": .. }` goes form→host, `{ "isLoading": .. }`
//! goes host→form.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

use crate::error::{FormError, Result};
use crate::record::FormRecord;

pub const FORM_START: &str = "form:start";
pub const FORM_SUBMIT: &str = "form:submit";
pub const FORM_RESULT: &str = "form:result";

/// Which schema family a form uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    Quote,
    Claim,
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flow::Quote => write!(f, "quote"),
            Flow::Claim => write!(f, "claim"),
        }
    }
}

/// Feature requested by the host in `form:start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Claim,
    Quote,
    Collection,
}

impl Feature {
    /// Collection has no form of its own.
    pub fn flow(self) -> Option<Flow> {
        match self {
            Feature::Claim => Some(Flow::Claim),
            Feature::Quote => Some(Flow::Quote),
            Feature::Collection => None,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::Claim => write!(f, "claim"),
            Feature::Quote => write!(f, "quote"),
            Feature::Collection => write!(f, "collection"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsuranceType {
    Health,
    Vehicle,
    Life,
    LifeSavings,
}

impl fmt::Display for InsuranceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsuranceType::Health => write!(f, "health"),
            InsuranceType::Vehicle => write!(f, "vehicle"),
            InsuranceType::Life => write!(f, "life"),
            InsuranceType::LifeSavings => write!(f, "life_savings"),
        }
    }
}

/// `form:start` spells the vehicle product "vehicule" while records use
/// "vehicle". Both spellings are accepted inbound; "vehicule" is emitted.
pub(crate) mod start_insurance {
    use super::InsuranceType;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(
        insurance: &InsuranceType,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let literal = match insurance {
            InsuranceType::Health => "health",
            InsuranceType::Vehicle => "vehicule",
            InsuranceType::Life => "life",
            InsuranceType::LifeSavings => "life_savings",
        };
        serializer.serialize_str(literal)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<InsuranceType, D::Error> {
        let literal = String::deserialize(deserializer)?;
        match literal.as_str() {
            "health" => Ok(InsuranceType::Health),
            "vehicule" | "vehicle" => Ok(InsuranceType::Vehicle),
            "life" => Ok(InsuranceType::Life),
            "life_savings" => Ok(InsuranceType::LifeSavings),
            other => Err(D::Error::unknown_variant(
                other,
                &["health", "vehicule", "life", "life_savings"],
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartMessage {
    pub brand: String,
    pub feature: Feature,
    #[serde(with = "start_insurance")]
    pub insurance: InsuranceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_data: Option<Value>,
}

impl StartMessage {
    pub fn new(brand: impl Into<String>, feature: Feature, insurance: InsuranceType) -> Self {
        Self {
            brand: brand.into(),
            feature,
            insurance,
            initial_data: None,
        }
    }

    pub fn with_initial_data(mut self, initial_data: Value) -> Self {
        self.initial_data = Some(initial_data);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitMessage {
    /// form→host: the validated record.
    Data(FormRecord),
    /// host→form: loading indicator.
    Loading(bool),
}

impl SubmitMessage {
    fn to_detail(&self) -> Result<Value> {
        Ok(match self {
            SubmitMessage::Data(record) => json!({ "data": serde_json::to_value(record)? }),
            SubmitMessage::Loading(is_loading) => json!({ "isLoading": is_loading }),
        })
    }

    /// `Ok(None)` when the payload carries neither `data` nor `isLoading`.
    fn from_detail(detail: Value) -> Result<Option<Self>> {
        let Value::Object(mut fields) = detail else {
            return Ok(None);
        };
        if let Some(data) = fields.remove("data") {
            let record = serde_json::from_value(data).map_err(|source| malformed(FORM_SUBMIT, source))?;
            return Ok(Some(SubmitMessage::Data(record)));
        }
        if let Some(is_loading) = fields.remove("isLoading") {
            let is_loading =
                serde_json::from_value(is_loading).map_err(|source| malformed(FORM_SUBMIT, source))?;
            return Ok(Some(SubmitMessage::Loading(is_loading)));
        }
        Ok(None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMessage {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_id: Option<String>,
}

impl ResultMessage {
    pub fn success(message: Option<String>, result_id: Option<String>) -> Self {
        Self {
            ok: true,
            message,
            error: None,
            result_id,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: None,
            error: Some(error.into()),
            result_id: None,
        }
    }
}

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Start(StartMessage),
    Submit(SubmitMessage),
    Result(ResultMessage),
}

impl Message {
    pub fn name(&self) -> &'static str {
        match self {
            Message::Start(_) => FORM_START,
            Message::Submit(_) => FORM_SUBMIT,
            Message::Result(_) => FORM_RESULT,
        }
    }

    pub fn to_wire(&self) -> Result<WireEvent> {
        let detail = match self {
            Message::Start(start) => serde_json::to_value(start)?,
            Message::Submit(submit) => submit.to_detail()?,
            Message::Result(result) => serde_json::to_value(result)?,
        };
        Ok(WireEvent {
            event: self.name().to_string(),
            detail,
        })
    }

    /// Decode a wire event. A submit payload with neither `data` nor
    /// `isLoading` decodes to `Ok(None)`; receivers ignore it.
    pub fn from_wire(wire: WireEvent) -> Result<Option<Message>> {
        match wire.event.as_str() {
            FORM_START => serde_json::from_value(wire.detail)
                .map(|start| Some(Message::Start(start)))
                .map_err(|source| malformed(FORM_START, source)),
            FORM_SUBMIT => Ok(SubmitMessage::from_detail(wire.detail)?.map(Message::Submit)),
            FORM_RESULT => serde_json::from_value(wire.detail)
                .map(|result| Some(Message::Result(result)))
                .map_err(|source| malformed(FORM_RESULT, source)),
            _ => Err(FormError::UnknownEvent(wire.event)),
        }
    }
}

/// Event name plus JSON detail, as exchanged between host and form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    pub event: String,
    #[serde(default = "empty_detail")]
    pub detail: Value,
}

fn empty_detail() -> Value {
    Value::Object(Map::new())
}

fn malformed(event: &str, source: serde_json::Error) -> FormError {
    FormError::MalformedPayload {
        event: event.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_message_uses_vehicule_on_the_wire() {
        let start = StartMessage::new("LPC001", Feature::Claim, InsuranceType::Vehicle);
        let wire = Message::Start(start.clone()).to_wire().unwrap();

        assert_eq!(wire.event, "form:start");
        assert_eq!(wire.detail["insurance"], "vehicule");
        assert_eq!(wire.detail["feature"], "claim");
        assert!(wire.detail.get("initialData").is_none());

        let decoded = Message::from_wire(wire).unwrap();
        assert_eq!(decoded, Some(Message::Start(start)));
    }

    #[test]
    fn start_message_accepts_both_vehicle_spellings() {
        for literal in ["vehicule", "vehicle"] {
            let wire = WireEvent {
                event: FORM_START.to_string(),
                detail: json!({ "brand": "LPC001", "feature": "quote", "insurance": literal }),
            };
            let Some(Message::Start(start)) = Message::from_wire(wire).unwrap() else {
                panic!("expected start message");
            };
            assert_eq!(start.insurance, InsuranceType::Vehicle);
        }
    }

    #[test]
    fn start_message_rejects_unknown_insurance() {
        let wire = WireEvent {
            event: FORM_START.to_string(),
            detail: json!({ "brand": "LPC001", "feature": "quote", "insurance": "pet" }),
        };
        assert!(matches!(
            Message::from_wire(wire),
            Err(FormError::MalformedPayload { .. })
        ));
    }

    #[test]
    fn submit_loading_round_trips() {
        let wire = Message::Submit(SubmitMessage::Loading(true)).to_wire().unwrap();
        assert_eq!(wire.detail, json!({ "isLoading": true }));
        assert_eq!(
            Message::from_wire(wire).unwrap(),
            Some(Message::Submit(SubmitMessage::Loading(true)))
        );
    }

    #[test]
    fn submit_without_discriminator_is_ignored() {
        let wire = WireEvent {
            event: FORM_SUBMIT.to_string(),
            detail: json!({ "somethingElse": 1 }),
        };
        assert_eq!(Message::from_wire(wire).unwrap(), None);
    }

    #[test]
    fn unknown_event_is_an_error() {
        let wire = WireEvent {
            event: "form:cancel".to_string(),
            detail: json!({}),
        };
        assert!(matches!(
            Message::from_wire(wire),
            Err(FormError::UnknownEvent(name)) if name == "form:cancel"
        ));
    }

    #[test]
    fn result_message_omits_absent_fields() {
        let wire = Message::Result(ResultMessage::failure("network down"))
            .to_wire()
            .unwrap();
        assert_eq!(wire.detail, json!({ "ok": false, "error": "network down" }));
    }
}
