//! Validation schemas, one per (flow × insurance type).
//!
//! A schema is a list of [`FieldRule`]s over dotted paths plus cross-field
//! [`Refinement`]s. Validating a draft document never fails loudly: it
//! returns either the typed [`FormRecord`] or a [`ValidationErrors`] map
//! keyed by the same dotted paths the form uses for its fields.

mod claim;
mod quote;
pub mod rules;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{FormError, Result};
use crate::protocol::{Flow, InsuranceType};
use crate::record::{ClaimRecord, FormRecord, QuoteRecord};

pub use rules::{Check, CheckContext, is_blank, lookup, remove_path, set_path};

/// Error key used when the draft as a whole cannot be turned into a record.
pub const FORM_PATH: &str = "_form";

/// Per-field error messages keyed by dotted path. The first error recorded
/// for a path wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(path.into()).or_insert_with(|| message.into());
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.errors.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.errors.contains_key(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.errors.remove(path)
    }

    /// Drop every error at `path` or below it.
    pub fn clear_under(&mut self, path: &str) {
        let nested = format!("{path}.");
        self.errors
            .retain(|key, _| key != path && !key.starts_with(&nested));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Predicate over the draft document deciding whether a field is shown.
pub type Visibility = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Cross-field rule run over the normalised document.
pub type Refinement = Arc<dyn Fn(&Value, &mut ValidationErrors) + Send + Sync>;

#[derive(Clone)]
pub struct FieldRule {
    pub path: &'static str,
    pub check: Check,
    default: Value,
    required_message: &'static str,
    visible_when: Option<Visibility>,
}

impl FieldRule {
    pub fn new(path: &'static str, check: Check) -> Self {
        let default = check.default_value();
        Self {
            path,
            check,
            default,
            required_message: rules::REQUIRED,
            visible_when: None,
        }
    }

    pub fn default_value(mut self, default: Value) -> Self {
        self.default = default;
        self
    }

    pub fn required_message(mut self, message: &'static str) -> Self {
        self.required_message = message;
        self
    }

    /// Only shown, and only required, while `condition` holds.
    pub fn visible_when<F>(mut self, condition: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.visible_when = Some(Arc::new(condition));
        self
    }

    pub fn is_conditional(&self) -> bool {
        self.visible_when.is_some()
    }

    pub fn is_visible(&self, document: &Value) -> bool {
        self.visible_when
            .as_ref()
            .is_none_or(|condition| condition(document))
    }
}

impl fmt::Debug for FieldRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRule")
            .field("path", &self.path)
            .field("check", &self.check)
            .field("conditional", &self.is_conditional())
            .finish()
    }
}

#[derive(Clone)]
pub struct Schema {
    flow: Flow,
    insurance: InsuranceType,
    fields: Vec<FieldRule>,
    refinements: Vec<Refinement>,
}

impl Schema {
    /// Schema for a supported (flow, insurance) pair.
    pub fn for_form(flow: Flow, insurance: InsuranceType) -> Result<Self> {
        match (flow, insurance) {
            (Flow::Quote, InsuranceType::Health) => Ok(quote::health()),
            (Flow::Quote, InsuranceType::Life) => Ok(quote::life()),
            (Flow::Quote, InsuranceType::LifeSavings) => Ok(quote::life_savings()),
            (Flow::Quote, InsuranceType::Vehicle) => Ok(quote::vehicle()),
            (Flow::Claim, InsuranceType::Health) => Ok(claim::health()),
            (Flow::Claim, InsuranceType::Vehicle) => Ok(claim::vehicle()),
            (flow, insurance) => Err(FormError::UnsupportedForm { flow, insurance }),
        }
    }

    pub(crate) fn builder(flow: Flow, insurance: InsuranceType) -> SchemaBuilder {
        SchemaBuilder {
            schema: Schema {
                flow,
                insurance,
                fields: Vec::new(),
                refinements: Vec::new(),
            },
        }
    }

    pub fn flow(&self) -> Flow {
        self.flow
    }

    pub fn insurance(&self) -> InsuranceType {
        self.insurance
    }

    pub fn fields(&self) -> &[FieldRule] {
        &self.fields
    }

    pub fn field(&self, path: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|rule| rule.path == path)
    }

    /// Blank document a fresh form starts from. Conditional fields are left
    /// out until they become visible.
    pub fn defaults(&self) -> Value {
        let mut document = Value::Object(Map::new());
        for rule in self.fields.iter().filter(|rule| !rule.is_conditional()) {
            set_path(&mut document, rule.path, rule.default.clone());
        }
        document
    }

    /// Conditional fields currently shown for `document`.
    pub fn visible_sections(&self, document: &Value) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|rule| rule.is_conditional() && rule.is_visible(document))
            .map(|rule| rule.path)
            .collect()
    }

    /// Conditional fields currently hidden for `document`.
    pub fn hidden_fields(&self, document: &Value) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|rule| !rule.is_visible(document))
            .map(|rule| rule.path)
            .collect()
    }

    pub fn validate(&self, document: &Value) -> std::result::Result<FormRecord, ValidationErrors> {
        self.validate_at(document, Utc::now().date_naive())
    }

    /// Validate against an explicit "today", which date and year rules are
    /// relative to.
    pub fn validate_at(
        &self,
        document: &Value,
        today: NaiveDate,
    ) -> std::result::Result<FormRecord, ValidationErrors> {
        let ctx = CheckContext { today };
        let mut errors = ValidationErrors::new();
        let mut normalised = Value::Object(Map::new());

        for rule in &self.fields {
            if !rule.is_visible(document) {
                continue;
            }
            match lookup(document, rule.path).filter(|value| !is_blank(value)) {
                None => errors.add(rule.path, rule.required_message),
                Some(value) => {
                    if let Some(value) = rule.check.apply(rule.path, value, &ctx, &mut errors) {
                        set_path(&mut normalised, rule.path, value);
                    }
                }
            }
        }

        for refinement in &self.refinements {
            refinement(&normalised, &mut errors);
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        set_path(&mut normalised, "insuranceType", json!(self.insurance));
        let record = match self.flow {
            Flow::Quote => serde_json::from_value::<QuoteRecord>(normalised).map(FormRecord::Quote),
            Flow::Claim => serde_json::from_value::<ClaimRecord>(normalised).map(FormRecord::Claim),
        };
        record.map_err(|e| {
            let mut errors = ValidationErrors::new();
            errors.add(FORM_PATH, e.to_string());
            errors
        })
    }

    /// Error for a single field, as shown beside it while the user edits.
    pub fn validate_field_at(&self, document: &Value, path: &str, today: NaiveDate) -> Option<String> {
        self.validate_at(document, today)
            .err()
            .and_then(|errors| errors.get(path).map(str::to_string))
    }

    pub fn is_submittable_at(&self, document: &Value, today: NaiveDate) -> bool {
        self.validate_at(document, today).is_ok()
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("flow", &self.flow)
            .field("insurance", &self.insurance)
            .field("fields", &self.fields)
            .field("refinements", &self.refinements.len())
            .finish()
    }
}

pub(crate) struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn field(mut self, rule: FieldRule) -> Self {
        self.schema.fields.push(rule);
        self
    }

    pub fn fields(mut self, rules: impl IntoIterator<Item = FieldRule>) -> Self {
        self.schema.fields.extend(rules);
        self
    }

    pub fn refine<F>(mut self, refinement: F) -> Self
    where
        F: Fn(&Value, &mut ValidationErrors) + Send + Sync + 'static,
    {
        self.schema.refinements.push(Arc::new(refinement));
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

/// Beneficiary percentages of a normalised document must add up to 100.
pub(crate) fn percentages_sum_to_100(document: &Value, errors: &mut ValidationErrors) {
    let Some(entries) = lookup(document, "beneficiaries").and_then(Value::as_array) else {
        return;
    };
    let total: u64 = entries
        .iter()
        .filter_map(|entry| entry.get("percentage").and_then(Value::as_u64))
        .sum();
    if total != 100 {
        errors.add(
            "beneficiaries",
            format!("Beneficiary percentages must sum to 100 (currently {total})"),
        );
    }
}
