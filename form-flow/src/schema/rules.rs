//! Field-level checks and dotted-path helpers.

use chrono::{DateTime, Datelike, NaiveDate};
use serde_json::{Map, Value, json};

use super::ValidationErrors;

pub const REQUIRED: &str = "Required";

/// Values a check is evaluated against besides the field itself.
#[derive(Debug, Clone, Copy)]
pub struct CheckContext {
    pub today: NaiveDate,
}

#[derive(Debug, Clone)]
pub enum Check {
    Text { min: usize, max: usize },
    Email,
    Phone,
    OneOf(&'static [&'static str]),
    Bool,
    /// A checkbox that has to be ticked.
    Accepted(&'static str),
    Integer { min: i64, max: i64 },
    Money { allow_zero: bool },
    /// Birth date implying an age within the range.
    BirthDate { min_age: u32, max_age: u32 },
    /// A date no later than today.
    PastDate,
    /// A model year between `min` and the current year plus `ahead`.
    ModelYear { min: i32, ahead: i32 },
    Beneficiaries,
}

impl Check {
    pub fn text(min: usize, max: usize) -> Self {
        Check::Text { min, max }
    }

    pub fn integer(min: i64, max: i64) -> Self {
        Check::Integer { min, max }
    }

    pub fn money() -> Self {
        Check::Money { allow_zero: true }
    }

    pub fn positive_money() -> Self {
        Check::Money { allow_zero: false }
    }

    /// Value a blank form starts with for this field.
    pub fn default_value(&self) -> Value {
        match self {
            Check::Text { .. }
            | Check::Email
            | Check::Phone
            | Check::BirthDate { .. }
            | Check::PastDate => json!(""),
            Check::OneOf(options) => options.first().map(|o| json!(o)).unwrap_or(Value::Null),
            Check::Bool | Check::Accepted(_) => json!(false),
            Check::Integer { .. } | Check::Money { .. } | Check::ModelYear { .. } => Value::Null,
            Check::Beneficiaries => json!([]),
        }
    }

    /// Validate one present value. Returns the normalised value, or records
    /// errors under `path` and returns `None`.
    pub fn apply(
        &self,
        path: &str,
        value: &Value,
        ctx: &CheckContext,
        errors: &mut ValidationErrors,
    ) -> Option<Value> {
        if let Check::Beneficiaries = self {
            return check_beneficiaries(path, value, errors);
        }
        match self.apply_scalar(value, ctx) {
            Ok(normalised) => Some(normalised),
            Err(message) => {
                errors.add(path, message);
                None
            }
        }
    }

    fn apply_scalar(&self, value: &Value, ctx: &CheckContext) -> Result<Value, String> {
        match self {
            Check::Text { min, max } => {
                let text = as_text(value)?;
                let len = text.chars().count();
                if len < *min {
                    Err(format!("Must be at least {min} characters"))
                } else if len > *max {
                    Err(format!("Must be at most {max} characters"))
                } else {
                    Ok(json!(text))
                }
            }
            Check::Email => {
                let text = as_text(value)?;
                if is_email(&text) {
                    Ok(json!(text.to_lowercase()))
                } else {
                    Err("Invalid email address".to_string())
                }
            }
            Check::Phone => {
                let text = as_text(value)?;
                if is_phone(&text) {
                    Ok(json!(text))
                } else {
                    Err("Invalid phone number".to_string())
                }
            }
            Check::OneOf(options) => {
                let text = as_text(value)?;
                if options.contains(&text.as_str()) {
                    Ok(json!(text))
                } else {
                    Err(format!("Must be one of: {}", options.join(", ")))
                }
            }
            Check::Bool => value
                .as_bool()
                .map(Value::Bool)
                .ok_or_else(|| "Must be true or false".to_string()),
            Check::Accepted(message) => match value.as_bool() {
                Some(true) => Ok(Value::Bool(true)),
                _ => Err(message.to_string()),
            },
            Check::Integer { min, max } => {
                let number = as_integer(value)?;
                if number < *min || number > *max {
                    Err(format!("Must be between {min} and {max}"))
                } else {
                    Ok(json!(number))
                }
            }
            Check::Money { allow_zero } => {
                let amount = as_number(value)?;
                if amount < 0.0 {
                    Err("Amount cannot be negative".to_string())
                } else if !allow_zero && amount == 0.0 {
                    Err("Amount must be greater than zero".to_string())
                } else {
                    Ok(json!(amount))
                }
            }
            Check::BirthDate { min_age, max_age } => {
                let date = as_date(value)?;
                let age = ctx
                    .today
                    .years_since(date)
                    .ok_or_else(|| "Birth date cannot be in the future".to_string())?;
                if age < *min_age || age > *max_age {
                    Err(format!("Age must be between {min_age} and {max_age} years"))
                } else {
                    Ok(json!(date.format("%Y-%m-%d").to_string()))
                }
            }
            Check::PastDate => {
                let date = as_date(value)?;
                if date > ctx.today {
                    Err("Date cannot be in the future".to_string())
                } else {
                    Ok(json!(date.format("%Y-%m-%d").to_string()))
                }
            }
            Check::ModelYear { min, ahead } => {
                let year = as_integer(value)?;
                let max = i64::from(ctx.today.year() + ahead);
                if year < i64::from(*min) || year > max {
                    Err(format!("Vehicle year must be between {min} and {max}"))
                } else {
                    Ok(json!(year))
                }
            }
            Check::Beneficiaries => Err("Invalid beneficiaries".to_string()),
        }
    }
}

fn check_beneficiaries(path: &str, value: &Value, errors: &mut ValidationErrors) -> Option<Value> {
    let Some(entries) = value.as_array() else {
        errors.add(path, "Must be a list of beneficiaries");
        return None;
    };
    if entries.is_empty() {
        errors.add(path, "At least one beneficiary is required");
        return None;
    }

    let name = Check::text(2, 80);
    let relationship = Check::text(2, 40);
    let percentage = Check::integer(1, 100);
    // Dates never matter for beneficiary entries.
    let ctx = CheckContext {
        today: NaiveDate::MIN,
    };

    let before = errors.len();
    let mut normalised = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let mut out = Map::new();
        for (key, check) in [
            ("name", &name),
            ("relationship", &relationship),
            ("percentage", &percentage),
        ] {
            let entry_path = format!("{path}.{index}.{key}");
            match entry.get(key).filter(|v| !is_blank(v)) {
                None => errors.add(&entry_path, REQUIRED),
                Some(v) => {
                    if let Some(v) = check.apply(&entry_path, v, &ctx, errors) {
                        out.insert(key.to_string(), v);
                    }
                }
            }
        }
        normalised.push(Value::Object(out));
    }

    (errors.len() == before).then(|| Value::Array(normalised))
}

/// Missing, null and empty-string values all count as "not filled in".
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn as_text(value: &Value) -> Result<String, String> {
    value
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| "Must be text".to_string())
}

fn as_number(value: &Value) -> Result<f64, String> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number
        .filter(|n| n.is_finite())
        .ok_or_else(|| "Must be a number".to_string())
}

fn as_integer(value: &Value) -> Result<i64, String> {
    let number = as_number(value)?;
    if number.fract() != 0.0 {
        return Err("Must be a whole number".to_string());
    }
    Ok(number as i64)
}

fn as_date(value: &Value) -> Result<NaiveDate, String> {
    let text = as_text(value)?;
    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(&text).ok().map(|dt| dt.date_naive()))
        .ok_or_else(|| "Invalid date".to_string())
}

fn is_email(text: &str) -> bool {
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn is_phone(text: &str) -> bool {
    let body = text.strip_prefix('+').unwrap_or(text);
    let mut digits = 0;
    for c in body.chars() {
        match c {
            '0'..='9' => digits += 1,
            ' ' | '-' | '(' | ')' => {}
            _ => return false,
        }
    }
    (7..=15).contains(&digits)
}

/// Look up a dotted path; numeric segments index into arrays.
pub fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(document, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Write `value` at a dotted path, creating intermediate objects and arrays.
///
/// A numeric segment may address an existing array entry or append one right
/// after the last. Returns `false`, leaving `document` untouched, when an
/// index lies further out.
pub fn set_path(document: &mut Value, path: &str, value: Value) -> bool {
    let segments: Vec<&str> = path.split('.').collect();
    if !reachable(document, &segments) {
        return false;
    }
    set_segments(document, &segments, value);
    true
}

fn reachable(current: &Value, segments: &[&str]) -> bool {
    let Some((segment, rest)) = segments.split_first() else {
        return true;
    };
    match segment.parse::<usize>() {
        Ok(index) => match current {
            Value::Array(items) if index < items.len() => reachable(&items[index], rest),
            Value::Array(items) => index == items.len() && reachable(&Value::Null, rest),
            _ => index == 0 && reachable(&Value::Null, rest),
        },
        Err(_) => match current {
            Value::Object(map) => reachable(map.get(*segment).unwrap_or(&Value::Null), rest),
            _ => reachable(&Value::Null, rest),
        },
    }
}

fn set_segments(current: &mut Value, segments: &[&str], value: Value) {
    let Some((segment, rest)) = segments.split_first() else {
        *current = value;
        return;
    };
    let slot = if let Ok(index) = segment.parse::<usize>() {
        if !current.is_array() {
            *current = Value::Array(Vec::new());
        }
        let Value::Array(items) = current else { return };
        if index == items.len() {
            items.push(Value::Null);
        }
        let Some(slot) = items.get_mut(index) else { return };
        slot
    } else {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else { return };
        map.entry(segment.to_string()).or_insert(Value::Null)
    };
    set_segments(slot, rest, value);
}

/// Remove the value at a dotted path, if any.
pub fn remove_path(document: &mut Value, path: &str) -> Option<Value> {
    let (parent, key) = match path.rsplit_once('.') {
        Some((parent, key)) => (lookup_mut(document, parent)?, key),
        None => (document, path),
    };
    match parent {
        Value::Object(map) => map.remove(key),
        Value::Array(items) => {
            let index = key.parse::<usize>().ok()?;
            (index < items.len()).then(|| items.remove(index))
        }
        _ => None,
    }
}

fn lookup_mut<'a>(document: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    path.split('.').try_fold(document, |current, segment| match current {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> CheckContext {
        CheckContext {
            today: NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
        }
    }

    fn run(check: &Check, value: Value) -> Result<Value, String> {
        let mut errors = ValidationErrors::new();
        check
            .apply("field", &value, &ctx(), &mut errors)
            .ok_or_else(|| errors.get("field").unwrap_or_default().to_string())
    }

    #[test]
    fn money_coerces_strings_and_rejects_negatives() {
        assert_eq!(run(&Check::money(), json!("1500.50")), Ok(json!(1500.5)));
        assert_eq!(run(&Check::money(), json!(0)), Ok(json!(0.0)));
        assert_eq!(
            run(&Check::money(), json!(-1)),
            Err("Amount cannot be negative".to_string())
        );
        assert!(run(&Check::positive_money(), json!(0)).is_err());
    }

    #[test]
    fn birth_date_enforces_adult_age() {
        let check = Check::BirthDate {
            min_age: 18,
            max_age: 100,
        };
        assert!(run(&check, json!("2008-10-17")).is_ok());
        assert!(run(&check, json!("2008-10-18")).is_err());
        assert_eq!(
            run(&check, json!("2030-01-01")),
            Err("Birth date cannot be in the future".to_string())
        );
        assert!(run(&check, json!("1920-01-01")).is_err());
    }

    #[test]
    fn birth_date_upper_age_bound_is_inclusive() {
        let check = Check::BirthDate {
            min_age: 18,
            max_age: 100,
        };
        assert_eq!(run(&check, json!("1926-10-17")), Ok(json!("1926-10-17")));
        assert!(run(&check, json!("1925-10-18")).is_ok());
        assert_eq!(
            run(&check, json!("1925-10-17")),
            Err("Age must be between 18 and 100 years".to_string())
        );
    }

    #[test]
    fn model_year_is_bounded_by_next_year() {
        let check = Check::ModelYear {
            min: 1990,
            ahead: 1,
        };
        assert_eq!(run(&check, json!(2027)), Ok(json!(2027)));
        assert_eq!(
            run(&check, json!(2031)),
            Err("Vehicle year must be between 1990 and 2027".to_string())
        );
        assert!(run(&check, json!(1989)).is_err());
        assert!(run(&check, json!(2010.5)).is_err());
    }

    #[test]
    fn email_and_phone_formats() {
        assert_eq!(run(&Check::Email, json!(" Ana@Example.com ")), Ok(json!("ana@example.com")));
        assert!(run(&Check::Email, json!("ana@example")).is_err());
        assert!(run(&Check::Phone, json!("+1 (809) 555-0101")).is_ok());
        assert!(run(&Check::Phone, json!("555-CALL")).is_err());
    }

    #[test]
    fn beneficiary_entries_report_nested_paths() {
        let mut errors = ValidationErrors::new();
        let value = json!([
            { "name": "Rosa", "relationship": "spouse", "percentage": 0 },
            { "name": "", "relationship": "son", "percentage": 50 }
        ]);
        assert!(
            Check::Beneficiaries
                .apply("beneficiaries", &value, &ctx(), &mut errors)
                .is_none()
        );
        assert_eq!(errors.get("beneficiaries.0.percentage"), Some("Must be between 1 and 100"));
        assert_eq!(errors.get("beneficiaries.1.name"), Some(REQUIRED));
    }

    #[test]
    fn set_and_lookup_paths() {
        let mut doc = json!({});
        assert!(set_path(&mut doc, "personalInfo.email", json!("a@b.co")));
        assert!(set_path(&mut doc, "beneficiaries.0.name", json!("Rosa")));
        assert!(set_path(&mut doc, "beneficiaries.1.percentage", json!(40)));
        assert!(set_path(&mut doc, "beneficiaries.0.percentage", json!(60)));

        assert_eq!(lookup(&doc, "personalInfo.email"), Some(&json!("a@b.co")));
        assert_eq!(lookup(&doc, "beneficiaries.1.percentage"), Some(&json!(40)));
        assert_eq!(
            lookup(&doc, "beneficiaries.0"),
            Some(&json!({ "name": "Rosa", "percentage": 60 }))
        );

        assert_eq!(remove_path(&mut doc, "personalInfo.email"), Some(json!("a@b.co")));
        assert_eq!(lookup(&doc, "personalInfo.email"), None);
    }

    #[test]
    fn indices_past_the_end_are_refused() {
        let mut doc = json!({ "beneficiaries": [{ "name": "Rosa" }] });
        let before = doc.clone();

        assert!(!set_path(&mut doc, "beneficiaries.2.name", json!("Luis")));
        assert!(!set_path(&mut doc, "beneficiaries.18446744073709551614.name", json!("x")));
        assert!(!set_path(&mut doc, "dependents.list.3", json!(1)));
        assert_eq!(doc, before);

        assert!(set_path(&mut doc, "beneficiaries.1.name", json!("Luis")));
        assert_eq!(lookup(&doc, "beneficiaries.1.name"), Some(&json!("Luis")));
    }
}
