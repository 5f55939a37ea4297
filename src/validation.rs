//! Per-field rules checked against request bodies before they are deserialized into a schema.

use crate::error::AppError;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Format checks understood by [`FieldRule::format`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Email,
    Uuid,
}

#[derive(Clone, Debug, Default)]
pub struct FieldRule {
    pub required: bool,
    pub format: Option<Format>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
    pub allowed: Option<Vec<Value>>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

impl FieldRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn min_length(mut self, n: usize) -> Self {
        self.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        self.max_length = Some(n);
        self
    }

    /// Fails when the pattern does not compile.
    pub fn pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.pattern = Some(Regex::new(pattern)?);
        Ok(self)
    }

    pub fn allowed<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn minimum(mut self, n: f64) -> Self {
        self.minimum = Some(n);
        self
    }

    pub fn maximum(mut self, n: f64) -> Self {
        self.maximum = Some(n);
        self
    }
}

/// Rules keyed by JSON field name.
#[derive(Clone, Debug, Default)]
pub struct FieldRules {
    rules: BTreeMap<String, FieldRule>,
}

impl FieldRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.rules.insert(name.into(), rule);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Validate a full body (create). All required fields must be present and non-null.
    pub fn validate(&self, body: &Map<String, Value>) -> Result<(), AppError> {
        for (field, rule) in &self.rules {
            let val = body.get(field);
            if rule.required && val.map_or(true, Value::is_null) {
                return Err(AppError::Validation(format!("{} is required", field)));
            }
            if let Some(v) = val {
                validate_field(field, v, rule)?;
            }
        }
        Ok(())
    }

    /// Validate only the fields present in body (update). Required is not enforced for missing fields,
    /// but a required field cannot be set to null.
    pub fn validate_partial(&self, body: &Map<String, Value>) -> Result<(), AppError> {
        for (field, v) in body {
            if let Some(rule) = self.rules.get(field) {
                if rule.required && v.is_null() {
                    return Err(AppError::Validation(format!("{} cannot be null", field)));
                }
                validate_field(field, v, rule)?;
            }
        }
        Ok(())
    }
}

fn validate_field(field: &str, v: &Value, rule: &FieldRule) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(format) = rule.format {
        validate_format(field, v, format)?;
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max {
                return Err(AppError::Validation(format!(
                    "{} must be at most {} characters",
                    field, max
                )));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min {
                return Err(AppError::Validation(format!(
                    "{} must be at least {} characters",
                    field, min
                )));
            }
        }
        if let Some(re) = &rule.pattern {
            if !re.is_match(s) {
                return Err(AppError::Validation(format!("{} does not match required pattern", field)));
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(AppError::Validation(format!(
                "{} must be one of: {:?}",
                field,
                allowed.iter().take(5).collect::<Vec<_>>()
            )));
        }
    }
    if let Some(n) = v.as_f64() {
        if let Some(min) = rule.minimum {
            if n < min {
                return Err(AppError::Validation(format!("{} must be at least {}", field, min)));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                return Err(AppError::Validation(format!("{} must be at most {}", field, max)));
            }
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(field: &str, v: &Value, format: Format) -> Result<(), AppError> {
    let Some(s) = v.as_str() else {
        return Ok(());
    };
    match format {
        Format::Email => {
            let valid = s
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
            if !valid {
                return Err(AppError::Validation(format!("{} must be a valid email", field)));
            }
        }
        Format::Uuid => {
            if uuid::Uuid::parse_str(s).is_err() {
                return Err(AppError::Validation(format!("{} must be a valid UUID", field)));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn rules() -> FieldRules {
        FieldRules::new()
            .field("label", FieldRule::new().required().min_length(1).max_length(8))
            .field("kind", FieldRule::new().allowed(["note", "task"]))
            .field("score", FieldRule::new().minimum(0.0).maximum(10.0))
            .field("owner", FieldRule::new().format(Format::Uuid))
            .field("email", FieldRule::new().format(Format::Email))
            .field("code", FieldRule::new().pattern("^[A-Z]{3}$").unwrap())
    }

    #[test]
    fn valid_body_passes() {
        let body = obj(json!({
            "label": "hello",
            "kind": "task",
            "score": 3,
            "owner": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "email": "a@b.io",
            "code": "ABC"
        }));
        rules().validate(&body).unwrap();
    }

    #[test]
    fn missing_required_field_fails_on_create_only() {
        let body = obj(json!({"kind": "note"}));
        let err = rules().validate(&body).unwrap_err();
        assert_eq!(err.to_string(), "validation: label is required");
        rules().validate_partial(&body).unwrap();
    }

    #[test]
    fn required_field_cannot_be_nulled_on_update() {
        let err = rules().validate_partial(&obj(json!({"label": null}))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn each_rule_rejects() {
        let r = rules();
        for bad in [
            json!({"label": ""}),
            json!({"label": "much too long"}),
            json!({"kind": "event"}),
            json!({"score": -1}),
            json!({"score": 10.5}),
            json!({"owner": "not-a-uuid"}),
            json!({"email": "nobody"}),
            json!({"code": "abc"}),
        ] {
            assert!(r.validate_partial(&obj(bad.clone())).is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn invalid_pattern_is_reported() {
        assert!(FieldRule::new().pattern("(").is_err());
    }
}
