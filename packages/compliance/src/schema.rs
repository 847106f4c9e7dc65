//! Per-action payload schema descriptors.
//!
//! Payloads are untyped maps; schemas give the engine a declared shape to
//! check before any policy runs. Required-field and type/range violations
//! are hard failures; unknown fields are preserved but flagged on the
//! aggregate so callers can audit them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ComplianceError;
use crate::policy::Payload;

/// Declared type of a payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Number,
    Integer,
    String,
    Boolean,
    List,
}

impl FieldType {
    fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            Self::Number => value.is_number() || value.as_str().is_some_and(|s| s.parse::<f64>().is_ok()),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::String => value.is_string(),
            Self::Boolean => value.is_boolean(),
            Self::List => value.is_array(),
        }
    }
}

/// Declared shape of one payload field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    /// Lower bound for numeric fields
    pub min: Option<f64>,
    /// Upper bound for numeric fields
    pub max: Option<f64>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            min: None,
            max: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }
}

/// Declared shape of one action's payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSchema {
    pub action: String,
    pub fields: Vec<FieldSpec>,
}

impl ActionSchema {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }
}

/// Outcome of validating a payload against its action schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaReport {
    /// No required-field or type/range violations
    pub ok: bool,
    /// Hard violations (missing required, wrong type, out of range)
    pub violations: Vec<String>,
    /// Fields present in the payload but not declared; preserved verbatim
    pub unknown_fields: Vec<String>,
}

impl SchemaReport {
    fn clean() -> Self {
        Self {
            ok: true,
            violations: Vec::new(),
            unknown_fields: Vec::new(),
        }
    }
}

/// Registry of action schemas.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, ActionSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with descriptors for the core enterprise actions.
    pub fn with_default_schemas() -> Self {
        let mut registry = Self::new();
        for schema in default_schemas() {
            // Defaults are distinct by construction.
            let _ = registry.register(schema);
        }
        registry
    }

    pub fn register(&mut self, schema: ActionSchema) -> Result<(), ComplianceError> {
        if self.schemas.contains_key(&schema.action) {
            return Err(ComplianceError::DuplicateSchema {
                action: schema.action,
            });
        }
        self.schemas.insert(schema.action.clone(), schema);
        Ok(())
    }

    pub fn get(&self, action: &str) -> Option<&ActionSchema> {
        self.schemas.get(action)
    }

    /// Validate a payload. Actions without a registered schema pass clean.
    pub fn validate(&self, action: &str, payload: &Payload) -> SchemaReport {
        let Some(schema) = self.schemas.get(action) else {
            return SchemaReport::clean();
        };

        let mut violations = Vec::new();
        for spec in &schema.fields {
            match payload.get(&spec.name) {
                None => {
                    if spec.required {
                        violations.push(format!("required field '{}' missing", spec.name));
                    }
                }
                Some(value) => {
                    if !spec.field_type.matches(value) {
                        violations.push(format!(
                            "field '{}' has wrong type (expected {:?})",
                            spec.name, spec.field_type
                        ));
                        continue;
                    }
                    if let Some(number) = value.as_f64() {
                        if spec.min.is_some_and(|min| number < min) {
                            violations.push(format!(
                                "field '{}' below minimum {}",
                                spec.name,
                                spec.min.unwrap_or_default()
                            ));
                        }
                        if spec.max.is_some_and(|max| number > max) {
                            violations.push(format!(
                                "field '{}' above maximum {}",
                                spec.name,
                                spec.max.unwrap_or_default()
                            ));
                        }
                    }
                }
            }
        }

        let declared: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        let unknown_fields: Vec<String> = payload
            .keys()
            .filter(|key| !declared.contains(&key.as_str()))
            .cloned()
            .collect();

        SchemaReport {
            ok: violations.is_empty(),
            violations,
            unknown_fields,
        }
    }
}

fn default_schemas() -> Vec<ActionSchema> {
    vec![
        ActionSchema::new("approve_expense")
            .field(FieldSpec::new("amount", FieldType::Number).required().min(0.0))
            .field(FieldSpec::new("has_receipt", FieldType::Boolean))
            .field(FieldSpec::new("receipt", FieldType::Boolean))
            .field(FieldSpec::new("description", FieldType::String))
            .field(FieldSpec::new("category", FieldType::String)),
        ActionSchema::new("process_expense")
            .field(FieldSpec::new("amount", FieldType::Number).required().min(0.0))
            .field(FieldSpec::new("has_receipt", FieldType::Boolean))
            .field(FieldSpec::new("receipt", FieldType::Boolean))
            .field(FieldSpec::new("employee", FieldType::String)),
        ActionSchema::new("generate_offer")
            .field(FieldSpec::new("level", FieldType::String))
            .field(FieldSpec::new("salary", FieldType::Number).min(0.0))
            .field(FieldSpec::new("current_salary", FieldType::Number))
            .field(FieldSpec::new("candidate", FieldType::String))
            .field(FieldSpec::new("role", FieldType::String)),
        ActionSchema::new("send_email")
            .field(FieldSpec::new("to", FieldType::String).required())
            .field(FieldSpec::new("body", FieldType::String))
            .field(FieldSpec::new("subject", FieldType::String))
            .field(FieldSpec::new("cc", FieldType::List)),
        ActionSchema::new("provision_access")
            .field(FieldSpec::new("user", FieldType::String).required())
            .field(FieldSpec::new("role", FieldType::String))
            .field(FieldSpec::new("systems", FieldType::List)),
        ActionSchema::new("create_purchase_order")
            .field(FieldSpec::new("amount", FieldType::Number).required().min(0.0))
            .field(FieldSpec::new("vendor", FieldType::String))
            .field(FieldSpec::new("purchase_order", FieldType::String))
            .field(FieldSpec::new("po_number", FieldType::String)),
        ActionSchema::new("review_contract")
            .field(FieldSpec::new("value", FieldType::Number).min(0.0))
            .field(FieldSpec::new("type", FieldType::String))
            .field(FieldSpec::new("legal_reviewed", FieldType::Boolean))
            .field(FieldSpec::new("terms_modified", FieldType::Boolean)),
        ActionSchema::new("terminate_employee")
            .field(FieldSpec::new("employee", FieldType::String).required())
            .field(FieldSpec::new("type", FieldType::String))
            .field(FieldSpec::new("documentation", FieldType::List))
            .field(FieldSpec::new("hr_reviewed", FieldType::Boolean))
            .field(FieldSpec::new("legal_reviewed", FieldType::Boolean)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: serde_json::Value) -> Payload {
        json.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_unschematized_action_passes_clean() {
        let registry = SchemaRegistry::with_default_schemas();
        let report = registry.validate("mystery_action", &payload(serde_json::json!({"x": 1})));
        assert!(report.ok);
        assert!(report.unknown_fields.is_empty());
    }

    #[test]
    fn test_missing_required_field_violates() {
        let registry = SchemaRegistry::with_default_schemas();
        let report = registry.validate("approve_expense", &payload(serde_json::json!({})));
        assert!(!report.ok);
        assert!(report.violations[0].contains("amount"));
    }

    #[test]
    fn test_wrong_type_violates() {
        let registry = SchemaRegistry::with_default_schemas();
        let report = registry.validate(
            "approve_expense",
            &payload(serde_json::json!({"amount": [1, 2, 3]})),
        );
        assert!(!report.ok);
        assert!(report.violations[0].contains("wrong type"));
    }

    #[test]
    fn test_unknown_fields_flagged_not_fatal() {
        let registry = SchemaRegistry::with_default_schemas();
        let report = registry.validate(
            "approve_expense",
            &payload(serde_json::json!({"amount": 50, "surprise": true})),
        );
        assert!(report.ok);
        assert_eq!(report.unknown_fields, vec!["surprise".to_string()]);
    }

    #[test]
    fn test_range_bounds_enforced() {
        let registry = SchemaRegistry::with_default_schemas();
        let report = registry.validate(
            "approve_expense",
            &payload(serde_json::json!({"amount": -5})),
        );
        assert!(!report.ok);
        assert!(report.violations[0].contains("minimum"));
    }

    #[test]
    fn test_numeric_string_accepted_for_number() {
        let registry = SchemaRegistry::with_default_schemas();
        let report = registry.validate(
            "approve_expense",
            &payload(serde_json::json!({"amount": "150"})),
        );
        assert!(report.ok, "violations: {:?}", report.violations);
    }

    #[test]
    fn test_duplicate_schema_rejected() {
        let mut registry = SchemaRegistry::new();
        registry.register(ActionSchema::new("a")).unwrap();
        assert!(registry.register(ActionSchema::new("a")).is_err());
    }
}
