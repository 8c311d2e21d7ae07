//! JSON schema validators for the tagscan DTOs.
//!
//! Schemas are generated from the types with schemars and compiled with
//! jsonschema, so a serialized value that drifts from its declared shape
//! fails loudly in tests.

use jsonschema::JSONSchema;
use schemars::schema_for;
use serde_json::Value;

use tagscan_types::{RuleConfig, ScanReport, VerifyReport};

/// Error type for schema validation failures.
#[derive(Debug)]
pub struct SchemaValidationError {
    pub errors: Vec<String>,
}

impl std::fmt::Display for SchemaValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "schema validation failed: {}", self.errors.join("; "))
    }
}

impl std::error::Error for SchemaValidationError {}

fn compile(schema: Value) -> JSONSchema {
    JSONSchema::compile(&schema).expect("generated schema should compile")
}

fn validate(schema: &JSONSchema, value: &Value) -> Result<(), SchemaValidationError> {
    let result = schema.validate(value);
    match result {
        Ok(()) => Ok(()),
        Err(errors) => Err(SchemaValidationError {
            errors: errors.map(|e| e.to_string()).collect(),
        }),
    }
}

/// Validate a scan report against its generated schema.
pub fn validate_scan_report(report: &ScanReport) -> Result<(), SchemaValidationError> {
    let schema = compile(
        serde_json::to_value(schema_for!(ScanReport)).expect("schema should serialize"),
    );
    let value = serde_json::to_value(report).expect("report should serialize");
    validate(&schema, &value)
}

/// Validate a verify report against its generated schema.
pub fn validate_verify_report(report: &VerifyReport) -> Result<(), SchemaValidationError> {
    let schema = compile(
        serde_json::to_value(schema_for!(VerifyReport)).expect("schema should serialize"),
    );
    let value = serde_json::to_value(report).expect("report should serialize");
    validate(&schema, &value)
}

/// Validate a rule list against the generated rule schema.
pub fn validate_rule_configs(rules: &[RuleConfig]) -> Result<(), SchemaValidationError> {
    let schema = compile(
        serde_json::to_value(schema_for!(Vec<RuleConfig>)).expect("schema should serialize"),
    );
    let value = serde_json::to_value(rules).expect("rules should serialize");
    validate(&schema, &value)
}
