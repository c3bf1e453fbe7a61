use jsonschema::Validator;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::ConfigError;
use crate::error::ApiError;

/// A compiled JSON schema a request body must satisfy
pub struct RequestSchema {
    name: String,
    validator: Validator,
}

impl std::fmt::Debug for RequestSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSchema").field("name", &self.name).finish()
    }
}

impl RequestSchema {
    pub fn compile(name: impl Into<String>, schema: &Value) -> Result<Self, ConfigError> {
        let name = name.into();
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| ConfigError::construction(format!("schema.{}", name), e))?;
        Ok(Self { name, validator })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reject with 400 listing every failing instance path
    pub fn validate(&self, body: &Value) -> Result<(), ApiError> {
        let mut field_errors = BTreeMap::new();
        for error in self.validator.iter_errors(body) {
            let path = error.instance_path.to_string();
            let path = if path.is_empty() { "/".to_string() } else { path };
            field_errors.entry(path).or_insert_with(|| error.to_string());
        }

        if field_errors.is_empty() {
            Ok(())
        } else {
            tracing::debug!(schema = self.name.as_str(), errors = field_errors.len(), "Request body rejected");
            Err(ApiError::validation_error(
                format!("Request body does not match the '{}' schema", self.name),
                field_errors,
            ))
        }
    }
}
