//! # Schema Data Model
//!
//! The single entity kind stored by the registry: a JSON-Schema body plus
//! its identity/bookkeeping metadata and optional UI form hints.
//!
//! Wire format is camelCase JSON throughout, shared by the local backing
//! file, the remote protocol, and the HTTP surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RegistryError;
use crate::identity::{Said, SchemaId};
use crate::temporal::Timestamp;

/// Semantic version assigned to newly created schemas.
pub const DEFAULT_SCHEMA_VERSION: &str = "1.0.0";

fn default_version() -> String {
    DEFAULT_SCHEMA_VERSION.to_string()
}

/// Identity and bookkeeping for one schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaMetadata {
    /// Opaque, provider-assigned identifier.
    pub id: SchemaId,
    /// Content identifier derived from the JSON-Schema body.
    pub said: Said,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Tag set; duplicates are removed keeping first-seen order.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
}

impl SchemaMetadata {
    /// Whether the record carries at least one of `tags`.
    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.tags.contains(t))
    }
}

/// The stored entity: metadata, the raw JSON-Schema body, and form hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaData {
    pub metadata: SchemaMetadata,
    /// The JSON-Schema body served verbatim on OOBI resolution.
    pub json_schema: Value,
    #[serde(default)]
    pub fields: Vec<CredentialField>,
}

/// Input type of a credential form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Select,
    Textarea,
    Date,
    Number,
    Boolean,
}

/// Optional value constraints attached to a form field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// UI-facing form hint for one credential attribute. Not used for resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialField {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<FieldValidation>,
}

impl CredentialField {
    /// Check that the field's constraints agree with its declared type.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::InvalidInput("field name must not be empty".into()));
        }
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return Err(RegistryError::InvalidInput(format!(
                    "field {}: minLength {min} exceeds maxLength {max}",
                    self.name
                )));
            }
        }
        if self.field_type == FieldType::Select
            && self.options.as_ref().map_or(true, |o| o.is_empty())
        {
            return Err(RegistryError::InvalidInput(format!(
                "field {}: select fields require at least one option",
                self.name
            )));
        }
        if let Some(FieldValidation {
            min: Some(min),
            max: Some(max),
            ..
        }) = &self.validation
        {
            if min > max {
                return Err(RegistryError::InvalidInput(format!(
                    "field {}: validation min {min} exceeds max {max}",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// Request body for creating a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSchemaRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub json_schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<CredentialField>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl CreateSchemaRequest {
    /// Minimal request carrying only a name and a schema body.
    pub fn new(name: impl Into<String>, json_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: None,
            json_schema,
            fields: None,
            tags: None,
            is_public: None,
            created_by: None,
        }
    }

    /// Reject blank names, non-object bodies, and inconsistent fields.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::InvalidInput("schema name is required".into()));
        }
        validate_body(&self.json_schema)?;
        for field in self.fields.iter().flatten() {
            field.validate()?;
        }
        Ok(())
    }
}

impl From<&SchemaData> for CreateSchemaRequest {
    fn from(data: &SchemaData) -> Self {
        Self {
            name: data.metadata.name.clone(),
            description: data.metadata.description.clone(),
            json_schema: data.json_schema.clone(),
            fields: Some(data.fields.clone()),
            tags: Some(data.metadata.tags.clone()),
            is_public: Some(data.metadata.is_public),
            created_by: data.metadata.created_by.clone(),
        }
    }
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSchemaRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<CredentialField>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

impl UpdateSchemaRequest {
    pub fn validate(&self) -> Result<(), RegistryError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(RegistryError::InvalidInput("schema name must not be blank".into()));
            }
        }
        if let Some(body) = &self.json_schema {
            validate_body(body)?;
        }
        for field in self.fields.iter().flatten() {
            field.validate()?;
        }
        Ok(())
    }
}

fn validate_body(body: &Value) -> Result<(), RegistryError> {
    if !body.is_object() {
        return Err(RegistryError::InvalidInput(
            "jsonSchema must be a JSON object".into(),
        ));
    }
    Ok(())
}

/// Remove duplicate tags, keeping first-seen order.
pub fn dedupe_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}
