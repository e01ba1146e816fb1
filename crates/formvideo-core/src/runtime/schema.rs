use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

/// Form type used when a submission does not name one.
pub const DEFAULT_FORM_TYPE: &str = "personal_info";

/// Value type expected for a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Array,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub field_type: FieldType,
}

/// Field schema handed to the extraction collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSchema {
    /// The form type this schema was resolved for.
    pub name: String,
    pub fields: Vec<SchemaField>,
}

impl FormSchema {
    pub fn new(name: impl Into<String>, fields: &[(&str, FieldType)]) -> Self {
        Self {
            name: name.into(),
            fields: fields
                .iter()
                .map(|(name, field_type)| SchemaField {
                    name: (*name).to_owned(),
                    field_type: *field_type,
                })
                .collect(),
        }
    }

    /// `{ "field": "type", ... }`, the shape extraction prompts embed.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), Value::String(f.field_type.to_string())))
            .collect();
        Value::Object(map)
    }
}

/// Static lookup from form type to field schema.
pub trait SchemaProvider: Send + Sync + 'static {
    /// Never fails: unknown form types resolve to a default schema.
    fn get_schema(&self, form_type: &str) -> FormSchema;
}

/// Built-in schemas: `personal_info` (also the fallback) and `job_application`.
#[derive(Debug, Clone)]
pub struct StaticSchemaProvider {
    schemas: Vec<FormSchema>,
}

impl StaticSchemaProvider {
    pub fn new() -> Self {
        use FieldType::*;
        Self {
            schemas: vec![
                FormSchema::new(
                    DEFAULT_FORM_TYPE,
                    &[
                        ("name", String),
                        ("email", String),
                        ("phone", String),
                        ("address", String),
                        ("date_of_birth", String),
                        ("gender", String),
                    ],
                ),
                FormSchema::new(
                    "job_application",
                    &[
                        ("name", String),
                        ("email", String),
                        ("phone", String),
                        ("position_applied_for", String),
                        ("experience_years", Number),
                        ("skills", Array),
                        ("education", String),
                        ("previous_company", String),
                        ("reason_for_application", String),
                    ],
                ),
            ],
        }
    }

    /// Register an extra schema, replacing any schema of the same name.
    pub fn with_schema(mut self, schema: FormSchema) -> Self {
        self.schemas.retain(|s| s.name != schema.name);
        self.schemas.push(schema);
        self
    }

    pub fn form_types(&self) -> impl Iterator<Item = &str> {
        self.schemas.iter().map(|s| s.name.as_str())
    }
}

impl Default for StaticSchemaProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaProvider for StaticSchemaProvider {
    fn get_schema(&self, form_type: &str) -> FormSchema {
        self.schemas
            .iter()
            .find(|s| s.name == form_type)
            .or_else(|| self.schemas.iter().find(|s| s.name == DEFAULT_FORM_TYPE))
            .cloned()
            .unwrap_or_else(|| FormSchema::new(DEFAULT_FORM_TYPE, &[]))
    }
}
