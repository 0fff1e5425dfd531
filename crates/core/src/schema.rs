//! Explicit parameter schemas for tools and structured output.
//!
//! Schemas are declared with a builder rather than inferred from function
//! signatures. The type mapping is deliberately coarse: anything that is not
//! a string, integer, number, boolean, array or object is declared as a
//! string.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Coarse JSON-Schema type of a single parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    /// The JSON-Schema `type` keyword for this parameter.
    pub fn json_type(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }

    /// Whether `value` is an instance of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub description: Option<String>,
    /// A parameter is required iff it has no default.
    pub required: bool,
    pub enum_values: Vec<String>,
}

/// An object schema: `{"type": "object", "properties": {...}, "required": [...]}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSchema {
    params: Vec<ParamSpec>,
}

impl ObjectSchema {
    pub fn builder() -> ObjectSchemaBuilder {
        ObjectSchemaBuilder::default()
    }

    /// A schema for a tool that takes no arguments.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Render as a JSON-Schema object. `required` is omitted when empty.
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        for p in &self.params {
            let mut field = Map::new();
            field.insert("type".into(), Value::from(p.param_type.json_type()));
            if let Some(desc) = &p.description {
                field.insert("description".into(), Value::from(desc.as_str()));
            }
            if !p.enum_values.is_empty() {
                field.insert("enum".into(), Value::from(p.enum_values.clone()));
            }
            properties.insert(p.name.clone(), Value::Object(field));
        }

        let mut schema = Map::new();
        schema.insert("type".into(), Value::from("object"));
        schema.insert("properties".into(), Value::Object(properties));

        let required: Vec<Value> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| Value::from(p.name.as_str()))
            .collect();
        if !required.is_empty() {
            schema.insert("required".into(), Value::Array(required));
        }

        Value::Object(schema)
    }

    /// Check that `value` is an object whose required keys are present and
    /// whose declared keys have the declared coarse type. Undeclared keys are
    /// allowed.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        let obj = value
            .as_object()
            .ok_or_else(|| format!("expected a JSON object, got {}", kind_of(value)))?;

        for p in &self.params {
            match obj.get(&p.name) {
                None | Some(Value::Null) if p.required => {
                    return Err(format!("missing required field '{}'", p.name));
                }
                None | Some(Value::Null) => {}
                Some(v) => {
                    if !p.param_type.accepts(v) {
                        return Err(format!(
                            "field '{}' should be {}, got {}",
                            p.name,
                            p.param_type.json_type(),
                            kind_of(v)
                        ));
                    }
                    if !p.enum_values.is_empty() {
                        let ok = v.as_str().is_some_and(|s| p.enum_values.iter().any(|e| e == s));
                        if !ok {
                            return Err(format!(
                                "field '{}' must be one of {:?}",
                                p.name, p.enum_values
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl From<ObjectSchema> for Value {
    fn from(schema: ObjectSchema) -> Self {
        schema.to_json()
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Builder for [`ObjectSchema`].
#[derive(Debug, Default)]
pub struct ObjectSchemaBuilder {
    params: Vec<ParamSpec>,
}

impl ObjectSchemaBuilder {
    /// Add a required parameter. An empty description is omitted.
    pub fn param(self, name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        self.push(name.into(), param_type, description.into(), true)
    }

    /// Add a parameter that has a default value (not required).
    pub fn optional(self, name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        self.push(name.into(), param_type, description.into(), false)
    }

    /// Restrict an already-declared parameter to a fixed set of string values.
    pub fn enum_values<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(p) = self.params.iter_mut().find(|p| p.name == name) {
            p.enum_values = values.into_iter().map(Into::into).collect();
        }
        self
    }

    pub fn build(self) -> ObjectSchema {
        ObjectSchema { params: self.params }
    }

    fn push(mut self, name: String, param_type: ParamType, description: String, required: bool) -> Self {
        self.params.push(ParamSpec {
            name,
            param_type,
            description: (!description.is_empty()).then_some(description),
            required,
            enum_values: Vec::new(),
        });
        self
    }
}
