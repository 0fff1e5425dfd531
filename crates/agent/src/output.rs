//! Run outcomes and structured-output coercion.

use std::fmt;
use std::marker::PhantomData;

use agentloop_core::schema::ObjectSchema;
use agentloop_core::tool::ToolInput;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Returned (or streamed as an error) when a run exhausts its iteration budget.
pub const ITERATION_LIMIT_MESSAGE: &str = "Maximum iterations reached without completing the task.";

/// A declared shape for the agent's final answer.
pub trait OutputSchema: Send + Sync {
    /// The JSON Schema for the expected object.
    fn json_schema(&self) -> Value;

    /// Check a parsed candidate against the schema.
    fn validate(&self, value: &Value) -> Result<(), String>;
}

impl OutputSchema for ObjectSchema {
    fn json_schema(&self) -> Value {
        self.to_json()
    }

    fn validate(&self, value: &Value) -> Result<(), String> {
        ObjectSchema::validate(self, value)
    }
}

/// Output schema taken from a [`ToolInput`] type. A candidate must satisfy
/// the declared schema and also deserialize into `T`.
pub struct TypedOutput<T> {
    schema: ObjectSchema,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ToolInput> TypedOutput<T> {
    pub fn new() -> Self {
        Self {
            schema: T::input_schema(),
            _marker: PhantomData,
        }
    }
}

impl<T: ToolInput> Default for TypedOutput<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ToolInput> OutputSchema for TypedOutput<T> {
    fn json_schema(&self) -> Value {
        self.schema.to_json()
    }

    fn validate(&self, value: &Value) -> Result<(), String> {
        self.schema.validate(value)?;
        serde_json::from_value::<T>(value.clone())
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Result of coercing the final answer into the declared schema.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredOutput {
    /// The answer was a JSON object satisfying the schema.
    Parsed(Value),
    /// The answer was not object-shaped; returned as-is.
    RawFallback(String),
    /// The answer looked like an object but did not parse or validate.
    ParseError { raw: String, error: String },
}

impl StructuredOutput {
    /// Coerce `raw` against `schema`. Never fails: anything that does not
    /// validate comes back as raw text.
    pub fn coerce(schema: &dyn OutputSchema, raw: &str) -> Self {
        let trimmed = raw.trim();
        if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
            return Self::RawFallback(raw.to_string());
        }

        let value: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(e) => {
                return Self::ParseError {
                    raw: raw.to_string(),
                    error: e.to_string(),
                };
            }
        };

        match schema.validate(&value) {
            Ok(()) => Self::Parsed(value),
            Err(error) => Self::ParseError {
                raw: raw.to_string(),
                error,
            },
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Parsed(v) => Some(v),
            Self::RawFallback(_) | Self::ParseError { .. } => None,
        }
    }

    /// Deserialize a parsed answer into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Option<T> {
        self.value().and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// The outcome of one agent run.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutput {
    /// Final answer when no output schema is declared.
    Text(String),
    /// Final answer coerced against the declared output schema.
    Structured(StructuredOutput),
    /// The run used every iteration without a final answer.
    IterationLimit,
}

impl AgentOutput {
    /// The answer as text, if it has a textual form.
    ///
    /// `None` only for a successfully parsed structured answer; use
    /// [`AgentOutput::structured`] for that.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(StructuredOutput::RawFallback(raw))
            | Self::Structured(StructuredOutput::ParseError { raw, .. }) => Some(raw),
            Self::Structured(StructuredOutput::Parsed(_)) => None,
            Self::IterationLimit => Some(ITERATION_LIMIT_MESSAGE),
        }
    }

    pub fn structured(&self) -> Option<&Value> {
        match self {
            Self::Structured(output) => output.value(),
            Self::Text(_) | Self::IterationLimit => None,
        }
    }

    pub fn is_iteration_limit(&self) -> bool {
        matches!(self, Self::IterationLimit)
    }
}

impl fmt::Display for AgentOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structured(StructuredOutput::Parsed(value)) => {
                let pretty = serde_json::to_string_pretty(value).map_err(|_| fmt::Error)?;
                f.write_str(&pretty)
            }
            other => f.write_str(other.text().unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentloop_core::schema::ParamType;
    use serde::Deserialize;
    use serde_json::json;

    fn schema() -> ObjectSchema {
        ObjectSchema::builder().param("a", ParamType::Integer, "").build()
    }

    #[test]
    fn object_answer_is_parsed() {
        let out = StructuredOutput::coerce(&schema(), "  {\"a\": 1}\n");
        assert_eq!(out, StructuredOutput::Parsed(json!({"a": 1})));
        assert_eq!(out.value().unwrap()["a"], 1);
    }

    #[test]
    fn plain_text_falls_back() {
        let out = StructuredOutput::coerce(&schema(), "not json");
        assert_eq!(out, StructuredOutput::RawFallback("not json".into()));
    }

    #[test]
    fn malformed_object_is_a_parse_error_with_raw_text() {
        let out = StructuredOutput::coerce(&schema(), "{a: 1}");
        match out {
            StructuredOutput::ParseError { raw, .. } => assert_eq!(raw, "{a: 1}"),
            other => panic!("expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn schema_violation_is_a_parse_error() {
        let out = StructuredOutput::coerce(&schema(), r#"{"a": "one"}"#);
        assert!(matches!(out, StructuredOutput::ParseError { .. }));
        assert_eq!(AgentOutput::Structured(out).text(), Some(r#"{"a": "one"}"#));
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Weather {
        city: String,
        temperature: f64,
    }

    impl ToolInput for Weather {
        fn input_schema() -> ObjectSchema {
            ObjectSchema::builder()
                .param("city", ParamType::String, "")
                .param("temperature", ParamType::Number, "")
                .build()
        }
    }

    #[test]
    fn typed_output_deserializes() {
        let schema = TypedOutput::<Weather>::new();
        assert_eq!(schema.json_schema()["required"], json!(["city", "temperature"]));

        let out = StructuredOutput::coerce(&schema, r#"{"city": "Tokyo", "temperature": 26.5}"#);
        let weather: Weather = out.deserialize().unwrap();
        assert_eq!(
            weather,
            Weather {
                city: "Tokyo".into(),
                temperature: 26.5
            }
        );
    }

    #[test]
    fn output_text_and_display() {
        assert_eq!(AgentOutput::Text("hi".into()).text(), Some("hi"));
        assert_eq!(AgentOutput::IterationLimit.to_string(), ITERATION_LIMIT_MESSAGE);

        let parsed = AgentOutput::Structured(StructuredOutput::Parsed(json!({"a": 1})));
        assert_eq!(parsed.text(), None);
        assert_eq!(parsed.to_string(), "{\n  \"a\": 1\n}");
    }
}
