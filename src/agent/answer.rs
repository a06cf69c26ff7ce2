//! Validation of structured final answers.
//!
//! Model output is untrusted text. A task that expects JSON declares the
//! fields it needs; the answer is only accepted once a JSON object with
//! those fields, of those types, can be pulled out of it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Bool,
    String,
    Number,
    Array,
    Object,
}

impl FieldType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Bool => value.is_boolean(),
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::String => write!(f, "string"),
            Self::Number => write!(f, "number"),
            Self::Array => write!(f, "array"),
            Self::Object => write!(f, "object"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnswerError {
    #[error("Final Answer must contain a JSON object")]
    NoJson,

    #[error("Final Answer is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Final Answer JSON is missing field `{0}`")]
    MissingField(String),

    #[error("Final Answer field `{field}` must be a {expected}")]
    WrongType { field: String, expected: FieldType },
}

/// Required top-level fields of a JSON final answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerSchema {
    fields: Vec<(String, FieldType)>,
}

impl AnswerSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push((name.into(), ty));
        self
    }

    pub fn fields(&self) -> &[(String, FieldType)] {
        &self.fields
    }

    /// One line per field, for the corrective observation.
    pub fn describe(&self) -> String {
        self.fields
            .iter()
            .map(|(name, ty)| format!("- `{}`: {}", name, ty))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Extract and check the JSON object in `answer`.
    pub fn validate(&self, answer: &str) -> Result<Value, AnswerError> {
        let object = extract_json_object(answer)?;
        for (name, ty) in &self.fields {
            let value = object
                .get(name)
                .ok_or_else(|| AnswerError::MissingField(name.clone()))?;
            if !ty.accepts(value) {
                return Err(AnswerError::WrongType {
                    field: name.clone(),
                    expected: *ty,
                });
            }
        }
        Ok(Value::Object(object))
    }
}

/// Find the outermost `{ ... }` span, tolerating code fences and prose.
fn extract_json_object(text: &str) -> Result<Map<String, Value>, AnswerError> {
    let start = text.find('{').ok_or(AnswerError::NoJson)?;
    let end = text.rfind('}').ok_or(AnswerError::NoJson)?;
    if end < start {
        return Err(AnswerError::NoJson);
    }

    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AnswerError::NoJson),
        Err(e) => Err(AnswerError::InvalidJson(e.to_string())),
    }
}
