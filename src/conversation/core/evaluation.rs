//! Structured evaluation payload produced at the end of a conversation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::conversation::core::errors::{UpstreamError, UpstreamResult};

/// Opaque structured record of named fields, as returned by the model.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Evaluation(pub Map<String, Value>);

impl Evaluation {
    /// Parse a model reply into an evaluation.
    ///
    /// Accepts a bare JSON object or one wrapped in a Markdown code fence.
    ///
    /// # Errors
    /// Returns [`UpstreamError::MalformedOutput`] if the reply is not a JSON object.
    pub fn parse(reply: &str) -> UpstreamResult<Self> {
        let body = strip_code_fence(reply.trim());
        let value: Value = serde_json::from_str(body).map_err(|err| {
            UpstreamError::MalformedOutput(format!("evaluation is not valid json: {err}"))
        })?;
        match value {
            Value::Object(fields) if !fields.is_empty() => Ok(Self(fields)),
            Value::Object(_) => Err(UpstreamError::MalformedOutput(
                "evaluation object is empty".to_string(),
            )),
            other => Err(UpstreamError::MalformedOutput(format!(
                "evaluation must be a json object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Look up a field by name.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json") up to the first newline.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
