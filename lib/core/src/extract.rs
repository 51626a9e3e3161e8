//! Built-in value extractors

use crate::aligner::ValueExtractor;
use serde_json::Value;

/// Reads a field of a JSON request.
///
/// The expression is either a JSON pointer (`/customer/age`) or a dotted path
/// (`customer.age`, optionally prefixed with `$.`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPointerExtractor {
    pointer: String,
}

impl JsonPointerExtractor {
    pub fn new(expression: &str) -> Self {
        let expression = expression.trim();
        let pointer = if expression.starts_with('/') || expression.is_empty() {
            expression.to_string()
        } else {
            let path = expression.strip_prefix("$.").unwrap_or(expression);
            path.split('.')
                .map(|segment| format!("/{}", segment.replace('~', "~0").replace('/', "~1")))
                .collect()
        };
        Self { pointer }
    }

    pub fn pointer(&self) -> &str {
        &self.pointer
    }
}

impl ValueExtractor<Value> for JsonPointerExtractor {
    fn extract(&self, ctx: &Value) -> Option<String> {
        match ctx.pointer(&self.pointer)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            other => Some(other.to_string()),
        }
    }
}

/// Always yields the same value, whatever the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantExtractor {
    value: Option<String>,
}

impl ConstantExtractor {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }

    /// An extractor that reports the value as absent
    pub fn absent() -> Self {
        Self { value: None }
    }
}

impl<C: ?Sized> ValueExtractor<C> for ConstantExtractor {
    fn extract(&self, _ctx: &C) -> Option<String> {
        self.value.clone()
    }
}
