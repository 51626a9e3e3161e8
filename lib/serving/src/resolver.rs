//! Turning configured expressions into extractors

use modelbridge_core::{ConstantExtractor, Error, JsonPointerExtractor, Result, ValueExtractor};
use serde_json::Value;
use std::sync::Arc;

/// Prefix marking an expression as a literal value
pub const CONSTANT_PREFIX: &str = "const:";

/// Resolves the extractor expression of a binding for request type `C`
pub trait ExtractorResolver<C: ?Sized>: Send + Sync {
    fn resolve(&self, feature: &str, expression: &str) -> Result<Arc<dyn ValueExtractor<C>>>;
}

/// Resolver for JSON requests.
///
/// `const:<value>` yields a literal; anything else is read as a JSON pointer
/// or dotted path into the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonResolver;

impl ExtractorResolver<Value> for JsonResolver {
    fn resolve(&self, feature: &str, expression: &str) -> Result<Arc<dyn ValueExtractor<Value>>> {
        if let Some(literal) = expression.strip_prefix(CONSTANT_PREFIX) {
            return Ok(Arc::new(ConstantExtractor::new(literal)));
        }
        if expression.trim().is_empty() {
            return Err(Error::config(format!(
                "feature '{}' has an empty extractor expression",
                feature
            )));
        }
        Ok(Arc::new(JsonPointerExtractor::new(expression)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_resolver() {
        let request = json!({"customer": {"age": 41}});
        let age = JsonResolver.resolve("age", "customer.age").unwrap();
        assert_eq!(age.extract(&request).as_deref(), Some("41"));

        let plan = JsonResolver.resolve("plan", "const:gold").unwrap();
        assert_eq!(plan.extract(&request).as_deref(), Some("gold"));

        assert!(JsonResolver.resolve("age", "  ").is_err());
    }
}
