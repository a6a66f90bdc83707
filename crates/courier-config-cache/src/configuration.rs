//! Gateway configuration document.

use courier_http::{parse_json_object, ResponseError};
use serde_json::Value;

/// A configuration document as served by the gateway.
///
/// The document is kept opaque. `raw` is the exact text received, which is
/// also what the cache stores.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    raw: String,
    document: Value,
}

impl Configuration {
    /// Parse a serialized configuration. The document must be a JSON object.
    pub fn from_json(raw: impl Into<String>) -> Result<Self, ResponseError> {
        let raw = raw.into();
        let document = parse_json_object(&raw)?;
        Ok(Self { raw, document })
    }

    /// Serialized form, as received.
    pub fn to_json(&self) -> &str {
        &self.raw
    }

    /// Parsed document.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Look up a value by JSON pointer, e.g. `/graphQL/url`.
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        self.document.pointer(pointer)
    }

    /// Base URL of the client API.
    pub fn client_api_url(&self) -> Option<&str> {
        self.str_field("clientApiUrl")
    }

    /// Gateway environment, e.g. `sandbox` or `production`.
    pub fn environment(&self) -> Option<&str> {
        self.str_field("environment")
    }

    /// Merchant identifier.
    pub fn merchant_id(&self) -> Option<&str> {
        self.str_field("merchantId")
    }

    /// GraphQL endpoint, when enabled.
    pub fn graphql_url(&self) -> Option<&str> {
        self.pointer("/graphQL/url").and_then(Value::as_str)
    }

    fn str_field(&self, name: &str) -> Option<&str> {
        self.document.get(name).and_then(Value::as_str)
    }
}
