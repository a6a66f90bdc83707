//! Response body parsing.

use serde::de::DeserializeOwned;

/// Response parsing errors.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("failed to parse JSON response: {source}")]
    Parse {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("expected a JSON {expected} in response")]
    UnexpectedShape { expected: &'static str },
}

/// Parse a response body as JSON.
pub fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, ResponseError> {
    serde_json::from_str(body).map_err(|source| ResponseError::Parse {
        body: body.to_string(),
        source,
    })
}

/// Parse a response body that must be a JSON object.
pub fn parse_json_object(body: &str) -> Result<serde_json::Value, ResponseError> {
    let value: serde_json::Value = parse_json(body)?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(ResponseError::UnexpectedShape { expected: "object" })
    }
}
