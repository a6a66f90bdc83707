//! Versioned API resources.
//!
//! [`ApiClient`] only holds a weak reference to its [`Gateway`]. Once the
//! gateway is dropped every call becomes a no-op and its callback is dropped
//! without being invoked.

use std::sync::{Arc, Weak};

use courier_http::{parse_json_object, HttpError, Outcome};
use serde_json::{Map, Value};

use crate::gateway::Gateway;

/// Endpoint for payment method tokenization.
pub const PAYMENT_METHOD_ENDPOINT: &str = "payment_methods";

/// Version prefix of every REST path.
pub const API_VERSION_PREFIX: &str = "/v1/";

/// Key under which request metadata is attached to a payload.
pub const META_KEY: &str = "_meta";

/// Receives a parsed JSON object or the error that prevented it.
pub type JsonCallback = Box<dyn FnOnce(Result<Value, HttpError>) + Send + 'static>;

/// `/v1/<path>`.
pub fn versioned_path(path: &str) -> String {
    format!("{API_VERSION_PREFIX}{path}")
}

/// Client for versioned REST resources and GraphQL payloads.
#[derive(Debug, Clone)]
pub struct ApiClient {
    gateway: Weak<Gateway>,
}

impl ApiClient {
    /// Client backed by `gateway`.
    pub fn new(gateway: &Arc<Gateway>) -> Self {
        Self::from_weak(Arc::downgrade(gateway))
    }

    /// Client backed by an existing weak reference.
    pub fn from_weak(gateway: Weak<Gateway>) -> Self {
        Self { gateway }
    }

    /// Whether the gateway is still alive.
    pub fn is_attached(&self) -> bool {
        self.gateway.strong_count() > 0
    }

    /// `POST` `payload` to `/v1/<resource>`, tagged with the session id.
    pub fn post_resource(&self, resource: &str, mut payload: Map<String, Value>, callback: JsonCallback) {
        let Some(gateway) = self.gateway.upgrade() else {
            tracing::debug!(resource, "gateway released, dropping request");
            return;
        };

        attach_session_id(&mut payload, &gateway.session_id().to_wire());
        let body = Value::Object(payload).to_string();

        tracing::info!(resource, "tokenization started");
        gateway.send_post(
            &versioned_path(resource),
            body,
            Some(Box::new(move |outcome| callback(into_json(outcome)))),
        );
    }

    /// `POST` `payload` to the `/v1/payment_methods/<kind>` endpoint.
    pub fn tokenize_rest(&self, kind: &str, payload: Map<String, Value>, callback: JsonCallback) {
        self.post_resource(&format!("{PAYMENT_METHOD_ENDPOINT}/{kind}"), payload, callback);
    }

    /// `POST` `payload` to the GraphQL endpoint.
    pub fn tokenize_graphql(&self, payload: &Value, callback: JsonCallback) {
        let Some(gateway) = self.gateway.upgrade() else {
            tracing::debug!("gateway released, dropping GraphQL request");
            return;
        };

        tracing::info!("graphql tokenization started");
        gateway.send_graphql_post(
            payload.to_string(),
            Box::new(move |outcome| {
                let result = into_json(outcome);
                match &result {
                    Ok(_) => tracing::info!("graphql tokenization succeeded"),
                    Err(e) => tracing::info!(error = %e, "graphql tokenization failed"),
                }
                callback(result)
            }),
        );
    }
}

fn attach_session_id(payload: &mut Map<String, Value>, session_id: &str) {
    let meta = payload
        .entry(META_KEY)
        .or_insert_with(|| Value::Object(Map::new()));
    if !meta.is_object() {
        *meta = Value::Object(Map::new());
    }
    if let Value::Object(meta) = meta {
        meta.insert("sessionId".to_string(), Value::String(session_id.to_string()));
    }
}

fn into_json(outcome: Outcome) -> Result<Value, HttpError> {
    let body = outcome?;
    let value = parse_json_object(&body)?;
    Ok(value)
}
