//! HTTP request values and builders.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::fmt;

/// Common HTTP headers.
pub mod headers {
    pub const CONTENT_TYPE_JSON: &str = "application/json";
    pub const X_API_KEY: &str = "x-api-key";
    pub const CLIENT_SESSION_ID: &str = "client-session-id";
}

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// One HTTP exchange to perform.
///
/// A `Request` is assembled up front and never changes once handed to a
/// client. Building one does no I/O.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    url: String,
    body: Option<String>,
    headers: HeaderMap,
}

impl Request {
    /// Create a request with no body and no headers.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    /// A `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// A `POST` request carrying `body`.
    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(Method::Post, url).with_body(body)
    }

    /// A `PUT` request carrying `body`.
    pub fn put(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(Method::Put, url).with_body(body)
    }

    /// A `DELETE` request.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    /// Attach a body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Add a header. Names or values that are not valid HTTP are skipped.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Add every header from `defaults` that the request does not set itself.
    pub fn with_default_headers(mut self, defaults: &HeaderMap) -> Self {
        for (name, value) in defaults {
            if !self.headers.contains_key(name) {
                self.headers.insert(name.clone(), value.clone());
            }
        }
        self
    }

    /// HTTP method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Full URL, or a path to be resolved against the transport's base URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Body, if any.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether the URL already carries a scheme.
    pub fn is_absolute(&self) -> bool {
        is_absolute_url(&self.url)
    }
}

fn is_absolute_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Stamps a base URL and default headers onto outgoing requests.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    headers: HeaderMap,
    base_url: Option<String>,
}

impl RequestBuilder {
    /// Create a new request builder.
    pub fn new() -> Self {
        Self {
            headers: HeaderMap::new(),
            base_url: None,
        }
    }

    /// Set the base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Add a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Add bearer token authorization.
    pub fn bearer_auth(mut self, token: impl AsRef<str>) -> Self {
        if let Ok(value) = HeaderValue::try_from(format!("Bearer {}", token.as_ref())) {
            self.headers.insert(AUTHORIZATION, value);
        }
        self
    }

    /// Add API key header.
    pub fn api_key(self, key: impl AsRef<str>) -> Self {
        self.header(headers::X_API_KEY, key)
    }

    /// Set content type to JSON.
    pub fn json_content(mut self) -> Self {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(headers::CONTENT_TYPE_JSON));
        self
    }

    /// Get the default headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Resolve `path` against the base URL. Absolute URLs pass through.
    pub fn url(&self, path: &str) -> String {
        match &self.base_url {
            Some(base) if !is_absolute_url(path) => {
                format!("{}{}", base.trim_end_matches('/'), path)
            }
            _ => path.to_string(),
        }
    }

    /// Build a request for `path` carrying the default headers.
    pub fn build(&self, method: Method, path: &str) -> Request {
        Request::new(method, self.url(path)).with_default_headers(&self.headers)
    }

    /// Build a `GET` request.
    pub fn get(&self, path: &str) -> Request {
        self.build(Method::Get, path)
    }

    /// Build a `POST` request.
    pub fn post(&self, path: &str, body: impl Into<String>) -> Request {
        self.build(Method::Post, path).with_body(body)
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}
