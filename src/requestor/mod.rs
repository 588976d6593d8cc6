//! Single-shot request/response over a point-to-point protocol.
//!
//! A [`Requestor`] resolves each request exactly once through its
//! [`Completion`]: with the parsed response body on success, or with a
//! [`TailError`](crate::TailError) on every failure path.

mod http;
mod local;

pub use self::http::HttpRequestor;
pub use self::local::LocalRequestor;

use crate::error::Result;
use serde_json::Value;
use std::fmt;

/// Request method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request relative to the API root.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path plus query string, e.g. `/messages?reverse=1&count=5`.
    pub path: String,
    /// JSON body. Sent with a JSON content type when present.
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    /// Path without the query string.
    pub fn route(&self) -> &str {
        self.path.split('?').next().unwrap_or("")
    }

    /// Decoded query parameters in order.
    pub fn query(&self) -> Vec<(String, String)> {
        let Some((_, query)) = self.path.split_once('?') else {
            return Vec::new();
        };
        query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode_component(key), decode_component(value))
            })
            .collect()
    }
}

fn decode_component(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Receives the outcome of one request.
pub type Completion = Box<dyn FnOnce(Result<Value>) + Send>;

/// Issues requests and reports each outcome exactly once.
///
/// Implementations may complete synchronously, from inside `request`.
pub trait Requestor: Send + Sync {
    fn request(&self, request: ApiRequest, on_complete: Completion);
}
