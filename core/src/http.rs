//! HTTP transport types for the build/execute/parse split.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The
//! client builds `HttpRequest` values and parses `HttpResponse` values; only
//! a `Transport` implementation touches the network. Keeping the request as
//! data lets tests assert on URLs, query parameters and bodies without a
//! server.
//!
//! Multipart bodies carry file *paths*, not open handles. The transport opens
//! them immediately before sending so handle lifetime is bounded by a single
//! call.

use std::fmt;
use std::path::PathBuf;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single file attached to a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name the file is attached under.
    pub field: String,
    /// Local file to read when the request is sent.
    pub path: PathBuf,
}

/// Request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Empty,
    /// Already-serialized JSON, sent verbatim.
    Json(String),
    Multipart(Vec<FilePart>),
}

impl RequestBody {
    /// Short label used in log output.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestBody::Empty => "empty",
            RequestBody::Json(_) => "json",
            RequestBody::Multipart(_) => "multipart",
        }
    }

    pub fn as_json(&self) -> Option<&str> {
        match self {
            RequestBody::Json(body) => Some(body),
            _ => None,
        }
    }
}

/// An HTTP request described as plain data.
///
/// Built by `TeamscaleClient::build_*` methods and executed by a
/// `Transport`. Query parameters keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    /// Value of the first query parameter named `key`.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}
