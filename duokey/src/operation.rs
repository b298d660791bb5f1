//! Static descriptions of remote actions.

use reqwest::Method;
use std::fmt;

/// How parameters of a GET operation are sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryEncoding {
    /// Parameters travel in the JSON body only
    #[default]
    Omit,
    /// Top-level parameter fields are appended as a URL-encoded query string
    UrlEncoded,
}

/// One remote action: method and address.
///
/// Built once per facade and shared by every call to that action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// Name used in logs and errors
    pub name: &'static str,
    /// HTTP method
    pub method: Method,
    /// Base URL of the service
    pub base_url: String,
    /// Route appended to the base URL
    pub route: String,
    /// Query encoding for GET requests
    pub query: QueryEncoding,
}

impl Operation {
    /// Describe an action.
    #[must_use]
    pub fn new(
        name: &'static str,
        method: Method,
        base_url: impl Into<String>,
        route: impl Into<String>,
    ) -> Self {
        Self {
            name,
            method,
            base_url: base_url.into(),
            route: route.into(),
            query: QueryEncoding::Omit,
        }
    }

    /// Describe a GET action whose parameters go in the query string.
    #[must_use]
    pub fn get(name: &'static str, base_url: impl Into<String>, route: impl Into<String>) -> Self {
        Self::new(name, Method::GET, base_url, route).with_query_encoding(QueryEncoding::UrlEncoded)
    }

    /// Describe a POST action.
    #[must_use]
    pub fn post(name: &'static str, base_url: impl Into<String>, route: impl Into<String>) -> Self {
        Self::new(name, Method::POST, base_url, route)
    }

    /// Set the query encoding.
    #[must_use]
    pub const fn with_query_encoding(mut self, query: QueryEncoding) -> Self {
        self.query = query;
        self
    }

    /// Concatenation of base URL and route.
    #[must_use]
    pub fn raw_url(&self) -> String {
        format!("{}{}", self.base_url, self.route)
    }

    /// Whether the method is one the builder accepts.
    #[must_use]
    pub fn has_supported_method(&self) -> bool {
        is_supported_method(&self.method)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.method, self.route)
    }
}

/// GET, POST, PUT and DELETE.
#[must_use]
pub fn is_supported_method(method: &Method) -> bool {
    [Method::GET, Method::POST, Method::PUT, Method::DELETE].contains(method)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_methods() {
        for method in [Method::GET, Method::POST, Method::PUT, Method::DELETE] {
            assert!(is_supported_method(&method), "{method} should be supported");
        }
        for method in [Method::PATCH, Method::HEAD, Method::OPTIONS] {
            assert!(!is_supported_method(&method), "{method} should be rejected");
        }
    }

    #[test]
    fn test_get_defaults_to_query_encoding() {
        let op = Operation::get("GetKeyId", "https://kms.example.com", "/keys");
        assert_eq!(op.method, Method::GET);
        assert_eq!(op.query, QueryEncoding::UrlEncoded);

        let op = Operation::post("Encrypt", "https://kms.example.com", "/encrypt");
        assert_eq!(op.query, QueryEncoding::Omit);
    }

    #[test]
    fn test_raw_url_and_display() {
        let op = Operation::post("Encrypt", "https://kms.example.com", "/api/encrypt");
        assert_eq!(op.raw_url(), "https://kms.example.com/api/encrypt");
        assert_eq!(op.to_string(), "Encrypt POST /api/encrypt");
    }
}
