//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! Requests and responses are plain data. `StaffoClient` builds
//! `HttpRequest` values and parses `HttpResponse` values; a `Transport`
//! executes the round-trip in between. Query parameters are kept apart from
//! the URL so the paginator can append `page`/`per_page` without re-parsing.

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }
}

/// An HTTP request described as plain data.
///
/// `path` is the absolute URL without a query string; `query` holds the
/// parameters in the order they are sent.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Returns a copy of this request with one extra query parameter.
    pub fn with_query(&self, key: &str, value: impl ToString) -> HttpRequest {
        let mut request = self.clone();
        request.query.push((key.to_string(), value.to_string()));
        request
    }

    /// First query value for `key`, if any.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let response = HttpResponse {
            status: 200,
            headers: vec![("pages".to_string(), "3".to_string())],
            body: "[]".to_string(),
        };
        assert_eq!(response.header("Pages"), Some("3"));
        assert_eq!(response.header("Page"), None);
    }

    #[test]
    fn with_query_leaves_original_untouched() {
        let request = HttpRequest {
            method: HttpMethod::Get,
            path: "http://localhost/users.json".to_string(),
            query: vec![("state".to_string(), "active".to_string())],
            headers: Vec::new(),
            body: None,
        };
        let paged = request.with_query("page", 2);
        assert_eq!(request.query.len(), 1);
        assert_eq!(paged.query_value("state"), Some("active"));
        assert_eq!(paged.query_value("page"), Some("2"));
    }

    #[test]
    fn success_covers_2xx_only() {
        let mut response = HttpResponse {
            status: 201,
            headers: Vec::new(),
            body: String::new(),
        };
        assert!(response.is_success());
        response.status = 422;
        assert!(!response.is_success());
    }
}
