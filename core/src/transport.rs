//! Blocking execution of `HttpRequest` values.
//!
//! # Design
//! `Transport` is the single seam between the deterministic core and the
//! network. Every status code, success or not, comes back as an
//! `HttpResponse`; only failures to complete the round-trip become
//! `ApiError::Transport`. Status interpretation stays with the caller.

use log::trace;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes one request and returns the response as plain data.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        (**self).execute(request)
    }
}

/// `Transport` backed by a blocking `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl Default for UreqTransport {
    fn default() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a caller-configured agent (timeouts, proxies, TLS).
    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        trace!("{} {}", request.method.as_str(), request.path);
        let url = request.path.as_str();
        let result = match (request.method, request.body.as_deref()) {
            (HttpMethod::Get, _) => decorate(self.agent.get(url), request).call(),
            (HttpMethod::Post, Some(body)) => {
                decorate(self.agent.post(url), request).send(body.as_bytes())
            }
            (HttpMethod::Post, None) => decorate(self.agent.post(url), request).send_empty(),
            (HttpMethod::Put, Some(body)) => {
                decorate(self.agent.put(url), request).send(body.as_bytes())
            }
            (HttpMethod::Put, None) => decorate(self.agent.put(url), request).send_empty(),
        };

        let mut response = match result {
            Ok(response) => response,
            // Agents built without `http_status_as_error(false)` report statuses as errors.
            Err(ureq::Error::StatusCode(status)) => {
                return Ok(HttpResponse {
                    status,
                    headers: Vec::new(),
                    body: String::new(),
                })
            }
            Err(e) => return Err(ApiError::Transport(e.to_string())),
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn decorate<B>(
    mut builder: ureq::RequestBuilder<B>,
    request: &HttpRequest,
) -> ureq::RequestBuilder<B> {
    for (key, value) in &request.query {
        builder = builder.query(key, value);
    }
    for (key, value) in &request.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    builder
}
