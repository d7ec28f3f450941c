//! In-memory transport for unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;

use serde_json::Value;

use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;

/// Replays queued responses in order and records every request it sees.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: RefCell<VecDeque<Result<HttpResponse, ApiError>>>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, status: u16, headers: &[(&str, &str)], body: Value) -> &Self {
        self.responses.borrow_mut().push_back(Ok(HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.to_string(),
        }));
        self
    }

    pub(crate) fn push_json(&self, status: u16, body: Value) -> &Self {
        self.push(status, &[], body)
    }

    /// Queue a page of records, optionally advertising a `Pages` header.
    pub(crate) fn push_page(&self, records: Vec<Value>, pages: Option<u32>) -> &Self {
        let pages = pages.map(|n| n.to_string());
        let headers: Vec<(&str, &str)> = pages.iter().map(|n| ("Pages", n.as_str())).collect();
        self.push(200, &headers, Value::Array(records))
    }

    pub(crate) fn push_error(&self, error: ApiError) -> &Self {
        self.responses.borrow_mut().push_back(Err(error));
        self
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.responses.borrow().len()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        self.requests.borrow_mut().push(request.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected request: {} {}", request.method.as_str(), request.path))
    }
}

/// `count` records shaped like `{"id": start + i, "name": "<prefix> <id>"}`.
pub(crate) fn named_records(prefix: &str, start: i64, count: usize) -> Vec<Value> {
    (0..count as i64)
        .map(|i| serde_json::json!({ "id": start + i, "name": format!("{prefix} {}", start + i) }))
        .collect()
}
