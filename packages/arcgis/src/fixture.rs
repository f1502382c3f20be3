//! In-process [`GisClient`] serving canned responses.
//!
//! Routes are keyed by exact URL (query parameters are ignored). A route
//! may hold one-shot responses, consumed in order, and a sticky response
//! served once those run out. Every request is recorded so tests can
//! assert how many calls a resolver made.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::client::{parse_json, reject_service_error};
use crate::{GisClient, LookupError};

/// A canned response.
#[derive(Debug, Clone)]
pub enum FixtureResponse {
    /// A JSON body.
    Json(Value),
    /// A raw text body (HTML pages, malformed JSON).
    Text(String),
    /// The request times out.
    Timeout,
    /// The connection is refused.
    ConnectionRefused,
}

enum Body {
    Json(Value),
    Text(String),
}

#[derive(Debug, Default)]
struct Route {
    once: VecDeque<FixtureResponse>,
    sticky: Option<FixtureResponse>,
}

/// Fixture-backed [`GisClient`].
#[derive(Debug, Default)]
pub struct FixtureClient {
    routes: Mutex<BTreeMap<String, Route>>,
    requests: Mutex<Vec<String>>,
}

impl FixtureClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `response` for every request to `url`.
    #[must_use]
    pub fn route(self, url: &str, response: FixtureResponse) -> Self {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(url.to_string())
            .or_default()
            .sticky = Some(response);
        self
    }

    /// Serves `response` for the next request to `url` only.
    #[must_use]
    pub fn route_once(self, url: &str, response: FixtureResponse) -> Self {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(url.to_string())
            .or_default()
            .once
            .push_back(response);
        self
    }

    /// Shorthand for a sticky JSON route.
    #[must_use]
    pub fn json(self, url: &str, body: Value) -> Self {
        self.route(url, FixtureResponse::Json(body))
    }

    /// Every requested URL, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests made to `url`.
    #[must_use]
    pub fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|u| *u == url)
            .count()
    }

    fn respond(&self, url: &str) -> Result<Body, LookupError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());

        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        let response = routes
            .get_mut(url)
            .and_then(|r| r.once.pop_front().or_else(|| r.sticky.clone()));

        match response {
            Some(FixtureResponse::Timeout) => Err(LookupError::Network {
                url: url.to_string(),
                message: "operation timed out".to_string(),
                timed_out: true,
            }),
            Some(FixtureResponse::ConnectionRefused) | None => Err(LookupError::Network {
                url: url.to_string(),
                message: "connection refused".to_string(),
                timed_out: false,
            }),
            Some(FixtureResponse::Json(body)) => Ok(Body::Json(body)),
            Some(FixtureResponse::Text(text)) => Ok(Body::Text(text)),
        }
    }
}

#[async_trait]
impl GisClient for FixtureClient {
    async fn get_json(
        &self,
        url: &str,
        _params: &[(&str, String)],
    ) -> Result<Value, LookupError> {
        match self.respond(url)? {
            Body::Json(body) => {
                reject_service_error(url, &body)?;
                Ok(body)
            }
            Body::Text(text) => parse_json(url, &text),
        }
    }

    async fn get_text(&self, url: &str, _params: &[(&str, String)]) -> Result<String, LookupError> {
        match self.respond(url)? {
            Body::Json(body) => Ok(body.to_string()),
            Body::Text(text) => Ok(text),
        }
    }
}
