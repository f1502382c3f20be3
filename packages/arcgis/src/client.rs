//! HTTP client seam for outbound GIS requests.
//!
//! Resolvers only talk to [`GisClient`]. [`HttpGisClient`] sends real
//! requests with a bounded per-request timeout and retries once on
//! transient failures (timeouts, connection errors, HTTP 429 and 5xx).
//! Every request is a read-only `GET`, so the retry never duplicates a
//! side effect.

use std::time::Duration;

use async_trait::async_trait;

use crate::LookupError;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Environment variable overriding [`DEFAULT_TIMEOUT`], in seconds.
pub const TIMEOUT_ENV: &str = "SITE_LOOKUP_TIMEOUT_SECS";

/// Maximum length of the response body preview included in errors.
const BODY_PREVIEW_LEN: usize = 300;

/// Read-only access to GIS web services.
#[async_trait]
pub trait GisClient: Send + Sync {
    /// Sends `GET url?params` and parses the body as JSON.
    ///
    /// An `ArcGIS` `{"error": {...}}` body is reported as
    /// [`LookupError::SchemaMismatch`].
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] on transport failure, timeout, error
    /// status, or an unparseable body.
    async fn get_json(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value, LookupError>;

    /// Sends `GET url?params` and returns the body as text.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] on transport failure, timeout, or error
    /// status.
    async fn get_text(&self, url: &str, params: &[(&str, String)]) -> Result<String, LookupError>;
}

/// Settings for [`HttpGisClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Delay before each retry.
    pub retry_delay: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: 1,
            retry_delay: Duration::from_millis(500),
            user_agent: format!("site-lookup/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Defaults, with the timeout taken from `SITE_LOOKUP_TIMEOUT_SECS`
    /// when it is set to a positive integer.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = std::env::var(TIMEOUT_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|s| *s > 0)
        {
            config.timeout = Duration::from_secs(secs);
        }
        config
    }
}

/// [`GisClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpGisClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpGisClient {
    /// Builds a client with the given settings.
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the TLS backend cannot be initialized.
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, config })
    }

    /// Sends the request, retrying transient failures.
    async fn send(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<reqwest::Response, LookupError> {
        let max_retries = self.config.max_retries;
        let mut last_error: Option<LookupError> = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                log::warn!(
                    "  retry {attempt}/{max_retries} in {:?}...",
                    self.config.retry_delay
                );
                tokio::time::sleep(self.config.retry_delay).await;
            }

            log::debug!("GET {url}");
            match self.client.get(url).query(params).send().await {
                Err(e) => {
                    let err = network_error(url, &e);
                    if is_transient(&e) && attempt < max_retries {
                        log::warn!("  transient error: {e}");
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Ok(response) => {
                    let status = response.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS
                        || status.is_server_error()
                    {
                        let err = LookupError::Network {
                            url: url.to_string(),
                            message: format!("HTTP {status}"),
                            timed_out: false,
                        };
                        if attempt < max_retries {
                            log::warn!("  HTTP {status} from {url}");
                            last_error = Some(err);
                            continue;
                        }
                        return Err(err);
                    }

                    if status.is_client_error() {
                        return Err(client_error(url, status));
                    }

                    return Ok(response);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LookupError::Network {
            url: url.to_string(),
            message: "request failed after all retries".to_string(),
            timed_out: false,
        }))
    }
}

#[async_trait]
impl GisClient for HttpGisClient {
    async fn get_json(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value, LookupError> {
        let text = self.get_text(url, params).await?;
        parse_json(url, &text)
    }

    async fn get_text(&self, url: &str, params: &[(&str, String)]) -> Result<String, LookupError> {
        let response = self.send(url, params).await?;
        response.text().await.map_err(|e| network_error(url, &e))
    }
}

/// Parses a response body as JSON and rejects `ArcGIS` error payloads.
///
/// # Errors
///
/// Returns [`LookupError::SchemaMismatch`] if the body is not JSON or is
/// an `ArcGIS` error object.
pub fn parse_json(url: &str, text: &str) -> Result<serde_json::Value, LookupError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
        let preview: String = text.chars().take(BODY_PREVIEW_LEN).collect();
        LookupError::schema(url, format!("invalid JSON ({e}); body: {preview}"))
    })?;
    reject_service_error(url, &value)?;
    Ok(value)
}

/// `ArcGIS` reports many failures as HTTP 200 with an `error` object.
///
/// # Errors
///
/// Returns [`LookupError::SchemaMismatch`] carrying the service's code
/// and message when `value` has an `error` object.
pub fn reject_service_error(url: &str, value: &serde_json::Value) -> Result<(), LookupError> {
    let Some(error) = value.get("error").filter(|e| e.is_object()) else {
        return Ok(());
    };
    let code = error
        .get("code")
        .map_or_else(|| "unknown".to_string(), ToString::to_string);
    let message = error
        .get("message")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("unknown error");
    Err(LookupError::schema(
        url,
        format!("ArcGIS error {code}: {message}"),
    ))
}

/// A 4xx answer means the configured URL or query is wrong, not that the
/// parcel is missing; a missing parcel comes back as an empty result.
fn client_error(url: &str, status: reqwest::StatusCode) -> LookupError {
    let message = if status == reqwest::StatusCode::NOT_FOUND {
        format!("service endpoint not found (HTTP {status})")
    } else {
        format!("HTTP {status}")
    };
    LookupError::schema(url, message)
}

fn network_error(url: &str, e: &reqwest::Error) -> LookupError {
    LookupError::Network {
        url: url.to_string(),
        message: e.to_string(),
        timed_out: e.is_timeout(),
    }
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_body() {
        let value = parse_json("https://x", r#"{"features": []}"#).unwrap();
        assert!(value["features"].as_array().unwrap().is_empty());
    }

    #[test]
    fn rejects_html_body_as_schema_mismatch() {
        let err = parse_json("https://x", "<html>maintenance</html>").unwrap_err();
        assert!(matches!(err, LookupError::SchemaMismatch { .. }));
        assert!(err.to_string().contains("maintenance"));
    }

    #[test]
    fn rejects_arcgis_error_payload() {
        let err = parse_json(
            "https://x/query",
            r#"{"error": {"code": 400, "message": "Invalid field: PARCELID"}}"#,
        )
        .unwrap_err();
        match err {
            LookupError::SchemaMismatch { message, .. } => {
                assert_eq!(message, "ArcGIS error 400: Invalid field: PARCELID");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_endpoint_is_schema_mismatch() {
        let url = "https://egis.pinellas.gov/gis/rest/services/Moved/MapServer/0/query";
        let err = client_error(url, reqwest::StatusCode::NOT_FOUND);
        assert!(matches!(&err, LookupError::SchemaMismatch { url: u, .. } if u == url));
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("service endpoint not found"));

        let err = client_error(url, reqwest::StatusCode::FORBIDDEN);
        assert!(matches!(err, LookupError::SchemaMismatch { .. }));
    }

    #[test]
    fn default_timeout_is_bounded() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.max_retries, 1);
    }
}
