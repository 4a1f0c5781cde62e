//! Request execution and response handling for the HTTP API.

use std::io;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use log::debug;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use ureq::{Agent, AgentBuilder};

use crate::meter::Meter;

use super::config::{
    AGGREGATORS_PATH, AuthConfig, HttpClientConfig, PUT_PATH, QUERY_PATH, STATS_PATH,
    TSMETA_PATH, VERSION_PATH,
};

/// Characters escaped when a TSUID is placed in a query string.
const TSUID_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'/')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?');

/// Errors raised by [`HttpClient`].
#[derive(Debug, Error)]
pub enum HttpError {
    /// The request never produced a response.
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    /// The response body could not be read.
    #[error("failed to read response from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
    /// The TSD answered with something other than a successful JSON document.
    #[error("TSD returned an error (status {status}): {message}")]
    Api { status: u16, message: String },
}

/// Status and body of a completed request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Serialize)]
struct RetentionRequest<'a> {
    tsuid: &'a str,
    retention: u32,
}

/// Blocking client for the TSD REST endpoints.
pub struct HttpClient {
    config: HttpClientConfig,
    agent: Agent,
    base_url: String,
}

impl HttpClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::with_config(HttpClientConfig::new(host, port))
    }

    pub fn with_config(config: HttpClientConfig) -> Self {
        let agent = AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .timeout(config.request_timeout)
            .build();
        let base_url = config.base_url();
        Self {
            config,
            agent,
            base_url,
        }
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Registered metrics and their statistics.
    pub fn get_statistics(&self) -> Result<HttpResponse, HttpError> {
        self.get(STATS_PATH)
    }

    /// Store meters, one request per meter, in order.
    ///
    /// Stops at the first transport failure; error statuses are returned
    /// alongside the successful responses.
    pub fn put_meter(&self, meters: &[Meter]) -> Result<Vec<HttpResponse>, HttpError> {
        meters
            .iter()
            .map(|meter| {
                let body = serde_json::to_string(meter)?;
                self.post(PUT_PATH, &body)
            })
            .collect()
    }

    /// Set how many days of data points `tsuid` keeps; zero keeps them forever.
    pub fn define_retention(&self, tsuid: &str, days: u32) -> Result<HttpResponse, HttpError> {
        let body = serde_json::to_string(&RetentionRequest {
            tsuid,
            retention: days,
        })?;
        let path = format!(
            "{TSMETA_PATH}?tsuid={}",
            utf8_percent_encode(tsuid, TSUID_ENCODE_SET)
        );
        self.post(&path, &body)
    }

    /// Names of the available aggregation functions.
    pub fn get_aggregators(&self) -> Result<HttpResponse, HttpError> {
        self.get(AGGREGATORS_PATH)
    }

    pub fn get_version(&self) -> Result<HttpResponse, HttpError> {
        self.get(VERSION_PATH)
    }

    /// Run a query given as a raw query string, e.g. `start=1h-ago&m=sum:cpu`.
    pub fn get_query(&self, query: &str) -> Result<HttpResponse, HttpError> {
        self.get(&format!("{QUERY_PATH}?{query}"))
    }

    /// Decode a response body, turning TSD error documents into [`HttpError::Api`].
    pub fn process_response(&self, status: u16, body: &str) -> Result<Value, HttpError> {
        let value: Value = serde_json::from_str(body).map_err(|_| HttpError::Api {
            status,
            message: body.to_owned(),
        })?;
        let error = value
            .as_object()
            .and_then(|doc| doc.get("error").or_else(|| doc.get("errors")));
        if let Some(error) = error {
            return Err(HttpError::Api {
                status,
                message: api_error_message(error),
            });
        }
        Ok(value)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn get(&self, path: &str) -> Result<HttpResponse, HttpError> {
        let url = self.url(path);
        let request = self.agent.get(&url);
        self.execute(url, request, None)
    }

    fn post(&self, path: &str, body: &str) -> Result<HttpResponse, HttpError> {
        let url = self.url(path);
        let request = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json");
        self.execute(url, request, Some(body))
    }

    fn execute(
        &self,
        url: String,
        request: ureq::Request,
        body: Option<&str>,
    ) -> Result<HttpResponse, HttpError> {
        let request = self.apply_headers(self.apply_auth(request));
        let result = match body {
            Some(body) => request.send_string(body),
            None => request.call(),
        };
        let response = match result {
            Ok(response) | Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(err)) => {
                return Err(HttpError::Transport {
                    url,
                    message: err.to_string(),
                });
            }
        };
        let status = response.status();
        let body = response
            .into_string()
            .map_err(|source| HttpError::Body {
                url: url.clone(),
                source,
            })?;
        debug!("{url} answered {status}");
        Ok(HttpResponse { status, body })
    }

    fn apply_auth(&self, req: ureq::Request) -> ureq::Request {
        match &self.config.auth {
            AuthConfig::None => req,
            AuthConfig::Basic { username, password } => {
                let encoded = BASE64_STANDARD.encode(format!("{username}:{password}"));
                req.set("Authorization", &format!("Basic {encoded}"))
            }
            AuthConfig::Bearer { token } => req.set("Authorization", &format!("Bearer {token}")),
        }
    }

    fn apply_headers(&self, mut req: ureq::Request) -> ureq::Request {
        for (key, value) in &self.config.headers {
            req = req.set(key, value);
        }
        req
    }
}

/// TSD errors look like `{"error": {"code": 400, "message": "..."}}`.
fn api_error_message(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        Value::Object(doc) => doc
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_owned),
        other => other.to_string(),
    }
}
