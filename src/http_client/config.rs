//! Configuration consumed by [`HttpClient`](super::HttpClient).

use std::{collections::HashMap, time::Duration};

use crate::socket_client::DEFAULT_PORT;

/// Default timeout for establishing connections.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default timeout for a whole request, body included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const STATS_PATH: &str = "/api/stats";
pub const PUT_PATH: &str = "/api/put?details";
pub const TSMETA_PATH: &str = "/api/uid/tsmeta";
pub const AGGREGATORS_PATH: &str = "/api/aggregators";
pub const VERSION_PATH: &str = "/api/version";
pub const QUERY_PATH: &str = "/api/query";

/// Authentication attached to every request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AuthConfig {
    #[default]
    None,
    /// HTTP Basic authentication with username and password.
    Basic { username: String, password: String },
    /// Bearer token authentication.
    Bearer { token: String },
}

/// Where and how the HTTP client talks to a TSD.
#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    pub host: String,
    pub port: u16,
    pub auth: AuthConfig,
    /// Extra headers sent with every request.
    pub headers: HashMap<String, String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl HttpClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// `http://host:port` with IPv6 literals bracketed.
    pub fn base_url(&self) -> String {
        if self.host.contains(':') {
            format!("http://[{}]:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_PORT,
            auth: AuthConfig::default(),
            headers: HashMap::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}
