//! Endpoint rotation with a transient blacklist.

use std::{collections::HashSet, fmt, str::FromStr};

use log::info;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use crate::error::ConfigError;

use super::config::{DEFAULT_PORT, ExhaustionPolicy};

/// One server address of the cluster.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Parses `host:port`, or a bare host using the default TSD port.
impl FromStr for Endpoint {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let bare_bracketed = raw.starts_with('[') && raw.ends_with(']');
        let (host, port) = match raw.rsplit_once(':').filter(|_| !bare_bracketed) {
            Some((host, port)) => {
                let port = port.parse().map_err(|_| {
                    ConfigError::InvalidConfig(format!("invalid port in endpoint {raw:?}"))
                })?;
                (host, port)
            }
            None => (raw, DEFAULT_PORT),
        };
        let (host, bracketed) = match host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
            Some(inner) => (inner, true),
            None => (host, false),
        };
        if !bracketed && host.contains(':') {
            return Err(ConfigError::InvalidConfig(format!(
                "IPv6 endpoint {raw:?} must be written as [addr]:port"
            )));
        }
        if host.is_empty() {
            return Err(ConfigError::InvalidConfig(format!(
                "endpoint {raw:?} has an empty host"
            )));
        }
        Ok(Self::new(host, port))
    }
}

/// Chooses which endpoint the next connection attempt targets.
pub struct HostSelector {
    endpoints: Vec<Endpoint>,
    cursor: Option<usize>,
    blacklist: HashSet<Endpoint>,
    exhaustion: ExhaustionPolicy,
    rng: StdRng,
}

impl HostSelector {
    /// Create a selector over `endpoints`, which must not be empty.
    pub fn new(
        endpoints: Vec<Endpoint>,
        exhaustion: ExhaustionPolicy,
        seed: Option<u64>,
    ) -> Result<Self, ConfigError> {
        if endpoints.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "socket client requires at least one endpoint".into(),
            ));
        }
        Ok(Self {
            endpoints,
            cursor: None,
            blacklist: HashSet::new(),
            exhaustion,
            rng: seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64),
        })
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// The endpoint chosen by the last [`pick`](Self::pick).
    pub fn current(&self) -> Option<&Endpoint> {
        self.cursor.map(|idx| &self.endpoints[idx])
    }

    pub fn is_blacklisted(&self, endpoint: &Endpoint) -> bool {
        self.blacklist.contains(endpoint)
    }

    pub fn blacklisted_len(&self) -> usize {
        self.blacklist.len()
    }

    /// Advance to the next endpoint that is not blacklisted.
    ///
    /// The scan starts after the cursor and wraps once around the list. When
    /// every endpoint is blacklisted the blacklist is cleared and the first
    /// endpoint (after an optional shuffle) is chosen.
    pub fn pick(&mut self) -> &Endpoint {
        let len = self.endpoints.len();
        let start = self.cursor.map_or(0, |idx| idx + 1);
        let found = (0..len)
            .map(|offset| (start + offset) % len)
            .find(|idx| !self.blacklist.contains(&self.endpoints[*idx]));
        let idx = match found {
            Some(idx) => idx,
            None => {
                info!("No more healthy endpoints, retrying previously blacklisted ones");
                if self.exhaustion == ExhaustionPolicy::ShuffleAndClear {
                    self.endpoints.shuffle(&mut self.rng);
                }
                self.blacklist.clear();
                0
            }
        };
        self.cursor = Some(idx);
        let endpoint = &self.endpoints[idx];
        info!("Selected connection: {endpoint}");
        endpoint
    }

    /// Mark the current endpoint as unusable until the next exhaustion reset.
    pub fn blacklist_current(&mut self) {
        let Some(endpoint) = self.current().cloned() else {
            return;
        };
        info!("Blacklisting {endpoint} for a while");
        self.blacklist.insert(endpoint);
    }
}
