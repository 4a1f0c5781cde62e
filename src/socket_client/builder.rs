//! Builder for [`SocketClient`](super::SocketClient).
//!
//! Exposes endpoint selection, trust and reconnect timings, queue limits,
//! TLS configuration and the reconnect retry policy.

use std::time::Duration;

use crate::error::ConfigError;

use super::{
    SocketClient,
    config::{ExhaustionPolicy, ReconnectPolicy, SocketClientConfig, WaitPolicy},
    selector::Endpoint,
    transport::{Resolver, TlsOptions},
};

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(ConfigError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

#[derive(Clone, Debug, Default)]
struct TlsConfig {
    domain: Option<String>,
    insecure: bool,
}

/// Builder for constructing [`SocketClient`] instances.
#[derive(Default)]
pub struct SocketClientBuilder {
    endpoints: Vec<Endpoint>,
    trust_window_ms: Option<u64>,
    reconnect_interval_ms: Option<u64>,
    send_queue_max_size: Option<usize>,
    max_uncaught_errors: Option<u32>,
    connect_timeout_ms: Option<u64>,
    io_timeout_ms: Option<u64>,
    max_attempts: Option<u32>,
    deadline_ms: Option<u64>,
    rng_seed: Option<u64>,
    wait: WaitPolicy,
    exhaustion: ExhaustionPolicy,
    tls: Option<TlsConfig>,
    resolver: Option<Box<dyn Resolver>>,
}

impl std::fmt::Debug for SocketClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketClientBuilder")
            .field("endpoints", &self.endpoints)
            .field("trust_window_ms", &self.trust_window_ms)
            .field("reconnect_interval_ms", &self.reconnect_interval_ms)
            .field("send_queue_max_size", &self.send_queue_max_size)
            .field("max_uncaught_errors", &self.max_uncaught_errors)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("io_timeout_ms", &self.io_timeout_ms)
            .field("max_attempts", &self.max_attempts)
            .field("deadline_ms", &self.deadline_ms)
            .field("rng_seed", &self.rng_seed)
            .field("wait", &self.wait)
            .field("exhaustion", &self.exhaustion)
            .field("tls", &self.tls)
            .field("resolver", &self.resolver.as_ref().map(|_| "<resolver>"))
            .finish()
    }
}

impl SocketClientBuilder {
    /// Create a new builder with no endpoints configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one endpoint to the rotation.
    pub fn with_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.endpoints.push(Endpoint::new(host, port));
        self
    }

    /// Append several endpoints to the rotation, keeping their order.
    pub fn with_endpoints(mut self, endpoints: impl IntoIterator<Item = Endpoint>) -> Self {
        self.endpoints.extend(endpoints);
        self
    }

    option_setter!(
        #[doc = "How long a probed connection is trusted without another probe."]
        with_trust_window_ms,
        trust_window_ms,
        u64
    );
    option_setter!(
        #[doc = "Force a fresh connection this often; zero disables it."]
        with_reconnect_interval_ms,
        reconnect_interval_ms,
        u64
    );
    option_setter!(with_send_queue_max_size, send_queue_max_size, usize);
    option_setter!(with_max_uncaught_errors, max_uncaught_errors, u32);
    option_setter!(with_connect_timeout_ms, connect_timeout_ms, u64);
    option_setter!(with_io_timeout_ms, io_timeout_ms, u64);
    option_setter!(
        #[doc = "Give up a single `maintain` call after this many connection attempts."]
        with_max_attempts,
        max_attempts,
        u32
    );
    option_setter!(
        #[doc = "Give up a single `maintain` call after this long."]
        with_deadline_ms,
        deadline_ms,
        u64
    );
    option_setter!(
        #[doc = "Seed endpoint shuffling and backoff jitter for reproducible runs."]
        with_rng_seed,
        rng_seed,
        u64
    );

    /// Sleep a random 60-360 s before each reconnect attempt when `enabled`.
    pub fn wait_retry(mut self, enabled: bool) -> Self {
        self.wait = if enabled {
            WaitPolicy::maintenance()
        } else {
            WaitPolicy::None
        };
        self
    }

    /// Set the sleep applied before each reconnect attempt.
    pub fn with_wait_policy(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    /// Choose what happens once every endpoint is blacklisted.
    pub fn with_exhaustion_policy(mut self, exhaustion: ExhaustionPolicy) -> Self {
        self.exhaustion = exhaustion;
        self
    }

    /// Configure TLS using the provided domain and validation policy.
    pub fn with_tls(mut self, domain: Option<String>, insecure: bool) -> Self {
        self.tls = Some(TlsConfig { domain, insecure });
        self
    }

    /// Resolve endpoint names with `resolver` instead of the system resolver.
    pub fn with_resolver(mut self, resolver: Box<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_endpoints()?;
        self.validate_limits()?;
        self.validate_timeouts()?;
        self.validate_wait()?;
        Ok(())
    }

    fn validate_endpoints(&self) -> Result<(), ConfigError> {
        if self.endpoints.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "socket client requires at least one endpoint".into(),
            ));
        }
        if let Some(bad) = self.endpoints.iter().find(|e| e.host.trim().is_empty()) {
            return Err(ConfigError::InvalidConfig(format!(
                "endpoint {bad} has an empty host"
            )));
        }
        Ok(())
    }

    fn validate_limits(&self) -> Result<(), ConfigError> {
        if let Some(attempts) = self.max_attempts {
            ensure_positive!(attempts, "max_attempts")?;
        }
        Ok(())
    }

    fn validate_timeouts(&self) -> Result<(), ConfigError> {
        if let Some(timeout) = self.connect_timeout_ms {
            ensure_positive!(timeout, "connect_timeout_ms")?;
        }
        if let Some(timeout) = self.io_timeout_ms {
            ensure_positive!(timeout, "io_timeout_ms")?;
        }
        if let Some(deadline) = self.deadline_ms {
            ensure_positive!(deadline, "deadline_ms")?;
        }
        Ok(())
    }

    fn validate_wait(&self) -> Result<(), ConfigError> {
        match self.wait {
            WaitPolicy::Uniform { min, max } if min > max => Err(ConfigError::InvalidConfig(
                "wait minimum must not exceed its maximum".into(),
            )),
            WaitPolicy::Exponential { base, cap } if base > cap => Err(
                ConfigError::InvalidConfig("backoff base must not exceed its cap".into()),
            ),
            _ => Ok(()),
        }
    }

    /// Validate the settings and produce a configuration object.
    pub fn build_config(&self) -> Result<SocketClientConfig, ConfigError> {
        self.validate()?;
        let mut config = SocketClientConfig {
            endpoints: self.endpoints.clone(),
            ..SocketClientConfig::default()
        };
        self.apply_optional_fields(&mut config);
        config.reconnect = ReconnectPolicy {
            wait: self.wait.clone(),
            max_attempts: self.max_attempts,
            deadline: self.deadline_ms.map(Duration::from_millis),
        };
        config.exhaustion = self.exhaustion;
        config.tls = self.tls.as_ref().map(|tls| TlsOptions {
            domain: tls.domain.clone().filter(|d| !d.trim().is_empty()),
            insecure_skip_verify: tls.insecure,
        });
        Ok(config)
    }

    fn apply_optional_fields(&self, config: &mut SocketClientConfig) {
        if let Some(window) = self.trust_window_ms {
            config.trust_window = Duration::from_millis(window);
        }
        if let Some(interval) = self.reconnect_interval_ms {
            config.reconnect_interval = (interval > 0).then(|| Duration::from_millis(interval));
        }
        if let Some(size) = self.send_queue_max_size {
            config.send_queue_max_size = size;
        }
        if let Some(errors) = self.max_uncaught_errors {
            config.max_uncaught_errors = errors;
        }
        if let Some(timeout) = self.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(timeout);
        }
        if let Some(timeout) = self.io_timeout_ms {
            config.io_timeout = Duration::from_millis(timeout);
        }
        config.rng_seed = self.rng_seed;
    }

    /// Validate the settings and construct the client.
    pub fn build(self) -> Result<SocketClient, ConfigError> {
        let config = self.build_config()?;
        match self.resolver {
            Some(resolver) => SocketClient::with_resolver(config, resolver),
            None => SocketClient::with_config(config),
        }
    }
}
