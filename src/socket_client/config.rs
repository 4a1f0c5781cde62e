//! Configuration structures consumed by the socket client lifecycle.
//!
//! [`SocketClientBuilder`](super::SocketClientBuilder) constructs these values
//! before handing them to [`SocketClient`](super::SocketClient).

use std::time::Duration;

use super::{selector::Endpoint, transport::TlsOptions};

/// Default window after a successful probe during which the connection is trusted.
pub const DEFAULT_TRUST_WINDOW: Duration = Duration::from_secs(60);
/// Default maximum number of queued meters before a flush is forced.
pub const DEFAULT_SEND_QUEUE_MAX_SIZE: usize = 1000;
/// Default number of swallowed send failures before they are surfaced.
pub const DEFAULT_MAX_UNCAUGHT_ERRORS: u32 = 100;
/// Default timeout applied when establishing sockets.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
/// Default read/write timeout applied to established sockets.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(15);
/// Lower bound of the uniform wait used by `wait_retry`.
pub const DEFAULT_WAIT_RETRY_MIN: Duration = Duration::from_secs(60);
/// Upper bound of the uniform wait used by `wait_retry`.
pub const DEFAULT_WAIT_RETRY_MAX: Duration = Duration::from_secs(360);
/// Default port of the telnet-style TSD interface.
pub const DEFAULT_PORT: u16 = 4242;
/// Default interval between rate-limited warnings about failed flushes.
pub const DEFAULT_WARN_INTERVAL: Duration = Duration::from_secs(5);

/// Configuration object describing how to construct a [`SocketClient`](super::SocketClient).
#[derive(Clone, Debug)]
pub struct SocketClientConfig {
    pub endpoints: Vec<Endpoint>,
    pub trust_window: Duration,
    /// Forced reconnect period; `None` keeps connections until they fail.
    pub reconnect_interval: Option<Duration>,
    pub send_queue_max_size: usize,
    pub max_uncaught_errors: u32,
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
    pub tls: Option<TlsOptions>,
    pub reconnect: ReconnectPolicy,
    pub exhaustion: ExhaustionPolicy,
    /// Seed for endpoint shuffling; entropy when unset.
    pub rng_seed: Option<u64>,
    pub warn_interval: Duration,
}

impl Default for SocketClientConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![Endpoint::new("localhost", DEFAULT_PORT)],
            trust_window: DEFAULT_TRUST_WINDOW,
            reconnect_interval: None,
            send_queue_max_size: DEFAULT_SEND_QUEUE_MAX_SIZE,
            max_uncaught_errors: DEFAULT_MAX_UNCAUGHT_ERRORS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            tls: None,
            reconnect: ReconnectPolicy::default(),
            exhaustion: ExhaustionPolicy::default(),
            rng_seed: None,
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }
}

/// Sleep applied before each reconnect attempt.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Reconnect immediately.
    #[default]
    None,
    /// Sleep a uniformly random duration within `[min, max]`.
    Uniform { min: Duration, max: Duration },
    /// Jittered exponential backoff starting at `base` and doubling up to `cap`.
    Exponential { base: Duration, cap: Duration },
}

impl WaitPolicy {
    /// The long randomised pause used when the database may be under maintenance.
    pub fn maintenance() -> Self {
        Self::Uniform {
            min: DEFAULT_WAIT_RETRY_MIN,
            max: DEFAULT_WAIT_RETRY_MAX,
        }
    }
}

/// Bounds on a single `maintain` call.
///
/// Both limits default to unset: the client keeps retrying until a
/// connection comes up.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub wait: WaitPolicy,
    pub max_attempts: Option<u32>,
    pub deadline: Option<Duration>,
}

/// What the host selector does once every endpoint is blacklisted.
///
/// Both variants clear the blacklist, so a host that is still down may be
/// picked again straight away.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExhaustionPolicy {
    /// Shuffle the endpoint order, then start from the first one.
    #[default]
    ShuffleAndClear,
    /// Keep the configured order and start from the first one.
    ClearInOrder,
}
