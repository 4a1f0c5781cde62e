//! Ownership and health of the single socket a client talks through.
//!
//! The connection moves through three states:
//!
//! ```text
//! Disconnected --connect--> Unverified --probe ok--> Verified
//!      ^                        |                       |
//!      +------ probe/write failure or forced reconnect -+
//! ```
//!
//! Only a `Verified` connection younger than the trust window skips the
//! `version` probe.

use std::{
    io, thread,
    time::{Duration, Instant},
};

use log::{debug, error};

use crate::error::{ClientError, ConfigError};

use super::{
    backoff::RetryState,
    config::{ReconnectPolicy, SocketClientConfig},
    selector::{Endpoint, HostSelector},
    transport::{ActiveConnection, Resolver, TlsOptions, connect_endpoint},
};

/// Lightweight request used to check the socket is really alive.
pub const PROBE_REQUEST: &[u8] = b"version\n";
/// Bytes read back from the probe.
pub const PROBE_BUFFER_SIZE: usize = 4096;

pub(crate) enum ConnectionState {
    Disconnected,
    Unverified {
        conn: ActiveConnection,
        endpoint: Endpoint,
    },
    Verified {
        conn: ActiveConnection,
        endpoint: Endpoint,
        verified_at: Instant,
    },
}

impl ConnectionState {
    fn into_parts(self) -> Option<(ActiveConnection, Endpoint)> {
        match self {
            Self::Disconnected => None,
            Self::Unverified { conn, endpoint } | Self::Verified { conn, endpoint, .. } => {
                Some((conn, endpoint))
            }
        }
    }
}

/// Observable phase of the connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionPhase {
    Disconnected,
    Unverified,
    Verified,
}

/// Owns the active transport and decides when to replace it.
pub struct ConnectionManager {
    pub(crate) state: ConnectionState,
    pub(crate) selector: HostSelector,
    resolver: Box<dyn Resolver>,
    trust_window: Duration,
    reconnect_interval: Option<Duration>,
    pub(crate) last_reconnect: Instant,
    connect_timeout: Duration,
    io_timeout: Duration,
    tls: Option<TlsOptions>,
    reconnect: ReconnectPolicy,
    rng_seed: Option<u64>,
}

impl ConnectionManager {
    /// Fails when `config` lists no endpoints.
    pub fn new(
        config: &SocketClientConfig,
        resolver: Box<dyn Resolver>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            state: ConnectionState::Disconnected,
            selector: HostSelector::new(
                config.endpoints.clone(),
                config.exhaustion,
                config.rng_seed,
            )?,
            resolver,
            trust_window: config.trust_window,
            reconnect_interval: config.reconnect_interval,
            last_reconnect: Instant::now(),
            connect_timeout: config.connect_timeout,
            io_timeout: config.io_timeout,
            tls: config.tls.clone(),
            reconnect: config.reconnect.clone(),
            rng_seed: config.rng_seed,
        })
    }

    pub fn phase(&self) -> ConnectionPhase {
        match self.state {
            ConnectionState::Disconnected => ConnectionPhase::Disconnected,
            ConnectionState::Unverified { .. } => ConnectionPhase::Unverified,
            ConnectionState::Verified { .. } => ConnectionPhase::Verified,
        }
    }

    pub fn selector(&self) -> &HostSelector {
        &self.selector
    }

    /// Endpoint of the live connection, if there is one.
    pub fn endpoint(&self) -> Option<&Endpoint> {
        match &self.state {
            ConnectionState::Disconnected => None,
            ConnectionState::Unverified { endpoint, .. }
            | ConnectionState::Verified { endpoint, .. } => Some(endpoint),
        }
    }

    /// Check whether the connection can be written to.
    pub fn verify(&mut self) -> bool {
        self.verify_at(Instant::now())
    }

    pub(crate) fn verify_at(&mut self, now: Instant) -> bool {
        if let ConnectionState::Verified { verified_at, .. } = self.state
            && now.saturating_duration_since(verified_at) < self.trust_window
        {
            return true;
        }
        if matches!(self.state, ConnectionState::Disconnected) {
            return false;
        }

        if let Some(interval) = self.reconnect_interval
            && now.saturating_duration_since(self.last_reconnect) >= interval
        {
            debug!("Reconnect interval elapsed, closing connection");
            self.close();
            self.last_reconnect = now;
            return false;
        }

        debug!("Verifying our TSD connection is alive");
        let Some((mut conn, endpoint)) =
            std::mem::replace(&mut self.state, ConnectionState::Disconnected).into_parts()
        else {
            return false;
        };
        match probe(&mut conn) {
            Ok(()) => {
                self.state = ConnectionState::Verified {
                    conn,
                    endpoint,
                    verified_at: now,
                };
                true
            }
            Err(err) => {
                debug!("Connection probe to {endpoint} failed: {err}");
                conn.close();
                self.selector.blacklist_current();
                false
            }
        }
    }

    /// Block until a verified connection is available and return its endpoint.
    ///
    /// Loops over verify, pick, resolve and connect. A freshly opened socket
    /// is probed by the next iteration before it is handed out. The loop only
    /// ends early when the reconnect policy runs out or a lookup fails fatally.
    pub fn maintain(&mut self) -> Result<Endpoint, ClientError> {
        let mut retry = RetryState::new(self.reconnect.clone(), Instant::now(), self.rng_seed);
        loop {
            if self.verify()
                && let Some(endpoint) = self.endpoint()
            {
                return Ok(endpoint.clone());
            }
            if !retry.begin_attempt(Instant::now()) {
                return Err(ClientError::RetriesExhausted {
                    attempts: retry.attempts(),
                });
            }
            if let Some(delay) = retry.next_sleep() {
                debug!("Blocking {:.2} seconds before reconnecting", delay.as_secs_f64());
                thread::sleep(delay);
            }

            let endpoint = self.selector.pick().clone();
            let addrs = match self.resolver.resolve(&endpoint) {
                Ok(addrs) => addrs,
                Err(err) if err.transient => {
                    debug!("DNS resolution failure: {endpoint}: {}", err.source);
                    continue;
                }
                Err(err) => {
                    return Err(ClientError::FatalResolution {
                        endpoint,
                        source: err.source,
                    });
                }
            };

            match connect_endpoint(&endpoint, &addrs, self.connect_timeout, self.tls.as_ref()) {
                Some(conn) => {
                    if let Err(err) = conn.set_io_timeout(self.io_timeout) {
                        debug!("Failed to set socket timeouts on {endpoint}: {err}");
                    }
                    self.state = ConnectionState::Unverified { conn, endpoint };
                }
                None => {
                    error!("Failed to connect to {endpoint}");
                    self.selector.blacklist_current();
                }
            }
        }
    }

    /// Write `payload` in one go on the live connection.
    ///
    /// Any failure closes the connection and blacklists its endpoint.
    pub fn write_payload(&mut self, payload: &[u8]) -> io::Result<()> {
        let result = match &mut self.state {
            ConnectionState::Disconnected => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "no active connection",
            )),
            ConnectionState::Unverified { conn, .. } | ConnectionState::Verified { conn, .. } => {
                conn.write_all(payload).and_then(|()| conn.flush())
            }
        };
        if result.is_err() {
            self.close();
            self.selector.blacklist_current();
        }
        result
    }

    /// Drop the active transport, if any.
    pub fn close(&mut self) {
        if let Some((conn, _)) =
            std::mem::replace(&mut self.state, ConnectionState::Disconnected).into_parts()
        {
            conn.close();
        }
    }
}

fn probe(conn: &mut ActiveConnection) -> io::Result<()> {
    conn.write_all(PROBE_REQUEST)?;
    conn.flush()?;
    let mut buf = [0u8; PROBE_BUFFER_SIZE];
    match conn.read(&mut buf)? {
        0 => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed during probe",
        )),
        _ => Ok(()),
    }
}
