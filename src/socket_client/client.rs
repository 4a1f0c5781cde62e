//! Public client type exported by the crate.

use std::fmt;

use log::{debug, error, warn};
use serde_json::Value;

use crate::{
    error::{ClientError, ConfigError, Recovery},
    line::encode_batch,
    meter::Meter,
    rate_limited_warner::RateLimitedWarner,
};

use super::{
    builder::SocketClientBuilder,
    config::SocketClientConfig,
    connection::ConnectionManager,
    selector::Endpoint,
    transport::{Resolver, SystemResolver},
};

/// Buffers meters and ships them to the database over one socket.
///
/// Meters are queued until the queue grows past `send_queue_max_size` or the
/// caller commits, at which point the whole queue is written as a single
/// payload. Nothing runs in the background; every flush happens on the
/// caller's thread and may block while a connection is re-established.
pub struct SocketClient {
    queue: Vec<Meter>,
    connection: ConnectionManager,
    send_queue_max_size: usize,
    max_uncaught_errors: u32,
    uncaught_errors: u32,
    warner: RateLimitedWarner,
}

impl SocketClient {
    /// Construct a client for `endpoints` with default configuration.
    pub fn new(endpoints: impl IntoIterator<Item = Endpoint>) -> Result<Self, ConfigError> {
        SocketClientBuilder::new().with_endpoints(endpoints).build()
    }

    /// Construct a builder.
    pub fn builder() -> SocketClientBuilder {
        SocketClientBuilder::new()
    }

    /// Construct the client from a configuration object.
    ///
    /// Fails when the configuration lists no endpoints.
    pub fn with_config(config: SocketClientConfig) -> Result<Self, ConfigError> {
        Self::with_resolver(config, Box::new(SystemResolver))
    }

    /// Construct the client with a custom name resolver.
    pub fn with_resolver(
        config: SocketClientConfig,
        resolver: Box<dyn Resolver>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            queue: Vec::new(),
            connection: ConnectionManager::new(&config, resolver)?,
            send_queue_max_size: config.send_queue_max_size,
            max_uncaught_errors: config.max_uncaught_errors,
            uncaught_errors: 0,
            warner: RateLimitedWarner::new(config.warn_interval),
        })
    }

    /// Queue `meters` and flush when the queue is over capacity or `commit` is set.
    pub fn submit(
        &mut self,
        meters: impl IntoIterator<Item = Meter>,
        commit: bool,
    ) -> Result<(), ClientError> {
        self.queue.extend(meters);
        if self.queue.len() <= self.send_queue_max_size && !commit {
            return Ok(());
        }
        self.send_queue()
    }

    /// Validate a JSON record (or array of records) and submit it.
    ///
    /// Nothing is queued unless every record is valid.
    pub fn submit_json(&mut self, records: &Value, commit: bool) -> Result<(), ClientError> {
        let meters = Meter::from_json(records)?;
        self.submit(meters, commit)
    }

    /// Send everything queued, regardless of the queue size.
    pub fn flush(&mut self) -> Result<(), ClientError> {
        self.send_queue()
    }

    /// Meters waiting to be sent, oldest first.
    pub fn pending(&self) -> &[Meter] {
        &self.queue
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    #[cfg(test)]
    pub(super) fn connection_mut(&mut self) -> &mut ConnectionManager {
        &mut self.connection
    }

    /// Number of consecutive swallowed send failures.
    pub fn uncaught_errors(&self) -> u32 {
        self.uncaught_errors
    }

    /// Close the socket. Queued meters are kept.
    pub fn close(&mut self) {
        self.connection.close();
    }

    fn send_queue(&mut self) -> Result<(), ClientError> {
        if self.queue.is_empty() {
            return Ok(());
        }
        match self.try_send() {
            Ok(()) => {
                self.uncaught_errors = 0;
                Ok(())
            }
            Err(err) => self.recover(err),
        }
    }

    fn try_send(&mut self) -> Result<(), ClientError> {
        let endpoint = self.connection.maintain()?;
        let payload = encode_batch(&self.queue);
        self.connection
            .write_payload(&payload)
            .map_err(|source| ClientError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;
        debug!("Sent {} meters to {endpoint}", self.queue.len());
        self.queue.clear();
        Ok(())
    }

    fn recover(&mut self, err: ClientError) -> Result<(), ClientError> {
        match err.kind().recovery() {
            Recovery::RetryOtherEndpoint => {
                error!("Failed to send data: {err}");
                let pending = self.queue.len();
                self.warner.record_failure();
                self.warner.warn_if_due(|count| {
                    warn!("SocketClient had {count} failed flushes; {pending} meters still queued");
                });
                Ok(())
            }
            Recovery::RetryNextFlush => {
                self.uncaught_errors += 1;
                if self.uncaught_errors > self.max_uncaught_errors {
                    error!(
                        "Uncaught error while trying to send meters, going to raise. \
                         Max number {} of uncaught errors has been collected",
                        self.max_uncaught_errors
                    );
                    return Err(ClientError::UncaughtSend {
                        errors: self.uncaught_errors,
                        source: Box::new(err),
                    });
                }
                warn!("Uncaught error while trying to send meters, ignoring: {err}");
                Ok(())
            }
            Recovery::Propagate => Err(err),
        }
    }
}

impl Drop for SocketClient {
    fn drop(&mut self) {
        self.warner.flush(|count| {
            warn!("SocketClient had {count} failed flushes before shutdown");
        });
        if !self.queue.is_empty() {
            warn!(
                "SocketClient dropped with {} unsent meters",
                self.queue.len()
            );
        }
        self.close();
    }
}

impl fmt::Debug for SocketClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketClient")
            .field("pending", &self.queue.len())
            .field("send_queue_max_size", &self.send_queue_max_size)
            .field("phase", &self.connection.phase())
            .field("uncaught_errors", &self.uncaught_errors)
            .finish()
    }
}
