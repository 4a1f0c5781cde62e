//! Socket-based client implementation.
//!
//! This module defines [`SocketClient`], which queues [`Meter`](crate::Meter)
//! values and writes them to a TSD as `put` lines over one persistent TCP
//! connection. The connection manager probes the socket with `version`,
//! rotates through the configured endpoints with a transient blacklist, and
//! reconnects under a configurable retry policy.

mod backoff;
mod builder;
mod client;
mod config;
mod connection;
mod selector;
mod shared;
mod transport;


pub use builder::SocketClientBuilder;
pub use client::SocketClient;
pub use config::{
    DEFAULT_PORT, ExhaustionPolicy, ReconnectPolicy, SocketClientConfig, WaitPolicy,
};
pub use connection::{ConnectionManager, ConnectionPhase};
pub use selector::{Endpoint, HostSelector};
pub use shared::SharedSocketClient;
pub use transport::{ResolveError, Resolver, SystemResolver, TlsOptions, classify_lookup_error};
