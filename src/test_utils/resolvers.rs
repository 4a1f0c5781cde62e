//! Resolvers that let tests observe or script name lookups.

use std::{
    collections::HashMap,
    io,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::socket_client::{Endpoint, ResolveError, Resolver, SystemResolver};

/// System resolver that counts how often it was asked.
#[derive(Clone, Default)]
pub struct CountingResolver {
    calls: Arc<AtomicUsize>,
}

impl CountingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Resolver for CountingResolver {
    fn resolve(&self, endpoint: &Endpoint) -> Result<Vec<SocketAddr>, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        SystemResolver.resolve(endpoint)
    }
}

/// Resolver failing on chosen hosts and deferring to the system otherwise.
#[derive(Clone, Default)]
pub struct ScriptedResolver {
    failures: HashMap<String, bool>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make lookups of `host` fail with a retryable error.
    pub fn transient(mut self, host: &str) -> Self {
        self.failures.insert(host.to_owned(), true);
        self
    }

    /// Make lookups of `host` fail with a permanent error.
    pub fn fatal(mut self, host: &str) -> Self {
        self.failures.insert(host.to_owned(), false);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Resolver for ScriptedResolver {
    fn resolve(&self, endpoint: &Endpoint) -> Result<Vec<SocketAddr>, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failures.get(&endpoint.host) {
            Some(true) => Err(ResolveError::transient(io::Error::other(
                "Temporary failure in name resolution",
            ))),
            Some(false) => Err(ResolveError::fatal(io::Error::other(
                "ai_family not supported",
            ))),
            None => SystemResolver.resolve(endpoint),
        }
    }
}
