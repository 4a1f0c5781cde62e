//! Transport primitives for the socket client.

use std::{
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use log::{debug, warn};
use native_tls::{TlsConnector, TlsStream};

use crate::error::FailureKind;

use super::selector::Endpoint;

/// TLS connection options applied to every endpoint.
#[derive(Clone, Debug)]
pub struct TlsOptions {
    /// Domain presented during the handshake; the endpoint host when unset.
    pub domain: Option<String>,
    /// Skip certificate validation when true (intended for tests).
    pub insecure_skip_verify: bool,
}

impl TlsOptions {
    fn connector(&self) -> io::Result<TlsConnector> {
        let mut builder = TlsConnector::builder();
        if self.insecure_skip_verify {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        builder.build().map_err(io::Error::other)
    }
}

/// Failed name lookup, classified as retryable or not.
#[derive(Debug)]
pub struct ResolveError {
    pub transient: bool,
    pub source: io::Error,
}

impl ResolveError {
    pub fn transient(source: io::Error) -> Self {
        Self {
            transient: true,
            source,
        }
    }

    pub fn fatal(source: io::Error) -> Self {
        Self {
            transient: false,
            source,
        }
    }

    pub fn kind(&self) -> FailureKind {
        if self.transient {
            FailureKind::TransientResolution
        } else {
            FailureKind::FatalResolution
        }
    }
}

/// Turns an endpoint into socket addresses.
pub trait Resolver: Send {
    fn resolve(&self, endpoint: &Endpoint) -> Result<Vec<SocketAddr>, ResolveError>;
}

/// Resolver backed by the operating system's `getaddrinfo`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn resolve(&self, endpoint: &Endpoint) -> Result<Vec<SocketAddr>, ResolveError> {
        let addrs: Vec<SocketAddr> = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()
            .map_err(classify_lookup_error)?
            .collect();
        if addrs.is_empty() {
            return Err(ResolveError::transient(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses for {endpoint}"),
            )));
        }
        Ok(addrs)
    }
}

/// Messages produced by `getaddrinfo` for EAI_AGAIN, EAI_NONAME and
/// EAI_NODATA across glibc, musl, macOS and Windows.
const TRANSIENT_LOOKUP_MESSAGES: &[&str] = &[
    "temporary failure in name resolution",
    "try again",
    "name or service not known",
    "nodename nor servname provided",
    "name does not resolve",
    "no address associated with hostname",
    "no such host is known",
    "non-authoritative host not found",
];

/// Classify a lookup failure reported by the standard library.
///
/// The standard library flattens `getaddrinfo` codes into message text, so the
/// message is the only signal left.
pub fn classify_lookup_error(err: io::Error) -> ResolveError {
    let message = err.to_string().to_ascii_lowercase();
    if err.kind() == io::ErrorKind::WouldBlock
        || TRANSIENT_LOOKUP_MESSAGES
            .iter()
            .any(|needle| message.contains(needle))
    {
        ResolveError::transient(err)
    } else {
        ResolveError::fatal(err)
    }
}

/// Active socket connection state.
pub enum ActiveConnection {
    PlainTcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl ActiveConnection {
    fn tcp(&self) -> &TcpStream {
        match self {
            ActiveConnection::PlainTcp(stream) => stream,
            ActiveConnection::Tls(stream) => stream.get_ref(),
        }
    }

    /// Apply `timeout` to both reads and writes.
    pub fn set_io_timeout(&self, timeout: Duration) -> io::Result<()> {
        let stream = self.tcp();
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))
    }

    /// Write a full buffer to the socket.
    pub fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            ActiveConnection::PlainTcp(stream) => stream.write_all(buf),
            ActiveConnection::Tls(stream) => stream.write_all(buf),
        }
    }

    /// Read whatever the peer has sent, up to `buf.len()` bytes.
    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ActiveConnection::PlainTcp(stream) => stream.read(buf),
            ActiveConnection::Tls(stream) => stream.read(buf),
        }
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        match self {
            ActiveConnection::PlainTcp(stream) => stream.flush(),
            ActiveConnection::Tls(stream) => stream.flush(),
        }
    }

    /// Close both directions, ignoring errors from an already dead socket.
    pub fn close(self) {
        let result = match self {
            ActiveConnection::PlainTcp(stream) => stream.shutdown(Shutdown::Both),
            ActiveConnection::Tls(mut stream) => stream
                .shutdown()
                .and_then(|()| stream.get_ref().shutdown(Shutdown::Both)),
        };
        if let Err(err) = result {
            debug!("Ignoring error while closing connection: {err}");
        }
    }
}

/// Try every resolved address of `endpoint` in turn.
///
/// Returns `None` when none of them accepted a connection; each failure is
/// logged.
pub fn connect_endpoint(
    endpoint: &Endpoint,
    addrs: &[SocketAddr],
    connect_timeout: Duration,
    tls: Option<&TlsOptions>,
) -> Option<ActiveConnection> {
    for addr in addrs {
        match connect_addr(endpoint, addr, connect_timeout, tls) {
            Ok(conn) => {
                debug!("Connection to {addr} was successful");
                return Some(conn);
            }
            Err(err) => warn!("Connection attempt failed to {endpoint} ({addr}): {err}"),
        }
    }
    None
}

fn connect_addr(
    endpoint: &Endpoint,
    addr: &SocketAddr,
    connect_timeout: Duration,
    tls: Option<&TlsOptions>,
) -> io::Result<ActiveConnection> {
    let stream = TcpStream::connect_timeout(addr, connect_timeout)?;
    stream.set_nonblocking(false)?;
    let Some(tls) = tls else {
        return Ok(ActiveConnection::PlainTcp(stream));
    };
    let connector = tls.connector()?;
    stream.set_read_timeout(Some(connect_timeout))?;
    stream.set_write_timeout(Some(connect_timeout))?;
    let domain = tls.domain.as_deref().unwrap_or(&endpoint.host);
    let stream = connector
        .connect(domain, stream)
        .map_err(io::Error::other)?;
    Ok(ActiveConnection::Tls(Box::new(stream)))
}
