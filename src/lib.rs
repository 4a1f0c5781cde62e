//! Client for shipping time-series data points to an OpenTSDB cluster.
//!
//! [`SocketClient`] batches [`Meter`]s and writes them as telnet-style `put`
//! lines over a single persistent connection, failing over between
//! endpoints and blacklisting those that stop answering. The optional
//! [`http_client`] module wraps the REST API for statistics, queries and
//! metadata.

mod error;
mod line;
mod meter;
mod rate_limited_warner;

pub mod file_config;
#[cfg(feature = "http")]
pub mod http_client;
pub mod socket_client;
#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use error::{
    ClientError, ConfigError, EXPECTED_METER_SHAPE, FailureKind, FormatError, Recovery,
};
pub use file_config::{from_ini_str, load_ini};
#[cfg(feature = "http")]
pub use http_client::{HttpClient, HttpClientConfig, HttpError, HttpResponse};
pub use line::{ParsedLine, encode_batch, encode_line, encode_put, parse_line};
pub use meter::{Meter, MeterValue};
pub use socket_client::{
    ConnectionPhase, Endpoint, ExhaustionPolicy, ReconnectPolicy, SharedSocketClient,
    SocketClient, SocketClientBuilder, SocketClientConfig, WaitPolicy,
};
