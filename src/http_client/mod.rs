//! Blocking client for the TSD HTTP API.
//!
//! [`HttpClient`] issues one request per call through a pooled
//! `ureq::Agent`. Responses are handed back as [`HttpResponse`] whatever
//! their status; only transport failures become errors. Use
//! [`HttpClient::process_response`] to decode a body and surface API errors.

mod client;
mod config;

#[cfg(test)]
mod tests;

pub use client::{HttpClient, HttpError, HttpResponse};
pub use config::{
    AGGREGATORS_PATH, AuthConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
    HttpClientConfig, PUT_PATH, QUERY_PATH, STATS_PATH, TSMETA_PATH, VERSION_PATH,
};
