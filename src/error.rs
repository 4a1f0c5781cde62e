//! Error types shared by the socket and HTTP clients.
//!
//! Send failures are modelled as a closed set of [`FailureKind`]s, each
//! carrying the [`Recovery`] the batcher applies when it meets one.

use std::io;

use thiserror::Error;

use crate::socket_client::Endpoint;

/// Shape every dynamic meter record must have.
pub const EXPECTED_METER_SHAPE: &str =
    "{'metric': <meter_name>, 'timestamp': <ts>, 'value': <value>, 'tags': <at least one pair>}";

/// A meter does not match the four-field schema accepted by the database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid meter format: got {actual}, expected {expected}")]
pub struct FormatError {
    /// Rendering of the offending record or field.
    pub actual: String,
    /// Description of what was required instead.
    pub expected: String,
}

impl FormatError {
    pub(crate) fn new(actual: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            actual: actual.into(),
            expected: expected.into(),
        }
    }

    pub(crate) fn shape(actual: impl Into<String>) -> Self {
        Self::new(actual, EXPECTED_METER_SHAPE)
    }
}

/// What the batcher does after a failure of a given kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Drop the endpoint for now and try the next one; the queue is kept.
    RetryOtherEndpoint,
    /// Keep the queue and try again on the next flush, counting the failure
    /// against the uncaught-error budget.
    RetryNextFlush,
    /// Surface the error to the caller.
    Propagate,
}

/// Closed classification of everything that can go wrong while submitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The record failed schema validation.
    Format,
    /// Name lookup failed with a retryable code.
    ///
    /// Only reported through [`ResolveError::kind`]. `maintain` retries these
    /// against the next endpoint itself, so `ClientError::kind` never
    /// returns it.
    ///
    /// [`ResolveError::kind`]: crate::socket_client::ResolveError::kind
    TransientResolution,
    /// Name lookup failed permanently.
    FatalResolution,
    /// Connect, probe or write failed on the socket.
    Transport,
    /// The reconnect policy ran out of attempts or time.
    RetriesExhausted,
    /// The uncaught-error budget was exceeded.
    BudgetExceeded,
}

impl FailureKind {
    /// Recovery action applied for this kind of failure.
    pub fn recovery(self) -> Recovery {
        match self {
            Self::TransientResolution | Self::Transport => Recovery::RetryOtherEndpoint,
            Self::RetriesExhausted => Recovery::RetryNextFlush,
            Self::Format | Self::FatalResolution | Self::BudgetExceeded => Recovery::Propagate,
        }
    }
}

/// Errors surfaced by [`SocketClient`](crate::SocketClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// A submitted record was malformed.
    #[error(transparent)]
    Format(#[from] FormatError),
    /// Name resolution failed with a non-retryable error.
    #[error("failed to resolve {endpoint}: {source}")]
    FatalResolution {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },
    /// The socket failed while writing a batch.
    #[error("transport failure talking to {endpoint}: {source}")]
    Transport {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },
    /// The reconnect policy gave up.
    #[error("no usable connection after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
    /// Too many send failures were swallowed in a row.
    #[error("giving up after {errors} uncaught send errors: {source}")]
    UncaughtSend {
        errors: u32,
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    /// Classify this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Format(_) => FailureKind::Format,
            Self::FatalResolution { .. } => FailureKind::FatalResolution,
            Self::Transport { .. } => FailureKind::Transport,
            Self::RetriesExhausted { .. } => FailureKind::RetriesExhausted,
            Self::UncaughtSend { .. } => FailureKind::BudgetExceeded,
        }
    }
}

/// Errors raised while building or loading a client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid user supplied configuration.
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
    /// The configuration file could not be read.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The configuration file is not valid INI.
    #[error("{path} is invalid: {message}")]
    Parse { path: String, message: String },
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(FailureKind::Format, Recovery::Propagate)]
    #[case(FailureKind::TransientResolution, Recovery::RetryOtherEndpoint)]
    #[case(FailureKind::FatalResolution, Recovery::Propagate)]
    #[case(FailureKind::Transport, Recovery::RetryOtherEndpoint)]
    #[case(FailureKind::RetriesExhausted, Recovery::RetryNextFlush)]
    #[case(FailureKind::BudgetExceeded, Recovery::Propagate)]
    fn every_kind_has_a_recovery(#[case] kind: FailureKind, #[case] expected: Recovery) {
        assert_eq!(kind.recovery(), expected);
    }

    #[rstest]
    fn uncaught_send_wraps_its_cause() {
        let err = ClientError::UncaughtSend {
            errors: 3,
            source: Box::new(ClientError::RetriesExhausted { attempts: 2 }),
        };
        assert_eq!(err.kind(), FailureKind::BudgetExceeded);
        assert!(err.to_string().contains("3 uncaught"));
        assert!(err.to_string().contains("2 attempts"));
    }

    #[rstest]
    fn format_error_lists_actual_and_expected() {
        let err = ClientError::from(FormatError::shape("{\"metric\":\"m\"}"));
        let message = err.to_string();
        assert!(message.contains("\"metric\":\"m\""));
        assert!(message.contains("<at least one pair>"));
        assert_eq!(err.kind(), FailureKind::Format);
    }
}
