//! Helpers shared by unit and integration tests.
//!
//! Compiled for unit tests and behind the `test-util` feature so the
//! integration tests under `tests/` can drive a real loopback server instead
//! of mocking sockets.

mod fake_tsd;
mod resolvers;

pub use fake_tsd::{FakeTsd, ProbeBehaviour, closed_endpoint};
pub use resolvers::{CountingResolver, ScriptedResolver};
