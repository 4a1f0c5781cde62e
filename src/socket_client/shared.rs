//! Cloneable handle for submitting from several threads.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::{error::ClientError, meter::Meter};

use super::SocketClient;

/// A [`SocketClient`] behind one mutex.
///
/// The whole client is locked for the duration of each call, so a flush that
/// blocks on reconnection blocks every other submitter as well.
#[derive(Clone)]
pub struct SharedSocketClient {
    inner: Arc<Mutex<SocketClient>>,
}

impl SharedSocketClient {
    pub fn new(client: SocketClient) -> Self {
        Self {
            inner: Arc::new(Mutex::new(client)),
        }
    }

    pub fn submit(
        &self,
        meters: impl IntoIterator<Item = Meter>,
        commit: bool,
    ) -> Result<(), ClientError> {
        self.inner.lock().submit(meters, commit)
    }

    pub fn submit_json(&self, records: &Value, commit: bool) -> Result<(), ClientError> {
        self.inner.lock().submit_json(records, commit)
    }

    pub fn flush(&self) -> Result<(), ClientError> {
        self.inner.lock().flush()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending_len()
    }

    /// Run `f` with exclusive access to the client.
    pub fn with_client<R>(&self, f: impl FnOnce(&mut SocketClient) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl From<SocketClient> for SharedSocketClient {
    fn from(client: SocketClient) -> Self {
        Self::new(client)
    }
}
