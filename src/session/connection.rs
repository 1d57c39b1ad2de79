use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::error::TransportError;
use crate::transport::{ConnectionHandle, DiscoveredDevice, TransportAdapter};

/// Connection-manager state.
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[display("disconnected")]
    Disconnected,
    #[display("connecting")]
    Connecting,
    #[display("connected")]
    Connected,
}

/// Owns the single-connection invariant: at most one live handle, and a new
/// connection always tears the previous one down first.
pub struct ConnectionManager {
    adapter: Arc<dyn TransportAdapter>,
    state: ConnectionState,
    handle: Option<ConnectionHandle>,
}

impl ConnectionManager {
    /// Creates a disconnected manager over the given adapter.
    #[must_use]
    pub fn new(adapter: Arc<dyn TransportAdapter>) -> Self {
        Self {
            adapter,
            state: ConnectionState::Disconnected,
            handle: None,
        }
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns the live handle, if any.
    #[must_use]
    pub fn current(&self) -> Option<&ConnectionHandle> {
        self.handle.as_ref()
    }

    /// Connects to `device`, tearing down any existing connection first.
    ///
    /// The prior teardown completes before the new attempt starts, even when
    /// the new attempt subsequently fails. Reconnecting to the currently
    /// connected device repeats teardown and reconnect; there is no short
    /// circuit.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter cannot establish the connection; the
    /// manager is left disconnected with no handle.
    #[instrument(skip(self, device), level = "info", fields(device_id = device.id()))]
    pub async fn connect(
        &mut self,
        device: &DiscoveredDevice,
    ) -> Result<&ConnectionHandle, TransportError> {
        if let Some(previous) = self.handle.take() {
            let previous_id = previous.device_id().to_string();
            if let Err(error) = self.adapter.disconnect(previous).await {
                warn!(?error, device_id = %previous_id, "teardown of previous connection failed");
            }
            self.state = ConnectionState::Disconnected;
        }

        self.state = ConnectionState::Connecting;
        match self.adapter.connect(device).await {
            Ok(handle) => {
                info!(service_count = handle.services().len(), "connected");
                self.state = ConnectionState::Connected;
                Ok(&*self.handle.insert(handle))
            }
            Err(error) => {
                self.state = ConnectionState::Disconnected;
                Err(error)
            }
        }
    }

    /// Tears down the live connection.
    ///
    /// The manager lands on `Disconnected` whether or not the peripheral
    /// acknowledges teardown; a failure is surfaced after the local state
    /// already changed. Disconnecting while already disconnected is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the adapter's teardown error, with the manager disconnected.
    #[instrument(skip(self), level = "info")]
    pub async fn disconnect(&mut self) -> Result<(), TransportError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        self.state = ConnectionState::Disconnected;

        match self.adapter.disconnect(handle).await {
            Ok(()) => {
                info!("disconnected");
                Ok(())
            }
            Err(error) => {
                warn!(?error, "peripheral did not acknowledge teardown");
                Err(error)
            }
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state)
            .field(
                "device_id",
                &self.handle.as_ref().map(ConnectionHandle::device_id),
            )
            .finish_non_exhaustive()
    }
}
