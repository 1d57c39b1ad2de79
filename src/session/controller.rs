use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::connection::{ConnectionManager, ConnectionState};
use super::discovery::{DiscoveryEvent, DiscoverySession};
use crate::auth::{ACCESS_TOKEN_KEY, AuthClient, CredentialStore};
use crate::error::{SessionError, TransportError};
use crate::transport::{
    DiscoveredDevice, PermissionGate, PermissionOutcome, TransportAdapter,
};

/// The logged-in state, created by login or credential recovery.
#[derive(Debug)]
pub struct AuthSession {
    token: String,
}

impl AuthSession {
    /// Returns the opaque access token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Read-only snapshot consumed by rendering collaborators.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub logged_in: bool,
    pub scanning: bool,
    pub devices: Vec<DiscoveredDevice>,
    pub connection_state: ConnectionState,
    pub connected_device: Option<ConnectedDeviceView>,
}

/// Identity of the currently connected device, for display.
#[derive(Debug, Serialize)]
pub struct ConnectedDeviceView {
    pub device_id: String,
    pub display_name: Option<String>,
}

/// Auth-gated orchestrator over the permission gate, discovery session and
/// connection manager.
///
/// Both sub-components are reached through `&mut self`, so adapter use is
/// serialized structurally rather than by a documented assumption.
pub struct SessionController {
    auth_client: Box<dyn AuthClient>,
    credential_store: Box<dyn CredentialStore>,
    permission_gate: PermissionGate,
    discovery: DiscoverySession,
    connection: ConnectionManager,
    auth: Option<AuthSession>,
}

impl SessionController {
    /// Creates a logged-out controller over one shared adapter.
    #[must_use]
    pub fn new(
        adapter: Arc<dyn TransportAdapter>,
        permission_gate: PermissionGate,
        auth_client: Box<dyn AuthClient>,
        credential_store: Box<dyn CredentialStore>,
    ) -> Self {
        Self {
            auth_client,
            credential_store,
            permission_gate,
            discovery: DiscoverySession::new(Arc::clone(&adapter)),
            connection: ConnectionManager::new(adapter),
            auth: None,
        }
    }

    /// Overrides the discovery session's scan window.
    #[must_use]
    pub fn with_scan_window(mut self, scan_window: Duration) -> Self {
        self.discovery = self.discovery.with_scan_window(scan_window);
        self
    }

    /// Returns whether the controller is logged in.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.auth.is_some()
    }

    /// Returns the live auth session, if any.
    #[must_use]
    pub fn auth_session(&self) -> Option<&AuthSession> {
        self.auth.as_ref()
    }

    /// Attempts startup credential recovery from the store.
    ///
    /// A stored credential transitions straight to logged-in without
    /// contacting the authentication backend; store failures are soft.
    #[instrument(skip(self), level = "info")]
    pub fn restore(&mut self) -> bool {
        match self.credential_store.get(ACCESS_TOKEN_KEY) {
            Ok(Some(token)) => {
                info!("recovered stored credential");
                self.auth = Some(AuthSession { token });
                true
            }
            Ok(None) => false,
            Err(error) => {
                warn!(?error, "credential recovery failed; staying logged out");
                false
            }
        }
    }

    /// Logs in through the authentication collaborator and stores the token.
    ///
    /// A store write failure is soft: the session still transitions to
    /// logged-in, it just will not survive a restart. Logging in while
    /// already logged in is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `AuthenticationFailed` on any collaborator failure; the
    /// controller stays logged out.
    #[instrument(skip(self, password), level = "info", fields(email))]
    pub async fn login(&mut self, email: &str, password: &str) -> Result<(), SessionError> {
        if self.is_logged_in() {
            debug!("already logged in; login is a no-op");
            return Ok(());
        }

        let token = self
            .auth_client
            .login(email, password)
            .await
            .map_err(|source| SessionError::AuthenticationFailed { source })?;

        if let Err(error) = self.credential_store.set(ACCESS_TOKEN_KEY, &token) {
            warn!(?error, "failed to persist credential; session is memory-only");
        }
        self.auth = Some(AuthSession { token });
        info!("logged in");
        Ok(())
    }

    /// Logs out: disconnects any live connection, clears discovered devices,
    /// deletes the stored credential and lands logged-out unconditionally.
    ///
    /// # Errors
    ///
    /// Returns `StorageFailed` if credential deletion failed; the local
    /// logout has already fully taken effect by then.
    #[instrument(skip(self), level = "info")]
    pub async fn logout(&mut self) -> Result<(), SessionError> {
        if !self.is_logged_in() {
            return Ok(());
        }

        if let Err(error) = self.connection.disconnect().await {
            warn!(?error, "disconnect during logout was not acknowledged");
        }
        self.discovery.cancel().await;
        self.discovery.clear_devices();
        self.auth = None;
        info!("logged out");

        self.credential_store
            .delete(ACCESS_TOKEN_KEY)
            .map_err(|source| SessionError::StorageFailed { source })
    }

    /// Requests capabilities and begins a scan. No-op while logged out.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` when the platform denies any capability,
    /// `ScanUnsupported` when no radio exists, `ScanFailed` otherwise.
    #[instrument(skip(self), level = "info")]
    pub async fn scan(&mut self) -> Result<(), SessionError> {
        if !self.is_logged_in() {
            debug!("scan requested while logged out; ignoring");
            return Ok(());
        }

        let outcome = self
            .permission_gate
            .request_capabilities()
            .await
            .map_err(|source| SessionError::ScanFailed { source })?;
        if outcome == PermissionOutcome::Denied {
            return Err(SessionError::PermissionDenied);
        }

        self.discovery.begin().await.map_err(scan_error)
    }

    /// Waits for the next discovery event while a scan is active.
    pub async fn next_discovery_event(&mut self) -> Option<DiscoveryEvent> {
        self.discovery.next_event().await
    }

    /// Cancels an active scan; safe when idle.
    pub async fn cancel_scan(&mut self) {
        self.discovery.cancel().await;
    }

    /// Connects to one discovered device. No-op while logged out.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailed` if the adapter cannot establish the
    /// connection; the connection manager is left disconnected.
    #[instrument(skip(self, device), level = "info", fields(device_id = device.id()))]
    pub async fn connect(&mut self, device: &DiscoveredDevice) -> Result<(), SessionError> {
        if !self.is_logged_in() {
            debug!("connect requested while logged out; ignoring");
            return Ok(());
        }

        self.connection
            .connect(device)
            .await
            .map(|_handle| ())
            .map_err(|source| SessionError::ConnectionFailed { source })
    }

    /// Disconnects the live connection, if any. No-op while logged out.
    ///
    /// # Errors
    ///
    /// Returns the soft `DisconnectFailed`; the manager is disconnected
    /// either way.
    #[instrument(skip(self), level = "info")]
    pub async fn disconnect(&mut self) -> Result<(), SessionError> {
        if !self.is_logged_in() {
            return Ok(());
        }

        self.connection
            .disconnect()
            .await
            .map_err(|source| SessionError::DisconnectFailed { source })
    }

    /// Returns the connection manager's state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Returns whether a scan is currently active.
    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.discovery.is_scanning()
    }

    /// Returns the current discovered-device set.
    #[must_use]
    pub fn devices(&self) -> &[DiscoveredDevice] {
        self.discovery.devices()
    }

    /// Snapshots the whole session for rendering collaborators.
    #[must_use]
    pub fn view(&self) -> SessionView {
        SessionView {
            logged_in: self.is_logged_in(),
            scanning: self.discovery.is_scanning(),
            devices: self.discovery.devices().to_vec(),
            connection_state: self.connection.state(),
            connected_device: self.connection.current().map(|handle| ConnectedDeviceView {
                device_id: handle.device_id().to_string(),
                display_name: handle.display_name().map(str::to_string),
            }),
        }
    }

    /// Returns the services of the live connection, if any.
    #[must_use]
    pub fn connected_services(&self) -> Option<&[crate::transport::ServiceInfo]> {
        self.connection.current().map(|handle| handle.services())
    }
}

fn scan_error(source: TransportError) -> SessionError {
    match source {
        TransportError::NoAdapters => SessionError::ScanUnsupported,
        source => SessionError::ScanFailed { source },
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("logged_in", &self.is_logged_in())
            .field("discovery", &self.discovery)
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}
