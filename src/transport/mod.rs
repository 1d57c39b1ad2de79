mod chooser;
mod fake;
mod model;
mod permission;
mod radio;
mod streaming;

pub use self::chooser::{ChooserAdapter, DeviceChooser};
pub use self::fake::{
    FakeAdapter, FakeAdapterConfig, FakeAdapterCounters, FakeChooserPick, FakeFailure, ScanFixture,
};
pub use self::model::{CharacteristicInfo, ConnectionHandle, DiscoveredDevice, ServiceInfo};
pub use self::permission::{
    Capability, CapabilityGrant, CapabilityPrompt, PermissionGate, PermissionOutcome,
    SystemCapabilityPrompt,
};
pub use self::streaming::StreamingAdapter;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// One report delivered while a scan is active.
#[derive(Debug)]
pub enum ScanEvent {
    DeviceObserved(DiscoveredDevice),
    ScanFailed(TransportError),
}

/// A concrete Bluetooth backend behind the capability-normalized contract.
///
/// Exactly four operations, identical across the streaming and chooser
/// variants; nothing above this trait branches on backend identity.
#[async_trait]
pub trait TransportAdapter: Send + Sync {
    /// Begins asynchronous discovery, delivering observations and scan
    /// errors through `events`.
    ///
    /// The streaming variant emits observations indefinitely until stopped;
    /// the chooser variant emits at most one, and a cancelled choice emits
    /// nothing at all.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan cannot be started at all.
    async fn start_scan(&self, events: mpsc::Sender<ScanEvent>) -> Result<(), TransportError>;

    /// Halts a live scan. Idempotent: stopping when no scan is active is
    /// treated as success.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures unrelated to scan liveness.
    async fn stop_scan(&self) -> Result<(), TransportError>;

    /// Establishes a connection and enumerates services, so the returned
    /// handle is immediately usable. Fails with no partial handle if
    /// enumeration fails after the link came up.
    ///
    /// # Errors
    ///
    /// Returns an error if the link or service enumeration fails.
    async fn connect(&self, device: &DiscoveredDevice)
    -> Result<ConnectionHandle, TransportError>;

    /// Tears down the link. Idempotent against an already-closed handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the peripheral rejects teardown.
    async fn disconnect(&self, handle: ConnectionHandle) -> Result<(), TransportError>;
}
