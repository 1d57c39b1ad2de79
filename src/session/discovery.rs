use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, instrument};

use crate::error::TransportError;
use crate::transport::{DiscoveredDevice, ScanEvent, TransportAdapter};

/// Maximum lifetime of one scan before it stops on its own.
pub const SCAN_WINDOW: Duration = Duration::from_secs(120);

const SCAN_EVENT_BUFFER: usize = 64;

/// Discovery-session state.
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display)]
pub enum DiscoveryState {
    #[display("idle")]
    Idle,
    #[display("scanning")]
    Scanning,
}

/// One step of an active scan, as seen by the caller pumping the session.
#[derive(Debug)]
pub enum DiscoveryEvent {
    /// A device was observed and upserted into the result set.
    DeviceObserved(DiscoveredDevice),
    /// The scan window elapsed and the scan was stopped.
    ScanComplete,
    /// The adapter reported a scan error; the session is idle again.
    ScanFailed(TransportError),
}

/// Owns the scan lifecycle: start/stop, deduplication, and the scan window.
pub struct DiscoverySession {
    adapter: Arc<dyn TransportAdapter>,
    scan_window: Duration,
    state: DiscoveryState,
    devices: Vec<DiscoveredDevice>,
    events: Option<mpsc::Receiver<ScanEvent>>,
    deadline: Option<Instant>,
}

impl DiscoverySession {
    /// Creates an idle session over the given adapter.
    #[must_use]
    pub fn new(adapter: Arc<dyn TransportAdapter>) -> Self {
        Self {
            adapter,
            scan_window: SCAN_WINDOW,
            state: DiscoveryState::Idle,
            devices: Vec::new(),
            events: None,
            deadline: None,
        }
    }

    /// Overrides the scan window. Mostly useful for short interactive scans.
    #[must_use]
    pub fn with_scan_window(mut self, scan_window: Duration) -> Self {
        self.scan_window = scan_window;
        self
    }

    /// Returns the current session state.
    #[must_use]
    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    /// Returns whether a scan is currently active.
    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.state == DiscoveryState::Scanning
    }

    /// Returns the deduplicated result set, in first-observation order.
    #[must_use]
    pub fn devices(&self) -> &[DiscoveredDevice] {
        &self.devices
    }

    /// Clears the result set, starts the adapter scan and arms the window.
    ///
    /// Calling this while already scanning is a guarded no-op, so two scans
    /// can never overlap within one session.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter cannot start scanning; the session
    /// stays idle.
    #[instrument(skip(self), level = "info")]
    pub async fn begin(&mut self) -> Result<(), TransportError> {
        if self.is_scanning() {
            debug!("scan already active; begin is a no-op");
            return Ok(());
        }

        self.devices.clear();
        let (sender, receiver) = mpsc::channel(SCAN_EVENT_BUFFER);
        self.adapter.start_scan(sender).await?;

        self.state = DiscoveryState::Scanning;
        self.events = Some(receiver);
        self.deadline = Some(Instant::now() + self.scan_window);
        info!(window = ?self.scan_window, "scan started");
        Ok(())
    }

    /// Waits for the next discovery event while a scan is active.
    ///
    /// Returns `None` when idle. Observations are upserted by device id
    /// before being surfaced; window expiry and adapter errors both leave
    /// the session idle.
    pub async fn next_event(&mut self) -> Option<DiscoveryEvent> {
        let deadline = self.deadline?;

        loop {
            // `None` means the window elapsed before anything arrived.
            let received = match self.events.as_mut() {
                Some(events) => {
                    tokio::select! {
                        () = sleep_until(deadline) => None,
                        event = events.recv() => Some(event),
                    }
                }
                // The sender side is gone (one-shot chooser backends close
                // it after their single answer); only the window remains.
                None => {
                    sleep_until(deadline).await;
                    None
                }
            };
            let Some(received) = received else {
                return Some(self.finish_window().await);
            };

            match received {
                Some(ScanEvent::DeviceObserved(device)) => {
                    self.upsert(device.clone());
                    return Some(DiscoveryEvent::DeviceObserved(device));
                }
                Some(ScanEvent::ScanFailed(error)) => {
                    if let Err(stop_error) = self.adapter.stop_scan().await {
                        debug!(?stop_error, "failed to stop scan after adapter error");
                    }
                    self.reset_to_idle();
                    return Some(DiscoveryEvent::ScanFailed(error));
                }
                None => {
                    self.events = None;
                }
            }
        }
    }

    /// Drops every discovered device without touching the scan state.
    pub(crate) fn clear_devices(&mut self) {
        self.devices.clear();
    }

    /// Stops an active scan and disarms the window; safe when already idle.
    pub async fn cancel(&mut self) {
        if !self.is_scanning() {
            return;
        }
        if let Err(error) = self.adapter.stop_scan().await {
            debug!(?error, "failed to stop scan during cancel");
        }
        self.reset_to_idle();
        info!("scan cancelled");
    }

    async fn finish_window(&mut self) -> DiscoveryEvent {
        if let Err(error) = self.adapter.stop_scan().await {
            debug!(?error, "failed to stop scan at window expiry");
        }
        self.reset_to_idle();
        info!(device_count = self.devices.len(), "scan complete");
        DiscoveryEvent::ScanComplete
    }

    fn reset_to_idle(&mut self) {
        self.state = DiscoveryState::Idle;
        self.events = None;
        self.deadline = None;
    }

    fn upsert(&mut self, device: DiscoveredDevice) {
        match self
            .devices
            .iter_mut()
            .find(|known| known.id() == device.id())
        {
            Some(known) => *known = device,
            None => self.devices.push(device),
        }
    }
}

impl std::fmt::Debug for DiscoverySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoverySession")
            .field("state", &self.state)
            .field("device_count", &self.devices.len())
            .field("scan_window", &self.scan_window)
            .finish_non_exhaustive()
    }
}
