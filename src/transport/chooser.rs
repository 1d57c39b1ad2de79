use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Central, ScanFilter};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, instrument};

use super::model::{ConnectionHandle, DiscoveredDevice, PeripheralLink};
use super::radio::Radio;
use super::{ScanEvent, TransportAdapter};
use crate::error::TransportError;

/// How long the picker gathers advertisements before presenting choices.
const CHOOSER_GATHER_WINDOW: Duration = Duration::from_secs(5);

/// One-shot, user-mediated device picker.
///
/// The chooser owns its candidate list; the caller only learns about the
/// single chosen device, or nothing at all when the user dismisses the
/// picker.
#[async_trait]
pub trait DeviceChooser: Send + Sync {
    /// Presents candidates and returns the index of the chosen device, or
    /// `None` when the user cancels.
    async fn choose(&self, candidates: &[DiscoveredDevice]) -> Option<usize>;
}

/// Radio-backed adapter with chooser-gated, single-shot discovery.
///
/// Discovery gathers advertisements for a bounded window, presents them to
/// the picker once, and emits at most one observation. A dismissed picker is
/// a silent no-op, never an error.
pub struct ChooserAdapter {
    radio: Arc<Radio>,
    chooser: Arc<dyn DeviceChooser>,
    gather_window: Duration,
}

impl ChooserAdapter {
    /// Opens the first system BLE adapter behind a device picker.
    ///
    /// # Errors
    ///
    /// Returns an error if no adapter is present.
    pub async fn open(chooser: Arc<dyn DeviceChooser>) -> Result<Self, TransportError> {
        Ok(Self {
            radio: Arc::new(Radio::open().await?),
            chooser,
            gather_window: CHOOSER_GATHER_WINDOW,
        })
    }

    /// Static feature detection: whether a chooser-backed scan could work at
    /// all on this host.
    pub async fn is_available() -> bool {
        Radio::is_available().await
    }
}

impl std::fmt::Debug for ChooserAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChooserAdapter")
            .field("gather_window", &self.gather_window)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TransportAdapter for ChooserAdapter {
    #[instrument(skip(self, events), level = "debug")]
    async fn start_scan(&self, events: mpsc::Sender<ScanEvent>) -> Result<(), TransportError> {
        self.radio.adapter().start_scan(ScanFilter::default()).await?;
        info!(window = ?self.gather_window, "gathering chooser candidates");

        let radio = Arc::clone(&self.radio);
        let chooser = Arc::clone(&self.chooser);
        let gather_window = self.gather_window;
        tokio::spawn(async move {
            sleep(gather_window).await;
            let gathered = radio.visible_devices().await;
            radio.stop_scan_best_effort().await;

            let candidates = match gathered {
                Ok(candidates) => candidates,
                Err(error) => {
                    let _ = events.send(ScanEvent::ScanFailed(error)).await;
                    return;
                }
            };

            match chooser.choose(&candidates).await {
                Some(index) if index < candidates.len() => {
                    let chosen = candidates[index].clone();
                    info!(device_id = chosen.id(), "chooser selected a device");
                    let _ = events.send(ScanEvent::DeviceObserved(chosen)).await;
                }
                Some(index) => {
                    debug!(index, "chooser returned an out-of-range candidate");
                }
                // Dismissal is deliberately silent; see the discovery
                // session's scan window for how scans still terminate.
                None => debug!("chooser dismissed without a selection"),
            }
        });

        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), TransportError> {
        // No live scan to halt once the picker has run.
        Ok(())
    }

    async fn connect(
        &self,
        device: &DiscoveredDevice,
    ) -> Result<ConnectionHandle, TransportError> {
        self.radio.connect(device).await
    }

    async fn disconnect(&self, handle: ConnectionHandle) -> Result<(), TransportError> {
        match &handle.link {
            PeripheralLink::Radio(peripheral) => self.radio.disconnect(peripheral).await,
            PeripheralLink::Fake(_) => {
                debug!("ignoring foreign link handed to the chooser adapter");
                Ok(())
            }
        }
    }
}
