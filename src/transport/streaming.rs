use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Central, ScanFilter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::model::{ConnectionHandle, DiscoveredDevice, PeripheralLink};
use super::radio::Radio;
use super::{ScanEvent, TransportAdapter};
use crate::error::TransportError;

const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Radio-backed adapter with continuous scan callbacks.
///
/// Discovery polls the adapter's peripheral snapshot and pushes an
/// observation per visible device until the scan is stopped; deduplication is
/// the discovery session's concern.
#[derive(Debug)]
pub struct StreamingAdapter {
    radio: Arc<Radio>,
    scan: Mutex<Option<ScanTask>>,
}

#[derive(Debug)]
struct ScanTask {
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl StreamingAdapter {
    /// Opens the first system BLE adapter for streaming discovery.
    ///
    /// # Errors
    ///
    /// Returns an error if no adapter is present.
    pub async fn open() -> Result<Self, TransportError> {
        Ok(Self {
            radio: Arc::new(Radio::open().await?),
            scan: Mutex::new(None),
        })
    }

    fn take_scan_task(&self) -> Option<ScanTask> {
        self.scan
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
    }

    fn install_scan_task(&self, task: ScanTask) {
        let previous = self
            .scan
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            debug!("replacing a still-armed scan task");
            previous.cancel.cancel();
            previous.worker.abort();
        }
    }
}

#[async_trait]
impl TransportAdapter for StreamingAdapter {
    #[instrument(skip(self, events), level = "debug")]
    async fn start_scan(&self, events: mpsc::Sender<ScanEvent>) -> Result<(), TransportError> {
        self.radio.adapter().start_scan(ScanFilter::default()).await?;
        info!("streaming BLE scan started");

        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();
        let radio = Arc::clone(&self.radio);
        let worker = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = worker_cancel.cancelled() => break,
                    () = sleep(SCAN_POLL_INTERVAL) => {}
                }

                match radio.visible_devices().await {
                    Ok(devices) => {
                        for device in devices {
                            if events.send(ScanEvent::DeviceObserved(device)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(error) => {
                        let _ = events.send(ScanEvent::ScanFailed(error)).await;
                        return;
                    }
                }
            }
        });

        self.install_scan_task(ScanTask { cancel, worker });
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), TransportError> {
        if let Some(task) = self.take_scan_task() {
            task.cancel.cancel();
            self.radio.stop_scan_best_effort().await;
            debug!("streaming BLE scan stopped");
        }
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
                debug!("ignoring foreign link handed to the streaming adapter");
                Ok(())
            }
        }
    }
}
