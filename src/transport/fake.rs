use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::debug;

use super::model::{
    CharacteristicInfo, ConnectionHandle, DiscoveredDevice, PeripheralLink, ServiceInfo,
};
use super::{ScanEvent, TransportAdapter};
use crate::error::{FixtureError, TransportError};

/// Parsed fake scan fixture records.
///
/// Record syntax is `device_id|name|rssi|local_name`, `-` for an absent
/// field, records separated by `;`.
#[derive(Debug, Clone, derive_more::Into)]
pub struct ScanFixture {
    devices: Vec<DiscoveredDevice>,
}

impl FromStr for ScanFixture {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let devices = parse_scan_fixture(value)?;
        Ok(Self { devices })
    }
}

/// Operations the fake transport is configured to fail.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FakeFailure {
    /// The scan itself fails after starting.
    Scan,
    /// Connection establishment fails at the link level.
    Link,
    /// The link comes up but service enumeration fails.
    Enumeration,
    /// The peripheral refuses to acknowledge teardown.
    Disconnect,
}

/// Scripted chooser behaviour for the fake transport.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FakeChooserPick {
    /// The user picks the fixture device at this index.
    Device(usize),
    /// The user dismisses the picker.
    Cancel,
}

/// Settings for constructing a fake transport adapter.
#[derive(Debug, Builder)]
pub struct FakeAdapterConfig {
    scan_fixture: ScanFixture,
    #[builder(default)]
    discovery_delay: Duration,
    /// When set, the fake behaves like a chooser backend instead of a
    /// streaming one.
    chooser_pick: Option<FakeChooserPick>,
    #[builder(default)]
    failures: Vec<FakeFailure>,
}

/// Call counters observable from tests.
///
/// Besides per-operation totals the counters keep the operations in
/// invocation order, so tests can assert sequencing such as teardown
/// happening before a replacement connect.
#[derive(Debug, Default)]
pub struct FakeAdapterCounters {
    stop_scan_calls: AtomicUsize,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    operations: Mutex<Vec<&'static str>>,
}

impl FakeAdapterCounters {
    /// Returns how many times `stop_scan` ran.
    #[must_use]
    pub fn stop_scan_calls(&self) -> usize {
        self.stop_scan_calls.load(Ordering::SeqCst)
    }

    /// Returns how many times `connect` ran.
    #[must_use]
    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Returns how many times `disconnect` ran.
    #[must_use]
    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    /// Returns the adapter operations in the order they ran.
    #[must_use]
    pub fn operations(&self) -> Vec<&'static str> {
        self.operations
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn record(&self, operation: &'static str) {
        self.operations
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(operation);
    }
}

/// Fake transport used in tests and non-hardware environments.
#[derive(Debug)]
pub struct FakeAdapter {
    devices: Vec<DiscoveredDevice>,
    discovery_delay: Duration,
    chooser_pick: Option<FakeChooserPick>,
    failures: Vec<FakeFailure>,
    counters: Arc<FakeAdapterCounters>,
}

impl FakeAdapter {
    /// Creates a fake adapter from explicit settings.
    #[must_use]
    pub fn new(config: FakeAdapterConfig) -> Self {
        Self {
            devices: config.scan_fixture.into(),
            discovery_delay: config.discovery_delay,
            chooser_pick: config.chooser_pick,
            failures: config.failures,
            counters: Arc::new(FakeAdapterCounters::default()),
        }
    }

    /// Returns the shared call counters for assertions.
    #[must_use]
    pub fn counters(&self) -> Arc<FakeAdapterCounters> {
        Arc::clone(&self.counters)
    }

    fn fails(&self, failure: FakeFailure) -> bool {
        self.failures.contains(&failure)
    }
}

#[async_trait]
impl TransportAdapter for FakeAdapter {
    async fn start_scan(&self, events: mpsc::Sender<ScanEvent>) -> Result<(), TransportError> {
        self.counters.record("start_scan");

        let delay = self.discovery_delay;
        let fail_scan = self.fails(FakeFailure::Scan);
        let chooser_pick = self.chooser_pick;
        let devices = self.devices.clone();

        tokio::spawn(async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }

            if fail_scan {
                let _ = events
                    .send(ScanEvent::ScanFailed(TransportError::InjectedFailure {
                        operation: "start_scan",
                    }))
                    .await;
                return;
            }

            match chooser_pick {
                None => {
                    for device in devices {
                        if events.send(ScanEvent::DeviceObserved(device)).await.is_err() {
                            return;
                        }
                    }
                }
                Some(FakeChooserPick::Device(index)) => {
                    if let Some(device) = devices.into_iter().nth(index) {
                        let _ = events.send(ScanEvent::DeviceObserved(device)).await;
                    } else {
                        debug!(index, "chooser pick points past the fixture");
                    }
                }
                Some(FakeChooserPick::Cancel) => {
                    debug!("scripted chooser dismissal");
                }
            }
        });

        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), TransportError> {
        self.counters.stop_scan_calls.fetch_add(1, Ordering::SeqCst);
        self.counters.record("stop_scan");
        Ok(())
    }

    async fn connect(
        &self,
        device: &DiscoveredDevice,
    ) -> Result<ConnectionHandle, TransportError> {
        self.counters.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.counters.record("connect");

        if self.fails(FakeFailure::Link) {
            return Err(TransportError::InjectedFailure {
                operation: "connect",
            });
        }
        if self.fails(FakeFailure::Enumeration) {
            // Link came up; enumeration failed, so no handle is produced.
            return Err(TransportError::InjectedFailure {
                operation: "enumerate_services",
            });
        }

        Ok(ConnectionHandle::new(
            device.id().to_string(),
            device.display_name().map(str::to_string),
            fixture_services(),
            PeripheralLink::Fake(FakeLink {
                closed: AtomicBool::new(false),
            }),
        ))
    }

    async fn disconnect(&self, handle: ConnectionHandle) -> Result<(), TransportError> {
        self.counters.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.counters.record("disconnect");

        let PeripheralLink::Fake(link) = &handle.link else {
            debug!("ignoring foreign link handed to the fake adapter");
            return Ok(());
        };
        if link.closed.swap(true, Ordering::SeqCst) {
            // Already torn down; idempotent success.
            return Ok(());
        }
        if self.fails(FakeFailure::Disconnect) {
            return Err(TransportError::InjectedFailure {
                operation: "disconnect",
            });
        }
        Ok(())
    }
}

/// Fake link state carried inside a [`ConnectionHandle`].
#[derive(Debug)]
pub(crate) struct FakeLink {
    closed: AtomicBool,
}

fn fixture_services() -> Vec<ServiceInfo> {
    vec![
        ServiceInfo::new(
            "00001800-0000-1000-8000-00805f9b34fb".to_string(),
            true,
            vec![CharacteristicInfo::new(
                "00002a00-0000-1000-8000-00805f9b34fb".to_string(),
                vec!["read".to_string()],
            )],
        ),
        ServiceInfo::new(
            "0000180f-0000-1000-8000-00805f9b34fb".to_string(),
            true,
            vec![CharacteristicInfo::new(
                "00002a19-0000-1000-8000-00805f9b34fb".to_string(),
                vec!["read".to_string(), "notify".to_string()],
            )],
        ),
    ]
}

fn parse_scan_fixture(raw_fixture: &str) -> Result<Vec<DiscoveredDevice>, FixtureError> {
    if raw_fixture.trim().is_empty() {
        return Err(FixtureError::EmptyFixture);
    }

    raw_fixture
        .split(';')
        .map(parse_scan_record)
        .collect::<Result<Vec<_>, _>>()
}

fn parse_scan_record(raw_record: &str) -> Result<DiscoveredDevice, FixtureError> {
    let fields: Vec<&str> = raw_record.split('|').map(str::trim).collect();
    if fields.len() != 4 {
        return Err(FixtureError::InvalidRecordFieldCount);
    }
    if fields[0].is_empty() || fields[0] == "-" {
        return Err(FixtureError::EmptyDeviceId);
    }

    let optional = |field: &str| {
        if field == "-" || field.is_empty() {
            None
        } else {
            Some(field.to_string())
        }
    };
    let rssi = match fields[2] {
        "-" | "" => None,
        value => Some(value.parse::<i16>()?),
    };

    Ok(DiscoveredDevice::new(
        fields[0].to_string(),
        optional(fields[1]),
        rssi,
        optional(fields[3]),
    ))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("AA:BB|Heart Monitor|-43|HRM", 1)]
    #[case("AA:BB|Heart Monitor|-43|HRM;CC:DD|Speaker|-55|-", 2)]
    #[case("AA:BB|-|-|-", 1)]
    fn parse_scan_fixture_parses_records(#[case] fixture: &str, #[case] expected_count: usize) {
        let devices = parse_scan_fixture(fixture).expect("fixture should parse");
        assert_eq!(expected_count, devices.len());
    }

    #[test]
    fn parse_scan_fixture_keeps_optional_fields_absent() {
        let devices = parse_scan_fixture("AA:BB|-|-|-").expect("fixture should parse");
        assert_eq!(None, devices[0].name());
        assert_eq!(None, devices[0].rssi());
        assert_eq!(None, devices[0].local_name());
    }

    #[test]
    fn parse_scan_fixture_rejects_invalid_field_count() {
        let result = parse_scan_fixture("AA:BB|Heart Monitor|-43");
        assert_matches!(result, Err(FixtureError::InvalidRecordFieldCount));
    }

    #[test]
    fn parse_scan_fixture_rejects_missing_device_id() {
        let result = parse_scan_fixture("-|Heart Monitor|-43|HRM");
        assert_matches!(result, Err(FixtureError::EmptyDeviceId));
    }

    #[test]
    fn parse_scan_fixture_rejects_bad_rssi() {
        let result = parse_scan_fixture("AA:BB|Heart Monitor|loud|HRM");
        assert_matches!(result, Err(FixtureError::InvalidRssi(_)));
    }
}
