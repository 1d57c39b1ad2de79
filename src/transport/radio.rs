use btleplug::api::{Central, Manager as _, Peripheral as _, PeripheralProperties};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tracing::{debug, instrument};

use super::model::{
    CharacteristicInfo, ConnectionHandle, DiscoveredDevice, PeripheralLink, ServiceInfo,
};
use crate::error::TransportError;

/// Shared btleplug plumbing used by both radio-backed adapter variants.
#[derive(Debug)]
pub(crate) struct Radio {
    adapter: Adapter,
}

impl Radio {
    /// Opens the first system BLE adapter.
    pub(crate) async fn open() -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(TransportError::NoAdapters)?;
        Ok(Self { adapter })
    }

    /// Reports whether any BLE adapter is present, without keeping it.
    pub(crate) async fn is_available() -> bool {
        match Manager::new().await {
            Ok(manager) => manager
                .adapters()
                .await
                .map(|adapters| !adapters.is_empty())
                .unwrap_or(false),
            Err(error) => {
                debug!(?error, "BLE manager unavailable during feature check");
                false
            }
        }
    }

    pub(crate) fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Stops the adapter scan, swallowing failures on an inactive scan.
    pub(crate) async fn stop_scan_best_effort(&self) {
        if let Err(error) = self.adapter.stop_scan().await {
            debug!(?error, "failed to stop adapter scan cleanly");
        }
    }

    /// Snapshots every peripheral the adapter currently knows about.
    pub(crate) async fn visible_devices(&self) -> Result<Vec<DiscoveredDevice>, TransportError> {
        let mut devices = Vec::new();
        for peripheral in self.adapter.peripherals().await? {
            let Some(properties) = peripheral.properties().await? else {
                continue;
            };
            devices.push(device_from_properties(&peripheral, &properties));
        }
        Ok(devices)
    }

    /// Connects to a previously observed peripheral and enumerates services.
    #[instrument(skip(self, device), level = "debug", fields(device_id = device.id()))]
    pub(crate) async fn connect(
        &self,
        device: &DiscoveredDevice,
    ) -> Result<ConnectionHandle, TransportError> {
        let peripheral = self.find_peripheral(device.id()).await?;
        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }

        if let Err(source) = peripheral.discover_services().await {
            // No partial handle: tear the link back down before failing.
            if let Err(error) = peripheral.disconnect().await {
                debug!(?error, "failed to disconnect after enumeration error");
            }
            return Err(TransportError::ServiceEnumeration { source });
        }

        let services = collect_services(&peripheral);
        Ok(ConnectionHandle::new(
            device.id().to_string(),
            device.display_name().map(str::to_string),
            services,
            PeripheralLink::Radio(peripheral),
        ))
    }

    /// Tears down a radio link; already-disconnected links count as success.
    pub(crate) async fn disconnect(&self, peripheral: &Peripheral) -> Result<(), TransportError> {
        if !peripheral.is_connected().await.unwrap_or(false) {
            return Ok(());
        }
        peripheral.disconnect().await?;
        Ok(())
    }

    async fn find_peripheral(&self, device_id: &str) -> Result<Peripheral, TransportError> {
        for peripheral in self.adapter.peripherals().await? {
            if peripheral.id().to_string() == device_id {
                return Ok(peripheral);
            }
        }
        Err(TransportError::DeviceVanished {
            device_id: device_id.to_string(),
        })
    }
}

pub(crate) fn device_from_properties(
    peripheral: &Peripheral,
    properties: &PeripheralProperties,
) -> DiscoveredDevice {
    // btleplug surfaces only the advertised local name, so it doubles as the
    // resolved name the way the GAP name would on richer backends.
    DiscoveredDevice::new(
        peripheral.id().to_string(),
        properties.local_name.clone(),
        properties.rssi,
        properties.local_name.clone(),
    )
}

fn collect_services(peripheral: &Peripheral) -> Vec<ServiceInfo> {
    let mut services = Vec::new();
    for service in peripheral.services() {
        let mut characteristics = Vec::new();
        for characteristic in &service.characteristics {
            characteristics.push(CharacteristicInfo::new(
                characteristic.uuid.to_string().to_lowercase(),
                property_labels(characteristic.properties),
            ));
        }
        characteristics.sort_by(|left, right| left.uuid().cmp(right.uuid()));

        services.push(ServiceInfo::new(
            service.uuid.to_string().to_lowercase(),
            service.primary,
            characteristics,
        ));
    }
    services.sort_by(|left, right| left.uuid().cmp(right.uuid()));
    services
}

fn property_labels(flags: btleplug::api::CharPropFlags) -> Vec<String> {
    let labels: Vec<String> = flags
        .iter_names()
        .map(|(name, _)| name.to_lowercase())
        .collect();
    if labels.is_empty() {
        vec!["none".to_string()]
    } else {
        labels
    }
}
