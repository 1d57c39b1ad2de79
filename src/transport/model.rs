use serde::Serialize;

use super::fake::FakeLink;

/// A peripheral observed while a scan was active.
///
/// At most one record per `id` exists within a discovery session; a later
/// observation of the same `id` replaces the earlier record wholesale.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct DiscoveredDevice {
    id: String,
    name: Option<String>,
    rssi: Option<i16>,
    local_name: Option<String>,
}

impl DiscoveredDevice {
    /// Creates a discovered-device record.
    #[must_use]
    pub fn new(
        id: String,
        name: Option<String>,
        rssi: Option<i16>,
        local_name: Option<String>,
    ) -> Self {
        Self {
            id,
            name,
            rssi,
            local_name,
        }
    }

    /// Returns the backend-scoped stable device identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the resolved device name, if the backend reported one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the latest observed RSSI value, if present.
    #[must_use]
    pub fn rssi(&self) -> Option<i16> {
        self.rssi
    }

    /// Returns the advertised local name, if present.
    #[must_use]
    pub fn local_name(&self) -> Option<&str> {
        self.local_name.as_deref()
    }

    /// Returns the best available human-readable name.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.local_name.as_deref())
    }
}

/// A characteristic description discovered on a connected peripheral.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct CharacteristicInfo {
    uuid: String,
    properties: Vec<String>,
}

impl CharacteristicInfo {
    /// Creates a characteristic description.
    pub(crate) fn new(uuid: String, properties: Vec<String>) -> Self {
        Self { uuid, properties }
    }

    /// Returns the characteristic UUID.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Returns property labels for this characteristic.
    #[must_use]
    pub fn properties(&self) -> &[String] {
        &self.properties
    }
}

/// A GATT service with discovered characteristics.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ServiceInfo {
    uuid: String,
    primary: bool,
    characteristics: Vec<CharacteristicInfo>,
}

impl ServiceInfo {
    /// Creates a service description.
    pub(crate) fn new(
        uuid: String,
        primary: bool,
        characteristics: Vec<CharacteristicInfo>,
    ) -> Self {
        Self {
            uuid,
            primary,
            characteristics,
        }
    }

    /// Returns the service UUID.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Returns whether this is a primary service.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Returns all characteristics in this service.
    #[must_use]
    pub fn characteristics(&self) -> &[CharacteristicInfo] {
        &self.characteristics
    }
}

/// The single live connection, with services already enumerated.
///
/// The backend link object is opaque to everything above the transport layer;
/// the connection manager owns the handle exclusively.
#[derive(Debug)]
pub struct ConnectionHandle {
    device_id: String,
    display_name: Option<String>,
    services: Vec<ServiceInfo>,
    pub(crate) link: PeripheralLink,
}

impl ConnectionHandle {
    pub(crate) fn new(
        device_id: String,
        display_name: Option<String>,
        services: Vec<ServiceInfo>,
        link: PeripheralLink,
    ) -> Self {
        Self {
            device_id,
            display_name,
            services,
            link,
        }
    }

    /// Returns the connected device identifier.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Returns the connected device's display name, if known.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Returns the services enumerated during connection establishment.
    #[must_use]
    pub fn services(&self) -> &[ServiceInfo] {
        &self.services
    }
}

/// Backend-specific link state carried inside a [`ConnectionHandle`].
#[derive(Debug)]
pub(crate) enum PeripheralLink {
    Radio(btleplug::platform::Peripheral),
    Fake(FakeLink),
}
