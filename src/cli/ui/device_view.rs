use std::fmt::{self, Display, Formatter};

use crate::transport::DiscoveredDevice;
use crate::utils::{format_device_name, format_rssi};

use super::painter::Painter;
use super::table::Table;

/// Renders the discovered-device set as a grid.
pub(crate) struct DeviceListView<'a> {
    devices: &'a [DiscoveredDevice],
    painter: &'a Painter,
}

impl<'a> DeviceListView<'a> {
    pub(crate) fn new(devices: &'a [DiscoveredDevice], painter: &'a Painter) -> Self {
        Self { devices, painter }
    }
}

impl Display for DeviceListView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.devices.is_empty() {
            return write!(f, "{}", self.painter.muted("no devices discovered"));
        }

        let rows = self
            .devices
            .iter()
            .map(|device| {
                vec![
                    self.painter.value(format_device_name(device.display_name())),
                    device.id().to_string(),
                    format_rssi(device.rssi()),
                    device.local_name().unwrap_or("-").to_string(),
                ]
            })
            .collect();
        let table = Table::grid(["name", "device_id", "rssi", "local_name"], rows);
        write!(f, "{table}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, name: Option<&str>, rssi: Option<i16>) -> DiscoveredDevice {
        DiscoveredDevice::new(id.into(), name.map(String::from), rssi, None)
    }

    #[test]
    fn nameless_devices_are_flagged_unknown() {
        let devices = vec![device("AA:BB", None, Some(-43))];
        let painter = Painter::new(false);
        let rendered = DeviceListView::new(&devices, &painter).to_string();
        assert!(rendered.contains("Unknown"));
        assert!(rendered.contains("AA:BB"));
        assert!(rendered.contains("-43"));
    }

    #[test]
    fn empty_result_set_renders_a_hint() {
        let painter = Painter::new(false);
        let rendered = DeviceListView::new(&[], &painter).to_string();
        assert!(rendered.contains("no devices discovered"));
    }
}
