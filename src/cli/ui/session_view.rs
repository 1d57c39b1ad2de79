use std::fmt::{self, Display, Formatter};

use crate::session::SessionView;
use crate::transport::ServiceInfo;

use super::painter::Painter;
use super::table::Table;

/// Renders a session snapshot as a key-value table.
pub(crate) struct StatusView<'a> {
    view: &'a SessionView,
    painter: &'a Painter,
}

impl<'a> StatusView<'a> {
    pub(crate) fn new(view: &'a SessionView, painter: &'a Painter) -> Self {
        Self { view, painter }
    }
}

impl Display for StatusView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let auth = if self.view.logged_in {
            self.painter.success("logged in")
        } else {
            self.painter.warning("logged out")
        };
        let connected = match &self.view.connected_device {
            Some(device) => format!(
                "{} ({})",
                device.display_name.as_deref().unwrap_or("Unknown"),
                device.device_id
            ),
            None => "-".to_string(),
        };

        let table = Table::key_value(
            self.painter,
            vec![
                ("auth", auth),
                ("scanning", self.view.scanning.to_string()),
                ("devices", self.view.devices.len().to_string()),
                ("connection", self.view.connection_state.to_string()),
                ("connected_device", connected),
            ],
        );
        write!(f, "{table}")
    }
}

/// Renders enumerated services and characteristics as a grid.
pub(crate) struct ServiceListView<'a> {
    services: &'a [ServiceInfo],
    painter: &'a Painter,
}

impl<'a> ServiceListView<'a> {
    pub(crate) fn new(services: &'a [ServiceInfo], painter: &'a Painter) -> Self {
        Self { services, painter }
    }
}

impl Display for ServiceListView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.services.is_empty() {
            return write!(f, "{}", self.painter.muted("no services enumerated"));
        }

        let mut rows = Vec::new();
        for service in self.services {
            let kind = if service.is_primary() {
                "primary"
            } else {
                "secondary"
            };
            rows.push(vec![
                self.painter.value(service.uuid()),
                kind.to_string(),
                String::new(),
            ]);
            for characteristic in service.characteristics() {
                rows.push(vec![
                    format!("  {}", characteristic.uuid()),
                    "characteristic".to_string(),
                    characteristic.properties().join(", "),
                ]);
            }
        }
        let table = Table::grid(["uuid", "kind", "properties"], rows);
        write!(f, "{table}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ConnectionState;

    #[test]
    fn status_view_renders_the_snapshot() {
        let view = SessionView {
            logged_in: true,
            scanning: false,
            devices: Vec::new(),
            connection_state: ConnectionState::Disconnected,
            connected_device: None,
        };
        let painter = Painter::new(false);
        let rendered = StatusView::new(&view, &painter).to_string();
        assert!(rendered.contains("logged in"));
        assert!(rendered.contains("disconnected"));
    }
}
