/// Formats an optional RSSI for terminal output.
pub(crate) fn format_rssi(rssi: Option<i16>) -> String {
    match rssi {
        Some(value) => value.to_string(),
        None => "-".to_string(),
    }
}

/// Formats an optional name for terminal output, flagging nameless devices.
pub(crate) fn format_device_name(name: Option<&str>) -> String {
    match name {
        Some(value) => value.to_string(),
        None => "Unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn format_rssi_handles_unknown() {
        assert_eq!("-", format_rssi(None));
        assert_eq!("-43", format_rssi(Some(-43)));
    }

    #[test]
    fn nameless_devices_render_as_unknown() {
        assert_eq!("Unknown", format_device_name(None));
        assert_eq!("HRM", format_device_name(Some("HRM")));
    }
}
