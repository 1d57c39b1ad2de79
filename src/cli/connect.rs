use std::io;

use anyhow::{Result, bail};
use serde::Serialize;
use tracing::instrument;

use crate::cli::OutputFormat;
use crate::cli::command::ConnectArgs;
use crate::session::{DiscoveryEvent, SessionController};
use crate::terminal::TerminalClient;
use crate::transport::{DiscoveredDevice, ServiceInfo};

use super::ui::{Painter, ServiceListView, Spinner};

/// JSON payload for a completed `connect` run.
#[derive(Serialize)]
struct ConnectReport<'a> {
    device_id: &'a str,
    display_name: Option<&'a str>,
    services: &'a [ServiceInfo],
}

/// Executes the `connect` command: scans until a device matches, connects,
/// lists the enumerated services and disconnects.
#[instrument(skip(controller, args, out, terminal_client), level = "info", fields(?output_format))]
pub(crate) async fn run<W>(
    controller: &mut SessionController,
    args: &ConnectArgs,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    if !controller.is_logged_in() {
        writeln!(out, "Not logged in; run `blelink login` first.")?;
        return Ok(());
    }

    controller.scan().await?;

    let spinner = Spinner::new(terminal_client.stderr_is_terminal());
    let search = spinner.start(&format!("Looking for {}…", args.device));
    let found = find_device(controller, &args.device).await;
    search.finish();

    let Some(device) = found? else {
        bail!("no device matching \"{}\" was discovered", args.device);
    };

    spinner
        .with_spinner("Connecting…", || controller.connect(&device))
        .await?;

    render(controller, &device, out, terminal_client, output_format)?;

    controller.disconnect().await?;
    if output_format == OutputFormat::Pretty {
        writeln!(out, "Disconnected.")?;
    }
    Ok(())
}

/// Pumps discovery events until the query matches or the window closes.
async fn find_device(
    controller: &mut SessionController,
    query: &str,
) -> Result<Option<DiscoveredDevice>> {
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                controller.cancel_scan().await;
                return Ok(None);
            }
            event = controller.next_discovery_event() => match event {
                None | Some(DiscoveryEvent::ScanComplete) => return Ok(None),
                Some(DiscoveryEvent::DeviceObserved(device)) => {
                    if matches_query(query, &device) {
                        controller.cancel_scan().await;
                        return Ok(Some(device));
                    }
                }
                Some(DiscoveryEvent::ScanFailed(source)) => {
                    return Err(crate::error::SessionError::ScanFailed { source }.into());
                }
            },
        }
    }
}

/// A device matches on its exact id or on a case-insensitive name prefix.
fn matches_query(query: &str, device: &DiscoveredDevice) -> bool {
    if device.id() == query {
        return true;
    }
    device.display_name().is_some_and(|name| {
        name.to_lowercase().starts_with(&query.to_lowercase())
    })
}

fn render<W>(
    controller: &SessionController,
    device: &DiscoveredDevice,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let services = controller.connected_services().unwrap_or_default();
    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(
                out,
                "{}",
                painter.heading(format!(
                    "Connected to {} ({})",
                    device.display_name().unwrap_or("Unknown"),
                    device.id()
                ))
            )?;
            writeln!(out, "{}", ServiceListView::new(services, &painter))?;
        }
        OutputFormat::Json => {
            let report = ConnectReport {
                device_id: device.id(),
                display_name: device.display_name(),
                services,
            };
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn device(id: &str, name: Option<&str>) -> DiscoveredDevice {
        DiscoveredDevice::new(id.to_string(), name.map(str::to_string), Some(-40), None)
    }

    #[test]
    fn exact_id_matches() {
        assert_eq!(matches_query("AA:BB", &device("AA:BB", None)), true);
    }

    #[test]
    fn name_prefix_matches_case_insensitively() {
        assert_eq!(matches_query("sensor", &device("AA:BB", Some("Sensor Tag"))), true);
    }

    #[test]
    fn unrelated_device_does_not_match() {
        assert_eq!(matches_query("sensor", &device("AA:BB", Some("Beacon"))), false);
    }
}
