use std::io;

use anyhow::Result;
use tracing::instrument;

use crate::cli::OutputFormat;
use crate::cli::command::ScanArgs;
use crate::session::{DiscoveryEvent, SessionController};
use crate::terminal::TerminalClient;

use super::ui::{DeviceListView, Painter, Spinner};

/// Executes the `scan` command: runs one full discovery session and prints
/// the deduplicated result set.
#[instrument(skip(controller, args, out, terminal_client), level = "info", fields(?output_format))]
pub(crate) async fn run<W>(
    controller: &mut SessionController,
    args: &ScanArgs,
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

    let spinner = Spinner::new(terminal_client.stderr_is_terminal()).start("Scanning…");
    let outcome = pump_scan(controller, &spinner, args.chooser).await;
    spinner.finish();
    outcome?;

    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(out, "{}", DeviceListView::new(controller.devices(), &painter))?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &controller.view())?;
            writeln!(out)?;
        }
    }
    Ok(())
}

async fn pump_scan(
    controller: &mut SessionController,
    spinner: &super::ui::SpinnerHandle,
    single_shot: bool,
) -> Result<()> {
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                controller.cancel_scan().await;
                return Ok(());
            }
            event = controller.next_discovery_event() => match event {
                None | Some(DiscoveryEvent::ScanComplete) => return Ok(()),
                Some(DiscoveryEvent::DeviceObserved(_)) => {
                    // A chooser-gated scan resolves with its one answer.
                    if single_shot {
                        controller.cancel_scan().await;
                        return Ok(());
                    }
                    spinner.update(format!(
                        "Scanning… {} device(s)",
                        controller.devices().len()
                    ));
                }
                Some(DiscoveryEvent::ScanFailed(source)) => {
                    return Err(crate::error::SessionError::ScanFailed { source }.into());
                }
            },
        }
    }
}
