use std::io;

use anyhow::Result;
use tracing::{instrument, warn};

use crate::cli::OutputFormat;
use crate::cli::command::LoginArgs;
use crate::error::SessionError;
use crate::session::SessionController;
use crate::terminal::TerminalClient;

use super::ui::{Painter, StatusView};

/// Executes the `login` command.
#[instrument(skip(controller, args, out), level = "info")]
pub(crate) async fn login<W>(
    controller: &mut SessionController,
    args: &LoginArgs,
    out: &mut W,
) -> Result<()>
where
    W: io::Write,
{
    if controller.is_logged_in() {
        writeln!(out, "Already logged in.")?;
        return Ok(());
    }

    controller.login(&args.email, &args.password).await?;
    writeln!(out, "Logged in as {}.", args.email)?;
    Ok(())
}

/// Executes the `logout` command.
#[instrument(skip(controller, out), level = "info")]
pub(crate) async fn logout<W>(controller: &mut SessionController, out: &mut W) -> Result<()>
where
    W: io::Write,
{
    if !controller.is_logged_in() {
        writeln!(out, "Not logged in.")?;
        return Ok(());
    }

    match controller.logout().await {
        Ok(()) => writeln!(out, "Logged out.")?,
        // Local logout already happened; the stored credential is stale.
        Err(error @ SessionError::StorageFailed { .. }) => {
            warn!(?error, "stored credential could not be removed");
            writeln!(out, "Logged out; stored credential could not be removed.")?;
        }
        Err(error) => return Err(error.into()),
    }
    Ok(())
}

/// Executes the `status` command.
#[instrument(skip(controller, out, terminal_client), level = "info", fields(?output_format))]
pub(crate) fn status<W>(
    controller: &SessionController,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let view = controller.view();
    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(out, "{}", StatusView::new(&view, &painter))?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &view)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
