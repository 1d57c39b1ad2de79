use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::instrument;

use crate::auth::{
    ACCESS_TOKEN_KEY, AuthClient, CredentialStore, FileCredentialStore, HttpAuthClient,
    MemoryCredentialStore,
};
use crate::cli::picker::TerminalChooser;
use crate::cli::{Args, Command, FakeArgs, LogLevel, OutputFormat};
use crate::error::{CliConfigError, SessionError};
use crate::session::SessionController;
use crate::telemetry;
use crate::terminal::{SystemTerminalClient, TerminalClient};
use crate::transport::{
    ChooserAdapter, FakeAdapter, PermissionGate, PermissionOutcome, StreamingAdapter,
    SystemCapabilityPrompt, TransportAdapter,
};

/// Runs parsed CLI arguments against the system terminal.
///
/// ```
/// # async fn demo() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// let args = blelink::Args::try_parse_from([
///     "blelink",
///     "--fake",
///     "--fake-scan",
///     "AA:BB:CC|Sensor Tag|-43|-",
///     "--fake-token",
///     "T1",
///     "status",
/// ])?;
/// let mut out = Vec::new();
/// blelink::run(args, &mut out).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, BLE interaction fails,
/// or output writing fails.
pub async fn run<W>(args: Args, out: &mut W) -> Result<()>
where
    W: io::Write,
{
    run_with_clients(args, out, &SystemTerminalClient).await
}

/// Runs parsed CLI arguments with an injected terminal client.
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, BLE interaction fails,
/// or output writing fails.
pub async fn run_with_clients<W>(
    args: Args,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
) -> Result<()>
where
    W: io::Write,
{
    let log_level = args.log_level();
    telemetry::initialise_tracing(
        "blelink",
        terminal_client.stderr_is_terminal(),
        log_level.map(LogLevel::as_level_filter),
    )?;

    let output_format = args
        .output_format()
        .unwrap_or(if terminal_client.stdout_is_terminal() {
            OutputFormat::Pretty
        } else {
            OutputFormat::Json
        });
    let fake_token = args.fake_token().map(str::to_string);
    let (command, maybe_fake_args) = args.into_command_and_fake_args()?;

    let mut controller = match maybe_fake_args {
        Some(fake_args) => fake_session_controller(&command, fake_args, fake_token.as_deref())?,
        None => real_session_controller(&command).await?,
    };
    if let Some(window) = requested_scan_window(&command) {
        controller = controller.with_scan_window(window);
    }
    controller.restore();

    dispatch(command, &mut controller, out, terminal_client, output_format).await
}

/// Runs one command against an already-built controller.
///
/// # Errors
///
/// Returns an error if BLE interaction fails or output writing fails.
#[instrument(
    skip(controller, out, terminal_client),
    level = "info",
    fields(command = %command_name(&command), ?output_format)
)]
pub async fn dispatch<W>(
    command: Command,
    controller: &mut SessionController,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    match command {
        Command::Login(args) => crate::cli::account::login(controller, &args, out).await,
        Command::Logout => crate::cli::account::logout(controller, out).await,
        Command::Status => crate::cli::account::status(controller, out, terminal_client, output_format),
        Command::Scan(args) => {
            crate::cli::scan::run(controller, &args, out, terminal_client, output_format).await
        }
        Command::Connect(args) => {
            crate::cli::connect::run(controller, &args, out, terminal_client, output_format).await
        }
    }
}

/// Builds a controller over the fixture-driven fake transport.
///
/// # Errors
///
/// Returns an error if the command needs configuration it did not get.
pub fn fake_session_controller(
    command: &Command,
    fake_args: FakeArgs,
    fake_token: Option<&str>,
) -> Result<SessionController> {
    let adapter: Arc<dyn TransportAdapter> =
        Arc::new(FakeAdapter::new(fake_args.into_adapter_config()));
    let credential_store: Box<dyn CredentialStore> = match fake_token {
        Some(token) => Box::new(MemoryCredentialStore::with_entry(ACCESS_TOKEN_KEY, token)),
        None => Box::new(MemoryCredentialStore::new()),
    };
    Ok(SessionController::new(
        adapter,
        PermissionGate::feature_check(true),
        auth_client_for(command)?,
        credential_store,
    ))
}

/// Builds a controller over the system Bluetooth radio.
///
/// # Errors
///
/// Returns an error if no usable adapter is present, the credential store
/// directory cannot be resolved, or the command needs configuration it did
/// not get.
pub async fn real_session_controller(command: &Command) -> Result<SessionController> {
    let (adapter, permission_gate): (Arc<dyn TransportAdapter>, PermissionGate) =
        if wants_chooser(command) {
            // The feature check must answer before the radio is opened, so
            // a host without one reports a denial rather than an open error.
            let gate = checked_chooser_gate(ChooserAdapter::is_available().await).await?;
            let adapter = ChooserAdapter::open(Arc::new(TerminalChooser)).await?;
            (Arc::new(adapter), gate)
        } else {
            let adapter = StreamingAdapter::open().await?;
            (
                Arc::new(adapter),
                PermissionGate::prompt(Box::new(SystemCapabilityPrompt)),
            )
        };
    let credential_store: Box<dyn CredentialStore> = Box::new(FileCredentialStore::open()?);
    Ok(SessionController::new(
        adapter,
        permission_gate,
        auth_client_for(command)?,
        credential_store,
    ))
}

/// Resolves the chooser feature check into a gate, refusing up front when
/// the host has no radio to offer.
async fn checked_chooser_gate(available: bool) -> Result<PermissionGate, SessionError> {
    let gate = PermissionGate::feature_check(available);
    match gate
        .request_capabilities()
        .await
        .map_err(|source| SessionError::ScanFailed { source })?
    {
        PermissionOutcome::Granted => Ok(gate),
        PermissionOutcome::Denied => Err(SessionError::PermissionDenied),
    }
}

fn auth_client_for(command: &Command) -> Result<Box<dyn AuthClient>, CliConfigError> {
    let login_url = match command {
        Command::Login(args) => args
            .auth_url
            .clone()
            .ok_or(CliConfigError::MissingAuthUrl)?,
        // Only `login` talks to the endpoint; no other command dials out.
        _ => String::new(),
    };
    Ok(Box::new(HttpAuthClient::new(login_url)))
}

fn wants_chooser(command: &Command) -> bool {
    matches!(command, Command::Scan(args) if args.chooser)
}

fn requested_scan_window(command: &Command) -> Option<Duration> {
    match command {
        Command::Scan(args) => args.duration,
        Command::Connect(args) => args.duration,
        Command::Login(_) | Command::Logout | Command::Status => None,
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Login(_) => "login",
        Command::Logout => "logout",
        Command::Status => "status",
        Command::Scan(_) => "scan",
        Command::Connect(_) => "connect",
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn chooser_gate_passes_when_a_radio_is_available() {
        let gate = checked_chooser_gate(true)
            .await
            .expect("an available radio should pass the feature check");
        assert_matches!(
            gate.request_capabilities().await,
            Ok(PermissionOutcome::Granted)
        );
    }

    #[tokio::test]
    async fn chooser_gate_denies_before_any_radio_is_opened() {
        let result = checked_chooser_gate(false).await;
        assert_matches!(result, Err(SessionError::PermissionDenied));
    }
}
