use std::time::Duration;

use bon::Builder;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::filter::LevelFilter;

use crate::error::CliConfigError;
use crate::transport::{FakeAdapterConfig, FakeChooserPick, FakeFailure, ScanFixture};

/// Command-line options for the BLE session tool.
#[derive(Debug, Parser)]
#[command(
    name = "blelink",
    about = "Discover, connect to and disconnect nearby BLE peripherals."
)]
pub struct Args {
    /// Uses the fake transport with fixture-driven discovery.
    #[arg(long, global = true)]
    fake: bool,
    /// Fake scan fixtures in the form `device_id|name|rssi|local_name;...`.
    #[arg(long, global = true, requires = "fake", required_if_eq("fake", "true"))]
    fake_scan: Option<ScanFixture>,
    /// Artificial fake discovery delay (e.g. `250ms`, `2s`).
    #[arg(long, global = true, requires = "fake", value_parser = parse_duration)]
    fake_discovery_delay: Option<Duration>,
    /// Simulates a chooser backend picking the fixture device at this index.
    #[arg(long, global = true, requires = "fake")]
    fake_chooser_pick: Option<usize>,
    /// Simulates a chooser backend the user dismisses.
    #[arg(long, global = true, requires = "fake", conflicts_with = "fake_chooser_pick")]
    fake_chooser_cancel: bool,
    /// Fake operations that fail (repeatable).
    #[arg(long, global = true, requires = "fake", value_enum)]
    fake_fail: Vec<FakeFailureArg>,
    /// Seeds the in-memory credential store so fake runs start logged in.
    #[arg(long, global = true, requires = "fake")]
    fake_token: Option<String>,
    /// Telemetry log-level override.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
    /// Output format; defaults to pretty on terminals, JSON otherwise.
    #[arg(long, global = true, value_enum)]
    output: Option<OutputFormat>,
    #[command(subcommand)]
    command: Command,
}

impl Args {
    /// Returns the telemetry log-level override, if any.
    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    /// Returns the requested output format, if any.
    #[must_use]
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output
    }

    /// Returns the fake-mode credential seed, if any.
    #[must_use]
    pub fn fake_token(&self) -> Option<&str> {
        self.fake_token.as_deref()
    }

    /// Splits parsed CLI arguments into command and optional fake settings.
    ///
    /// # Errors
    ///
    /// Returns an error if CLI backend configuration is invalid.
    pub fn into_command_and_fake_args(self) -> anyhow::Result<(Command, Option<FakeArgs>)> {
        if !self.fake {
            return Ok((self.command, None));
        }
        let scan_fixture = self
            .fake_scan
            .ok_or(CliConfigError::MissingFakeScanFixture)?;

        let chooser_pick = if self.fake_chooser_cancel {
            Some(FakeChooserPick::Cancel)
        } else {
            self.fake_chooser_pick.map(FakeChooserPick::Device)
        };

        let fake_args = FakeArgs::builder()
            .scan_fixture(scan_fixture)
            .discovery_delay(self.fake_discovery_delay.unwrap_or_default())
            .maybe_chooser_pick(chooser_pick)
            .failures(self.fake_fail.iter().map(FakeFailureArg::as_failure).collect())
            .build();
        Ok((self.command, Some(fake_args)))
    }
}

/// Pre-validated settings for the fake transport.
#[derive(Debug, Builder)]
pub struct FakeArgs {
    scan_fixture: ScanFixture,
    #[builder(default)]
    discovery_delay: Duration,
    chooser_pick: Option<FakeChooserPick>,
    #[builder(default)]
    failures: Vec<FakeFailure>,
}

impl FakeArgs {
    /// Converts CLI fake settings into an adapter configuration.
    #[must_use]
    pub fn into_adapter_config(self) -> FakeAdapterConfig {
        FakeAdapterConfig::builder()
            .scan_fixture(self.scan_fixture)
            .discovery_delay(self.discovery_delay)
            .maybe_chooser_pick(self.chooser_pick)
            .failures(self.failures)
            .build()
    }
}

/// Fake operation failures selectable from the CLI.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum FakeFailureArg {
    Scan,
    Link,
    Enumeration,
    Disconnect,
}

impl FakeFailureArg {
    fn as_failure(&self) -> FakeFailure {
        match self {
            Self::Scan => FakeFailure::Scan,
            Self::Link => FakeFailure::Link,
            Self::Enumeration => FakeFailure::Enumeration,
            Self::Disconnect => FakeFailure::Disconnect,
        }
    }
}

/// User intents, one subcommand per rendering-collaborator action.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Logs in against the authentication endpoint and stores the token.
    Login(LoginArgs),
    /// Logs out, tearing down any connection and deleting the stored token.
    Logout,
    /// Shows the current session snapshot.
    Status,
    /// Scans for nearby peripherals.
    Scan(ScanArgs),
    /// Scans until a device matches, then connects and lists its services.
    Connect(ConnectArgs),
}

#[derive(Debug, clap::Args)]
pub struct LoginArgs {
    /// Account email address.
    #[arg(long)]
    pub email: String,
    /// Account password.
    #[arg(long)]
    pub password: String,
    /// Login endpoint URL.
    #[arg(long)]
    pub auth_url: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct ScanArgs {
    /// Scan duration (e.g. `30s`, `2m`); defaults to the 2-minute window.
    #[arg(long, value_parser = parse_duration)]
    pub duration: Option<Duration>,
    /// Uses the chooser-gated backend instead of streaming discovery.
    #[arg(long)]
    pub chooser: bool,
}

#[derive(Debug, clap::Args)]
pub struct ConnectArgs {
    /// Device id, or a display-name prefix, to connect to.
    pub device: String,
    /// How long to keep looking for the device before giving up.
    #[arg(long, value_parser = parse_duration)]
    pub duration: Option<Duration>,
}

/// Telemetry log levels selectable from the CLI.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub(crate) fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

/// Output formats for command results.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|error| error.to_string())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn fake_mode_requires_a_scan_fixture() {
        let result = Args::try_parse_from(["blelink", "--fake", "status"]);
        assert!(result.is_err());
    }

    #[test]
    fn fake_args_carry_the_chooser_script() {
        let args = Args::try_parse_from([
            "blelink",
            "--fake",
            "--fake-scan",
            "AA:BB|HRM|-43|-",
            "--fake-chooser-pick",
            "0",
            "scan",
            "--chooser",
        ])
        .expect("arguments should parse");

        let (command, fake_args) = args
            .into_command_and_fake_args()
            .expect("fake settings should validate");
        assert_matches!(command, Command::Scan(ScanArgs { chooser: true, .. }));
        let fake_args = fake_args.expect("fake mode should yield settings");
        assert_eq!(Some(FakeChooserPick::Device(0)), fake_args.chooser_pick);
    }

    #[test]
    fn scan_duration_parses_humantime() {
        let args =
            Args::try_parse_from(["blelink", "scan", "--duration", "30s"]).expect("should parse");
        let (command, _) = args.into_command_and_fake_args().expect("no fake settings");
        assert_matches!(
            command,
            Command::Scan(ScanArgs { duration: Some(duration), .. })
            if duration == Duration::from_secs(30)
        );
    }
}
