use thiserror::Error;

/// Errors raised by a transport adapter while scanning or connecting.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("BLE operation failed")]
    Ble(#[from] btleplug::Error),
    #[error("no BLE adapters were found")]
    NoAdapters,
    #[error("device `{device_id}` is no longer visible to the adapter")]
    DeviceVanished { device_id: String },
    #[error("service enumeration failed after the link was established")]
    ServiceEnumeration { source: btleplug::Error },
    #[error("the fake transport was configured to fail `{operation}`")]
    InjectedFailure { operation: &'static str },
    #[error(transparent)]
    Fixture(#[from] FixtureError),
}

/// Errors returned by the authentication collaborator.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("login request failed")]
    Request(#[from] reqwest::Error),
    #[error("login was rejected with HTTP status {status}")]
    Rejected { status: u16 },
    #[error("login response did not contain an access token")]
    MalformedResponse,
}

/// Errors returned by the credential-storage collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed while reading or writing the credential store")]
    Io {
        #[source]
        source: std::io::Error,
    },
    #[error("no usable credential-store directory was found")]
    NoStoreDirectory,
}

/// Session-level errors surfaced to rendering collaborators.
///
/// Every variant leaves the owning component in a well-defined state; none is
/// fatal and none triggers an automatic retry.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("bluetooth permissions were denied")]
    PermissionDenied,
    #[error("scanning is not supported on this platform")]
    ScanUnsupported,
    #[error("the device scan failed")]
    ScanFailed {
        #[source]
        source: TransportError,
    },
    #[error("connecting to the device failed")]
    ConnectionFailed {
        #[source]
        source: TransportError,
    },
    #[error("the device did not acknowledge disconnection")]
    DisconnectFailed {
        #[source]
        source: TransportError,
    },
    #[error("authentication failed")]
    AuthenticationFailed {
        #[source]
        source: AuthError,
    },
    #[error("the credential store failed")]
    StorageFailed {
        #[source]
        source: StorageError,
    },
}

/// Errors returned when parsing fake scan fixtures.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("the fake discovery fixture is empty")]
    EmptyFixture,
    #[error("fixture records must contain four pipe-delimited fields")]
    InvalidRecordFieldCount,
    #[error("fixture records cannot contain an empty device id")]
    EmptyDeviceId,
    #[error("failed to parse RSSI value")]
    InvalidRssi(#[from] std::num::ParseIntError),
}

/// Errors returned when validating runtime backend options.
#[derive(Debug, Error)]
pub(crate) enum CliConfigError {
    #[error("missing fake scan fixture while fake mode is enabled")]
    MissingFakeScanFixture,
    #[error("the login command requires `--auth-url`")]
    MissingAuthUrl,
}

/// Errors returned by telemetry initialisation.
#[derive(Debug, Error)]
pub(crate) enum TelemetryError {
    #[error("failed to install tracing subscriber")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}
