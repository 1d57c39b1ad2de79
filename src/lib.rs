mod app;
mod auth;
mod cli;
mod error;
mod session;
mod telemetry;
mod terminal;
mod transport;
mod utils;

pub use app::{dispatch, fake_session_controller, real_session_controller, run, run_with_clients};
pub use auth::{
    ACCESS_TOKEN_KEY, AuthClient, CredentialStore, FileCredentialStore, HttpAuthClient,
    MemoryCredentialStore,
};
pub use cli::{
    Args, Command, ConnectArgs, FakeArgs, FakeFailureArg, LogLevel, LoginArgs, OutputFormat,
    ScanArgs,
};
pub use error::{AuthError, FixtureError, SessionError, StorageError, TransportError};
pub use session::{
    AuthSession, ConnectedDeviceView, ConnectionManager, ConnectionState, DiscoveryEvent,
    DiscoverySession, DiscoveryState, SCAN_WINDOW, SessionController, SessionView,
};
pub use terminal::TerminalClient;
pub use transport::{
    Capability, CapabilityGrant, CapabilityPrompt, CharacteristicInfo, ChooserAdapter,
    ConnectionHandle, DeviceChooser, DiscoveredDevice, FakeAdapter, FakeAdapterConfig,
    FakeAdapterCounters, FakeChooserPick, FakeFailure, PermissionGate, PermissionOutcome,
    ScanEvent, ScanFixture, ServiceInfo, StreamingAdapter, SystemCapabilityPrompt,
    TransportAdapter,
};
