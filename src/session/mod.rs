mod connection;
mod controller;
mod discovery;

pub use self::connection::{ConnectionManager, ConnectionState};
pub use self::controller::{AuthSession, ConnectedDeviceView, SessionController, SessionView};
pub use self::discovery::{
    DiscoveryEvent, DiscoverySession, DiscoveryState, SCAN_WINDOW,
};
