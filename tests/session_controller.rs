use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use pretty_assertions::assert_eq;

use blelink::{
    ACCESS_TOKEN_KEY, AuthClient, AuthError, Capability, CapabilityGrant, CapabilityPrompt,
    ConnectionState, CredentialStore, DiscoveredDevice, DiscoveryEvent, FakeAdapter,
    FakeAdapterConfig, FakeAdapterCounters, FakeChooserPick, FakeFailure, MemoryCredentialStore,
    PermissionGate, SessionController, SessionError, StorageError, TransportError,
};

struct StaticAuthClient {
    token: &'static str,
}

#[async_trait]
impl AuthClient for StaticAuthClient {
    async fn login(&self, _email: &str, _password: &str) -> Result<String, AuthError> {
        Ok(self.token.to_string())
    }
}

struct RejectingAuthClient;

#[async_trait]
impl AuthClient for RejectingAuthClient {
    async fn login(&self, _email: &str, _password: &str) -> Result<String, AuthError> {
        Err(AuthError::Rejected { status: 401 })
    }
}

/// Store whose entries stay observable after the controller takes ownership.
struct SharedStore(Arc<MemoryCredentialStore>);

impl CredentialStore for SharedStore {
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.0.set(key, value)
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.0.get(key)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.0.delete(key)
    }
}

/// Store that refuses deletion, for the logout failure path.
struct FailingDeleteStore(MemoryCredentialStore);

impl CredentialStore for FailingDeleteStore {
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.0.set(key, value)
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.0.get(key)
    }

    fn delete(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Io {
            source: std::io::Error::other("store is read-only"),
        })
    }
}

fn fixture_config(fixture: &str) -> FakeAdapterConfig {
    FakeAdapterConfig::builder()
        .scan_fixture(fixture.parse().expect("fixture should parse"))
        .build()
}

fn logged_in_controller(config: FakeAdapterConfig) -> (SessionController, Arc<FakeAdapterCounters>) {
    let adapter = FakeAdapter::new(config);
    let counters = adapter.counters();
    let mut controller = SessionController::new(
        Arc::new(adapter),
        PermissionGate::feature_check(true),
        Box::new(StaticAuthClient { token: "T1" }),
        Box::new(MemoryCredentialStore::with_entry(ACCESS_TOKEN_KEY, "T1")),
    );
    assert!(controller.restore());
    (controller, counters)
}

async fn pump_to_completion(controller: &mut SessionController) {
    loop {
        match controller.next_discovery_event().await {
            None | Some(DiscoveryEvent::ScanComplete) => return,
            Some(DiscoveryEvent::DeviceObserved(_)) => {}
            Some(DiscoveryEvent::ScanFailed(error)) => {
                panic!("scan failed unexpectedly: {error}")
            }
        }
    }
}

fn device(id: &str, name: &str) -> DiscoveredDevice {
    DiscoveredDevice::new(id.to_string(), Some(name.to_string()), Some(-40), None)
}

#[tokio::test]
async fn login_stores_the_token_and_transitions_to_logged_in() {
    let store = Arc::new(MemoryCredentialStore::new());
    let mut controller = SessionController::new(
        Arc::new(FakeAdapter::new(fixture_config("AA|HRM|-40|-"))),
        PermissionGate::feature_check(true),
        Box::new(StaticAuthClient { token: "T1" }),
        Box::new(SharedStore(Arc::clone(&store))),
    );

    controller
        .login("user@example.com", "hunter2")
        .await
        .expect("login should succeed");

    assert!(controller.is_logged_in());
    assert_eq!(
        Some("T1".to_string()),
        store.get(ACCESS_TOKEN_KEY).expect("store should read")
    );
}

#[tokio::test]
async fn rejected_login_stays_logged_out() {
    let mut controller = SessionController::new(
        Arc::new(FakeAdapter::new(fixture_config("AA|HRM|-40|-"))),
        PermissionGate::feature_check(true),
        Box::new(RejectingAuthClient),
        Box::new(MemoryCredentialStore::new()),
    );

    let result = controller.login("user@example.com", "wrong").await;

    assert_matches!(result, Err(SessionError::AuthenticationFailed { .. }));
    assert!(!controller.is_logged_in());
}

#[tokio::test]
async fn restore_recovers_a_stored_credential() {
    let (controller, _counters) = logged_in_controller(fixture_config("AA|HRM|-40|-"));
    assert!(controller.is_logged_in());

    let mut fresh = SessionController::new(
        Arc::new(FakeAdapter::new(fixture_config("AA|HRM|-40|-"))),
        PermissionGate::feature_check(true),
        Box::new(StaticAuthClient { token: "T1" }),
        Box::new(MemoryCredentialStore::new()),
    );
    assert!(!fresh.restore());
    assert!(!fresh.is_logged_in());
}

#[tokio::test(start_paused = true)]
async fn scan_dedupes_devices_by_id() {
    let (mut controller, _counters) = logged_in_controller(fixture_config(
        "AA|First|-40|-;BB|Other|-50|-;AA|Renamed|-45|-",
    ));

    controller.scan().await.expect("scan should start");
    pump_to_completion(&mut controller).await;

    let devices = controller.devices();
    assert_eq!(2, devices.len());
    assert_eq!("AA", devices[0].id());
    assert_eq!(Some("Renamed"), devices[0].name());
    assert_eq!(Some(-45), devices[0].rssi());
    assert_eq!("BB", devices[1].id());
}

#[tokio::test(start_paused = true)]
async fn scan_window_expires_exactly_once() {
    let (mut controller, counters) = logged_in_controller(fixture_config("AA|HRM|-40|-"));
    let started = tokio::time::Instant::now();

    controller.scan().await.expect("scan should start");
    pump_to_completion(&mut controller).await;

    assert!(started.elapsed() >= Duration::from_secs(120));
    assert!(!controller.is_scanning());
    assert_eq!(1, counters.stop_scan_calls());
}

#[tokio::test(start_paused = true)]
async fn starting_a_scan_twice_runs_a_single_scan() {
    let (mut controller, counters) = logged_in_controller(fixture_config("AA|HRM|-40|-"));

    controller.scan().await.expect("scan should start");
    let first = controller.next_discovery_event().await;
    assert_matches!(first, Some(DiscoveryEvent::DeviceObserved(_)));

    // Re-entry while scanning must not restart discovery or drop results.
    controller.scan().await.expect("second scan is a no-op");
    assert_eq!(1, controller.devices().len());

    pump_to_completion(&mut controller).await;
    assert_eq!(1, controller.devices().len());
    assert_eq!(1, counters.stop_scan_calls());
}

#[tokio::test]
async fn partially_denied_permissions_block_scanning() {
    struct LocationDeniedPrompt;

    #[async_trait]
    impl CapabilityPrompt for LocationDeniedPrompt {
        async fn request(
            &self,
            capabilities: &[Capability],
        ) -> Result<Vec<CapabilityGrant>, TransportError> {
            Ok(capabilities
                .iter()
                .map(|capability| CapabilityGrant {
                    capability: *capability,
                    granted: *capability != Capability::Location,
                })
                .collect())
        }
    }

    let adapter = FakeAdapter::new(fixture_config("AA|HRM|-40|-"));
    let counters = adapter.counters();
    let mut controller = SessionController::new(
        Arc::new(adapter),
        PermissionGate::prompt(Box::new(LocationDeniedPrompt)),
        Box::new(StaticAuthClient { token: "T1" }),
        Box::new(MemoryCredentialStore::with_entry(ACCESS_TOKEN_KEY, "T1")),
    );
    assert!(controller.restore());

    let result = controller.scan().await;

    assert_matches!(result, Err(SessionError::PermissionDenied));
    assert!(!controller.is_scanning());
    assert_eq!(0, counters.stop_scan_calls());
}

#[tokio::test]
async fn connecting_elsewhere_tears_down_the_previous_connection() {
    let (mut controller, counters) =
        logged_in_controller(fixture_config("AA|First|-40|-;BB|Other|-50|-"));

    controller
        .connect(&device("AA", "First"))
        .await
        .expect("first connect should succeed");
    assert_eq!(ConnectionState::Connected, controller.connection_state());

    controller
        .connect(&device("BB", "Other"))
        .await
        .expect("second connect should succeed");

    // The old link must be torn down before the replacement comes up.
    assert_eq!(vec!["connect", "disconnect", "connect"], counters.operations());
    let view = controller.view();
    let connected = view.connected_device.expect("a device should be connected");
    assert_eq!("BB", connected.device_id);
}

#[tokio::test]
async fn enumeration_failure_leaves_no_partial_connection() {
    let config = FakeAdapterConfig::builder()
        .scan_fixture("AA|HRM|-40|-".parse().expect("fixture should parse"))
        .failures(vec![FakeFailure::Enumeration])
        .build();
    let (mut controller, _counters) = logged_in_controller(config);

    let result = controller.connect(&device("AA", "HRM")).await;

    assert_matches!(result, Err(SessionError::ConnectionFailed { .. }));
    assert_eq!(ConnectionState::Disconnected, controller.connection_state());
    assert!(controller.connected_services().is_none());
}

#[tokio::test]
async fn unacknowledged_teardown_still_lands_disconnected() {
    let config = FakeAdapterConfig::builder()
        .scan_fixture("AA|HRM|-40|-".parse().expect("fixture should parse"))
        .failures(vec![FakeFailure::Disconnect])
        .build();
    let (mut controller, counters) = logged_in_controller(config);

    controller
        .connect(&device("AA", "HRM"))
        .await
        .expect("connect should succeed");
    assert_eq!(ConnectionState::Connected, controller.connection_state());

    let result = controller.disconnect().await;

    // The error is soft: the handle is gone and the state already settled.
    assert_matches!(result, Err(SessionError::DisconnectFailed { .. }));
    assert_eq!(ConnectionState::Disconnected, controller.connection_state());
    assert!(controller.view().connected_device.is_none());
    assert!(controller.connected_services().is_none());
    assert_eq!(1, counters.disconnect_calls());
}

#[tokio::test]
async fn disconnect_without_a_connection_is_a_no_op() {
    let (mut controller, counters) = logged_in_controller(fixture_config("AA|HRM|-40|-"));

    controller
        .disconnect()
        .await
        .expect("idle disconnect should succeed");

    assert_eq!(0, counters.disconnect_calls());
    assert_eq!(ConnectionState::Disconnected, controller.connection_state());
}

#[tokio::test(start_paused = true)]
async fn logout_tears_everything_down_even_when_deletion_fails() {
    let adapter = FakeAdapter::new(fixture_config("AA|HRM|-40|-"));
    let counters = adapter.counters();
    let store = FailingDeleteStore(MemoryCredentialStore::with_entry(ACCESS_TOKEN_KEY, "T1"));
    let mut controller = SessionController::new(
        Arc::new(adapter),
        PermissionGate::feature_check(true),
        Box::new(StaticAuthClient { token: "T1" }),
        Box::new(store),
    );
    assert!(controller.restore());

    controller.scan().await.expect("scan should start");
    pump_to_completion(&mut controller).await;
    assert_eq!(1, controller.devices().len());
    controller
        .connect(&device("AA", "HRM"))
        .await
        .expect("connect should succeed");

    let result = controller.logout().await;

    assert_matches!(result, Err(SessionError::StorageFailed { .. }));
    let view = controller.view();
    assert!(!view.logged_in);
    assert!(view.devices.is_empty());
    assert_eq!(ConnectionState::Disconnected, view.connection_state);
    assert_eq!(1, counters.disconnect_calls());
}

#[tokio::test(start_paused = true)]
async fn dismissed_chooser_completes_with_no_devices() {
    let config = FakeAdapterConfig::builder()
        .scan_fixture("AA|HRM|-40|-".parse().expect("fixture should parse"))
        .chooser_pick(FakeChooserPick::Cancel)
        .build();
    let (mut controller, _counters) = logged_in_controller(config);

    controller.scan().await.expect("scan should start");
    let event = controller.next_discovery_event().await;

    assert_matches!(event, Some(DiscoveryEvent::ScanComplete));
    assert!(controller.devices().is_empty());
    assert!(!controller.is_scanning());
}

#[tokio::test(start_paused = true)]
async fn chosen_device_is_the_only_observation() {
    let config = FakeAdapterConfig::builder()
        .scan_fixture(
            "AA|First|-40|-;BB|Other|-50|-"
                .parse()
                .expect("fixture should parse"),
        )
        .chooser_pick(FakeChooserPick::Device(1))
        .build();
    let (mut controller, _counters) = logged_in_controller(config);

    controller.scan().await.expect("scan should start");
    pump_to_completion(&mut controller).await;

    assert_eq!(1, controller.devices().len());
    assert_eq!("BB", controller.devices()[0].id());
}

#[tokio::test]
async fn operations_while_logged_out_are_ignored() {
    let adapter = FakeAdapter::new(fixture_config("AA|HRM|-40|-"));
    let counters = adapter.counters();
    let mut controller = SessionController::new(
        Arc::new(adapter),
        PermissionGate::feature_check(true),
        Box::new(StaticAuthClient { token: "T1" }),
        Box::new(MemoryCredentialStore::new()),
    );

    controller.scan().await.expect("scan is a logged-out no-op");
    assert!(!controller.is_scanning());

    controller
        .connect(&device("AA", "HRM"))
        .await
        .expect("connect is a logged-out no-op");
    assert_eq!(ConnectionState::Disconnected, controller.connection_state());
    assert_eq!(0, counters.connect_calls());
}

#[tokio::test(start_paused = true)]
async fn failed_scan_leaves_the_session_idle() {
    let config = FakeAdapterConfig::builder()
        .scan_fixture("AA|HRM|-40|-".parse().expect("fixture should parse"))
        .failures(vec![FakeFailure::Scan])
        .build();
    let (mut controller, counters) = logged_in_controller(config);

    controller.scan().await.expect("scan starts before failing");
    let event = controller.next_discovery_event().await;

    assert_matches!(
        event,
        Some(DiscoveryEvent::ScanFailed(TransportError::InjectedFailure { .. }))
    );
    assert!(!controller.is_scanning());
    assert_eq!(1, counters.stop_scan_calls());

    // The session recovers: a later scan starts cleanly.
    controller.scan().await.expect("scan starts before failing");
    let event = controller.next_discovery_event().await;
    assert_matches!(event, Some(DiscoveryEvent::ScanFailed(_)));
}
