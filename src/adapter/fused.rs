//! Adapter over the proprietary fused location client.
//!
//! Unlike the native manager, the fused client connects asynchronously:
//! `connect()` only starts the handshake, and the outcome arrives on the
//! client's own thread. Connection events reach the client through one
//! internal listener that fans them out to caller callbacks. Failure and
//! location handles are wrapped once per id and the bridge is what the
//! client sees.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{ConnectionState, ProviderAdapter};
use crate::backend::{
    FusedConnectionListener, FusedFailureListener, FusedLocationClient, FusedLocationListener,
    FusedRequest, FusedStatus,
};
use crate::environment::Environment;
use crate::error::HubError;
use crate::listener::{
    ConnectionHandle, ConnectionResult, Extras, FailureHandle, ListenerId, LocationHandle,
};
use crate::location::{Location, MOCK_PROVIDER};
use crate::registry::Registry;
use crate::request::{LocationRequest, Priority, millis};

/// Translate a fused status into the caller-facing failure reason.
pub fn connection_result(status: &FusedStatus) -> ConnectionResult {
    match status.code {
        FusedStatus::SERVICE_MISSING => ConnectionResult::ServiceMissing,
        FusedStatus::SERVICE_DISABLED => ConnectionResult::ServiceDisabled,
        FusedStatus::SERVICE_VERSION_UPDATE_REQUIRED => ConnectionResult::ServiceUpdateRequired,
        FusedStatus::NETWORK_ERROR => ConnectionResult::NetworkError,
        code => ConnectionResult::Internal(
            status
                .message
                .clone()
                .unwrap_or_else(|| format!("status code {code}")),
        ),
    }
}

/// Map a hub request onto the fused request shape.
///
/// An unset priority falls back to balanced, the fused service default.
pub fn fused_request(request: &LocationRequest) -> FusedRequest {
    FusedRequest {
        priority: request
            .priority()
            .unwrap_or(Priority::BalancedPowerAccuracy),
        interval: millis(request.interval()),
        fastest_interval: millis(request.fastest_interval()),
        smallest_displacement: request.smallest_displacement(),
    }
}

// -- Bridges --

struct FailureBridge(FailureHandle);

impl FusedFailureListener for FailureBridge {
    fn on_connection_failed(&self, status: &FusedStatus) {
        self.0.on_connection_failed(&connection_result(status));
    }
}

struct LocationBridge {
    listener: LocationHandle,
    last: Arc<Mutex<Option<Location>>>,
}

impl FusedLocationListener for LocationBridge {
    fn on_location_changed(&self, location: &Location) {
        *self.last.lock() = Some(location.clone());
        self.listener.on_location_changed(location);
    }
}

/// Last connection event seen from the client.
enum Session {
    Down,
    Up(Option<Extras>),
}

/// The one connection listener the adapter registers with the client.
///
/// Fans connection events out to the caller callbacks and keeps the
/// hint of the live session so late registrations can replay it. The
/// client drops every subscription when the service goes away, so the
/// location registry is drained here too.
struct Lifecycle {
    session: Mutex<Session>,
    connections: Registry<ConnectionHandle>,
    locations: Registry<Arc<LocationBridge>>,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            session: Mutex::new(Session::Down),
            connections: Registry::new(),
            locations: Registry::new(),
        }
    }

    /// Add `callbacks` and replay `on_connected` if a session is up.
    ///
    /// Insertion and the session read share the session lock, so a
    /// handshake completing concurrently is delivered exactly once.
    fn register(&self, callbacks: &ConnectionHandle) {
        let replay = {
            let session = self.session.lock();
            if self
                .connections
                .insert_if_absent(callbacks.id(), || callbacks.clone())
                .is_some()
            {
                tracing::debug!(listener = %callbacks.id(), "connection callbacks registered");
            }
            match &*session {
                Session::Up(hint) => Some(hint.clone()),
                Session::Down => None,
            }
        };
        if let Some(hint) = replay {
            callbacks.on_connected(hint.as_ref());
        }
    }

    /// Mark the session down and tell every caller.
    fn notify_disconnected(&self) {
        let callbacks = {
            let mut session = self.session.lock();
            *session = Session::Down;
            self.connections.snapshot()
        };
        for callbacks in callbacks {
            callbacks.on_disconnected();
        }
    }
}

impl FusedConnectionListener for Lifecycle {
    fn on_connected(&self, hint: Option<&Extras>) {
        let callbacks = {
            let mut session = self.session.lock();
            *session = Session::Up(hint.cloned());
            self.connections.snapshot()
        };
        tracing::info!(adapter = FusedAdapter::NAME, "connected");
        for callbacks in callbacks {
            callbacks.on_connected(hint);
        }
    }

    fn on_disconnected(&self) {
        let dropped = self.locations.drain().len();
        tracing::info!(adapter = FusedAdapter::NAME, dropped, "service disconnected");
        self.notify_disconnected();
    }
}

#[derive(Default)]
struct FusedState {
    env: Option<Environment>,
    /// Whether the lifecycle listener is registered with the client.
    listening: bool,
    /// Set only once the client has accepted the change.
    mock: bool,
}

/// Adapter over a [`FusedLocationClient`].
pub struct FusedAdapter {
    client: Arc<dyn FusedLocationClient>,
    state: Mutex<FusedState>,
    last: Arc<Mutex<Option<Location>>>,
    lifecycle: Arc<Lifecycle>,
    failures: Registry<Arc<FailureBridge>>,
}

impl FusedAdapter {
    pub const NAME: &'static str = "fused";

    pub fn new(client: Arc<dyn FusedLocationClient>) -> Self {
        Self {
            client,
            state: Mutex::new(FusedState::default()),
            last: Arc::new(Mutex::new(None)),
            lifecycle: Arc::new(Lifecycle::new()),
            failures: Registry::new(),
        }
    }

    /// Whether mock mode is currently on.
    pub fn is_mock_mode(&self) -> bool {
        self.state.lock().mock
    }

    /// Number of live location subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.lifecycle.locations.len()
    }

    fn unsubscribe(&self, bridge: &Arc<LocationBridge>) {
        let fused: Arc<dyn FusedLocationListener> = bridge.clone();
        self.client.remove_location_updates(&fused);
    }
}

impl ProviderAdapter for FusedAdapter {
    fn setup(
        &self,
        env: &Environment,
        callbacks: Option<ConnectionHandle>,
        failure: Option<FailureHandle>,
        _extras: Option<Extras>,
    ) -> Result<(), HubError> {
        let first = {
            let mut state = self.state.lock();
            state.env = Some(env.clone());
            !std::mem::replace(&mut state.listening, true)
        };
        if first {
            let lifecycle: Arc<dyn FusedConnectionListener> = self.lifecycle.clone();
            self.client.register_connection_listener(lifecycle);
        }

        if let Some(callbacks) = callbacks {
            self.register_connection_callbacks(&callbacks);
        }
        if let Some(failure) = failure {
            self.register_connection_failed_listener(&failure);
        }
        Ok(())
    }

    fn is_service_available(&self, env: &Environment) -> bool {
        self.client.is_available(env)
    }

    fn adapter_name(&self) -> &str {
        Self::NAME
    }

    fn connect(&self) -> Result<(), HubError> {
        if self.state.lock().env.is_none() {
            return Err(HubError::NotSetUp);
        }
        tracing::debug!(adapter = Self::NAME, "starting handshake");
        self.client.connect();
        Ok(())
    }

    fn disconnect(&self) {
        let drained = self.lifecycle.locations.drain();
        for (_, bridge) in &drained {
            self.unsubscribe(bridge);
        }
        self.client.disconnect();
        tracing::info!(adapter = Self::NAME, removed = drained.len(), "disconnected");

        // The client stays silent on an explicit disconnect.
        self.lifecycle.notify_disconnected();
    }

    fn last_location(&self) -> Option<Location> {
        let fresh = self.client.last_location();
        let mut last = self.last.lock();
        if let Some(fix) = fresh {
            *last = Some(fix);
        }
        last.clone()
    }

    fn connection_state(&self) -> ConnectionState {
        self.client.connection_state()
    }

    fn register_connection_callbacks(&self, callbacks: &ConnectionHandle) {
        self.lifecycle.register(callbacks);
    }

    fn unregister_connection_callbacks(&self, id: ListenerId) {
        if self.lifecycle.connections.remove(id).is_some() {
            tracing::debug!(listener = %id, "connection callbacks unregistered");
        }
    }

    fn is_connection_callbacks_registered(&self, id: ListenerId) -> bool {
        self.lifecycle.connections.contains(id)
    }

    fn register_connection_failed_listener(&self, listener: &FailureHandle) {
        if let Some(bridge) = self
            .failures
            .insert_if_absent(listener.id(), || Arc::new(FailureBridge(listener.clone())))
        {
            self.client.register_failure_listener(bridge);
            tracing::debug!(listener = %listener.id(), "failure listener registered");
        }
    }

    fn unregister_connection_failed_listener(&self, id: ListenerId) {
        if let Some(bridge) = self.failures.remove(id) {
            let fused: Arc<dyn FusedFailureListener> = bridge;
            self.client.unregister_failure_listener(&fused);
            tracing::debug!(listener = %id, "failure listener unregistered");
        }
    }

    fn is_connection_failed_listener_registered(&self, id: ListenerId) -> bool {
        self.failures.contains(id)
    }

    fn set_mock_mode(&self, enabled: bool) -> Result<(), HubError> {
        {
            let state = self.state.lock();
            if state.mock == enabled {
                return Ok(());
            }
            if enabled {
                let env = state.env.as_ref().ok_or(HubError::NotSetUp)?;
                env.check_mock_allowed()?;
            }
        }
        if let Err(e) = self.client.set_mock_mode(enabled) {
            tracing::warn!(adapter = Self::NAME, error = %e, "mock mode refused");
            return Err(e.into());
        }
        self.state.lock().mock = enabled;
        tracing::info!(adapter = Self::NAME, enabled, "mock mode changed");
        Ok(())
    }

    fn set_mock_location(&self, mut location: Location) -> Result<(), HubError> {
        if !self.state.lock().mock {
            return Err(HubError::SecurityViolation(
                "mock mode is disabled; enable it before setting a mock location".into(),
            ));
        }
        location.provider = MOCK_PROVIDER.to_string();
        self.client.set_mock_location(location)?;
        Ok(())
    }

    fn request_location_updates(
        &self,
        request: &LocationRequest,
        listener: &LocationHandle,
    ) -> Result<(), HubError> {
        let bridge = Arc::new(LocationBridge {
            listener: listener.clone(),
            last: Arc::clone(&self.last),
        });
        let fused: Arc<dyn FusedLocationListener> = bridge.clone();
        if let Err(e) = self
            .client
            .request_location_updates(&fused_request(request), fused)
        {
            tracing::warn!(adapter = Self::NAME, error = %e, "location subscription refused");
            return Err(e.into());
        }
        if let Some(old) = self.lifecycle.locations.replace(listener.id(), bridge) {
            self.unsubscribe(&old);
        }
        tracing::debug!(listener = %listener.id(), "location updates requested");
        Ok(())
    }

    fn remove_location_updates(&self, id: ListenerId) {
        if let Some(bridge) = self.lifecycle.locations.remove(id) {
            self.unsubscribe(&bridge);
            tracing::debug!(listener = %id, "location updates removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sim::{FusedClientConfig, Handshake, SimulatedFusedClient};
    use crate::environment::FUSED_SERVICE;
    use crate::events::{HubEvent, event_channel};
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    fn adapter(handshake: Handshake) -> (Arc<SimulatedFusedClient>, FusedAdapter) {
        let client = Arc::new(SimulatedFusedClient::new(FusedClientConfig {
            handshake,
            connection_hint: None,
        }));
        let adapter = FusedAdapter::new(client.clone());
        (client, adapter)
    }

    // -- Mapping --

    #[test]
    fn status_codes_translate() {
        let cases = [
            (FusedStatus::SERVICE_MISSING, ConnectionResult::ServiceMissing),
            (FusedStatus::SERVICE_DISABLED, ConnectionResult::ServiceDisabled),
            (
                FusedStatus::SERVICE_VERSION_UPDATE_REQUIRED,
                ConnectionResult::ServiceUpdateRequired,
            ),
            (FusedStatus::NETWORK_ERROR, ConnectionResult::NetworkError),
        ];
        for (code, expected) in cases {
            assert_eq!(connection_result(&FusedStatus::new(code)), expected);
        }
        assert_eq!(
            connection_result(&FusedStatus::new(99)),
            ConnectionResult::Internal("status code 99".into())
        );
    }

    #[test]
    fn request_maps_through_unchanged() {
        let mut request = LocationRequest::new();
        request
            .set_priority(Priority::LowPower)
            .set_interval(6000)
            .unwrap()
            .set_fastest_interval(1000)
            .unwrap()
            .set_smallest_displacement(2.5)
            .unwrap();
        let mapped = fused_request(&request);
        assert_eq!(mapped.priority, Priority::LowPower);
        assert_eq!(mapped.interval, Duration::from_millis(6000));
        assert_eq!(mapped.fastest_interval, Duration::from_millis(1000));
        assert_eq!(mapped.smallest_displacement, 2.5);
    }

    #[test]
    fn unset_priority_defaults_to_balanced() {
        assert_eq!(
            fused_request(&LocationRequest::new()).priority,
            Priority::BalancedPowerAccuracy
        );
    }

    // -- Connection lifecycle --

    #[test]
    fn availability_asks_the_client() {
        let (_, a) = adapter(Handshake::Immediate);
        assert!(!a.is_service_available(&Environment::new()));
        assert!(a.is_service_available(&Environment::new().with_service(FUSED_SERVICE)));
        assert_eq!(a.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn connect_before_setup_fails() {
        let (_, a) = adapter(Handshake::Immediate);
        assert_eq!(a.connect(), Err(HubError::NotSetUp));
    }

    #[tokio::test]
    async fn connect_completes_asynchronously() {
        let (_, a) = adapter(Handshake::Delayed(Duration::from_millis(50)));
        let (sink, mut events) = event_channel();
        a.setup(&Environment::new(), Some(sink.connection_handle()), None, None)
            .unwrap();

        a.connect().unwrap();
        assert_eq!(a.connection_state(), ConnectionState::Connecting);
        assert!(events.try_recv().is_none());

        let event = timeout(WAIT, events.recv()).await.unwrap();
        assert_eq!(event, Some(HubEvent::Connected(None)));
        assert!(a.is_connected());
    }

    #[tokio::test]
    async fn handshake_failure_reaches_failure_listener() {
        let (_, a) = adapter(Handshake::Fail(FusedStatus::new(FusedStatus::SERVICE_DISABLED)));
        let (sink, mut events) = event_channel();
        a.setup(
            &Environment::new(),
            Some(sink.connection_handle()),
            Some(sink.failure_handle()),
            None,
        )
        .unwrap();
        a.connect().unwrap();

        let event = timeout(WAIT, events.recv()).await.unwrap();
        assert_eq!(
            event,
            Some(HubEvent::ConnectionFailed(ConnectionResult::ServiceDisabled))
        );
        assert_eq!(a.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn registration_is_idempotent_at_the_client() {
        let (client, a) = adapter(Handshake::Immediate);
        let (sink, mut events) = event_channel();
        let handle = sink.connection_handle();
        a.setup(&Environment::new(), Some(handle.clone()), None, None)
            .unwrap();
        a.setup(&Environment::new(), Some(handle.clone()), None, None)
            .unwrap();
        a.register_connection_callbacks(&handle);
        // Only the lifecycle listener reaches the client.
        assert_eq!(client.connection_listener_count(), 1);

        a.connect().unwrap();
        assert_eq!(
            timeout(WAIT, events.recv()).await.unwrap(),
            Some(HubEvent::Connected(None))
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(events.try_recv().is_none());

        a.unregister_connection_callbacks(handle.id());
        assert_eq!(client.connection_listener_count(), 1);
        assert!(!a.is_connection_callbacks_registered(handle.id()));
    }

    #[tokio::test]
    async fn late_registration_fires_synchronously() {
        let (_, a) = adapter(Handshake::Immediate);
        let (sink, mut events) = event_channel();
        a.setup(&Environment::new(), Some(sink.connection_handle()), None, None)
            .unwrap();
        a.connect().unwrap();
        timeout(WAIT, events.recv()).await.unwrap();

        let (late, mut late_events) = event_channel();
        a.register_connection_callbacks(&late.connection_handle());
        assert_eq!(late_events.try_recv(), Some(HubEvent::Connected(None)));
    }

    #[tokio::test]
    async fn late_registration_replays_the_connection_hint() {
        let hint = Extras::from([("session".to_string(), "42".to_string())]);
        let client = Arc::new(SimulatedFusedClient::new(FusedClientConfig {
            handshake: Handshake::Immediate,
            connection_hint: Some(hint.clone()),
        }));
        let a = FusedAdapter::new(client);
        let (sink, mut events) = event_channel();
        a.setup(&Environment::new(), Some(sink.connection_handle()), None, None)
            .unwrap();
        a.connect().unwrap();
        assert_eq!(
            timeout(WAIT, events.recv()).await.unwrap(),
            Some(HubEvent::Connected(Some(hint.clone())))
        );

        let (late, mut late_events) = event_channel();
        a.register_connection_callbacks(&late.connection_handle());
        assert_eq!(late_events.try_recv(), Some(HubEvent::Connected(Some(hint))));
    }

    #[tokio::test]
    async fn registration_racing_the_handshake_connects_once() {
        let (_, a) = adapter(Handshake::Immediate);
        a.setup(&Environment::new(), None, None, None).unwrap();
        a.connect().unwrap();

        let streams: Vec<_> = (0..32)
            .map(|_| {
                let (sink, events) = event_channel();
                a.register_connection_callbacks(&sink.connection_handle());
                (sink, events)
            })
            .collect();

        for (_, mut events) in streams {
            assert_eq!(
                timeout(WAIT, events.recv()).await.unwrap(),
                Some(HubEvent::Connected(None))
            );
            tokio::time::sleep(Duration::from_millis(1)).await;
            assert!(events.try_recv().is_none());
        }
    }

    #[tokio::test]
    async fn registration_after_disconnect_does_not_replay() {
        let (_, a) = adapter(Handshake::Immediate);
        let (sink, mut events) = event_channel();
        a.setup(&Environment::new(), Some(sink.connection_handle()), None, None)
            .unwrap();
        a.connect().unwrap();
        timeout(WAIT, events.recv()).await.unwrap();
        a.disconnect();

        let (late, mut late_events) = event_channel();
        a.register_connection_callbacks(&late.connection_handle());
        assert!(late_events.try_recv().is_none());
    }

    #[tokio::test]
    async fn explicit_disconnect_notifies_and_clears() {
        let (client, a) = adapter(Handshake::Immediate);
        let (sink, mut events) = event_channel();
        a.setup(&Environment::new(), Some(sink.connection_handle()), None, None)
            .unwrap();
        a.connect().unwrap();
        timeout(WAIT, events.recv()).await.unwrap();

        a.request_location_updates(&LocationRequest::new(), &sink.location_handle())
            .unwrap();
        assert_eq!(client.subscription_count(), 1);

        a.disconnect();
        assert_eq!(events.try_recv(), Some(HubEvent::Disconnected));
        assert_eq!(client.subscription_count(), 0);
        assert_eq!(a.subscription_count(), 0);
    }

    #[tokio::test]
    async fn service_death_clears_registry() {
        let (client, a) = adapter(Handshake::Immediate);
        let (sink, mut events) = event_channel();
        a.setup(&Environment::new(), Some(sink.connection_handle()), None, None)
            .unwrap();
        a.connect().unwrap();
        timeout(WAIT, events.recv()).await.unwrap();
        a.request_location_updates(&LocationRequest::new(), &sink.location_handle())
            .unwrap();

        client.simulate_service_death();
        assert_eq!(events.try_recv(), Some(HubEvent::Disconnected));
        assert_eq!(a.subscription_count(), 0);
    }

    #[test]
    fn failure_listeners_bridge_once() {
        let (client, a) = adapter(Handshake::Immediate);
        let (sink, _events) = event_channel();
        let failure = sink.failure_handle();
        a.register_connection_failed_listener(&failure);
        a.register_connection_failed_listener(&failure.clone());
        assert_eq!(client.failure_listener_count(), 1);
        assert!(a.is_connection_failed_listener_registered(failure.id()));

        a.unregister_connection_failed_listener(failure.id());
        a.unregister_connection_failed_listener(failure.id());
        assert_eq!(client.failure_listener_count(), 0);
    }

    // -- Location updates --

    #[tokio::test]
    async fn rerequest_replaces_client_subscription() {
        let (client, a) = adapter(Handshake::Immediate);
        let (sink, mut events) = event_channel();
        a.setup(&Environment::new(), Some(sink.connection_handle()), None, None)
            .unwrap();
        a.connect().unwrap();
        timeout(WAIT, events.recv()).await.unwrap();

        let listener = sink.location_handle();
        a.request_location_updates(&LocationRequest::new(), &listener)
            .unwrap();
        let mut precise = LocationRequest::new();
        precise.set_priority(Priority::HighAccuracy);
        a.request_location_updates(&precise, &listener).unwrap();

        assert_eq!(client.subscribed_priorities(), vec![Priority::HighAccuracy]);
        a.remove_location_updates(listener.id());
        assert_eq!(client.subscription_count(), 0);
    }

    #[test]
    fn request_while_disconnected_fails_cleanly() {
        let (_, a) = adapter(Handshake::Immediate);
        let (sink, _events) = event_channel();
        assert_eq!(
            a.request_location_updates(&LocationRequest::new(), &sink.location_handle()),
            Err(HubError::NotConnected)
        );
        assert_eq!(a.subscription_count(), 0);
    }

    #[tokio::test]
    async fn mock_fix_flows_to_listener_and_cache() {
        let (_, a) = adapter(Handshake::Immediate);
        let (sink, mut events) = event_channel();
        a.setup(
            &Environment::permissive(),
            Some(sink.connection_handle()),
            None,
            None,
        )
        .unwrap();
        a.connect().unwrap();
        timeout(WAIT, events.recv()).await.unwrap();

        a.set_mock_mode(true).unwrap();
        a.request_location_updates(&LocationRequest::new(), &sink.location_handle())
            .unwrap();
        a.set_mock_location(Location::new("gps", 0.0, 0.0)).unwrap();

        let Some(HubEvent::LocationChanged(fix)) = timeout(WAIT, events.recv()).await.unwrap()
        else {
            panic!("expected a location event");
        };
        assert!(fix.is_mock());
        assert_eq!(a.last_location(), Some(fix.clone()));

        a.disconnect();
        assert_eq!(a.last_location(), Some(fix));
    }

    #[tokio::test]
    async fn mock_location_rejected_without_mock_mode() {
        let (_, a) = adapter(Handshake::Immediate);
        let (sink, mut events) = event_channel();
        a.setup(
            &Environment::permissive(),
            Some(sink.connection_handle()),
            None,
            None,
        )
        .unwrap();
        a.connect().unwrap();
        timeout(WAIT, events.recv()).await.unwrap();

        assert!(matches!(
            a.set_mock_location(Location::mock(1.0, 1.0)),
            Err(HubError::SecurityViolation(_))
        ));
        assert_eq!(a.last_location(), None);
    }

    #[test]
    fn mock_location_while_disconnected_is_a_security_violation() {
        let (_, a) = adapter(Handshake::Immediate);
        a.setup(&Environment::permissive(), None, None, None).unwrap();
        assert!(matches!(
            a.set_mock_location(Location::mock(1.0, 1.0)),
            Err(HubError::SecurityViolation(_))
        ));
    }

    #[test]
    fn disabling_mock_mode_needs_no_setup_or_permission() {
        let (_, a) = adapter(Handshake::Immediate);
        assert_eq!(a.set_mock_mode(false), Ok(()));
        a.setup(&Environment::new(), None, None, None).unwrap();
        assert_eq!(a.set_mock_mode(false), Ok(()));
        assert!(!a.is_mock_mode());
    }

    #[tokio::test]
    async fn mock_mode_toggles_idempotently_and_real_fixes_resume() {
        let (client, a) = adapter(Handshake::Immediate);
        let (sink, mut events) = event_channel();
        a.setup(
            &Environment::permissive(),
            Some(sink.connection_handle()),
            None,
            None,
        )
        .unwrap();
        a.connect().unwrap();
        timeout(WAIT, events.recv()).await.unwrap();
        a.request_location_updates(&LocationRequest::new(), &sink.location_handle())
            .unwrap();

        a.set_mock_mode(true).unwrap();
        a.set_mock_mode(true).unwrap();
        assert!(a.is_mock_mode());
        // Real fixes are suppressed while mocking.
        client.push_location(Location::new("gps", 5.0, 5.0));
        assert!(events.try_recv().is_none());

        a.set_mock_mode(false).unwrap();
        a.set_mock_mode(false).unwrap();
        assert!(!a.is_mock_mode());
        assert!(matches!(
            a.set_mock_location(Location::mock(1.0, 1.0)),
            Err(HubError::SecurityViolation(_))
        ));

        client.push_location(Location::new("gps", 6.0, 6.0));
        let Some(HubEvent::LocationChanged(fix)) = events.try_recv() else {
            panic!("expected a real fix after disabling mock mode");
        };
        assert_eq!(fix.provider, "gps");
        assert!(!fix.is_mock());
        assert_eq!(a.last_location(), Some(fix));
    }

    #[test]
    fn refused_mock_mode_leaves_it_off() {
        let (_, a) = adapter(Handshake::Immediate);
        a.setup(&Environment::permissive(), None, None, None).unwrap();
        assert_eq!(a.set_mock_mode(true), Err(HubError::NotConnected));
        assert!(!a.is_mock_mode());
    }

    #[test]
    fn mock_mode_checks_environment_first() {
        let (_, a) = adapter(Handshake::Immediate);
        a.setup(&Environment::new(), None, None, None).unwrap();
        assert!(matches!(
            a.set_mock_mode(true),
            Err(HubError::SecurityViolation(_))
        ));
    }
}
