//! Adapter over the native OS location manager.
//!
//! The native service has no handshake, so `connect()` completes
//! synchronously. Location listeners are wrapped in [`NativeBridge`]s,
//! one per caller listener id, and subscribed on the provider that best
//! matches the request criteria (or the synthetic mock provider while
//! mock mode is on).

use std::sync::Arc;

use parking_lot::Mutex;

use super::{ConnectionState, ProviderAdapter};
use crate::backend::{LocationManager, NativeLocationListener, ProviderProperties};
use crate::environment::Environment;
use crate::error::HubError;
use crate::listener::{ConnectionHandle, Extras, FailureHandle, ListenerId, LocationHandle};
use crate::location::{Location, MOCK_PROVIDER};
use crate::registry::Registry;
use crate::request::{AccuracyRequirement, Criteria, LocationRequest, PowerRequirement, millis};

const MOCK_PROPERTIES: ProviderProperties = ProviderProperties {
    power: PowerRequirement::Low,
    accuracy: AccuracyRequirement::Fine,
};

/// Native listener wrapping one caller listener.
///
/// Records every fix in the adapter's cache before forwarding it.
struct NativeBridge {
    listener: LocationHandle,
    request: LocationRequest,
    last: Arc<Mutex<Option<Location>>>,
}

impl NativeLocationListener for NativeBridge {
    fn on_location_changed(&self, location: &Location) {
        *self.last.lock() = Some(location.clone());
        self.listener.on_location_changed(location);
    }

    fn on_provider_disabled(&self, provider: &str) {
        tracing::debug!(provider, listener = %self.listener.id(), "provider disabled");
    }
}

#[derive(Default)]
struct NativeState {
    env: Option<Environment>,
    extras: Option<Extras>,
    connection: ConnectionState,
    /// Provider used by the most recent subscription or refresh.
    provider: Option<String>,
    mock: bool,
}

/// Adapter over a [`LocationManager`].
pub struct NativeAdapter {
    manager: Arc<dyn LocationManager>,
    state: Mutex<NativeState>,
    last: Arc<Mutex<Option<Location>>>,
    connections: Registry<ConnectionHandle>,
    failures: Registry<FailureHandle>,
    locations: Registry<Arc<NativeBridge>>,
}

impl NativeAdapter {
    pub const NAME: &'static str = "native";

    pub fn new(manager: Arc<dyn LocationManager>) -> Self {
        Self {
            manager,
            state: Mutex::new(NativeState::default()),
            last: Arc::new(Mutex::new(None)),
            connections: Registry::new(),
            failures: Registry::new(),
            locations: Registry::new(),
        }
    }

    /// Whether mock mode is currently on.
    pub fn is_mock_mode(&self) -> bool {
        self.state.lock().mock
    }

    /// Number of live location subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.locations.len()
    }

    /// Provider a request maps to: the mock provider in mock mode, the
    /// best enabled match otherwise.
    fn resolve_provider(&self, criteria: &Criteria) -> Result<String, HubError> {
        if self.state.lock().mock {
            return Ok(MOCK_PROVIDER.to_string());
        }
        self.manager
            .best_provider(criteria, true)
            .ok_or(HubError::NoProviderAvailable)
    }

    fn subscribe(&self, provider: &str, bridge: &Arc<NativeBridge>) -> Result<(), HubError> {
        let native: Arc<dyn NativeLocationListener> = bridge.clone();
        self.manager.request_location_updates(
            provider,
            millis(bridge.request.interval()),
            bridge.request.smallest_displacement(),
            native,
        )?;
        Ok(())
    }

    fn unsubscribe(&self, bridge: &Arc<NativeBridge>) {
        let native: Arc<dyn NativeLocationListener> = bridge.clone();
        self.manager.remove_updates(&native);
    }

    /// Move every live subscription to the provider its request now
    /// resolves to. Called when mock mode flips.
    fn resubscribe_all(&self) {
        for bridge in self.locations.snapshot() {
            let provider = match self.resolve_provider(&bridge.request.criteria()) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(listener = %bridge.listener.id(), error = %e, "dropping subscription");
                    self.unsubscribe(&bridge);
                    self.locations.remove(bridge.listener.id());
                    continue;
                }
            };
            if let Err(e) = self.subscribe(&provider, &bridge) {
                tracing::warn!(listener = %bridge.listener.id(), provider = %provider, error = %e, "resubscribe failed");
            }
        }
    }

    /// Refresh the cached fix from the active provider, picking a
    /// low-power provider first when none is active yet.
    fn refresh_location(&self) -> Option<Location> {
        let provider = {
            let mut state = self.state.lock();
            if state.provider.is_none() {
                state.provider = self.manager.best_provider(&Criteria::low_power(), true);
            }
            state.provider.clone()
        };

        let fresh = provider.and_then(|p| self.manager.last_known_location(&p));
        let mut last = self.last.lock();
        if let Some(fix) = fresh {
            *last = Some(fix);
        }
        last.clone()
    }

    fn install_mock_provider(&self) -> Result<(), HubError> {
        if !self.manager.has_provider(MOCK_PROVIDER) {
            self.manager.add_test_provider(MOCK_PROVIDER, MOCK_PROPERTIES);
        }
        self.manager.set_test_provider_enabled(MOCK_PROVIDER, true)?;
        Ok(())
    }

    fn remove_mock_provider(&self) -> Result<(), HubError> {
        if self.manager.has_provider(MOCK_PROVIDER) {
            self.manager.set_test_provider_enabled(MOCK_PROVIDER, false)?;
            self.manager.remove_test_provider(MOCK_PROVIDER)?;
        }
        Ok(())
    }
}

impl ProviderAdapter for NativeAdapter {
    fn setup(
        &self,
        env: &Environment,
        callbacks: Option<ConnectionHandle>,
        failure: Option<FailureHandle>,
        extras: Option<Extras>,
    ) -> Result<(), HubError> {
        {
            let mut state = self.state.lock();
            state.env = Some(env.clone());
            state.extras = extras;
        }
        if let Some(callbacks) = callbacks {
            self.register_connection_callbacks(&callbacks);
        }
        if let Some(failure) = failure {
            self.register_connection_failed_listener(&failure);
        }
        Ok(())
    }

    fn is_service_available(&self, _env: &Environment) -> bool {
        true
    }

    fn adapter_name(&self) -> &str {
        Self::NAME
    }

    fn connect(&self) -> Result<(), HubError> {
        let extras = {
            let mut state = self.state.lock();
            if state.env.is_none() {
                return Err(HubError::NotSetUp);
            }
            if state.connection == ConnectionState::Connected {
                return Ok(());
            }
            state.connection = ConnectionState::Connecting;
            // No handshake: the native service is ready immediately.
            state.connection = ConnectionState::Connected;
            state.extras.clone()
        };
        tracing::info!(adapter = Self::NAME, "connected");

        for callbacks in self.connections.snapshot() {
            callbacks.on_connected(extras.as_ref());
        }
        self.refresh_location();
        Ok(())
    }

    fn disconnect(&self) {
        self.state.lock().connection = ConnectionState::Disconnected;

        let drained = self.locations.drain();
        for (_, bridge) in &drained {
            self.unsubscribe(bridge);
        }
        tracing::info!(adapter = Self::NAME, removed = drained.len(), "disconnected");

        for callbacks in self.connections.snapshot() {
            callbacks.on_disconnected();
        }
    }

    fn last_location(&self) -> Option<Location> {
        self.refresh_location()
    }

    fn connection_state(&self) -> ConnectionState {
        self.state.lock().connection
    }

    fn register_connection_callbacks(&self, callbacks: &ConnectionHandle) {
        if self
            .connections
            .insert_if_absent(callbacks.id(), || callbacks.clone())
            .is_some()
        {
            tracing::debug!(listener = %callbacks.id(), "connection callbacks registered");
        }

        let connected = {
            let state = self.state.lock();
            (state.connection == ConnectionState::Connected).then(|| state.extras.clone())
        };
        if let Some(extras) = connected {
            callbacks.on_connected(extras.as_ref());
        }
    }

    fn unregister_connection_callbacks(&self, id: ListenerId) {
        if self.connections.remove(id).is_some() {
            tracing::debug!(listener = %id, "connection callbacks unregistered");
        }
    }

    fn is_connection_callbacks_registered(&self, id: ListenerId) -> bool {
        self.connections.contains(id)
    }

    fn register_connection_failed_listener(&self, listener: &FailureHandle) {
        if self
            .failures
            .insert_if_absent(listener.id(), || listener.clone())
            .is_some()
        {
            tracing::debug!(listener = %listener.id(), "failure listener registered");
        }
    }

    fn unregister_connection_failed_listener(&self, id: ListenerId) {
        if self.failures.remove(id).is_some() {
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
            // Turning mock mode off needs no permission.
            if enabled {
                let env = state.env.as_ref().ok_or(HubError::NotSetUp)?;
                env.check_mock_allowed()?;
            }
        }

        if enabled {
            self.install_mock_provider()?;
            let mut state = self.state.lock();
            state.mock = true;
            state.provider = Some(MOCK_PROVIDER.to_string());
        } else {
            {
                let mut state = self.state.lock();
                state.mock = false;
                state.provider = None;
            }
            self.remove_mock_provider()?;
        }
        tracing::info!(adapter = Self::NAME, enabled, "mock mode changed");

        self.resubscribe_all();
        Ok(())
    }

    fn set_mock_location(&self, mut location: Location) -> Result<(), HubError> {
        if !self.state.lock().mock {
            return Err(HubError::SecurityViolation(
                "mock mode is disabled; enable it before setting a mock location".into(),
            ));
        }
        location.provider = MOCK_PROVIDER.to_string();
        self.manager.set_test_provider_location(MOCK_PROVIDER, location)?;
        Ok(())
    }

    fn request_location_updates(
        &self,
        request: &LocationRequest,
        listener: &LocationHandle,
    ) -> Result<(), HubError> {
        let provider = self.resolve_provider(&request.criteria())?;
        let bridge = Arc::new(NativeBridge {
            listener: listener.clone(),
            request: request.clone(),
            last: Arc::clone(&self.last),
        });

        // An earlier subscription for this id stays live until the new one is in.
        if let Err(e) = self.subscribe(&provider, &bridge) {
            tracing::warn!(provider = %provider, error = %e, "location subscription refused");
            return Err(e);
        }
        self.state.lock().provider = Some(provider.clone());
        if let Some(old) = self.locations.replace(listener.id(), bridge) {
            self.unsubscribe(&old);
        }
        tracing::debug!(listener = %listener.id(), provider = %provider, "location updates requested");
        Ok(())
    }

    fn remove_location_updates(&self, id: ListenerId) {
        if let Some(bridge) = self.locations.remove(id) {
            self.unsubscribe(&bridge);
            tracing::debug!(listener = %id, "location updates removed");
        }
    }
}
