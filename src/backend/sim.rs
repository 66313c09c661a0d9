//! In-process simulated backends.
//!
//! [`SimulatedLocationManager`] behaves like a native location manager
//! with a fixed provider table. [`SimulatedFusedClient`] behaves like the
//! proprietary fused client, including an asynchronous connection
//! handshake completed on a background thread. Both deliver fixes
//! synchronously on the thread that pushes them.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{
    BackendError, FusedConnectionListener, FusedFailureListener, FusedLocationClient,
    FusedLocationListener, FusedRequest, FusedStatus, LocationManager, NativeLocationListener,
    ProviderProperties, same_listener,
};
use crate::adapter::ConnectionState;
use crate::environment::{Environment, FUSED_SERVICE};
use crate::listener::Extras;
use crate::location::Location;
use crate::request::{AccuracyRequirement, Criteria, PowerRequirement, Priority};

pub const GPS_PROVIDER: &str = "gps";
pub const NETWORK_PROVIDER: &str = "network";
pub const PASSIVE_PROVIDER: &str = "passive";

// -- Native location manager --

#[derive(Debug)]
struct SimProvider {
    properties: ProviderProperties,
    enabled: bool,
    test: bool,
    last: Option<Location>,
}

struct Subscription {
    provider: String,
    min_distance: f32,
    listener: Arc<dyn NativeLocationListener>,
    last_delivered: Option<Location>,
}

#[derive(Default)]
struct ManagerState {
    providers: BTreeMap<String, SimProvider>,
    subscriptions: Vec<Subscription>,
}

/// Simulated native location manager.
///
/// Subscriptions honour the minimum distance; the minimum time is
/// recorded by the caller's request but not enforced.
#[derive(Default)]
pub struct SimulatedLocationManager {
    state: Mutex<ManagerState>,
}

impl SimulatedLocationManager {
    /// Manager with no providers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager with enabled `gps`, `network` and `passive` providers.
    pub fn standard() -> Self {
        Self::new()
            .with_provider(
                GPS_PROVIDER,
                ProviderProperties {
                    power: PowerRequirement::High,
                    accuracy: AccuracyRequirement::Fine,
                },
            )
            .with_provider(
                NETWORK_PROVIDER,
                ProviderProperties {
                    power: PowerRequirement::Medium,
                    accuracy: AccuracyRequirement::Coarse,
                },
            )
            .with_provider(
                PASSIVE_PROVIDER,
                ProviderProperties {
                    power: PowerRequirement::Low,
                    accuracy: AccuracyRequirement::Coarse,
                },
            )
    }

    /// Add an enabled real provider.
    pub fn with_provider(self, name: &str, properties: ProviderProperties) -> Self {
        self.state.lock().providers.insert(
            name.to_string(),
            SimProvider {
                properties,
                enabled: true,
                test: false,
                last: None,
            },
        );
        self
    }

    /// Enable or disable a provider, notifying its subscribers.
    pub fn set_provider_enabled(&self, name: &str, enabled: bool) -> Result<(), BackendError> {
        let listeners = {
            let mut state = self.state.lock();
            let provider = state
                .providers
                .get_mut(name)
                .ok_or_else(|| BackendError::UnknownProvider(name.to_string()))?;
            if provider.enabled == enabled {
                return Ok(());
            }
            provider.enabled = enabled;
            subscribers_of(&state, name)
        };
        for listener in listeners {
            if enabled {
                listener.on_provider_enabled(name);
            } else {
                listener.on_provider_disabled(name);
            }
        }
        Ok(())
    }

    /// Inject a fix from `provider`, as if the hardware produced it.
    ///
    /// Disabled providers drop the fix.
    pub fn push_location(&self, provider: &str, location: Location) -> Result<(), BackendError> {
        let deliveries = {
            let mut state = self.state.lock();
            let entry = state
                .providers
                .get_mut(provider)
                .ok_or_else(|| BackendError::UnknownProvider(provider.to_string()))?;
            if !entry.enabled {
                tracing::trace!(provider, "fix dropped, provider disabled");
                return Ok(());
            }
            entry.last = Some(location.clone());

            let mut out = Vec::new();
            for sub in state.subscriptions.iter_mut().filter(|s| s.provider == provider) {
                let far_enough = sub.last_delivered.as_ref().is_none_or(|prev| {
                    prev.distance_to(&location) >= f64::from(sub.min_distance)
                });
                if far_enough {
                    sub.last_delivered = Some(location.clone());
                    out.push(Arc::clone(&sub.listener));
                }
            }
            out
        };
        for listener in deliveries {
            listener.on_location_changed(&location);
        }
        Ok(())
    }

    /// Number of live subscriptions across all providers.
    pub fn subscription_count(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    /// Provider a given listener is subscribed to, if any.
    pub fn subscribed_provider(&self, listener: &Arc<dyn NativeLocationListener>) -> Option<String> {
        self.state
            .lock()
            .subscriptions
            .iter()
            .find(|s| same_listener(&s.listener, listener))
            .map(|s| s.provider.clone())
    }
}

fn subscribers_of(state: &ManagerState, provider: &str) -> Vec<Arc<dyn NativeLocationListener>> {
    state
        .subscriptions
        .iter()
        .filter(|s| s.provider == provider)
        .map(|s| Arc::clone(&s.listener))
        .collect()
}

fn accuracy_rank(accuracy: AccuracyRequirement) -> u8 {
    match accuracy {
        AccuracyRequirement::Fine => 2,
        AccuracyRequirement::Coarse => 1,
        AccuracyRequirement::NoRequirement => 0,
    }
}

impl LocationManager for SimulatedLocationManager {
    fn best_provider(&self, criteria: &Criteria, enabled_only: bool) -> Option<String> {
        let state = self.state.lock();
        let candidates: Vec<(&String, &SimProvider)> = state
            .providers
            .iter()
            .filter(|(_, p)| !p.test && (p.enabled || !enabled_only))
            .collect();

        // Relax power first, then accuracy, until something matches.
        let relaxed = [
            *criteria,
            Criteria {
                power: PowerRequirement::NoRequirement,
                ..*criteria
            },
            Criteria::default(),
        ];
        relaxed.iter().find_map(|c| {
            candidates
                .iter()
                .filter(|(_, p)| p.properties.satisfies(c))
                .max_by_key(|(_, p)| (accuracy_rank(p.properties.accuracy), p.properties.power))
                .map(|(name, _)| (*name).clone())
        })
    }

    fn has_provider(&self, name: &str) -> bool {
        self.state.lock().providers.contains_key(name)
    }

    fn last_known_location(&self, provider: &str) -> Option<Location> {
        self.state
            .lock()
            .providers
            .get(provider)
            .and_then(|p| p.last.clone())
    }

    fn request_location_updates(
        &self,
        provider: &str,
        _min_time: Duration,
        min_distance: f32,
        listener: Arc<dyn NativeLocationListener>,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        if !state.providers.contains_key(provider) {
            return Err(BackendError::UnknownProvider(provider.to_string()));
        }
        // A listener holds one subscription; a new request replaces it.
        state
            .subscriptions
            .retain(|s| !same_listener(&s.listener, &listener));
        state.subscriptions.push(Subscription {
            provider: provider.to_string(),
            min_distance,
            listener,
            last_delivered: None,
        });
        Ok(())
    }

    fn remove_updates(&self, listener: &Arc<dyn NativeLocationListener>) {
        self.state
            .lock()
            .subscriptions
            .retain(|s| !same_listener(&s.listener, listener));
    }

    fn add_test_provider(&self, name: &str, properties: ProviderProperties) {
        self.state.lock().providers.insert(
            name.to_string(),
            SimProvider {
                properties,
                enabled: false,
                test: true,
                last: None,
            },
        );
    }

    fn set_test_provider_enabled(&self, name: &str, enabled: bool) -> Result<(), BackendError> {
        {
            let state = self.state.lock();
            match state.providers.get(name) {
                Some(p) if p.test => {}
                _ => return Err(BackendError::UnknownProvider(name.to_string())),
            }
        }
        self.set_provider_enabled(name, enabled)
    }

    fn remove_test_provider(&self, name: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        match state.providers.get(name) {
            Some(p) if p.test => {}
            _ => return Err(BackendError::UnknownProvider(name.to_string())),
        }
        state.providers.remove(name);
        state.subscriptions.retain(|s| s.provider != name);
        Ok(())
    }

    fn set_test_provider_location(
        &self,
        name: &str,
        location: Location,
    ) -> Result<(), BackendError> {
        let is_test = self
            .state
            .lock()
            .providers
            .get(name)
            .is_some_and(|p| p.test);
        if !is_test {
            return Err(BackendError::UnknownProvider(name.to_string()));
        }
        self.push_location(name, location)
    }
}

// -- Fused location client --

/// How the simulated fused client completes `connect()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    /// Complete on the handshake thread without delay.
    Immediate,
    /// Complete after the given delay.
    Delayed(Duration),
    /// Fail with the given status.
    Fail(FusedStatus),
}

#[derive(Debug, Clone)]
pub struct FusedClientConfig {
    pub handshake: Handshake,
    /// Hint delivered with `on_connected`.
    pub connection_hint: Option<Extras>,
}

impl Default for FusedClientConfig {
    fn default() -> Self {
        Self {
            handshake: Handshake::Immediate,
            connection_hint: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Disconnected,
    Connecting,
    Connected,
}

struct FusedState {
    link: Link,
    /// Bumped on every connect/disconnect so a stale handshake thread
    /// cannot complete a newer attempt.
    generation: u64,
    connection_listeners: Vec<Arc<dyn FusedConnectionListener>>,
    failure_listeners: Vec<Arc<dyn FusedFailureListener>>,
    subscriptions: Vec<(FusedRequest, Arc<dyn FusedLocationListener>)>,
    mock: bool,
    last: Option<Location>,
}

/// Simulated proprietary fused client.
pub struct SimulatedFusedClient {
    config: FusedClientConfig,
    state: Arc<Mutex<FusedState>>,
}

impl SimulatedFusedClient {
    pub fn new(config: FusedClientConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(FusedState {
                link: Link::Disconnected,
                generation: 0,
                connection_listeners: Vec::new(),
                failure_listeners: Vec::new(),
                subscriptions: Vec::new(),
                mock: false,
                last: None,
            })),
        }
    }

    /// Inject a real fix. Ignored while disconnected or in mock mode.
    pub fn push_location(&self, location: Location) {
        let listeners = {
            let mut state = self.state.lock();
            if state.link != Link::Connected || state.mock {
                return;
            }
            state.last = Some(location.clone());
            state
                .subscriptions
                .iter()
                .map(|(_, l)| Arc::clone(l))
                .collect::<Vec<_>>()
        };
        for listener in listeners {
            listener.on_location_changed(&location);
        }
    }

    /// Simulate the service dying: drops every subscription and fires
    /// `on_disconnected` on the connection listeners.
    pub fn simulate_service_death(&self) {
        let listeners = {
            let mut state = self.state.lock();
            if state.link == Link::Disconnected {
                return;
            }
            state.link = Link::Disconnected;
            state.generation += 1;
            state.subscriptions.clear();
            state.connection_listeners.clone()
        };
        for listener in listeners {
            listener.on_disconnected();
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    /// Priorities of the live subscriptions, in registration order.
    pub fn subscribed_priorities(&self) -> Vec<Priority> {
        self.state
            .lock()
            .subscriptions
            .iter()
            .map(|(r, _)| r.priority)
            .collect()
    }

    pub fn connection_listener_count(&self) -> usize {
        self.state.lock().connection_listeners.len()
    }

    pub fn failure_listener_count(&self) -> usize {
        self.state.lock().failure_listeners.len()
    }
}

/// Complete (or fail) a pending handshake if it is still current.
fn finish_handshake(
    state: &Mutex<FusedState>,
    generation: u64,
    outcome: &Handshake,
    hint: Option<&Extras>,
) {
    let mut guard = state.lock();
    if guard.generation != generation || guard.link != Link::Connecting {
        return;
    }
    match outcome {
        Handshake::Fail(status) => {
            guard.link = Link::Disconnected;
            let listeners = guard.failure_listeners.clone();
            drop(guard);
            tracing::debug!(code = status.code, "fused handshake failed");
            for listener in listeners {
                listener.on_connection_failed(status);
            }
        }
        Handshake::Immediate | Handshake::Delayed(_) => {
            guard.link = Link::Connected;
            let listeners = guard.connection_listeners.clone();
            drop(guard);
            tracing::debug!("fused handshake complete");
            for listener in listeners {
                listener.on_connected(hint);
            }
        }
    }
}

impl FusedLocationClient for SimulatedFusedClient {
    fn is_available(&self, env: &Environment) -> bool {
        env.has_service(FUSED_SERVICE)
    }

    fn connect(&self) {
        let generation = {
            let mut state = self.state.lock();
            if state.link != Link::Disconnected {
                return;
            }
            state.link = Link::Connecting;
            state.generation += 1;
            state.generation
        };

        let shared = Arc::clone(&self.state);
        let outcome = self.config.handshake.clone();
        let hint = self.config.connection_hint.clone();
        let spawned = std::thread::Builder::new()
            .name("fused-handshake".into())
            .spawn(move || {
                if let Handshake::Delayed(delay) = outcome {
                    std::thread::sleep(delay);
                }
                finish_handshake(&shared, generation, &outcome, hint.as_ref());
            });

        if let Err(e) = spawned {
            tracing::warn!(error = %e, "failed to spawn fused handshake thread");
            let status = FusedStatus {
                code: FusedStatus::INTERNAL_ERROR,
                message: Some(e.to_string()),
            };
            finish_handshake(&self.state, generation, &Handshake::Fail(status), None);
        }
    }

    fn disconnect(&self) {
        let mut state = self.state.lock();
        state.link = Link::Disconnected;
        state.generation += 1;
        state.subscriptions.clear();
    }

    fn connection_state(&self) -> ConnectionState {
        match self.state.lock().link {
            Link::Disconnected => ConnectionState::Disconnected,
            Link::Connecting => ConnectionState::Connecting,
            Link::Connected => ConnectionState::Connected,
        }
    }

    fn last_location(&self) -> Option<Location> {
        let state = self.state.lock();
        if state.link == Link::Connected {
            state.last.clone()
        } else {
            None
        }
    }

    fn register_connection_listener(&self, listener: Arc<dyn FusedConnectionListener>) {
        let mut state = self.state.lock();
        if !state
            .connection_listeners
            .iter()
            .any(|l| same_listener(l, &listener))
        {
            state.connection_listeners.push(listener);
        }
    }

    fn unregister_connection_listener(&self, listener: &Arc<dyn FusedConnectionListener>) {
        self.state
            .lock()
            .connection_listeners
            .retain(|l| !same_listener(l, listener));
    }

    fn register_failure_listener(&self, listener: Arc<dyn FusedFailureListener>) {
        let mut state = self.state.lock();
        if !state
            .failure_listeners
            .iter()
            .any(|l| same_listener(l, &listener))
        {
            state.failure_listeners.push(listener);
        }
    }

    fn unregister_failure_listener(&self, listener: &Arc<dyn FusedFailureListener>) {
        self.state
            .lock()
            .failure_listeners
            .retain(|l| !same_listener(l, listener));
    }

    fn request_location_updates(
        &self,
        request: &FusedRequest,
        listener: Arc<dyn FusedLocationListener>,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        if state.link != Link::Connected {
            return Err(BackendError::NotConnected);
        }
        state.subscriptions.retain(|(_, l)| !same_listener(l, &listener));
        state.subscriptions.push((request.clone(), listener));
        Ok(())
    }

    fn remove_location_updates(&self, listener: &Arc<dyn FusedLocationListener>) {
        self.state
            .lock()
            .subscriptions
            .retain(|(_, l)| !same_listener(l, listener));
    }

    fn set_mock_mode(&self, enabled: bool) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        if state.link != Link::Connected {
            return Err(BackendError::NotConnected);
        }
        state.mock = enabled;
        Ok(())
    }

    fn set_mock_location(&self, location: Location) -> Result<(), BackendError> {
        let listeners = {
            let mut state = self.state.lock();
            if state.link != Link::Connected {
                return Err(BackendError::NotConnected);
            }
            if !state.mock {
                return Err(BackendError::Security("mock mode is not enabled".into()));
            }
            state.last = Some(location.clone());
            state
                .subscriptions
                .iter()
                .map(|(_, l)| Arc::clone(l))
                .collect::<Vec<_>>()
        };
        for listener in listeners {
            listener.on_location_changed(&location);
        }
        Ok(())
    }
}
