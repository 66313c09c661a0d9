//! The caller-facing location hub.
//!
//! A hub resolves one adapter at construction and forwards every
//! operation to it. Callers never see which backend they got unless
//! they ask through [`LocationHub::adapter`].

use std::sync::Arc;

use crate::adapter::{ConnectionState, ProviderAdapter};
use crate::backend::LocationManager;
use crate::environment::Environment;
use crate::error::HubError;
use crate::listener::{ConnectionHandle, Extras, FailureHandle, ListenerId, LocationHandle};
use crate::location::Location;
use crate::request::LocationRequest;
use crate::resolver::{AdapterResolver, DefaultResolver};

/// Facade over a single resolved [`ProviderAdapter`].
///
/// The construction-time callbacks are handed to the adapter on every
/// [`connect`](Self::connect); everything else forwards unchanged.
pub struct LocationHub {
    env: Environment,
    callbacks: Option<ConnectionHandle>,
    failure: Option<FailureHandle>,
    resolver: Box<dyn AdapterResolver>,
    adapter: Arc<dyn ProviderAdapter>,
}

impl LocationHub {
    /// Hub over the native backend only.
    pub fn new(
        env: Environment,
        callbacks: Option<ConnectionHandle>,
        failure: Option<FailureHandle>,
        manager: Arc<dyn LocationManager>,
    ) -> Result<Self, HubError> {
        let resolver = DefaultResolver::native(env.clone(), manager);
        Self::with_resolver(env, callbacks, failure, Box::new(resolver))
    }

    /// Hub over whichever adapter `resolver` picks.
    pub fn with_resolver(
        env: Environment,
        callbacks: Option<ConnectionHandle>,
        failure: Option<FailureHandle>,
        resolver: Box<dyn AdapterResolver>,
    ) -> Result<Self, HubError> {
        let adapter = resolver.resolve().ok_or(HubError::NoAdapterAvailable)?;
        Ok(Self {
            env,
            callbacks,
            failure,
            resolver,
            adapter,
        })
    }

    /// The adapter chosen at construction.
    pub fn adapter(&self) -> &Arc<dyn ProviderAdapter> {
        &self.adapter
    }

    /// Resolver the hub was built from, with its full candidate list.
    pub fn resolver(&self) -> &dyn AdapterResolver {
        self.resolver.as_ref()
    }

    /// Environment passed to the adapter at setup.
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Set up the adapter with the construction-time callbacks, then
    /// start connecting.
    pub fn connect(&self) -> Result<(), HubError> {
        self.connect_with(None)
    }

    /// Like [`connect`](Self::connect), passing `extras` to setup.
    pub fn connect_with(&self, extras: Option<Extras>) -> Result<(), HubError> {
        self.adapter.setup(
            &self.env,
            self.callbacks.clone(),
            self.failure.clone(),
            extras,
        )?;
        self.adapter.connect()
    }

    /// Disconnect, cancelling every location subscription. Connection
    /// callbacks hear `on_disconnected`.
    pub fn disconnect(&self) {
        self.adapter.disconnect();
    }

    /// Most recent fix known to the adapter. Never regresses to `None`
    /// once a fix has been seen.
    pub fn last_location(&self) -> Option<Location> {
        self.adapter.last_location()
    }

    /// Current connection state of the adapter.
    pub fn connection_state(&self) -> ConnectionState {
        self.adapter.connection_state()
    }

    /// Shorthand for `connection_state() == Connected`.
    pub fn is_connected(&self) -> bool {
        self.adapter.is_connected()
    }

    /// Shorthand for `connection_state() == Connecting`.
    pub fn is_connecting(&self) -> bool {
        self.adapter.is_connecting()
    }

    /// Register connection callbacks. Registering an id twice keeps one
    /// entry. If already connected, `on_connected` fires right away.
    pub fn register_connection_callbacks(&self, callbacks: &ConnectionHandle) {
        self.adapter.register_connection_callbacks(callbacks);
    }

    /// Remove the connection callbacks registered under `id`.
    pub fn unregister_connection_callbacks(&self, id: ListenerId) {
        self.adapter.unregister_connection_callbacks(id);
    }

    /// Whether `id` holds a connection callback registration.
    pub fn is_connection_callbacks_registered(&self, id: ListenerId) -> bool {
        self.adapter.is_connection_callbacks_registered(id)
    }

    /// Register a failure listener. Idempotent per id.
    pub fn register_connection_failed_listener(&self, listener: &FailureHandle) {
        self.adapter.register_connection_failed_listener(listener);
    }

    /// Remove the failure listener registered under `id`.
    pub fn unregister_connection_failed_listener(&self, id: ListenerId) {
        self.adapter.unregister_connection_failed_listener(id);
    }

    /// Whether `id` holds a failure listener registration.
    pub fn is_connection_failed_listener_registered(&self, id: ListenerId) -> bool {
        self.adapter.is_connection_failed_listener_registered(id)
    }

    /// Turn location simulation on or off.
    ///
    /// Enabling checks the environment and fails with
    /// [`HubError::SecurityViolation`] when simulation is not allowed.
    /// Setting the current mode again is a no-op, and disabling never
    /// needs permission.
    pub fn set_mock_mode(&self, enabled: bool) -> Result<(), HubError> {
        self.adapter.set_mock_mode(enabled)
    }

    /// Inject a simulated fix. Fails with
    /// [`HubError::SecurityViolation`] unless mock mode is on.
    pub fn set_mock_location(&self, location: Location) -> Result<(), HubError> {
        self.adapter.set_mock_location(location)
    }

    /// Subscribe `listener` with `request`. A second request for the
    /// same id replaces the first; if it fails, the first stays live.
    pub fn request_location_updates(
        &self,
        request: &LocationRequest,
        listener: &LocationHandle,
    ) -> Result<(), HubError> {
        self.adapter.request_location_updates(request, listener)
    }

    /// Cancel the subscription held by `id`. Unknown ids are ignored.
    pub fn remove_location_updates(&self, id: ListenerId) {
        self.adapter.remove_location_updates(id);
    }
}
