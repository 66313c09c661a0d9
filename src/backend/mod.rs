//! Backend integration seams: the native and proprietary location SDKs
//! the adapters drive.
//!
//! Each backend speaks its own listener types and request shapes. The
//! adapters in [`crate::adapter`] bridge these to the caller-facing
//! traits in [`crate::listener`]. Real platform integrations implement
//! these traits outside this crate; [`sim`] provides in-process
//! implementations for tests and the demo.
//!
//! Native listeners are identified by `Arc` address: `remove_*` calls
//! must pass a clone of the `Arc` that was registered.

pub mod sim;

use std::sync::Arc;
use std::time::Duration;

use crate::adapter::ConnectionState;
use crate::environment::Environment;
use crate::error::HubError;
use crate::listener::Extras;
use crate::location::Location;
use crate::request::{AccuracyRequirement, Criteria, PowerRequirement, Priority};

/// Errors reported by backend SDK calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The named provider does not exist.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// The client must be connected first.
    #[error("client not connected")]
    NotConnected,

    /// The backend refused a privileged operation.
    #[error("{0}")]
    Security(String),
}

impl From<BackendError> for HubError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::UnknownProvider(_) => HubError::NoProviderAvailable,
            BackendError::NotConnected => HubError::NotConnected,
            BackendError::Security(msg) => HubError::SecurityViolation(msg),
        }
    }
}

/// Returns true when both `Arc`s point at the same listener object.
pub(crate) fn same_listener<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

// -- Native OS location service --

/// Native listener shape. Only fixes are required; provider callbacks
/// default to no-ops.
pub trait NativeLocationListener: Send + Sync {
    fn on_location_changed(&self, location: &Location);

    fn on_provider_enabled(&self, _provider: &str) {}

    fn on_provider_disabled(&self, _provider: &str) {}
}

/// Capabilities of a native provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderProperties {
    pub power: PowerRequirement,
    pub accuracy: AccuracyRequirement,
}

impl ProviderProperties {
    /// Whether a provider with these properties satisfies `criteria`.
    ///
    /// Power is an upper bound; accuracy must match when constrained.
    pub fn satisfies(&self, criteria: &Criteria) -> bool {
        let power_ok = criteria.power == PowerRequirement::NoRequirement
            || self.power <= criteria.power;
        let accuracy_ok = criteria.accuracy == AccuracyRequirement::NoRequirement
            || self.accuracy == criteria.accuracy;
        power_ok && accuracy_ok
    }
}

/// The native location manager.
pub trait LocationManager: Send + Sync {
    /// Name of the provider best matching `criteria`, or `None` if no
    /// (enabled, when `enabled_only`) provider exists at all.
    fn best_provider(&self, criteria: &Criteria, enabled_only: bool) -> Option<String>;

    fn has_provider(&self, name: &str) -> bool;

    fn last_known_location(&self, provider: &str) -> Option<Location>;

    fn request_location_updates(
        &self,
        provider: &str,
        min_time: Duration,
        min_distance: f32,
        listener: Arc<dyn NativeLocationListener>,
    ) -> Result<(), BackendError>;

    /// Cancel every subscription held by `listener`.
    fn remove_updates(&self, listener: &Arc<dyn NativeLocationListener>);

    fn add_test_provider(&self, name: &str, properties: ProviderProperties);

    fn set_test_provider_enabled(&self, name: &str, enabled: bool) -> Result<(), BackendError>;

    fn remove_test_provider(&self, name: &str) -> Result<(), BackendError>;

    fn set_test_provider_location(
        &self,
        name: &str,
        location: Location,
    ) -> Result<(), BackendError>;
}

// -- Proprietary fused location service --

/// Status codes reported by the fused service on connection failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusedStatus {
    pub code: i32,
    pub message: Option<String>,
}

impl FusedStatus {
    pub const SERVICE_MISSING: i32 = 1;
    pub const SERVICE_VERSION_UPDATE_REQUIRED: i32 = 2;
    pub const SERVICE_DISABLED: i32 = 3;
    pub const NETWORK_ERROR: i32 = 7;
    pub const INTERNAL_ERROR: i32 = 8;

    pub fn new(code: i32) -> Self {
        Self {
            code,
            message: None,
        }
    }
}

/// Fused-service request parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedRequest {
    pub priority: Priority,
    pub interval: Duration,
    pub fastest_interval: Duration,
    pub smallest_displacement: f32,
}

pub trait FusedConnectionListener: Send + Sync {
    fn on_connected(&self, hint: Option<&Extras>);

    /// Fired only for service-initiated disconnects, never for an
    /// explicit `disconnect()`.
    fn on_disconnected(&self);
}

pub trait FusedFailureListener: Send + Sync {
    fn on_connection_failed(&self, status: &FusedStatus);
}

pub trait FusedLocationListener: Send + Sync {
    fn on_location_changed(&self, location: &Location);
}

/// The proprietary fused location client.
///
/// `connect()` returns immediately; completion is reported through the
/// registered connection or failure listeners. Registering a connection
/// listener never replays a past `on_connected`.
pub trait FusedLocationClient: Send + Sync {
    /// Whether the service is installed and usable. Must not connect.
    fn is_available(&self, env: &Environment) -> bool;

    fn connect(&self);

    fn disconnect(&self);

    /// Link state, read in one step so a transition is never observed
    /// half-way.
    fn connection_state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    fn is_connecting(&self) -> bool {
        self.connection_state() == ConnectionState::Connecting
    }

    fn last_location(&self) -> Option<Location>;

    fn register_connection_listener(&self, listener: Arc<dyn FusedConnectionListener>);

    fn unregister_connection_listener(&self, listener: &Arc<dyn FusedConnectionListener>);

    fn register_failure_listener(&self, listener: Arc<dyn FusedFailureListener>);

    fn unregister_failure_listener(&self, listener: &Arc<dyn FusedFailureListener>);

    fn request_location_updates(
        &self,
        request: &FusedRequest,
        listener: Arc<dyn FusedLocationListener>,
    ) -> Result<(), BackendError>;

    fn remove_location_updates(&self, listener: &Arc<dyn FusedLocationListener>);

    fn set_mock_mode(&self, enabled: bool) -> Result<(), BackendError>;

    fn set_mock_location(&self, location: Location) -> Result<(), BackendError>;
}
