//! Provider adapters: one implementation of [`ProviderAdapter`] per
//! backend.
//!
//! An adapter owns its listener registries and translates between the
//! caller-facing listener handles and the backend's own listener types.
//! Adapters are shared as `Arc<dyn ProviderAdapter>`, so every operation
//! takes `&self` and state lives behind locks.

pub mod fused;
pub mod native;

use std::fmt;

use crate::environment::Environment;
use crate::error::HubError;
use crate::listener::{ConnectionHandle, Extras, FailureHandle, ListenerId, LocationHandle};
use crate::location::Location;
use crate::request::LocationRequest;

pub use fused::FusedAdapter;
pub use native::NativeAdapter;

/// Adapter connection state. Exactly one value at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Connected => f.write_str("connected"),
        }
    }
}

/// A location backend behind the hub.
pub trait ProviderAdapter: Send + Sync {
    /// Store the environment and register the initial callback pair.
    ///
    /// Must precede [`connect`](Self::connect). The callbacks go through
    /// the regular registration path, so they de-duplicate with later
    /// `register_*` calls.
    fn setup(
        &self,
        env: &Environment,
        callbacks: Option<ConnectionHandle>,
        failure: Option<FailureHandle>,
        extras: Option<Extras>,
    ) -> Result<(), HubError>;

    /// Whether this backend can be used. Never connects or mutates state.
    fn is_service_available(&self, env: &Environment) -> bool;

    /// Stable identifier of the backend.
    fn adapter_name(&self) -> &str;

    /// Start connecting. Completion is reported through the connection
    /// or failure callbacks, never through the return value.
    fn connect(&self) -> Result<(), HubError>;

    /// Cancel every location subscription, then notify every registered
    /// connection callback with `on_disconnected`.
    fn disconnect(&self);

    /// Most recent fix seen by this adapter, or `None` before the first.
    fn last_location(&self) -> Option<Location>;

    fn connection_state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    fn is_connecting(&self) -> bool {
        self.connection_state() == ConnectionState::Connecting
    }

    /// Idempotent by id. Fires `on_connected` before returning when the
    /// adapter is already connected.
    fn register_connection_callbacks(&self, callbacks: &ConnectionHandle);

    fn unregister_connection_callbacks(&self, id: ListenerId);

    fn is_connection_callbacks_registered(&self, id: ListenerId) -> bool;

    fn register_connection_failed_listener(&self, listener: &FailureHandle);

    fn unregister_connection_failed_listener(&self, id: ListenerId);

    fn is_connection_failed_listener_registered(&self, id: ListenerId) -> bool;

    /// Toggle location simulation. Repeating the current mode is a no-op.
    /// Enabling checks the environment before any state changes.
    fn set_mock_mode(&self, enabled: bool) -> Result<(), HubError>;

    /// Inject a fix through the synthetic provider. Requires mock mode.
    fn set_mock_location(&self, location: Location) -> Result<(), HubError>;

    /// Subscribe `listener`, replacing any earlier subscription it holds.
    /// A failed request leaves the earlier subscription in place.
    fn request_location_updates(
        &self,
        request: &LocationRequest,
        listener: &LocationHandle,
    ) -> Result<(), HubError>;

    /// Cancel the subscription held by `id`. Unknown ids are ignored.
    fn remove_location_updates(&self, id: ListenerId);
}

impl fmt::Display for dyn ProviderAdapter + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Thin the pointer; `{:p}` on a fat one prints its metadata.
        let addr = self as *const Self as *const ();
        write!(f, "{}: {:p}", self.adapter_name(), addr)
    }
}

impl fmt::Debug for dyn ProviderAdapter + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderAdapter")
            .field("name", &self.adapter_name())
            .field("state", &self.connection_state())
            .finish()
    }
}
