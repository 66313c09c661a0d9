//! One interface over interchangeable location backends.
//!
//! A [`LocationHub`] resolves a [`ProviderAdapter`] from an ordered
//! candidate list and forwards every call to it. Adapters bridge the
//! caller-facing listener traits onto each backend's own listener types
//! and keep those bridges in identity-keyed registries.

pub mod adapter;
pub mod backend;
pub mod environment;
pub mod error;
pub mod events;
pub mod hub;
pub mod listener;
pub mod location;
pub mod registry;
pub mod request;
pub mod resolver;

pub use adapter::{ConnectionState, FusedAdapter, NativeAdapter, ProviderAdapter};
pub use environment::{Environment, Permission};
pub use error::HubError;
pub use events::{EventSink, EventStream, HubEvent, event_channel};
pub use hub::LocationHub;
pub use listener::{
    ConnectionCallbacks, ConnectionFailedListener, ConnectionHandle, ConnectionResult, Extras,
    FailureHandle, Listener, ListenerId, LocationHandle, LocationListener,
};
pub use location::{Location, MOCK_PROVIDER};
pub use request::{Criteria, LocationRequest, Priority};
pub use resolver::{AdapterResolver, DefaultResolver};
