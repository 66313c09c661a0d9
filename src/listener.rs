//! Caller-facing listener traits and identity handles.
//!
//! Callers wrap their callback objects in a [`Listener`] handle. The
//! handle carries a [`ListenerId`] minted at construction; clones share
//! it. Adapters key every registry by that id, so registering a clone of
//! an already-registered handle is recognised as the same listener.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::location::Location;

/// Free-form key/value data passed to `setup` and delivered with
/// `on_connected`.
pub type Extras = BTreeMap<String, String>;

/// Stable identity token for a registered listener.
///
/// Monotonically increasing, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Reason a connection attempt failed.
///
/// Delivered through [`ConnectionFailedListener`]; never returned as an
/// error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionResult {
    /// The backing service is not installed.
    ServiceMissing,
    /// The backing service is installed but disabled.
    ServiceDisabled,
    /// The installed service version is too old.
    ServiceUpdateRequired,
    /// The service could not be reached.
    NetworkError,
    /// Backend-specific failure with a diagnostic message.
    Internal(String),
}

impl fmt::Display for ConnectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionResult::ServiceMissing => f.write_str("service missing"),
            ConnectionResult::ServiceDisabled => f.write_str("service disabled"),
            ConnectionResult::ServiceUpdateRequired => f.write_str("service update required"),
            ConnectionResult::NetworkError => f.write_str("network error"),
            ConnectionResult::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

/// Connection lifecycle callbacks.
pub trait ConnectionCallbacks: Send + Sync {
    /// The adapter finished connecting. `hint` carries backend-provided
    /// data, if any.
    fn on_connected(&self, hint: Option<&Extras>);

    /// The adapter disconnected. All location-update registrations have
    /// been cancelled by the time this fires.
    fn on_disconnected(&self);
}

/// Receives connection failures.
pub trait ConnectionFailedListener: Send + Sync {
    fn on_connection_failed(&self, result: &ConnectionResult);
}

/// Receives location updates.
pub trait LocationListener: Send + Sync {
    fn on_location_changed(&self, location: &Location);
}

impl<F> ConnectionFailedListener for F
where
    F: Fn(&ConnectionResult) + Send + Sync,
{
    fn on_connection_failed(&self, result: &ConnectionResult) {
        self(result);
    }
}

impl<F> LocationListener for F
where
    F: Fn(&Location) + Send + Sync,
{
    fn on_location_changed(&self, location: &Location) {
        self(location);
    }
}

/// A callback object paired with its identity token.
pub struct Listener<T: ?Sized> {
    id: ListenerId,
    inner: Arc<T>,
}

/// Handle for [`ConnectionCallbacks`].
pub type ConnectionHandle = Listener<dyn ConnectionCallbacks>;
/// Handle for [`ConnectionFailedListener`].
pub type FailureHandle = Listener<dyn ConnectionFailedListener>;
/// Handle for [`LocationListener`].
pub type LocationHandle = Listener<dyn LocationListener>;

impl<T: ?Sized> Listener<T> {
    /// Wrap an existing shared callback object under a fresh id.
    pub fn from_arc(inner: Arc<T>) -> Self {
        Self {
            id: ListenerId::next(),
            inner,
        }
    }

    /// Identity the adapters key registrations by. Shared by clones.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Shared reference to the wrapped callback object.
    pub fn inner(&self) -> &Arc<T> {
        &self.inner
    }
}

impl Listener<dyn ConnectionCallbacks> {
    /// Wrap `callbacks` under a fresh id.
    pub fn new(callbacks: impl ConnectionCallbacks + 'static) -> Self {
        Self::from_arc(Arc::new(callbacks))
    }
}

impl Listener<dyn ConnectionFailedListener> {
    pub fn new(listener: impl ConnectionFailedListener + 'static) -> Self {
        Self::from_arc(Arc::new(listener))
    }
}

impl Listener<dyn LocationListener> {
    pub fn new(listener: impl LocationListener + 'static) -> Self {
        Self::from_arc(Arc::new(listener))
    }
}

impl<T: ?Sized> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: ?Sized> Deref for Listener<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: ?Sized> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener").field(&self.id).finish()
    }
}
