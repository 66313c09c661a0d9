//! Error taxonomy shared by the request builder, adapters and hub.
//!
//! Connection failures are not part of this enum: they are delivered
//! asynchronously as [`ConnectionResult`](crate::listener::ConnectionResult)
//! through the failure listener, never returned from a call.

/// Errors returned synchronously by the location hub layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HubError {
    /// A request setter received an out-of-domain value (negative
    /// interval or displacement, unknown priority code).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The environment forbids location simulation, or a mock location
    /// was supplied while mock mode is disabled.
    #[error("security violation: {0}")]
    SecurityViolation(String),

    /// No candidate adapter reported itself available.
    #[error("no location adapter available")]
    NoAdapterAvailable,

    /// `connect()` was called before `setup()`.
    #[error("adapter has not been set up")]
    NotSetUp,

    /// The backend requires a live connection for this operation.
    #[error("adapter is not connected")]
    NotConnected,

    /// No enabled backend provider satisfies the request criteria.
    #[error("no location provider matches the requested criteria")]
    NoProviderAvailable,
}
