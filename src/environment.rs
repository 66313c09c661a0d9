//! Runtime environment the adapters check before touching a backend.
//!
//! Plain configuration value, built once by the caller (the demo CLI
//! fills it from flags). Adapters only read it.

use std::collections::BTreeSet;

use crate::error::HubError;

/// Service name the fused adapter looks for.
pub const FUSED_SERVICE: &str = "fused-location";

/// Permissions relevant to location access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    CoarseLocation,
    FineLocation,
    MockLocation,
}

/// Capabilities of the host: settings, granted permissions and installed
/// services.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// System-wide "allow mock locations" setting.
    pub allow_mock_location: bool,
    /// Permissions granted to the caller.
    pub permissions: BTreeSet<Permission>,
    /// Names of installed location services.
    pub services: BTreeSet<String>,
}

impl Environment {
    /// Locked-down environment: no permissions, no services, mock
    /// locations disallowed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment with location permissions granted and mock locations
    /// allowed.
    pub fn permissive() -> Self {
        Self::new()
            .with_permission(Permission::CoarseLocation)
            .with_permission(Permission::FineLocation)
            .with_permission(Permission::MockLocation)
            .allow_mock_locations(true)
    }

    /// Grant `permission`.
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.insert(permission);
        self
    }

    /// Mark the service `name` as installed.
    pub fn with_service(mut self, name: impl Into<String>) -> Self {
        self.services.insert(name.into());
        self
    }

    /// Flip the system-wide mock-location setting.
    pub fn allow_mock_locations(mut self, allow: bool) -> Self {
        self.allow_mock_location = allow;
        self
    }

    /// Whether `permission` was granted.
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Whether a service called `name` is installed.
    pub fn has_service(&self, name: &str) -> bool {
        self.services.contains(name)
    }

    /// Check that location simulation is allowed.
    ///
    /// Requires both the mock-location setting and the
    /// [`Permission::MockLocation`] grant.
    pub fn check_mock_allowed(&self) -> Result<(), HubError> {
        if !self.allow_mock_location {
            return Err(HubError::SecurityViolation(
                "mock locations are disabled in settings".into(),
            ));
        }
        if !self.has_permission(Permission::MockLocation) {
            return Err(HubError::SecurityViolation(
                "missing mock location permission".into(),
            ));
        }
        Ok(())
    }
}
