//! Adapter resolution: pick the first usable backend from an ordered
//! candidate list.
//!
//! Candidate order is priority order. Availability checks go through
//! [`ProviderAdapter::is_service_available`], which never connects, so
//! resolving has no side effects and can be repeated. Nothing is cached
//! here; the hub keeps the adapter it resolved at construction.

use std::sync::Arc;

use crate::adapter::{FusedAdapter, NativeAdapter, ProviderAdapter};
use crate::backend::{FusedLocationClient, LocationManager};
use crate::environment::Environment;

/// Chooses the adapter a hub will use.
pub trait AdapterResolver: Send + Sync {
    /// Environment the availability checks run against.
    fn environment(&self) -> &Environment;

    /// Candidates in priority order.
    fn adapters(&self) -> &[Arc<dyn ProviderAdapter>];

    /// Live candidate list, for appending or prepending before
    /// resolution.
    fn adapters_mut(&mut self) -> &mut Vec<Arc<dyn ProviderAdapter>>;

    /// First available candidate, or `None` when none qualifies.
    fn resolve(&self) -> Option<Arc<dyn ProviderAdapter>> {
        let env = self.environment();
        let found = self
            .adapters()
            .iter()
            .find(|a| a.is_service_available(env))
            .cloned();
        match &found {
            Some(adapter) => tracing::info!(adapter = %adapter, "adapter resolved"),
            None => tracing::warn!(candidates = self.adapters().len(), "no adapter available"),
        }
        found
    }
}

/// Resolver over an explicit ordered list.
pub struct DefaultResolver {
    env: Environment,
    adapters: Vec<Arc<dyn ProviderAdapter>>,
}

impl DefaultResolver {
    pub fn builder(env: Environment) -> DefaultResolverBuilder {
        DefaultResolverBuilder {
            env,
            adapters: Vec::new(),
        }
    }

    /// Native adapter only.
    pub fn native(env: Environment, manager: Arc<dyn LocationManager>) -> Self {
        Self::builder(env)
            .adapter(Arc::new(NativeAdapter::new(manager)))
            .build()
    }

    /// Fused adapter first, native adapter as fallback.
    pub fn fused_with_fallback(
        env: Environment,
        client: Arc<dyn FusedLocationClient>,
        manager: Arc<dyn LocationManager>,
    ) -> Self {
        Self::builder(env)
            .adapter(Arc::new(FusedAdapter::new(client)))
            .adapter(Arc::new(NativeAdapter::new(manager)))
            .build()
    }
}

impl AdapterResolver for DefaultResolver {
    fn environment(&self) -> &Environment {
        &self.env
    }

    fn adapters(&self) -> &[Arc<dyn ProviderAdapter>] {
        &self.adapters
    }

    fn adapters_mut(&mut self) -> &mut Vec<Arc<dyn ProviderAdapter>> {
        &mut self.adapters
    }
}

pub struct DefaultResolverBuilder {
    env: Environment,
    adapters: Vec<Arc<dyn ProviderAdapter>>,
}

impl DefaultResolverBuilder {
    /// Append a candidate. Duplicates are kept.
    pub fn adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn build(self) -> DefaultResolver {
        DefaultResolver {
            env: self.env,
            adapters: self.adapters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sim::{FusedClientConfig, SimulatedFusedClient, SimulatedLocationManager};
    use crate::environment::FUSED_SERVICE;
    use crate::error::HubError;
    use crate::listener::{ConnectionHandle, Extras, FailureHandle, ListenerId, LocationHandle};
    use crate::location::Location;
    use crate::request::LocationRequest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Adapter with a fixed availability answer that counts checks.
    struct Stub {
        name: &'static str,
        available: bool,
        checks: AtomicUsize,
    }

    fn stub(name: &'static str, available: bool) -> Arc<Stub> {
        Arc::new(Stub {
            name,
            available,
            checks: AtomicUsize::new(0),
        })
    }

    impl ProviderAdapter for Stub {
        fn setup(
            &self,
            _env: &Environment,
            _callbacks: Option<ConnectionHandle>,
            _failure: Option<FailureHandle>,
            _extras: Option<Extras>,
        ) -> Result<(), HubError> {
            Ok(())
        }
        fn is_service_available(&self, _env: &Environment) -> bool {
            self.checks.fetch_add(1, Ordering::SeqCst);
            self.available
        }
        fn adapter_name(&self) -> &str {
            self.name
        }
        fn connect(&self) -> Result<(), HubError> {
            Ok(())
        }
        fn disconnect(&self) {}
        fn last_location(&self) -> Option<Location> {
            None
        }
        fn connection_state(&self) -> crate::adapter::ConnectionState {
            crate::adapter::ConnectionState::Disconnected
        }
        fn register_connection_callbacks(&self, _callbacks: &ConnectionHandle) {}
        fn unregister_connection_callbacks(&self, _id: ListenerId) {}
        fn is_connection_callbacks_registered(&self, _id: ListenerId) -> bool {
            false
        }
        fn register_connection_failed_listener(&self, _listener: &FailureHandle) {}
        fn unregister_connection_failed_listener(&self, _id: ListenerId) {}
        fn is_connection_failed_listener_registered(&self, _id: ListenerId) -> bool {
            false
        }
        fn set_mock_mode(&self, _enabled: bool) -> Result<(), HubError> {
            Ok(())
        }
        fn set_mock_location(&self, _location: Location) -> Result<(), HubError> {
            Ok(())
        }
        fn request_location_updates(
            &self,
            _request: &LocationRequest,
            _listener: &LocationHandle,
        ) -> Result<(), HubError> {
            Ok(())
        }
        fn remove_location_updates(&self, _id: ListenerId) {}
    }

    #[test]
    fn first_available_wins() {
        let a = stub("a", false);
        let b = stub("b", true);
        let c = stub("c", true);
        let resolver = DefaultResolver::builder(Environment::new())
            .adapter(a.clone())
            .adapter(b.clone())
            .adapter(c.clone())
            .build();

        let chosen = resolver.resolve().unwrap();
        assert_eq!(chosen.adapter_name(), "b");
        assert_eq!(c.checks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn nothing_available_resolves_to_none() {
        let resolver = DefaultResolver::builder(Environment::new())
            .adapter(stub("a", false))
            .build();
        assert!(resolver.resolve().is_none());
        assert!(DefaultResolver::builder(Environment::new()).build().resolve().is_none());
    }

    #[test]
    fn resolution_is_repeatable() {
        let b = stub("b", true);
        let resolver = DefaultResolver::builder(Environment::new())
            .adapter(b.clone())
            .build();
        let first = resolver.resolve().unwrap();
        let second = resolver.resolve().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(b.checks.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn prepend_through_adapters_mut() {
        let mut resolver = DefaultResolver::builder(Environment::new())
            .adapter(stub("late", true))
            .build();
        resolver.adapters_mut().insert(0, stub("early", true));
        assert_eq!(resolver.resolve().unwrap().adapter_name(), "early");
    }

    #[test]
    fn fused_falls_back_to_native_when_missing() {
        let client = Arc::new(SimulatedFusedClient::new(FusedClientConfig::default()));
        let manager = Arc::new(SimulatedLocationManager::standard());

        let without = DefaultResolver::fused_with_fallback(
            Environment::new(),
            client.clone(),
            manager.clone(),
        );
        assert_eq!(without.resolve().unwrap().adapter_name(), NativeAdapter::NAME);

        let with = DefaultResolver::fused_with_fallback(
            Environment::new().with_service(FUSED_SERVICE),
            client,
            manager,
        );
        assert_eq!(with.resolve().unwrap().adapter_name(), FusedAdapter::NAME);
    }

    #[test]
    fn native_resolver_always_resolves() {
        let resolver =
            DefaultResolver::native(Environment::new(), Arc::new(SimulatedLocationManager::new()));
        assert_eq!(resolver.adapters().len(), 1);
        assert!(resolver.resolve().is_some());
    }
}
