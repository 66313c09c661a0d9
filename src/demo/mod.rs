//! Demo commands against the simulated backends.
//!
//! `resolve` shows how the resolver orders and checks candidates.
//! `watch` runs a full session: connect, enable mock mode, subscribe,
//! inject a line of mock fixes, and print every event until the
//! disconnect comes back.

mod format;

use std::sync::Arc;
use std::time::Duration;

use locationhub::backend::sim::{
    FusedClientConfig, Handshake, SimulatedFusedClient, SimulatedLocationManager,
};
use locationhub::environment::FUSED_SERVICE;
use locationhub::{
    AdapterResolver, ConnectionResult, DefaultResolver, Environment, EventStream, FusedAdapter,
    HubError, HubEvent, Location, LocationHub, LocationRequest, NativeAdapter, Priority,
    event_channel,
};

use crate::cli::{Backend, Command, PriorityArg};

/// How long to wait for any single event before giving up.
const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Demo error type.
#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    #[error("hub: {0}")]
    Hub(#[from] HubError),

    /// The backend reported a failed handshake.
    #[error("connection failed: {0}")]
    ConnectionFailed(ConnectionResult),

    /// No event arrived within [`EVENT_TIMEOUT`].
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("event stream closed")]
    StreamClosed,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::NoPower => Priority::NoPower,
            PriorityArg::LowPower => Priority::LowPower,
            PriorityArg::Balanced => Priority::BalancedPowerAccuracy,
            PriorityArg::HighAccuracy => Priority::HighAccuracy,
        }
    }
}

/// Run a demo command. Called from `main.rs`.
pub async fn run(command: Command) -> Result<(), DemoError> {
    match command {
        Command::Resolve {
            fused_installed,
            fused_first,
        } => {
            resolve(fused_installed, fused_first);
            Ok(())
        }
        Command::Watch {
            backend,
            priority,
            interval_ms,
            count,
            lat,
            lon,
            alt,
            step_deg,
            handshake_ms,
        } => {
            let mut request = LocationRequest::new();
            request
                .set_priority(priority.into())
                .set_interval(interval_ms)?;
            let path = Path {
                start: (lat, lon, alt),
                step_deg,
                count,
            };
            watch(backend, &request, path, Duration::from_millis(handshake_ms)).await
        }
    }
}

fn resolve(fused_installed: bool, fused_first: bool) {
    let mut env = Environment::new();
    if fused_installed {
        env = env.with_service(FUSED_SERVICE);
    }
    let client = Arc::new(SimulatedFusedClient::new(FusedClientConfig::default()));
    let manager = Arc::new(SimulatedLocationManager::standard());

    let resolver = if fused_first {
        DefaultResolver::fused_with_fallback(env.clone(), client, manager)
    } else {
        DefaultResolver::builder(env.clone())
            .adapter(Arc::new(NativeAdapter::new(manager)))
            .adapter(Arc::new(FusedAdapter::new(client)))
            .build()
    };

    let resolved = resolver.resolve();
    format::print_candidates(&env, resolver.adapters(), resolved.as_ref());
}

/// Straight line of mock fixes.
struct Path {
    start: (f64, f64, f64),
    step_deg: f64,
    count: u32,
}

impl Path {
    fn fix(&self, i: u32) -> Location {
        let (lat, lon, alt) = self.start;
        let offset = self.step_deg * f64::from(i);
        Location::mock(lat + offset, lon + offset).with_altitude(alt)
    }
}

async fn watch(
    backend: Backend,
    request: &LocationRequest,
    path: Path,
    handshake: Duration,
) -> Result<(), DemoError> {
    let (sink, mut events) = event_channel();

    let (env, resolver) = match backend {
        Backend::Native => {
            let env = Environment::permissive();
            let manager = Arc::new(SimulatedLocationManager::standard());
            (env.clone(), DefaultResolver::native(env, manager))
        }
        Backend::Fused => {
            let env = Environment::permissive().with_service(FUSED_SERVICE);
            let client = SimulatedFusedClient::new(FusedClientConfig {
                handshake: Handshake::Delayed(handshake),
                connection_hint: None,
            });
            let resolver = DefaultResolver::builder(env.clone())
                .adapter(Arc::new(FusedAdapter::new(Arc::new(client))))
                .build();
            (env, resolver)
        }
    };
    let hub = LocationHub::with_resolver(
        env,
        Some(sink.connection_handle()),
        Some(sink.failure_handle()),
        Box::new(resolver),
    )?;
    tracing::info!(adapter = %hub.adapter(), "hub ready");

    hub.connect()?;
    match next_event(&mut events, "connection").await? {
        HubEvent::ConnectionFailed(result) => return Err(DemoError::ConnectionFailed(result)),
        event => format::print_event(&event),
    }

    hub.set_mock_mode(true)?;
    let listener = sink.location_handle();
    hub.request_location_updates(request, &listener)?;

    for i in 0..path.count {
        hub.set_mock_location(path.fix(i))?;
    }

    let mut seen = 0;
    while seen < path.count {
        let event = next_event(&mut events, "location").await?;
        if matches!(event, HubEvent::LocationChanged(_)) {
            seen += 1;
        }
        format::print_event(&event);
    }

    hub.remove_location_updates(listener.id());
    hub.disconnect();
    let event = next_event(&mut events, "disconnect").await?;
    format::print_event(&event);
    Ok(())
}

async fn next_event(events: &mut EventStream, what: &'static str) -> Result<HubEvent, DemoError> {
    match tokio::time::timeout(EVENT_TIMEOUT, events.recv()).await {
        Ok(Some(event)) => Ok(event),
        Ok(None) => Err(DemoError::StreamClosed),
        Err(_) => Err(DemoError::Timeout(what)),
    }
}
