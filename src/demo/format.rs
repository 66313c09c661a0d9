//! Output formatting for the demo commands.
//!
//! Tables and event lines go to stdout; diagnostics go through tracing.

use std::sync::Arc;

use locationhub::{Environment, HubEvent, Location, ProviderAdapter};

/// Print the resolver's candidates in order, marking the resolved one.
pub fn print_candidates(
    env: &Environment,
    adapters: &[Arc<dyn ProviderAdapter>],
    resolved: Option<&Arc<dyn ProviderAdapter>>,
) {
    if adapters.is_empty() {
        println!("No candidate adapters");
        return;
    }

    println!("{:<4} {:<10} {:>9} RESOLVED", "#", "ADAPTER", "AVAILABLE");
    println!("{}", "-".repeat(36));
    for (i, adapter) in adapters.iter().enumerate() {
        let chosen = resolved.is_some_and(|r| Arc::ptr_eq(r, adapter));
        println!(
            "{:<4} {:<10} {:>9} {}",
            i,
            adapter.adapter_name(),
            yes_no(adapter.is_service_available(env)),
            if chosen { "*" } else { "" }
        );
    }
}

/// Print one hub event as a status line.
pub fn print_event(event: &HubEvent) {
    println!("{}", format_event(event));
}

fn format_event(event: &HubEvent) -> String {
    match event {
        HubEvent::Connected(None) => "connected".to_string(),
        HubEvent::Connected(Some(hint)) => format!("connected ({} hint keys)", hint.len()),
        HubEvent::Disconnected => "disconnected".to_string(),
        HubEvent::ConnectionFailed(result) => format!("connection failed: {result}"),
        HubEvent::LocationChanged(location) => format!("location  {}", format_location(location)),
    }
}

/// Compact `lat,lon[,alt] via provider` rendering.
fn format_location(location: &Location) -> String {
    let mut out = format!("{:.6},{:.6}", location.latitude, location.longitude);
    if let Some(alt) = location.altitude {
        out.push_str(&format!(",{alt:.1}"));
    }
    out.push_str(" via ");
    out.push_str(&location.provider);
    out
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}
