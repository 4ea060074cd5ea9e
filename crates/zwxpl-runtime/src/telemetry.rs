//! Log output for the bridge daemon.
//!
//! `RUST_LOG` filters (default `info`), `ZWXPL_LOG_FORMAT=json` switches to
//! JSON lines, and `OTEL_EXPORTER_OTLP_ENDPOINT` adds span export over OTLP.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_FORMAT_ENV: &str = "ZWXPL_LOG_FORMAT";
pub const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Install the global subscriber. Call once, before the Tokio runtime starts,
/// and keep the guard until the process exits.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = json_format_requested(std::env::var(LOG_FORMAT_ENV).ok().as_deref());
    let provider = std::env::var(OTLP_ENDPOINT_ENV)
        .ok()
        .and_then(|endpoint| build_provider(service_name, endpoint));

    let otel = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("zwxpl")));

    tracing_subscriber::registry()
        .with(filter)
        .with(otel)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer().compact()))
        .init();

    TracerProviderGuard(provider)
}

fn json_format_requested(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("json"))
}

/// Flushes exported spans on drop. Drop it before `std::process::exit`.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("[zwxpl] span export shutdown failed: {e}");
        }
    }
}

// No subscriber exists yet, so failures go to stderr.
fn build_provider(service_name: &str, endpoint: String) -> Option<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[zwxpl] OTLP exporter disabled: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    // Simple exporter: it must not need a Tokio runtime.
    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            .with_simple_exporter(exporter)
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_format_is_opt_in() {
        assert!(json_format_requested(Some("json")));
        assert!(json_format_requested(Some(" JSON ")));
        assert!(!json_format_requested(Some("compact")));
        assert!(!json_format_requested(None));
    }

    #[test]
    fn empty_guard_drops_quietly() {
        drop(TracerProviderGuard(None));
    }
}
