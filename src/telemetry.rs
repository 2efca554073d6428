//! Tracing initialization.
//!
//! Controlled by `OTEL_EXPORTER_OTLP_ENDPOINT`:
//! - unset → human-readable events on stderr, but only when `RUST_LOG` is
//!   set (progress output already tells the user what is happening)
//! - `"stderr"` → JSON spans/events to stderr
//! - `"http://..."` → OTLP HTTP export (traces + logs) to the given endpoint
//!
//! `RUST_LOG` filters in every mode; the default level is `info`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

#[cfg(feature = "otel")]
const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");

/// Opaque guard: dropping it flushes and shuts down the OTLP pipeline.
/// Hold this in `main()` until exit.
pub struct TelemetryGuard {
    #[cfg(feature = "otel")]
    trace_provider: Option<opentelemetry_sdk::trace::SdkTracerProvider>,
    #[cfg(feature = "otel")]
    log_provider: Option<opentelemetry_sdk::logs::SdkLoggerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        #[cfg(feature = "otel")]
        {
            if let Some(provider) = self.trace_provider.take()
                && let Err(e) = provider.shutdown()
            {
                eprintln!("otel trace shutdown error: {e}");
            }
            if let Some(provider) = self.log_provider.take()
                && let Err(e) = provider.shutdown()
            {
                eprintln!("otel log shutdown error: {e}");
            }
        }
    }
}

/// Initialize tracing from the environment.
///
/// Returns a guard that must be held until the program exits.
#[must_use]
pub fn init() -> TelemetryGuard {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();

    match endpoint.as_deref() {
        None | Some("") => init_fmt(),
        Some("stderr") => init_stderr_json(),
        #[cfg(feature = "otel")]
        Some(_) => init_otlp(),
        #[cfg(not(feature = "otel"))]
        Some(_) => {
            eprintln!(
                "warning: OTEL_EXPORTER_OTLP_ENDPOINT set but svn-bisect built without 'otel' feature"
            );
            init_fmt()
        }
    }
}

const fn empty_guard() -> TelemetryGuard {
    TelemetryGuard {
        #[cfg(feature = "otel")]
        trace_provider: None,
        #[cfg(feature = "otel")]
        log_provider: None,
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Plain-text events to stderr when `RUST_LOG` asks for them.
fn init_fmt() -> TelemetryGuard {
    if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .init();
    }
    empty_guard()
}

/// JSON spans/events to stderr via tracing-subscriber's JSON formatter.
fn init_stderr_json() -> TelemetryGuard {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE),
        )
        .init();

    empty_guard()
}

/// OTLP HTTP export (traces + logs).
///
/// The SDK reads `OTEL_EXPORTER_OTLP_ENDPOINT` from the environment natively
/// and appends `/v1/traces` or `/v1/logs` as appropriate. If either exporter
/// cannot be built, falls back to [`init_fmt`].
#[cfg(feature = "otel")]
fn init_otlp() -> TelemetryGuard {
    use opentelemetry::trace::TracerProvider as _;

    let (span_exporter, log_exporter) = match otlp_exporters() {
        Ok(exporters) => exporters,
        Err(e) => {
            eprintln!("warning: OTLP export disabled: {e}");
            return init_fmt();
        }
    };

    let resource = otel_resource();
    let trace_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_simple_exporter(span_exporter)
        .with_resource(resource.clone())
        .build();
    let log_provider = opentelemetry_sdk::logs::SdkLoggerProvider::builder()
        .with_simple_exporter(log_exporter)
        .with_resource(resource)
        .build();

    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_opentelemetry::layer().with_tracer(trace_provider.tracer(SERVICE_NAME)))
        .with(opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new(&log_provider))
        .init();

    TelemetryGuard {
        trace_provider: Some(trace_provider),
        log_provider: Some(log_provider),
    }
}

#[cfg(feature = "otel")]
fn otlp_exporters() -> Result<
    (opentelemetry_otlp::SpanExporter, opentelemetry_otlp::LogExporter),
    opentelemetry_otlp::ExporterBuildError,
> {
    let spans = opentelemetry_otlp::SpanExporter::builder().with_http().build()?;
    let logs = opentelemetry_otlp::LogExporter::builder().with_http().build()?;
    Ok((spans, logs))
}

/// Resource attributes attached to every exported span and log record.
#[cfg(feature = "otel")]
fn otel_resource() -> opentelemetry_sdk::Resource {
    use opentelemetry::KeyValue;
    opentelemetry_sdk::Resource::builder()
        .with_attribute(KeyValue::new("service.name", SERVICE_NAME))
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .with_attribute(KeyValue::new("vcs.default_tool", crate::config::DEFAULT_VCS_TOOL))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_guard_drops_without_providers() {
        let guard = empty_guard();
        #[cfg(feature = "otel")]
        {
            assert!(guard.trace_provider.is_none());
            assert!(guard.log_provider.is_none());
        }
        drop(guard);
    }

    #[cfg(feature = "otel")]
    #[test]
    fn resource_identifies_the_tool() {
        use opentelemetry::{Key, Value};

        let resource = otel_resource();
        assert_eq!(
            resource.get(&Key::new("service.name")),
            Some(Value::from("svn-bisect"))
        );
        assert_eq!(
            resource.get(&Key::new("service.version")),
            Some(Value::from(env!("CARGO_PKG_VERSION")))
        );
        assert_eq!(
            resource.get(&Key::new("vcs.default_tool")),
            Some(Value::from("svn"))
        );
    }
}
