//! Tracing subscriber initialization with structured logging and optional
//! OpenTelemetry span export.
//!
//! # Usage
//!
//! ```no_run
//! // Plain logs at warn level unless RUST_LOG says otherwise
//! leadflow_observe::tracing_setup::init_tracing("warn", false, false).unwrap();
//!
//! // JSON logs plus step spans exported to stdout
//! leadflow_observe::tracing_setup::init_tracing("info", true, true).unwrap();
//! ```

use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Stores the OTel tracer provider so it can be shut down cleanly on exit.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Filter used when `RUST_LOG` is unset; `default_filter` otherwise.
pub fn build_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Map CLI verbosity to a filter directive.
///
/// `quiet` wins over any `-v` count.
pub fn verbosity_filter(quiet: bool, verbose: u8) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Initialize the global tracing subscriber.
///
/// - Logs go to stderr so stdout stays free for `--json` output.
/// - `json` switches the fmt layer to one JSON object per line.
/// - `enable_otel` bridges spans to OpenTelemetry with a stdout exporter.
/// - `RUST_LOG` overrides `default_filter`.
///
/// # Errors
///
/// Returns an error if the global subscriber has already been set.
pub fn init_tracing(
    default_filter: &str,
    json: bool,
    enable_otel: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let plain_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
    });
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE)
    });

    let otel_layer = enable_otel.then(|| {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("leadflow");

        // Store the provider for shutdown and register it globally.
        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);

        tracing_opentelemetry::layer().with_tracer(tracer)
    });

    tracing_subscriber::registry()
        .with(build_filter(default_filter))
        .with(plain_layer)
        .with(json_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(())
}

/// Flush pending spans and shut down the OpenTelemetry tracer provider.
///
/// No-op when OTel was not enabled.
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Warning: OTel tracer provider shutdown error: {e}");
        }
    }
}
