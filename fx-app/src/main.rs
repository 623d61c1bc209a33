//! # FX Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize the upstream rate provider adapter
//! - Create the shared cache and circuit breaker
//! - Create the conversion service
//! - Start the HTTP server

mod config;

use std::sync::Arc;

use opentelemetry::{KeyValue, global};
use opentelemetry_sdk::{
    metrics::{PeriodicReader, SdkMeterProvider},
    propagation::TraceContextPropagator,
    trace as sdktrace,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fx_hex::{ConversionService, inbound::HttpServer};
use fx_resilience::{CircuitBreaker, CircuitState, RateCache, TransitionListener};
use fx_upstream::HttpRateClient;

fn init_tracer() -> anyhow::Result<(sdktrace::Tracer, sdktrace::SdkTracerProvider)> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Use gRPC exporter with batch processing (non-blocking)
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()?;

    let provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();

    global::set_tracer_provider(provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    Ok((provider.tracer("fx-service"), provider))
}

/// Installs the global meter provider read by the HTTP metrics layer and
/// the breaker transition counter.
fn init_meter() -> anyhow::Result<SdkMeterProvider> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .build()?;

    let provider = SdkMeterProvider::builder()
        .with_reader(PeriodicReader::builder(exporter).build())
        .build();

    global::set_meter_provider(provider.clone());
    Ok(provider)
}

/// Reports breaker transitions as log events and an OpenTelemetry counter.
///
/// The counter is a no-op unless [`init_meter`] ran first.
fn transition_listener() -> TransitionListener {
    let transitions = global::meter("fx-service")
        .u64_counter("fx.circuit.transitions")
        .with_description("Upstream circuit breaker state changes")
        .build();

    Arc::new(move |from: CircuitState, to: CircuitState| {
        tracing::info!(%from, %to, "upstream circuit state changed");
        transitions.add(
            1,
            &[
                KeyValue::new("from", from.as_str()),
                KeyValue::new("to", to.as_str()),
            ],
        );
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // OpenTelemetry export is opt-in
    let otel = match std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Ok(endpoint) if !endpoint.trim().is_empty() => Some((init_tracer()?, init_meter()?)),
        _ => None,
    };
    let telemetry = otel
        .as_ref()
        .map(|((tracer, _), _)| tracing_opentelemetry::layer().with_tracer(tracer.clone()));

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,fx_app=debug,fx_hex=debug,fx_resilience=debug,fx_upstream=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry)
        .init();

    // Load configuration
    let config = config::Config::from_env()?;

    tracing::info!("Starting currency server on port {}", config.port);
    tracing::info!("Using upstream provider: {}", config.upstream_base_url);

    // Upstream adapter
    let provider = HttpRateClient::new(config.upstream_config())?;

    // Process-wide resilience state
    let cache = Arc::new(RateCache::new());
    let sweeper = config
        .cache_sweep_interval
        .map(|period| cache.spawn_sweeper(period));
    let breaker = Arc::new(
        CircuitBreaker::new("upstream", config.breaker_config())
            .with_listener(transition_listener()),
    );

    // Create the conversion service
    let service = ConversionService::new(provider, config.service_config(), cache, breaker);

    // Create and run the HTTP server
    let server = HttpServer::new(service);
    let addr = format!("0.0.0.0:{}", config.port);

    server.run(&addr).await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }

    // Ensure traces and metrics are flushed before exit
    if let Some(((_, tracer_provider), meter_provider)) = otel {
        let _ = tracer_provider.shutdown();
        let _ = meter_provider.shutdown();
    }
    Ok(())
}
