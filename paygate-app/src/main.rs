//! # Paygate Server
//!
//! Binary that wires together all the components:
//! - Load configuration from environment and the gateway config file
//! - Connect the order service store
//! - Create the pay service
//! - Start the notification HTTP server

mod config;

use opentelemetry::global;
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace as sdktrace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paygate_gateways::HttpOrderStore;
use paygate_hex::{Pay, PayService, inbound::HttpServer};
use paygate_types::PayConfig;

fn init_tracer() -> anyhow::Result<(sdktrace::Tracer, sdktrace::SdkTracerProvider)> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // gRPC exporter with batch processing; endpoint comes from OTEL_EXPORTER_OTLP_ENDPOINT
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()?;

    let provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();

    global::set_tracer_provider(provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    Ok((provider.tracer("paygate-server"), provider))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = config::Config::from_env()?;

    let (telemetry, otel_provider) = match &config.otlp_endpoint {
        Some(_) => {
            let (tracer, provider) = init_tracer()?;
            (
                Some(tracing_opentelemetry::layer().with_tracer(tracer)),
                Some(provider),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,paygate_app=debug,paygate_hex=debug,paygate_gateways=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry)
        .init();

    let pay_config = PayConfig::from_file(&config.gateway_config)?;
    tracing::info!("Starting paygate server on port {}", config.port);
    tracing::info!(
        config = %config.gateway_config,
        gateways = pay_config.gateways.len(),
        "Loaded gateway config"
    );
    tracing::info!("Using order service: {}", config.order_service_url);

    let pay = Pay::new(pay_config);
    let store = HttpOrderStore::new(&config.order_service_url, &config.order_service_secret);
    let service = PayService::new(pay, store);

    let server = HttpServer::new(service);
    let addr = format!("0.0.0.0:{}", config.port);

    server.run(&addr).await?;

    // Ensure traces are flushed before exit
    if let Some(provider) = otel_provider {
        let _ = provider.shutdown();
    }
    Ok(())
}
