use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod domain;
mod messaging;
mod metrics;
mod models;
mod storage;
mod utils;

use config::AppConfig;
use domain::registration::{PricingResolver, RegistrationPipeline};
use messaging::{publication_queue, CircuitBreakingSink, RedpandaClient};
use models::RegistrationRequest;
use storage::{ensure_schema, ScyllaRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging, overridable with RUST_LOG
    // Example: RUST_LOG=debug cargo run < registrations.jsonl
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true).with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,event_registration=debug"))
        )
        .init();

    tracing::info!("🚀 Starting event registration service");

    let config = AppConfig::from_env();
    tracing::debug!(?config, "Configuration loaded");

    // === 1. Metrics registry and HTTP endpoint ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let system = actix_web::rt::System::new();
        if let Err(e) = system.block_on(metrics::start_metrics_server(metrics_registry, metrics_port)) {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    // === 2. ScyllaDB session and schema ===
    tracing::info!(nodes = ?config.scylla.nodes, "Connecting to ScyllaDB...");
    let session: Session = SessionBuilder::new()
        .known_nodes(&config.scylla.nodes)
        .build()
        .await?;
    ensure_schema(&session, &config.scylla).await?;
    let repository = Arc::new(ScyllaRepository::new(Arc::new(session)));

    // === 3. Publication pipeline: queue → serialize → Redpanda ===
    let redpanda = Arc::new(RedpandaClient::new(&config.redpanda)?);
    let broker = Arc::new(CircuitBreakingSink::new(
        redpanda,
        RedpandaClient::circuit_breaker_config(),
        metrics.clone(),
    ));
    let (queue, stage) = publication_queue(
        broker,
        repository.clone(),
        config.publisher.retry_config(),
        metrics.clone(),
    );
    let publisher = tokio::spawn(stage.run());

    // === 4. Registration pipeline ===
    let pricing = PricingResolver::new(repository.clone(), repository.clone(), repository.clone());
    let pipeline = Arc::new(RegistrationPipeline::new(
        pricing,
        repository.clone(),
        repository,
        queue,
        metrics,
    ));

    // === 5. Intake: one JSON registration request per stdin line ===
    tracing::info!("📝 Reading registration requests from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight = JoinSet::new();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, finishing in-flight registrations");
                None
            }
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let request: RegistrationRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed registration request");
                continue;
            }
        };

        let pipeline = pipeline.clone();
        in_flight.spawn(async move {
            let outcome = match pipeline.register(request.received_at, &request.registration).await {
                Ok(ticket) => serde_json::json!({
                    "status": "registered",
                    "email": ticket.attendee.email,
                    "ticketCode": ticket.ticket_code,
                    "netPrice": ticket.net_price,
                }),
                Err(e) => serde_json::json!({
                    "status": "rejected",
                    "email": request.registration.email,
                    "kind": e.label(),
                    "error": e.to_string(),
                }),
            };
            println!("{}", outcome);
        });
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "Registration task panicked");
        }
    }

    // Dropping the last pipeline handle closes the queue; the stage drains it
    drop(pipeline);
    publisher.await?;

    tracing::info!("🎉 All registrations processed and handed to the broker");
    Ok(())
}
