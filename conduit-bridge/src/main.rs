use std::net::SocketAddr;
use std::sync::Arc;

use conduit_bridge::config::BridgeConfig;
use conduit_bridge::session::SessionSupervisor;
use conduit_bridge::upstream::SimulatedUpstream;
use conduit_bridge::{control_service, session_control_service};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| {
        #[cfg(debug_assertions)]
        {
            "debug".to_string()
        }
        #[cfg(not(debug_assertions))]
        {
            "warn".to_string()
        }
    });
    let log_json = std::env::var("LOG_JSON")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(true);

    let registry = tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&log_level));
    if log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("starting conduit-bridge");

    let config = BridgeConfig::default();

    if config.enable_metrics {
        let builder = PrometheusBuilder::new();
        builder
            .with_http_listener(SocketAddr::from(([0, 0, 0, 0], config.metrics_port)))
            .install()
            .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {e}"))?;
        metrics::describe_gauge!(
            "session_handles_active",
            "Number of live upstream sessions tracked by the supervisor"
        );
        metrics::describe_counter!(
            "normalizer_anomalies_total",
            "Total unrecognized upstream events counted as normalizer anomalies"
        );
        tracing::info!(port = config.metrics_port, "metrics server listening");
    }

    let shutdown = CancellationToken::new();

    let upstream_factory: Arc<dyn Fn() -> Box<dyn conduit_bridge::upstream::UpstreamClient> + Send + Sync> =
        Arc::new(|| Box::new(SimulatedUpstream::new()));

    let supervisor = Arc::new(SessionSupervisor::new(
        upstream_factory,
        config.core_ingest_addr.clone(),
        config.recording_mode,
        config.session_store_path.clone(),
        shutdown.clone(),
    ));

    let control_addr = SocketAddr::from(([0, 0, 0, 0], config.control_port));
    tracing::info!(%control_addr, "bridge control gRPC listening");

    let grpc_shutdown = shutdown.clone();
    let grpc_supervisor = supervisor.clone();
    let grpc_server = async move {
        tonic::transport::Server::builder()
            .add_service(control_service::server(grpc_supervisor.clone()))
            .add_service(session_control_service::server(grpc_supervisor))
            .serve_with_shutdown(control_addr, async move { grpc_shutdown.cancelled().await })
            .await?;
        Ok::<(), anyhow::Error>(())
    };

    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received, disconnecting sessions");
        ctrl_c_shutdown.cancel();
    });

    let shutdown_supervisor = supervisor.clone();
    let shutdown_watcher = shutdown.clone();
    tokio::spawn(async move {
        shutdown_watcher.cancelled().await;
        shutdown_supervisor.shutdown_all().await;
    });

    grpc_server.await?;

    tracing::info!("conduit-bridge stopped");
    Ok(())
}
