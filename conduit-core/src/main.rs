use std::net::SocketAddr;

use axum::routing::get;
use axum::Router;
use conduit_core::auth::JwtConfig;
use conduit_core::config::CoreConfig;
use conduit_core::outbox::OutboxDispatcher;
use conduit_core::state::AppState;
use conduit_core::{db, health, ingest_grpc, metrics as core_metrics, outbox, sync_api};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
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

    tracing::info!("starting conduit-core");

    let metrics_recorder = core_metrics::MetricsRecorder::new();
    let metrics_handle = metrics_recorder.handle().clone();

    let config = CoreConfig::default();
    let pool = db::init_db_default().await?;
    tracing::info!("database initialized");

    let bridge_control_addr = std::env::var("BRIDGE_CONTROL_ADDR")
        .unwrap_or_else(|_| "http://127.0.0.1:9090".to_string());
    let dispatcher = OutboxDispatcher::new(bridge_control_addr);

    let shutdown = CancellationToken::new();

    let worker_pool = pool.clone();
    let worker_dispatcher = dispatcher.clone();
    let worker_shutdown = shutdown.clone();
    let outbox_batch_size = config.outbox_batch_size;
    let outbox_max_retries = config.outbox_max_retries;
    let outbox_interval = config.outbox_worker_interval;
    tokio::spawn(async move {
        outbox::run_worker(
            worker_pool,
            worker_dispatcher,
            outbox_batch_size,
            outbox_max_retries,
            outbox_interval,
            worker_shutdown,
        )
        .await;
    });
    tracing::info!("outbox retry worker started");

    let app_state = AppState {
        pool: pool.clone(),
        jwt: JwtConfig::default(),
        dispatcher,
    };

    let metrics_router = if config.enable_metrics {
        Router::new()
            .route("/metrics", get(core_metrics::metrics_handler))
            .with_state(metrics_handle)
    } else {
        Router::new()
    };

    let http_app = Router::new()
        .route("/health", get(health::liveness))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(pool.clone())
        .merge(sync_api::router().with_state(app_state))
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(core_metrics::track_request_metrics));

    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let grpc_addr = SocketAddr::from(([0, 0, 0, 0], config.grpc_port));

    tracing::info!(%http_addr, "sync HTTP API listening");
    tracing::info!(%grpc_addr, "ingest gRPC server listening");

    let http_shutdown = shutdown.clone();
    let http_server = async {
        let listener = tokio::net::TcpListener::bind(http_addr).await?;
        axum::serve(listener, http_app)
            .with_graceful_shutdown(async move { http_shutdown.cancelled().await })
            .await?;
        Ok::<(), anyhow::Error>(())
    };

    let grpc_shutdown = shutdown.clone();
    let grpc_server = async {
        tonic::transport::Server::builder()
            .add_service(ingest_grpc::server(pool.clone()))
            .serve_with_shutdown(grpc_addr, async move { grpc_shutdown.cancelled().await })
            .await?;
        Ok::<(), anyhow::Error>(())
    };

    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received, draining in-flight work");
        ctrl_c_shutdown.cancel();
    });

    tokio::try_join!(http_server, grpc_server)?;

    tracing::info!("conduit-core stopped");
    Ok(())
}
