//! Worker entry point.

use inventory::sample_catalog;
use state_store::{InMemoryStateStore, PostgresStateStore, StateStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use worker::config::Config;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Seeds the catalog if asked to, then serves until shutdown.
async fn serve<S: StateStore + Clone + 'static>(
    config: Config,
    store: S,
    metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
) {
    let state = worker::create_default_state(store, config.reservation.clone());

    if config.seed_sample_catalog {
        let seeded = state
            .catalog
            .restock_all(sample_catalog())
            .await
            .expect("failed to seed sample catalog");
        tracing::info!(seeded, "sample catalog restocked");
    }

    let app = worker::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(
        %addr,
        write_mode = %config.reservation.write_mode,
        delay_ms = config.reservation.processing_delay.as_millis() as u64,
        "starting activity worker"
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("worker shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration
    let config = Config::from_env();

    // 2. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 3. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 4. Pick the state store and serve
    match config.database_url.clone() {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(&url)
                .await
                .expect("failed to connect to database");
            let store = PostgresStateStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL state store");
            serve(config, store, metrics_handle).await;
        }
        None => {
            tracing::info!("using in-memory state store");
            serve(config, InMemoryStateStore::new(), metrics_handle).await;
        }
    }
}
