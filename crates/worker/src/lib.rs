//! HTTP activity host for the inventory reservation workflow step.
//!
//! The workflow engine drives activities through `POST /activities/{name}`;
//! operators seed and inspect stock through `/inventory/{item}`. Structured
//! logging comes from tracing and metrics are exported for Prometheus.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use inventory::{ActivityRegistry, InventoryCatalog, ReservationConfig, ReserveInventoryActivity};
use metrics_exporter_prometheus::PrometheusHandle;
use state_store::StateStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state accessible from all handlers.
pub struct AppState<S: StateStore> {
    pub registry: ActivityRegistry,
    pub catalog: InventoryCatalog<S>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: StateStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::observability::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::observability::health::<S>))
        .route("/activities", get(routes::activities::list::<S>))
        .route(
            "/activities/{name}",
            axum::routing::post(routes::activities::invoke::<S>),
        )
        .route(
            "/inventory/{item}",
            get(routes::inventory::get::<S>).put(routes::inventory::restock::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state with the reservation activity registered.
pub fn create_default_state<S: StateStore + Clone + 'static>(
    store: S,
    reservation: ReservationConfig,
) -> Arc<AppState<S>> {
    let mut registry = ActivityRegistry::new();
    registry.register(ReserveInventoryActivity::new(store.clone(), reservation));

    Arc::new(AppState {
        registry,
        catalog: InventoryCatalog::new(store),
    })
}
