//! Route assembly

pub mod dashboards;
pub mod health;
pub mod logs;
pub mod metrics;
pub mod otlp;
pub mod services;
pub mod traces;
pub mod ws;

use axum::Router;
use axum::routing::{delete, get, post, put};

use super::ApiState;

/// The query/dashboard router (everything except OTLP ingestion)
pub fn query_router(state: ApiState) -> Router {
    let api = Router::new()
        // Traces
        .route("/traces", get(traces::list))
        .route("/traces/recent", get(traces::recent))
        .route("/traces/{id}", get(traces::get_by_id))
        .route("/traces/{id}/spans", get(traces::spans))
        // Metrics
        .route("/metrics", get(metrics::list))
        .route("/metrics/names", get(metrics::names))
        .route("/metrics/series", get(metrics::series))
        .route("/metrics/series/batch", post(metrics::batch_series))
        .route("/metrics/breakdown", get(metrics::breakdown))
        // Logs
        .route("/logs", get(logs::list))
        .route("/logs/levels", get(logs::levels))
        // Services and stats
        .route("/services", get(services::list))
        .route("/stats", get(services::stats))
        .route("/telemetry", delete(services::delete_telemetry))
        // Dashboards
        .route("/dashboards", get(dashboards::list).post(dashboards::create))
        .route(
            "/dashboards/{id}",
            get(dashboards::get_by_id)
                .put(dashboards::update)
                .delete(dashboards::delete_by_id),
        )
        .route("/dashboards/{id}/default", post(dashboards::set_default))
        .route(
            "/dashboards/{id}/widgets",
            get(dashboards::list_widgets).post(dashboards::create_widget),
        )
        .route(
            "/dashboards/{id}/widgets/positions",
            put(dashboards::update_widget_positions),
        )
        .route(
            "/widgets/{id}",
            put(dashboards::update_widget).delete(dashboards::delete_widget),
        );

    Router::new()
        .nest("/api", api)
        .route("/ws", get(ws::handler))
        .route("/health", get(health::health))
        .with_state(state)
}
