use std::future::ready;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::prometheus::{setup_metrics_recorder, track_metrics};
use crate::{handlers, AppState};

pub fn router(state: AppState, metrics: bool) -> Router {
    let liveness = state.liveness.clone();
    let router = Router::new()
        .route("/", get(handlers::index))
        .route("/scrape", get(handlers::scrape))
        .route("/status/:task_id", get(handlers::status))
        .route("/result/:task_id", get(handlers::result))
        .route("/tasks", get(handlers::tasks))
        .route("/_readiness", get(handlers::index))
        .route("/_liveness", get(move || ready(liveness.get_status())))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state);

    // Installing a global Prometheus recorder more than once panics, so
    // tests that build multiple routers should pass metrics=false.
    if metrics {
        let recorder_handle = setup_metrics_recorder();
        router.route(
            "/metrics",
            get(move || std::future::ready(recorder_handle.render())),
        )
    } else {
        router
    }
}
