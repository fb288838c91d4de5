use std::future::Future;
use std::sync::Arc;

use health::HealthRegistry;
use task_registry::TaskRegistry;
use time::Duration;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::pipeline::remote_client_for;
use crate::router;
use crate::AppState;

pub async fn serve_app(config: &Config, liveness: HealthRegistry) -> axum::Router {
    // We have no way to actively probe the backend at startup; assume it's
    // reachable and let the first failed pipeline call correct the status.
    liveness
        .register("backend_dispatcher".to_string(), Duration::seconds(30))
        .await
        .report_healthy()
        .await;

    let state = AppState {
        registry: Arc::new(TaskRegistry::new(config.max_tasks)),
        backend: remote_client_for(&config.processing_host, config.processing_port),
        liveness,
        timesource: Arc::new(crate::time::SystemTime {}),
    };

    router::router(state, config.export_prometheus)
}

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let liveness = HealthRegistry::new("liveness");
    let app = serve_app(&config, liveness).await;

    tracing::info!("listening on {:?}", listener.local_addr().unwrap());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .unwrap()
}
