use std::sync::Arc;

use envconfig::Envconfig;
use tracing_subscriber::EnvFilter;

mod config;
mod dispatcher;
mod error;
mod job_worker;
mod pool;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::init_from_env().expect("failed to load configuration from env");

    let default_level = if config.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .init();

    if std::env::args().any(|arg| arg == "--job-worker") {
        job_worker::run().await;
        return Ok(());
    }

    let process_count = config.process_count();

    let listener = tokio::net::TcpListener::bind(config.bind()).await?;
    tracing::info!(
        bind = config.bind(),
        processes = process_count,
        "backend dispatcher listening"
    );

    let pool = Arc::new(pool::JobPool::new(process_count));
    dispatcher::run(listener, pool).await
}
