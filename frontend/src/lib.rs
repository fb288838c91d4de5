use std::sync::Arc;

use health::HealthRegistry;
use remote_client::RemoteClient;
use task_registry::TaskRegistry;

pub mod api;
pub mod config;
pub mod handlers;
pub mod pipeline;
pub mod prometheus;
pub mod router;
pub mod server;
pub mod time;

use crate::time::TimeSource;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<TaskRegistry>,
    pub backend: RemoteClient,
    pub liveness: HealthRegistry,
    pub timesource: Arc<dyn TimeSource + Send + Sync>,
}
