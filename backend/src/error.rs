#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("job timed out")]
    Timeout,
    #[error("failed to spawn job worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("job worker exited without a result")]
    WorkerDied,
    #[error("framing error: {0}")]
    Frame(#[from] wire_protocol::FrameError),
}
