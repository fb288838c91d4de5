//! Bounded process pool for CPU-heavy jobs (headless browser automation,
//! image decoding). Rust has no `ProcessPoolExecutor`, so each job is run by
//! re-exec'ing this same binary with `--job-worker`, piping one framed
//! request over its stdin and reading one framed response off its stdout.
//! A process that overruns its deadline is killed outright — fault
//! isolation is the point, not graceful degradation.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::warn;
use wire_protocol::Message;

use crate::error::DispatchError;

const DEFAULT_JOB_TIMEOUT_SECS: u64 = 30;
/// Margin added on top of the caller-supplied timeout before we give up on
/// a job process, mirroring the original pool's fixed grace period.
const TIMEOUT_MARGIN_SECS: u64 = 10;

pub struct JobPool {
    semaphore: Arc<Semaphore>,
}

impl JobPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity.max(1))),
        }
    }

    pub async fn execute(&self, request: Message) -> Result<Message, DispatchError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("job pool semaphore never closes");

        let timeout_secs = request
            .data
            .get("timeout")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_JOB_TIMEOUT_SECS);
        let deadline = Duration::from_secs(timeout_secs + TIMEOUT_MARGIN_SECS);

        let current_exe = std::env::current_exe()?;
        let mut child = Command::new(current_exe)
            .arg("--job-worker")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child.stdin.take().expect("stdin was piped");
        let mut stdout = child.stdout.take().expect("stdout was piped");

        let exchange = async {
            wire_protocol::write_message(&mut stdin, &request).await?;
            drop(stdin);
            match wire_protocol::read_message(&mut stdout).await {
                Err(wire_protocol::FrameError::ConnectionClosed) => Err(DispatchError::WorkerDied),
                other => other.map_err(DispatchError::from),
            }
        };

        match tokio::time::timeout(deadline, exchange).await {
            Ok(Ok(response)) => {
                drop(child.wait().await);
                Ok(response)
            }
            Ok(Err(err)) => {
                warn!(%err, "job worker failed, killing process");
                drop(child.kill().await);
                Err(err)
            }
            Err(_) => {
                warn!(timeout_secs = deadline.as_secs(), "job exceeded deadline, killing process");
                drop(child.kill().await);
                Err(DispatchError::Timeout)
            }
        }
    }
}
