//! The in-memory task registry backing the frontend's async job tracking.
//!
//! A task moves through a small state machine: `Pending` -> `Scraping` ->
//! `Processing` -> one of `Completed`/`Failed`. The terminal states never
//! transition further, `result` and `error` are mutually exclusive, and
//! `updated_at` only moves forward. The registry holds at most `max_tasks`
//! entries; once the limit is exceeded the oldest entries by `updated_at`
//! are evicted, independent of their status.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_MAX_TASKS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Scraping,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Scraping => "scraping",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub task_id: Uuid,
    pub url: String,
    pub status: TaskStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

impl Task {
    fn new(task_id: Uuid, url: String) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            task_id,
            url,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    fn advance(&mut self, status: TaskStatus) {
        self.status = status;
        self.updated_at = OffsetDateTime::now_utc();
        if status.is_terminal() {
            self.completed_at = Some(self.updated_at);
        }
    }

    fn set_result(&mut self, result: Value) {
        self.result = Some(result);
        self.advance(TaskStatus::Completed);
    }

    fn set_error(&mut self, error: String) {
        self.error = Some(error);
        self.advance(TaskStatus::Failed);
    }
}

/// A lightweight view of a task's progress, returned by `status()`. Does not
/// carry the (potentially large) result payload.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatusView {
    pub task_id: Uuid,
    pub url: String,
    pub status: TaskStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

impl From<&Task> for TaskStatusView {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.task_id,
            url: task.url.clone(),
            status: task.status,
            created_at: task.created_at,
            updated_at: task.updated_at,
            completed_at: task.completed_at,
        }
    }
}

/// What `result()` reports for a task, depending on whether it has finished.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TaskResultView {
    Done(Value),
    Failed { error: Option<String>, status: &'static str },
    Pending { status: &'static str, message: &'static str },
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub scraping: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

pub struct TaskRegistry {
    tasks: Mutex<HashMap<Uuid, Task>>,
    max_tasks: usize,
}

impl TaskRegistry {
    pub fn new(max_tasks: usize) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            max_tasks,
        }
    }

    /// Creates a new pending task for `url` and returns its id. Evicts the
    /// oldest tasks by `updated_at` if the registry is now over capacity.
    pub fn create(&self, url: String) -> Uuid {
        let task_id = Uuid::new_v4();
        let task = Task::new(task_id, url.clone());

        let mut tasks = self.tasks.lock().expect("poisoned TaskRegistry mutex");
        tasks.insert(task_id, task);
        self.evict_oldest(&mut tasks);
        info!(%task_id, url, "task created");
        task_id
    }

    /// Moves a task to a new (non-terminal) status. No-op if the task is
    /// unknown or already in a terminal state.
    pub fn advance(&self, task_id: Uuid, status: TaskStatus) {
        let mut tasks = self.tasks.lock().expect("poisoned TaskRegistry mutex");
        if let Some(task) = tasks.get_mut(&task_id) {
            if task.status.is_terminal() {
                warn!(%task_id, status = task.status.as_str(), "ignoring status update on terminal task");
                return;
            }
            task.advance(status);
            debug!(%task_id, status = status.as_str(), "task status updated");
        }
    }

    pub fn set_result(&self, task_id: Uuid, result: Value) {
        let mut tasks = self.tasks.lock().expect("poisoned TaskRegistry mutex");
        if let Some(task) = tasks.get_mut(&task_id) {
            if task.status.is_terminal() {
                warn!(%task_id, "ignoring result on terminal task");
                return;
            }
            task.set_result(result);
            info!(%task_id, "task completed");
        }
    }

    pub fn set_error(&self, task_id: Uuid, error: String) {
        let mut tasks = self.tasks.lock().expect("poisoned TaskRegistry mutex");
        if let Some(task) = tasks.get_mut(&task_id) {
            if task.status.is_terminal() {
                warn!(%task_id, "ignoring error on terminal task");
                return;
            }
            task.set_error(error.clone());
        }
        warn!(%task_id, error, "task failed");
    }

    pub fn status(&self, task_id: Uuid) -> Option<TaskStatusView> {
        let tasks = self.tasks.lock().expect("poisoned TaskRegistry mutex");
        tasks.get(&task_id).map(TaskStatusView::from)
    }

    pub fn result(&self, task_id: Uuid) -> Option<TaskResultView> {
        let tasks = self.tasks.lock().expect("poisoned TaskRegistry mutex");
        let task = tasks.get(&task_id)?;
        Some(match task.status {
            TaskStatus::Completed => {
                TaskResultView::Done(task.result.clone().unwrap_or(Value::Null))
            }
            TaskStatus::Failed => TaskResultView::Failed {
                error: task.error.clone(),
                status: "failed",
            },
            other => TaskResultView::Pending {
                status: other.as_str(),
                message: "Task not completed yet",
            },
        })
    }

    pub fn get(&self, task_id: Uuid) -> Option<Task> {
        let tasks = self.tasks.lock().expect("poisoned TaskRegistry mutex");
        tasks.get(&task_id).cloned()
    }

    pub fn counts(&self) -> TaskCounts {
        let tasks = self.tasks.lock().expect("poisoned TaskRegistry mutex");
        let mut counts = TaskCounts::default();
        for task in tasks.values() {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Scraping => counts.scraping += 1,
                TaskStatus::Processing => counts.processing += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    fn evict_oldest(&self, tasks: &mut HashMap<Uuid, Task>) {
        if tasks.len() <= self.max_tasks {
            return;
        }
        let to_remove = tasks.len() - self.max_tasks;
        let mut ids: Vec<Uuid> = tasks.keys().copied().collect();
        ids.sort_by_key(|id| tasks[id].updated_at);
        for id in ids.into_iter().take(to_remove) {
            tasks.remove(&id);
            debug!(task_id = %id, "evicted old task");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_starts_pending() {
        let registry = TaskRegistry::new(DEFAULT_MAX_TASKS);
        let id = registry.create("https://example.com".to_string());
        let status = registry.status(id).unwrap();
        assert_eq!(status.status, TaskStatus::Pending);
        assert_eq!(status.created_at, status.updated_at);
        assert!(status.completed_at.is_none());
    }

    #[test]
    fn advancing_updates_timestamp_monotonically() {
        let registry = TaskRegistry::new(DEFAULT_MAX_TASKS);
        let id = registry.create("https://example.com".to_string());
        let before = registry.status(id).unwrap().updated_at;

        std::thread::sleep(std::time::Duration::from_millis(5));
        registry.advance(id, TaskStatus::Scraping);
        let after = registry.status(id).unwrap().updated_at;
        assert!(after > before);
    }

    #[test]
    fn terminal_state_is_immutable() {
        let registry = TaskRegistry::new(DEFAULT_MAX_TASKS);
        let id = registry.create("https://example.com".to_string());
        registry.set_result(id, serde_json::json!({"title": "ok"}));
        let after_result = registry.status(id).unwrap();

        registry.advance(id, TaskStatus::Processing);
        registry.set_error(id, "too late".to_string());

        let still = registry.status(id).unwrap();
        assert_eq!(still.status, TaskStatus::Completed);
        assert_eq!(still.updated_at, after_result.updated_at);
    }

    #[test]
    fn result_and_error_are_mutually_exclusive() {
        let registry = TaskRegistry::new(DEFAULT_MAX_TASKS);
        let id = registry.create("https://example.com".to_string());
        registry.set_error(id, "boom".to_string());
        let task = registry.get(id).unwrap();
        assert!(task.result.is_none());
        assert_eq!(task.error.as_deref(), Some("boom"));
        assert!(matches!(
            registry.result(id).unwrap(),
            TaskResultView::Failed { .. }
        ));
    }

    #[test]
    fn unfinished_result_reports_pending_status() {
        let registry = TaskRegistry::new(DEFAULT_MAX_TASKS);
        let id = registry.create("https://example.com".to_string());
        registry.advance(id, TaskStatus::Scraping);
        match registry.result(id).unwrap() {
            TaskResultView::Pending { status, .. } => assert_eq!(status, "scraping"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_task_returns_none() {
        let registry = TaskRegistry::new(DEFAULT_MAX_TASKS);
        assert!(registry.status(Uuid::new_v4()).is_none());
        assert!(registry.result(Uuid::new_v4()).is_none());
    }

    #[test]
    fn evicts_oldest_task_when_over_capacity() {
        let registry = TaskRegistry::new(2);
        let first = registry.create("https://one.example".to_string());
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = registry.create("https://two.example".to_string());
        std::thread::sleep(std::time::Duration::from_millis(5));
        let third = registry.create("https://three.example".to_string());

        assert!(registry.status(first).is_none());
        assert!(registry.status(second).is_some());
        assert!(registry.status(third).is_some());
    }

    #[test]
    fn counts_reflect_current_statuses() {
        let registry = TaskRegistry::new(DEFAULT_MAX_TASKS);
        let a = registry.create("https://a.example".to_string());
        let b = registry.create("https://b.example".to_string());
        registry.advance(a, TaskStatus::Scraping);
        registry.set_result(b, serde_json::json!({}));

        let counts = registry.counts();
        assert_eq!(counts.scraping, 1);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.pending, 0);
    }
}
