//! File-backed task registry.
//!
//! The whole collection lives in one JSON object (id → task). Every
//! mutation is a single critical section under an exclusive lock:
//! load, apply, write atomically. Reads take a shared lock. Separate
//! `TaskStore` instances (or processes) pointing at the same file
//! therefore never lose each other's updates.

use crate::error::{Result, StoreError};
use crate::lock::StoreLock;
use crate::task::{NewTask, StoredTask, Task, TaskCounts, TaskUpdate};
use chrono::{DateTime, Utc};
use payslip_core::TaskId;
use payslip_security::write_secure;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default time to wait for another holder of the store lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

type TaskMap = BTreeMap<String, Task>;

/// Persistent task registry backed by a JSON file.
#[derive(Debug, Clone)]
pub struct TaskStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl TaskStore {
    /// Store backed by `path`. Nothing touches disk until the first call.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");
        Self {
            path,
            lock_path: PathBuf::from(lock_path),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Override how long to wait for the store lock.
    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Path of the data file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate and persist a new task, returning its generated id.
    pub fn create(&self, new: NewTask) -> Result<TaskId> {
        let task = new.into_task(Utc::now())?;
        let id = task.id.clone();

        self.mutate(|tasks| {
            tasks.insert(id.as_str().to_string(), task);
            Ok(())
        })?;

        tracing::info!(task_id = %id, "Created task");
        Ok(id)
    }

    /// Look up a task by id.
    pub fn get(&self, id: &str) -> Result<Option<Task>> {
        self.read(|tasks| tasks.get(id).cloned())
    }

    /// All tasks (or only enabled ones), newest first, ties by id.
    pub fn list(&self, active_only: bool) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self.read(|tasks| {
            tasks
                .values()
                .filter(|t| !active_only || t.enabled)
                .cloned()
                .collect()
        })?;
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(tasks)
    }

    /// Enabled tasks, same order as [`list`](Self::list).
    pub fn active(&self) -> Result<Vec<Task>> {
        self.list(true)
    }

    /// Apply a partial update and return the updated task.
    pub fn update(&self, id: &str, update: TaskUpdate) -> Result<Task> {
        let task = self.mutate(|tasks| {
            let task = tasks.get_mut(id).ok_or_else(|| StoreError::not_found(id))?;
            update.validate()?;
            update.apply(task);
            Ok(task.clone())
        })?;

        tracing::info!(task_id = %id, "Updated task");
        Ok(task)
    }

    /// Remove a task.
    pub fn delete(&self, id: &str) -> Result<()> {
        self.mutate(|tasks| {
            tasks
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| StoreError::not_found(id))
        })?;

        tracing::info!(task_id = %id, "Deleted task");
        Ok(())
    }

    /// Record a run of `id` at `at` (now when `None`).
    pub fn mark_run(&self, id: &str, at: Option<DateTime<Utc>>) -> Result<()> {
        let at = at.unwrap_or_else(Utc::now);
        self.mutate(|tasks| {
            let task = tasks.get_mut(id).ok_or_else(|| StoreError::not_found(id))?;
            task.last_run = Some(at);
            Ok(())
        })?;

        tracing::debug!(task_id = %id, last_run = %at, "Marked task as run");
        Ok(())
    }

    /// Total, enabled and disabled task counts.
    pub fn counts(&self) -> Result<TaskCounts> {
        self.read(|tasks| {
            let enabled = tasks.values().filter(|t| t.enabled).count();
            TaskCounts {
                total: tasks.len(),
                enabled,
                disabled: tasks.len() - enabled,
            }
        })
    }

    fn read<T>(&self, f: impl FnOnce(&TaskMap) -> T) -> Result<T> {
        let _lock = StoreLock::shared(&self.lock_path, self.lock_timeout)?;
        let tasks = self.load()?;
        Ok(f(&tasks))
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut TaskMap) -> Result<T>) -> Result<T> {
        let _lock = StoreLock::exclusive(&self.lock_path, self.lock_timeout)?;
        let mut tasks = self.load()?;
        let out = f(&mut tasks)?;
        self.save(&tasks)?;
        Ok(out)
    }

    fn load(&self) -> Result<TaskMap> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(TaskMap::new()),
            Err(e) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    action: "reading task store",
                    source: e,
                })
            }
        };

        let corrupted = |reason: String| StoreError::Corrupted {
            path: self.path.clone(),
            reason,
        };

        let raw: BTreeMap<String, StoredTask> =
            serde_json::from_str(&content).map_err(|e| corrupted(e.to_string()))?;

        raw.into_iter()
            .map(|(id, stored)| {
                let task = stored
                    .into_task(&id)
                    .map_err(|reason| corrupted(format!("task {id}: {reason}")))?;
                Ok((id, task))
            })
            .collect()
    }

    fn save(&self, tasks: &TaskMap) -> Result<()> {
        let stored: BTreeMap<&str, StoredTask> = tasks
            .iter()
            .map(|(id, task)| (id.as_str(), StoredTask::from(task)))
            .collect();

        let json = serde_json::to_vec_pretty(&stored).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            action: "serializing task store",
            source: e.into(),
        })?;

        write_secure(&self.path, &json).map_err(StoreError::Write)?;
        tracing::debug!(path = %self.path.display(), count = tasks.len(), "Saved task store");
        Ok(())
    }
}
