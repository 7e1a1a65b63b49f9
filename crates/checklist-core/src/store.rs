use std::collections::HashSet;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::storage::{KeyValueStore, StorageKey};
use crate::task::{Priority, Task, TaskId};
use crate::view::{ViewQuery, derive};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("task title cannot be empty")]
    EmptyTitle,
}

/// An inline title edit in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub id: TaskId,
    pub draft: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub completed: usize,
    pub active: usize,
    pub overdue: usize,
}

/// Owns the task list, newest first, and mirrors it into one storage slot
/// after every mutation.
#[derive(Debug)]
pub struct TaskStore<S: KeyValueStore> {
    storage: S,
    key: String,
    tasks: Vec<Task>,
    editing: Option<EditSession>,
}

impl<S: KeyValueStore> TaskStore<S> {
    #[tracing::instrument(skip(storage), fields(key = %key.as_key()))]
    pub fn open(storage: S, key: &StorageKey) -> Self {
        let mut store = Self {
            storage,
            key: key.as_key(),
            tasks: vec![],
            editing: None,
        };
        store.tasks = store.load();
        info!(count = store.tasks.len(), "opened task store");
        store
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn find(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn editing(&self) -> Option<&EditSession> {
        self.editing.as_ref()
    }

    /// Reads the slot. Missing or unreadable data yields an empty list.
    #[tracing::instrument(skip(self), fields(key = %self.key))]
    pub fn load(&self) -> Vec<Task> {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("no stored tasks");
                return vec![];
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed reading task slot; starting empty");
                return vec![];
            }
        };

        if raw.trim().is_empty() {
            return vec![];
        }

        let records = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(records)) => records,
            Ok(other) => {
                warn!(kind = json_kind(&other), "task slot is not a JSON array; starting empty");
                return vec![];
            }
            Err(err) => {
                warn!(error = %err, "malformed task slot; starting empty");
                return vec![];
            }
        };

        let tasks = sanitize(records);
        debug!(count = tasks.len(), "loaded tasks");
        tasks
    }

    /// Writes the full list. Failures are logged and dropped.
    #[tracing::instrument(skip(self), fields(key = %self.key, count = self.tasks.len()))]
    pub fn save(&mut self) {
        let serialized = match serde_json::to_string(&self.tasks) {
            Ok(serialized) => serialized,
            Err(err) => {
                warn!(error = %err, "failed to serialize tasks; not saved");
                return;
            }
        };

        if let Err(err) = self.storage.set(&self.key, &serialized) {
            warn!(error = %format!("{err:#}"), "failed to save tasks");
        }
    }

    pub fn add(
        &mut self,
        title: &str,
        due: Option<NaiveDate>,
        priority: Priority,
    ) -> Result<Task, StoreError> {
        self.add_at(title, due, priority, Utc::now())
    }

    #[tracing::instrument(skip(self, now))]
    pub fn add_at(
        &mut self,
        title: &str,
        due: Option<NaiveDate>,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Result<Task, StoreError> {
        let title = title.trim();
        if title.is_empty() {
            debug!("rejected empty title");
            return Err(StoreError::EmptyTitle);
        }

        let mut task = Task::new(title.to_string(), due, priority, now);
        while self.find(&task.id).is_some() {
            task.id = TaskId::generate();
        }

        debug!(id = %task.id, "added task");
        self.tasks.insert(0, task.clone());
        self.save();
        Ok(task)
    }

    #[tracing::instrument(skip(self))]
    pub fn toggle_completed(&mut self, id: &TaskId) {
        if let Some(task) = self.tasks.iter_mut().find(|t| &t.id == id) {
            task.completed = !task.completed;
            debug!(completed = task.completed, "toggled task");
        }
        self.save();
    }

    #[tracing::instrument(skip(self))]
    pub fn remove(&mut self, id: &TaskId) {
        self.tasks.retain(|t| &t.id != id);
        self.end_stale_edit();
        self.save();
    }

    /// Returns how many tasks were removed.
    #[tracing::instrument(skip(self))]
    pub fn clear_completed(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| !t.completed);
        let removed = before - self.tasks.len();
        info!(removed, "cleared completed tasks");
        self.end_stale_edit();
        self.save();
        removed
    }

    #[tracing::instrument(skip(self))]
    pub fn clear_all(&mut self) -> usize {
        let removed = self.tasks.len();
        self.tasks.clear();
        info!(removed, "cleared all tasks");
        self.editing = None;
        self.save();
        removed
    }

    /// A blank title leaves the task unchanged.
    #[tracing::instrument(skip(self))]
    pub fn update_title(&mut self, id: &TaskId, new_title: &str) {
        let new_title = new_title.trim();
        if new_title.is_empty() {
            debug!("blank title ignored");
            return;
        }

        if let Some(task) = self.tasks.iter_mut().find(|t| &t.id == id) {
            task.title = new_title.to_string();
        }
        self.save();
    }

    #[tracing::instrument(skip(self))]
    pub fn set_priority(&mut self, id: &TaskId, priority: Priority) {
        if let Some(task) = self.tasks.iter_mut().find(|t| &t.id == id) {
            task.priority = priority;
        }
        self.save();
    }

    #[tracing::instrument(skip(self))]
    pub fn set_due(&mut self, id: &TaskId, due: Option<NaiveDate>) {
        if let Some(task) = self.tasks.iter_mut().find(|t| &t.id == id) {
            task.due = due;
        }
        self.save();
    }

    pub fn begin_edit(&mut self, id: &TaskId) -> bool {
        let Some(task) = self.find(id) else {
            return false;
        };
        self.editing = Some(EditSession {
            id: task.id.clone(),
            draft: task.title.clone(),
        });
        true
    }

    pub fn set_draft(&mut self, text: &str) {
        if let Some(session) = self.editing.as_mut() {
            session.draft = text.to_string();
        }
    }

    pub fn commit_edit(&mut self) {
        if let Some(session) = self.editing.take() {
            self.update_title(&session.id, &session.draft);
        }
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    pub fn stats(&self, today: NaiveDate) -> Stats {
        let completed = self.tasks.iter().filter(|t| t.completed).count();
        Stats {
            total: self.tasks.len(),
            completed,
            active: self.tasks.len() - completed,
            overdue: self.tasks.iter().filter(|t| t.is_overdue(today)).count(),
        }
    }

    pub fn view(&self, query: &ViewQuery, today: NaiveDate) -> Vec<&Task> {
        derive(&self.tasks, query, today)
    }

    /// Resolves a full id or a unique id prefix.
    pub fn resolve_id(&self, prefix: &str) -> anyhow::Result<TaskId> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(anyhow!("task id cannot be empty"));
        }

        if let Some(task) = self.tasks.iter().find(|t| t.id.as_str() == prefix) {
            return Ok(task.id.clone());
        }

        let mut matches = self.tasks.iter().filter(|t| t.id.as_str().starts_with(prefix));
        let first = matches
            .next()
            .ok_or_else(|| anyhow!("no task matches id {prefix}"))?;
        if matches.next().is_some() {
            return Err(anyhow!("task id {prefix} is ambiguous"));
        }
        Ok(first.id.clone())
    }

    fn end_stale_edit(&mut self) {
        if let Some(session) = &self.editing
            && self.find(&session.id).is_none()
        {
            self.editing = None;
        }
    }
}

// Drops records that would break list invariants instead of rejecting the
// whole slot.
fn sanitize(records: Vec<Value>) -> Vec<Task> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(records.len());

    for (idx, record) in records.into_iter().enumerate() {
        let task: Task = match serde_json::from_value(record) {
            Ok(task) => task,
            Err(err) => {
                warn!(index = idx, error = %err, "skipping unreadable task record");
                continue;
            }
        };

        let title = task.title.trim();
        if title.is_empty() {
            warn!(index = idx, id = %task.id, "skipping task with empty title");
            continue;
        }

        if !seen.insert(task.id.clone()) {
            warn!(index = idx, id = %task.id, "skipping task with duplicate id");
            continue;
        }

        out.push(task);
    }

    out
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
