use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::error::{TaskError, TaskResult};
use crate::models::{CreateTask, NewTask, ReorderTask, Task, TaskStatus, UpdateTask};
use crate::positions::{self, PartitionViolation};
use crate::repository::TaskRepository;

/// Service layer for the ordered task lists.
///
/// Every operation takes the authenticated owner explicitly and issues at
/// most one [`PositionBatch`](crate::positions::PositionBatch).
#[derive(Clone)]
pub struct TaskService<R: TaskRepository> {
    repository: Arc<R>,
}

impl<R: TaskRepository> TaskService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    /// List a board, ordered by position within each list
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub async fn list_tasks(&self, owner_id: Uuid) -> TaskResult<Vec<Task>> {
        self.repository.list(owner_id, None).await
    }

    /// List one list of a board in position order
    #[instrument(skip(self), fields(owner_id = %owner_id, status = %status))]
    pub async fn list_partition(&self, owner_id: Uuid, status: TaskStatus) -> TaskResult<Vec<Task>> {
        self.repository.list(owner_id, Some(status)).await
    }

    /// Get a task by ID
    #[instrument(skip(self), fields(owner_id = %owner_id, task_id = %id))]
    pub async fn get_task(&self, owner_id: Uuid, id: Uuid) -> TaskResult<Task> {
        self.repository
            .get(owner_id, id)
            .await?
            .ok_or(TaskError::NotFound(id))
    }

    /// Create a task at the tail of `todo`
    #[instrument(skip(self, input), fields(owner_id = %owner_id))]
    pub async fn create_task(&self, owner_id: Uuid, input: CreateTask) -> TaskResult<Task> {
        input.validate()?;

        let todo_len = self.repository.count(owner_id, TaskStatus::Todo).await?;
        let batch = positions::plan_create(owner_id, input.title.trim().to_string(), todo_len);
        let task = single(self.repository.apply(batch).await?)?;

        tracing::info!(task_id = %task.id, position = task.position, "Created task");
        Ok(task)
    }

    /// Move a task to the head of the other list.
    ///
    /// Asking for the status the task already has returns it untouched.
    #[instrument(skip(self), fields(owner_id = %owner_id, task_id = %id, status = %status))]
    pub async fn change_status(&self, owner_id: Uuid, id: Uuid, status: TaskStatus) -> TaskResult<Task> {
        let task = self.get_task(owner_id, id).await?;

        let Some(batch) = positions::plan_transfer(&task, status) else {
            tracing::debug!("Status unchanged, nothing to write");
            return Ok(task);
        };

        let moved = single(self.repository.apply(batch).await?)?;
        tracing::info!(from = %task.status, from_position = task.position, "Moved task to list head");
        Ok(moved)
    }

    /// Change a task's title. Positions are not affected.
    #[instrument(skip(self, title), fields(owner_id = %owner_id, task_id = %id))]
    pub async fn rename_task(&self, owner_id: Uuid, id: Uuid, title: String) -> TaskResult<Task> {
        CreateTask { title: title.clone() }.validate()?;

        let task = self.get_task(owner_id, id).await?;
        let batch = positions::plan_rename(&task, title.trim().to_string());
        let renamed = single(self.repository.apply(batch).await?)?;

        tracing::info!("Renamed task");
        Ok(renamed)
    }

    /// Apply a partial update. A new title and a status change commit together or not at all.
    #[instrument(skip(self, input), fields(owner_id = %owner_id, task_id = %id))]
    pub async fn update_task(&self, owner_id: Uuid, id: Uuid, input: UpdateTask) -> TaskResult<Task> {
        if input.is_empty() {
            return Err(TaskError::Validation("No fields to update".to_string()));
        }
        input.validate()?;

        let task = self.get_task(owner_id, id).await?;
        let title = input.title.map(|t| t.trim().to_string());

        let Some(batch) = positions::plan_update(&task, title, input.status) else {
            tracing::debug!("Status unchanged, nothing to write");
            return Ok(task);
        };

        let updated = self
            .repository
            .apply(batch)
            .await?
            .pop()
            .ok_or_else(|| TaskError::Storage("store returned no records".to_string()))?;

        tracing::info!(status = %updated.status, position = updated.position, "Updated task");
        Ok(updated)
    }

    /// Move a task inside its list, shifting the tasks in between by one.
    ///
    /// `input.status` and `input.old_position` must match the stored task,
    /// otherwise the caller's view is stale and the move is rejected.
    #[instrument(
        skip(self, input),
        fields(owner_id = %owner_id, task_id = %id, from = input.old_position, to = input.new_position)
    )]
    pub async fn reorder_task(&self, owner_id: Uuid, id: Uuid, input: ReorderTask) -> TaskResult<()> {
        input.validate()?;

        let task = self.get_task(owner_id, id).await?;

        if input.old_position == input.new_position {
            tracing::debug!("Position unchanged, nothing to write");
            return Ok(());
        }

        if task.status != input.status || task.position != input.old_position {
            return Err(positions::stale_slot(
                id,
                input.status,
                input.old_position,
                &task,
            ));
        }

        let len = self.repository.count(owner_id, task.status).await?;
        if let Some(batch) = positions::plan_reorder(&task, input.new_position, len)? {
            self.repository.apply(batch).await?;
            tracing::info!("Reordered task");
        }

        Ok(())
    }

    /// Delete a task and close the gap it leaves
    #[instrument(skip(self), fields(owner_id = %owner_id, task_id = %id))]
    pub async fn delete_task(&self, owner_id: Uuid, id: Uuid) -> TaskResult<Task> {
        let task = self.get_task(owner_id, id).await?;

        let deleted = single(self.repository.apply(positions::plan_removal(&task)).await?)?;

        tracing::info!(status = %deleted.status, position = deleted.position, "Deleted task");
        Ok(deleted)
    }

    /// Report duplicate and missing positions on a board
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub async fn audit(&self, owner_id: Uuid) -> TaskResult<Vec<PartitionViolation>> {
        let tasks = self.repository.list(owner_id, None).await?;
        let violations = positions::audit(&tasks);

        if !violations.is_empty() {
            tracing::warn!(count = violations.len(), "Board has position violations");
        }
        Ok(violations)
    }

    /// Re-index one list to `0..n-1`, keeping its order. Returns how many tasks moved.
    #[instrument(skip(self), fields(owner_id = %owner_id, status = %status))]
    pub async fn repack(&self, owner_id: Uuid, status: TaskStatus) -> TaskResult<usize> {
        let tasks = self.repository.list(owner_id, Some(status)).await?;

        let Some(batch) = positions::plan_repack(owner_id, status, &tasks) else {
            tracing::debug!("List already dense");
            return Ok(0);
        };

        let moved = self.repository.apply(batch).await?.len();
        tracing::info!(moved, "Repacked list");
        Ok(moved)
    }

    /// Append many tasks at once, each to the tail of its list
    #[instrument(skip(self, entries), fields(owner_id = %owner_id, count = entries.len()))]
    pub async fn import_tasks(&self, owner_id: Uuid, entries: Vec<NewTask>) -> TaskResult<Vec<Task>> {
        for entry in &entries {
            entry.validate()?;
        }

        let todo_len = self.repository.count(owner_id, TaskStatus::Todo).await?;
        let done_len = self.repository.count(owner_id, TaskStatus::Done).await?;

        let Some(batch) = positions::plan_import(owner_id, entries, todo_len, done_len) else {
            return Ok(Vec::new());
        };

        let created = self.repository.apply(batch).await?;
        tracing::info!(created = created.len(), "Imported tasks");
        Ok(created)
    }
}

/// The single record a one-write batch produced
fn single(mut written: Vec<Task>) -> TaskResult<Task> {
    match (written.pop(), written.is_empty()) {
        (Some(task), true) => Ok(task),
        _ => Err(TaskError::Storage(
            "store returned an unexpected number of records".to_string(),
        )),
    }
}
