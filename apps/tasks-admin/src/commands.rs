//! Subcommand implementations, independent of the store backing them

use domain_tasks::{
    NewTask, PartitionViolation, Task, TaskRepository, TaskService, TaskStatus,
};
use eyre::{Result, bail};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// Board created by `seed`
const STARTER_BOARD: [(&str, TaskStatus); 6] = [
    ("Run the database migrations", TaskStatus::Done),
    ("Describe the tasks table", TaskStatus::Done),
    ("Write the seed command", TaskStatus::Done),
    ("Expose task creation to clients", TaskStatus::Todo),
    ("Hook up drag and drop reordering", TaskStatus::Todo),
    ("Decide between PATCH and PUT for updates", TaskStatus::Todo),
];

#[derive(Debug, Serialize)]
pub struct Board {
    pub todo: Vec<Task>,
    pub done: Vec<Task>,
}

#[derive(Debug, Serialize)]
pub struct AuditReport {
    pub owner_id: Uuid,
    pub clean: bool,
    pub violations: Vec<PartitionViolation>,
}

#[derive(Debug, Serialize)]
pub struct RepackReport {
    pub owner_id: Uuid,
    pub status: TaskStatus,
    pub moved: usize,
}

pub async fn list<R: TaskRepository>(service: &TaskService<R>, owner_id: Uuid) -> Result<Board> {
    Ok(Board {
        todo: service.list_partition(owner_id, TaskStatus::Todo).await?,
        done: service.list_partition(owner_id, TaskStatus::Done).await?,
    })
}

pub async fn audit<R: TaskRepository>(service: &TaskService<R>, owner_id: Uuid) -> Result<AuditReport> {
    let violations = service.audit(owner_id).await?;

    Ok(AuditReport {
        owner_id,
        clean: violations.is_empty(),
        violations,
    })
}

/// Repack one list, or both when `status` is `None`
pub async fn repack<R: TaskRepository>(
    service: &TaskService<R>,
    owner_id: Uuid,
    status: Option<TaskStatus>,
) -> Result<Vec<RepackReport>> {
    let statuses = match status {
        Some(status) => vec![status],
        None => vec![TaskStatus::Todo, TaskStatus::Done],
    };

    let mut reports = Vec::with_capacity(statuses.len());
    for status in statuses {
        let moved = service.repack(owner_id, status).await?;
        info!(%owner_id, %status, moved, "Repack finished");
        reports.push(RepackReport {
            owner_id,
            status,
            moved,
        });
    }

    Ok(reports)
}

/// Import the starter board. Refuses a non-empty board unless `append` is set.
pub async fn seed<R: TaskRepository>(
    service: &TaskService<R>,
    owner_id: Uuid,
    append: bool,
) -> Result<Vec<Task>> {
    let existing = service.list_tasks(owner_id).await?;
    if !existing.is_empty() && !append {
        bail!(
            "owner {} already has {} tasks; pass --append to add the starter board anyway",
            owner_id,
            existing.len()
        );
    }

    let entries = STARTER_BOARD
        .iter()
        .map(|(title, status)| NewTask::new(*title, *status))
        .collect();

    let created = service.import_tasks(owner_id, entries).await?;
    info!(%owner_id, created = created.len(), "Seeded starter board");
    Ok(created)
}
