//! Position planning for the per-status task lists.
//!
//! Every mutation that touches ordering is expressed as a [`PositionBatch`]:
//! a set of guards that must still hold, range shifts over a partition, and
//! point writes. The planners in this module are pure; a
//! [`TaskRepository`](crate::repository::TaskRepository) applies a batch
//! atomically.
//!
//! Within a `(owner_id, status)` partition positions are always `0..n-1`.
//!
//! ```text
//! reorder 1 -> 3 (moving down)       transfer todo@1 -> done
//!
//!  0 a      0 a                       todo: 0 a  1 b  2 c   done: 0 x
//!  1 b ─┐   1 c  (-1)                 todo: 0 a  1 c        done: 0 b  1 x
//!  2 c  │   2 d  (-1)
//!  3 d  └─> 3 b
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::error::{TaskError, TaskResult};
use crate::models::{NewTask, Task, TaskStatus};

/// Inclusive range of positions. `end: None` means "to the tail".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionRange {
    pub start: i32,
    pub end: Option<i32>,
}

impl PositionRange {
    pub fn starting_at(start: i32) -> Self {
        Self { start, end: None }
    }

    pub fn between(start: i32, end: i32) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    pub fn contains(&self, position: i32) -> bool {
        position >= self.start && self.end.is_none_or(|end| position <= end)
    }
}

/// Add `delta` to the position of every task of `status` inside `range`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub status: TaskStatus,
    pub range: PositionRange,
    pub delta: i32,
    /// The moved task itself is never shifted
    pub except: Option<Uuid>,
}

impl Shift {
    /// Close the hole left at `vacated`
    pub fn close_gap(status: TaskStatus, vacated: i32, except: Uuid) -> Self {
        Self {
            status,
            range: PositionRange::starting_at(vacated + 1),
            delta: -1,
            except: Some(except),
        }
    }

    /// Push the whole partition down by one to free position 0
    pub fn open_head(status: TaskStatus, except: Uuid) -> Self {
        Self {
            status,
            range: PositionRange::starting_at(0),
            delta: 1,
            except: Some(except),
        }
    }

    pub fn applies_to(&self, task: &Task) -> bool {
        task.status == self.status
            && self.range.contains(task.position)
            && self.except != Some(task.id)
    }
}

/// Precondition checked inside the atomic batch before anything is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// The task is still in `status` at `position`
    At {
        id: Uuid,
        status: TaskStatus,
        position: i32,
    },
    /// The partition still holds exactly `len` tasks
    Len { status: TaskStatus, len: i32 },
}

/// Point write applied after the shifts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Insert {
        title: String,
        status: TaskStatus,
        position: i32,
    },
    Place {
        id: Uuid,
        status: TaskStatus,
        position: i32,
    },
    Retitle {
        id: Uuid,
        title: String,
    },
    Remove {
        id: Uuid,
    },
}

/// Everything one operator writes, scoped to a single owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionBatch {
    pub owner_id: Uuid,
    pub guards: Vec<Guard>,
    pub shifts: Vec<Shift>,
    pub writes: Vec<Write>,
}

impl PositionBatch {
    pub fn new(owner_id: Uuid) -> Self {
        Self {
            owner_id,
            guards: Vec::new(),
            shifts: Vec::new(),
            writes: Vec::new(),
        }
    }

    pub fn guard(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn shift(mut self, shift: Shift) -> Self {
        self.shifts.push(shift);
        self
    }

    pub fn write(mut self, write: Write) -> Self {
        self.writes.push(write);
        self
    }

    /// Apply the batch to an owner-agnostic row set.
    ///
    /// This is the reference semantics every store must match. On error the
    /// rows may be half-updated, so callers apply it to a copy.
    pub fn apply_to(&self, rows: &mut HashMap<Uuid, Task>) -> TaskResult<Vec<Task>> {
        let owner_id = self.owner_id;

        for guard in &self.guards {
            match *guard {
                Guard::At {
                    id,
                    status,
                    position,
                } => {
                    let current = rows
                        .get(&id)
                        .filter(|t| t.owner_id == owner_id)
                        .ok_or(TaskError::NotFound(id))?;
                    if current.status != status || current.position != position {
                        return Err(stale_slot(id, status, position, current));
                    }
                }
                Guard::Len { status, len } => {
                    let actual = rows
                        .values()
                        .filter(|t| t.owner_id == owner_id && t.status == status)
                        .count() as i32;
                    if actual != len {
                        return Err(stale_len(status, len, actual));
                    }
                }
            }
        }

        let now = chrono::Utc::now();

        for shift in &self.shifts {
            for task in rows
                .values_mut()
                .filter(|t| t.owner_id == owner_id && shift.applies_to(t))
            {
                task.position += shift.delta;
                task.updated_at = now;
            }
        }

        let mut written = Vec::with_capacity(self.writes.len());
        for write in &self.writes {
            let task = match write {
                Write::Insert {
                    title,
                    status,
                    position,
                } => {
                    let task = Task {
                        id: Uuid::now_v7(),
                        owner_id,
                        title: title.clone(),
                        status: *status,
                        position: *position,
                        created_at: now,
                        updated_at: now,
                    };
                    rows.insert(task.id, task.clone());
                    task
                }
                Write::Place {
                    id,
                    status,
                    position,
                } => {
                    let task = owned_mut(rows, owner_id, *id)?;
                    task.status = *status;
                    task.position = *position;
                    task.updated_at = now;
                    task.clone()
                }
                Write::Retitle { id, title } => {
                    let task = owned_mut(rows, owner_id, *id)?;
                    task.title = title.clone();
                    task.updated_at = now;
                    task.clone()
                }
                Write::Remove { id } => {
                    owned_mut(rows, owner_id, *id)?;
                    rows.remove(id).ok_or(TaskError::NotFound(*id))?
                }
            };
            written.push(task);
        }

        Ok(written)
    }
}

fn owned_mut(rows: &mut HashMap<Uuid, Task>, owner_id: Uuid, id: Uuid) -> TaskResult<&mut Task> {
    rows.get_mut(&id)
        .filter(|t| t.owner_id == owner_id)
        .ok_or(TaskError::NotFound(id))
}

pub(crate) fn stale_slot(id: Uuid, status: TaskStatus, position: i32, current: &Task) -> TaskError {
    TaskError::Conflict(format!(
        "task {} expected at {}#{}, found at {}#{}",
        id, status, position, current.status, current.position
    ))
}

pub(crate) fn stale_len(status: TaskStatus, expected: i32, actual: i32) -> TaskError {
    TaskError::Conflict(format!(
        "{} list expected to hold {} tasks, holds {}",
        status, expected, actual
    ))
}

/// Append a new task to the tail of `todo`.
pub fn plan_create(owner_id: Uuid, title: String, todo_len: i32) -> PositionBatch {
    PositionBatch::new(owner_id)
        .guard(Guard::Len {
            status: TaskStatus::Todo,
            len: todo_len,
        })
        .write(Write::Insert {
            title,
            status: TaskStatus::Todo,
            position: todo_len,
        })
}

/// Move `task` to the head of the `to` list, closing the gap it leaves.
///
/// Returns `None` when the task already has that status.
pub fn plan_transfer(task: &Task, to: TaskStatus) -> Option<PositionBatch> {
    if task.status == to {
        return None;
    }

    Some(
        PositionBatch::new(task.owner_id)
            .guard(Guard::At {
                id: task.id,
                status: task.status,
                position: task.position,
            })
            .shift(Shift::close_gap(task.status, task.position, task.id))
            .shift(Shift::open_head(to, task.id))
            .write(Write::Place {
                id: task.id,
                status: to,
                position: 0,
            }),
    )
}

/// Move `task` to `new_position` inside its own list of `len` tasks.
///
/// Returns `None` when the position does not change.
pub fn plan_reorder(task: &Task, new_position: i32, len: i32) -> TaskResult<Option<PositionBatch>> {
    let old_position = task.position;
    if new_position == old_position {
        return Ok(None);
    }
    if new_position < 0 || new_position >= len {
        return Err(TaskError::Validation(format!(
            "position {} is outside the {} list (0..{})",
            new_position, task.status, len
        )));
    }

    let shift = if new_position > old_position {
        Shift {
            status: task.status,
            range: PositionRange::between(old_position + 1, new_position),
            delta: -1,
            except: Some(task.id),
        }
    } else {
        Shift {
            status: task.status,
            range: PositionRange::between(new_position, old_position - 1),
            delta: 1,
            except: Some(task.id),
        }
    };

    Ok(Some(
        PositionBatch::new(task.owner_id)
            .guard(Guard::At {
                id: task.id,
                status: task.status,
                position: old_position,
            })
            .guard(Guard::Len {
                status: task.status,
                len,
            })
            .shift(shift)
            .write(Write::Place {
                id: task.id,
                status: task.status,
                position: new_position,
            }),
    ))
}

/// Delete `task` and pull everything below it up by one.
pub fn plan_removal(task: &Task) -> PositionBatch {
    PositionBatch::new(task.owner_id)
        .guard(Guard::At {
            id: task.id,
            status: task.status,
            position: task.position,
        })
        .shift(Shift::close_gap(task.status, task.position, task.id))
        .write(Write::Remove { id: task.id })
}

pub fn plan_rename(task: &Task, title: String) -> PositionBatch {
    PositionBatch::new(task.owner_id).write(Write::Retitle { id: task.id, title })
}

/// Rename and/or move `task` in one batch.
///
/// The retitle comes first, so the last record written is the task in its
/// final state. Returns `None` when neither field changes anything.
pub fn plan_update(task: &Task, title: Option<String>, status: Option<TaskStatus>) -> Option<PositionBatch> {
    let transfer = status.and_then(|to| plan_transfer(task, to));

    match (title, transfer) {
        (None, transfer) => transfer,
        (Some(title), None) => Some(plan_rename(task, title)),
        (Some(title), Some(mut batch)) => {
            batch
                .writes
                .insert(0, Write::Retitle { id: task.id, title });
            Some(batch)
        }
    }
}

/// Re-index one partition to `0..n-1`, keeping the current visual order.
///
/// `tasks` must be the full partition. Ties on position are broken by
/// creation time, then id. Returns `None` when the partition is already dense.
pub fn plan_repack(owner_id: Uuid, status: TaskStatus, tasks: &[Task]) -> Option<PositionBatch> {
    let mut ordered: Vec<&Task> = tasks.iter().filter(|t| t.status == status).collect();
    ordered.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });

    let mut batch = PositionBatch::new(owner_id).guard(Guard::Len {
        status,
        len: ordered.len() as i32,
    });

    for (index, task) in ordered.iter().enumerate() {
        let target = index as i32;
        if task.position == target {
            continue;
        }
        batch = batch
            .guard(Guard::At {
                id: task.id,
                status,
                position: task.position,
            })
            .write(Write::Place {
                id: task.id,
                status,
                position: target,
            });
    }

    (!batch.writes.is_empty()).then_some(batch)
}

/// Append imported entries to the tails of their lists, in input order.
pub fn plan_import(
    owner_id: Uuid,
    entries: Vec<NewTask>,
    todo_len: i32,
    done_len: i32,
) -> Option<PositionBatch> {
    if entries.is_empty() {
        return None;
    }

    let mut next = BTreeMap::from([(TaskStatus::Todo, todo_len), (TaskStatus::Done, done_len)]);
    let mut batch = PositionBatch::new(owner_id)
        .guard(Guard::Len {
            status: TaskStatus::Todo,
            len: todo_len,
        })
        .guard(Guard::Len {
            status: TaskStatus::Done,
            len: done_len,
        });

    for entry in entries {
        let slot = next.entry(entry.status).or_insert(0);
        batch = batch.write(Write::Insert {
            title: entry.title.trim().to_string(),
            status: entry.status,
            position: *slot,
        });
        *slot += 1;
    }

    Some(batch)
}

/// A broken density/uniqueness invariant found by [`audit`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartitionViolation {
    #[error("{status}: position {position} is held by {count} tasks")]
    Duplicate {
        status: TaskStatus,
        position: i32,
        count: usize,
    },

    #[error("{status}: position {position} is empty")]
    Gap { status: TaskStatus, position: i32 },

    #[error("{status}: task {id} has negative position {position}")]
    Negative {
        status: TaskStatus,
        id: Uuid,
        position: i32,
    },
}

/// Check every partition present in `tasks` for duplicates and gaps.
///
/// `tasks` is expected to be one owner's board.
pub fn audit(tasks: &[Task]) -> Vec<PartitionViolation> {
    let mut partitions: BTreeMap<TaskStatus, Vec<&Task>> = BTreeMap::new();
    for task in tasks {
        partitions.entry(task.status).or_default().push(task);
    }

    let mut violations = Vec::new();
    for (status, members) in partitions {
        let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
        for task in &members {
            if task.position < 0 {
                violations.push(PartitionViolation::Negative {
                    status,
                    id: task.id,
                    position: task.position,
                });
            } else {
                *counts.entry(task.position).or_default() += 1;
            }
        }

        for (&position, &count) in counts.iter().filter(|(_, c)| **c > 1) {
            violations.push(PartitionViolation::Duplicate {
                status,
                position,
                count,
            });
        }

        for position in 0..members.len() as i32 {
            if !counts.contains_key(&position) {
                violations.push(PartitionViolation::Gap { status, position });
            }
        }
    }

    violations
}
