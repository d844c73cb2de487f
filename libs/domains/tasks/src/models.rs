use chrono::{DateTime, Utc};
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Longest title accepted by create/rename
pub const MAX_TITLE_LEN: u64 = 255;

/// The list a task lives in. Each status is an independently ordered partition.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "task_status")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    /// Not finished yet
    #[default]
    #[sea_orm(string_value = "todo")]
    Todo,
    /// Completed
    #[sea_orm(string_value = "done")]
    Done,
}

/// Task entity - a single row of a user's board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, assigned by the store
    pub id: Uuid,
    /// Owning user
    pub owner_id: Uuid,
    /// Task title (trimmed, never empty)
    pub title: String,
    /// Which list the task is in
    pub status: TaskStatus,
    /// Zero-based rank inside the `(owner_id, status)` partition
    pub position: i32,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// DTO for creating a new task. New tasks always land at the tail of `todo`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateTask {
    #[validate(length(min = 1, max = MAX_TITLE_LEN), custom(function = "validate_title"))]
    pub title: String,
}

/// DTO for updating an existing task.
///
/// Unknown fields are rejected so that e.g. a client trying to write
/// `position` directly gets a validation error instead of a silent no-op.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateTask {
    #[validate(length(min = 1, max = MAX_TITLE_LEN), custom(function = "validate_title"))]
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
}

impl UpdateTask {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.status.is_none()
    }
}

/// DTO for an explicit drag-and-drop move inside one list.
///
/// `status` and `old_position` echo the client's view of the board and are
/// checked against the stored record before anything is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ReorderTask {
    pub status: TaskStatus,
    #[validate(range(min = 0))]
    pub old_position: i32,
    #[validate(range(min = 0))]
    pub new_position: i32,
}

/// One entry of a bulk import. Entries are appended to their list in order.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct NewTask {
    #[validate(length(min = 1, max = MAX_TITLE_LEN), custom(function = "validate_title"))]
    pub title: String,
    #[serde(default)]
    pub status: TaskStatus,
}

impl NewTask {
    pub fn new(title: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            title: title.into(),
            status,
        }
    }
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::new("blank_title"));
    }
    Ok(())
}

/// Order used when listing a whole board: by position, then by list.
pub fn board_order(a: &Task, b: &Task) -> std::cmp::Ordering {
    a.position
        .cmp(&b.position)
        .then(a.status.cmp(&b.status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_round_trips_through_strings() {
        assert_eq!(TaskStatus::Todo.to_string(), "todo");
        assert_eq!(TaskStatus::from_str("done").unwrap(), TaskStatus::Done);
        assert!(TaskStatus::from_str("in_progress").is_err());
    }

    #[test]
    fn test_blank_title_is_rejected() {
        let input = CreateTask {
            title: "   ".to_string(),
        };
        assert!(input.validate().is_err());

        let input = CreateTask {
            title: String::new(),
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_overlong_title_is_rejected() {
        let input = CreateTask {
            title: "x".repeat(MAX_TITLE_LEN as usize + 1),
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_update_rejects_unknown_fields() {
        let parsed = serde_json::from_str::<UpdateTask>(r#"{"position": 3}"#);
        assert!(parsed.is_err());

        let parsed: UpdateTask = serde_json::from_str(r#"{"status": "done"}"#).unwrap();
        assert_eq!(parsed.status, Some(TaskStatus::Done));
        assert!(parsed.title.is_none());
    }

    #[test]
    fn test_reorder_rejects_negative_positions() {
        let input = ReorderTask {
            status: TaskStatus::Todo,
            old_position: -1,
            new_position: 0,
        };
        assert!(input.validate().is_err());
    }
}
