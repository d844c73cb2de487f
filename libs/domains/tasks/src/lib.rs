//! Tasks Domain
//!
//! Per-user `todo`/`done` lists whose members carry a dense, zero-based
//! `position`. Every mutation is planned as a [`PositionBatch`] and applied
//! atomically by a store, so positions stay unique and gap-free under
//! concurrent requests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   Service   │  ← Validation, ownership, one batch per operation
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │  Positions  │  ← Pure planners: guards, range shifts, writes
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← Atomic batch application (Postgres, in-memory)
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_tasks::{CreateTask, PgTaskRepository, TaskService};
//! use sea_orm::Database;
//! use uuid::Uuid;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect("postgres://...").await?;
//!
//! let service = TaskService::new(PgTaskRepository::new(db));
//! let owner = Uuid::now_v7();
//! let task = service
//!     .create_task(owner, CreateTask { title: "write docs".into() })
//!     .await?;
//! assert_eq!(task.position, 0);
//! # Ok(())
//! # }
//! ```

pub mod entity;
pub mod error;
pub mod models;
pub mod positions;
pub mod postgres;
pub mod repository;
pub mod service;

pub use error::{TaskError, TaskResult};
pub use models::{CreateTask, NewTask, ReorderTask, Task, TaskStatus, UpdateTask};
pub use positions::{PartitionViolation, PositionBatch};
pub use postgres::PgTaskRepository;
pub use repository::{InMemoryTaskRepository, TaskRepository};
pub use service::TaskService;
