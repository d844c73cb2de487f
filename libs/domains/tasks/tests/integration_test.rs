//! Integration tests for the Tasks domain
//!
//! These tests use real PostgreSQL via testcontainers to ensure:
//! - Position batches commit atomically
//! - The deferred unique constraint tolerates range shifts
//! - Concurrent requests on one board never break density
//! - Owners are fully isolated

use domain_tasks::*;
use test_utils::{TestDataBuilder, TestDatabase};
use uuid::Uuid;

fn service(db: &TestDatabase) -> TaskService<PgTaskRepository> {
    TaskService::new(PgTaskRepository::new(db.connection()))
}

async fn titles(service: &TaskService<PgTaskRepository>, owner: Uuid, status: TaskStatus) -> Vec<String> {
    service
        .list_partition(owner, status)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.title)
        .collect()
}

async fn positions_of(service: &TaskService<PgTaskRepository>, owner: Uuid, status: TaskStatus) -> Vec<i32> {
    service
        .list_partition(owner, status)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.position)
        .collect()
}

async fn create(service: &TaskService<PgTaskRepository>, owner: Uuid, title: &str) -> Task {
    service
        .create_task(owner, CreateTask { title: title.to_string() })
        .await
        .unwrap()
}

// ============================================================================
// Walkthrough scenarios
// ============================================================================

#[tokio::test]
async fn test_create_appends_to_todo_tail() {
    let db = TestDatabase::new().await;
    let service = service(&db);
    let data = TestDataBuilder::from_test_name("create_appends");
    let owner = data.owner_id("alice");

    let a = create(&service, owner, "A").await;
    let b = create(&service, owner, "B").await;
    let c = create(&service, owner, "C").await;

    assert_eq!((a.position, b.position, c.position), (0, 1, 2));
    assert_eq!(c.status, TaskStatus::Todo);
    assert_eq!(titles(&service, owner, TaskStatus::Todo).await, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_status_change_moves_to_head_and_closes_gap() {
    let db = TestDatabase::new().await;
    let service = service(&db);
    let owner = TestDataBuilder::from_test_name("status_change").owner_id("alice");

    create(&service, owner, "A").await;
    let b = create(&service, owner, "B").await;
    create(&service, owner, "C").await;
    let x = service
        .import_tasks(owner, vec![NewTask::new("X", TaskStatus::Done)])
        .await
        .unwrap()
        .remove(0);

    let moved = service.change_status(owner, b.id, TaskStatus::Done).await.unwrap();
    assert_eq!((moved.status, moved.position), (TaskStatus::Done, 0));

    assert_eq!(titles(&service, owner, TaskStatus::Todo).await, vec!["A", "C"]);
    assert_eq!(positions_of(&service, owner, TaskStatus::Todo).await, vec![0, 1]);
    assert_eq!(titles(&service, owner, TaskStatus::Done).await, vec!["B", "X"]);
    assert_eq!(service.get_task(owner, x.id).await.unwrap().position, 1);

    // Asking again changes nothing
    let again = service.change_status(owner, b.id, TaskStatus::Done).await.unwrap();
    assert_eq!(again.position, 0);
    assert_eq!(titles(&service, owner, TaskStatus::Done).await, vec!["B", "X"]);
}

#[tokio::test]
async fn test_reorder_down_and_up() {
    let db = TestDatabase::new().await;
    let service = service(&db);
    let owner = TestDataBuilder::from_test_name("reorder").owner_id("alice");

    let p = create(&service, owner, "P").await;
    create(&service, owner, "Q").await;
    create(&service, owner, "R").await;
    let s = create(&service, owner, "S").await;

    service
        .reorder_task(
            owner,
            p.id,
            ReorderTask { status: TaskStatus::Todo, old_position: 0, new_position: 2 },
        )
        .await
        .unwrap();
    assert_eq!(titles(&service, owner, TaskStatus::Todo).await, vec!["Q", "R", "P", "S"]);

    service
        .reorder_task(
            owner,
            s.id,
            ReorderTask { status: TaskStatus::Todo, old_position: 3, new_position: 0 },
        )
        .await
        .unwrap();
    assert_eq!(titles(&service, owner, TaskStatus::Todo).await, vec!["S", "Q", "R", "P"]);
    assert_eq!(positions_of(&service, owner, TaskStatus::Todo).await, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_delete_repacks_list() {
    let db = TestDatabase::new().await;
    let service = service(&db);
    let owner = TestDataBuilder::from_test_name("delete").owner_id("alice");

    create(&service, owner, "A").await;
    let b = create(&service, owner, "B").await;
    create(&service, owner, "C").await;

    let deleted = service.delete_task(owner, b.id).await.unwrap();
    assert_eq!(deleted.title, "B");

    assert_eq!(titles(&service, owner, TaskStatus::Todo).await, vec!["A", "C"]);
    assert_eq!(positions_of(&service, owner, TaskStatus::Todo).await, vec![0, 1]);

    let gone = service.get_task(owner, b.id).await;
    assert!(matches!(gone, Err(TaskError::NotFound(_))));
}

#[tokio::test]
async fn test_foreign_owner_cannot_touch_tasks() {
    let db = TestDatabase::new().await;
    let service = service(&db);
    let data = TestDataBuilder::from_test_name("ownership");
    let alice = data.owner_id("alice");
    let bob = data.owner_id("bob");

    let a = create(&service, alice, "A").await;
    create(&service, alice, "B").await;

    let status = service.change_status(bob, a.id, TaskStatus::Done).await;
    let delete = service.delete_task(bob, a.id).await;
    let reorder = service
        .reorder_task(
            bob,
            a.id,
            ReorderTask { status: TaskStatus::Todo, old_position: 0, new_position: 1 },
        )
        .await;

    assert!(matches!(status, Err(TaskError::NotFound(_))));
    assert!(matches!(delete, Err(TaskError::NotFound(_))));
    assert!(matches!(reorder, Err(TaskError::NotFound(_))));
    assert_eq!(titles(&service, alice, TaskStatus::Todo).await, vec!["A", "B"]);

    // Bob's own list starts at zero regardless of Alice's
    let own = create(&service, bob, "mine").await;
    assert_eq!(own.position, 0);
}

// ============================================================================
// Store guarantees
// ============================================================================

#[tokio::test]
async fn test_stale_reorder_is_rejected_without_writes() {
    let db = TestDatabase::new().await;
    let service = service(&db);
    let owner = TestDataBuilder::from_test_name("stale_reorder").owner_id("alice");

    create(&service, owner, "A").await;
    let b = create(&service, owner, "B").await;
    create(&service, owner, "C").await;

    let result = service
        .reorder_task(
            owner,
            b.id,
            ReorderTask { status: TaskStatus::Todo, old_position: 2, new_position: 0 },
        )
        .await;

    assert!(matches!(result, Err(TaskError::Conflict(_))));
    assert_eq!(titles(&service, owner, TaskStatus::Todo).await, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_back_to_back_reorders_on_one_list() {
    let db = TestDatabase::new().await;
    let service = service(&db);
    let owner = TestDataBuilder::from_test_name("back_to_back").owner_id("alice");

    let mut tasks = Vec::new();
    for title in ["A", "B", "C", "D"] {
        tasks.push(create(&service, owner, title).await);
    }

    let (first, second) = tokio::join!(
        service.reorder_task(
            owner,
            tasks[1].id,
            ReorderTask { status: TaskStatus::Todo, old_position: 1, new_position: 3 },
        ),
        service.reorder_task(
            owner,
            tasks[0].id,
            ReorderTask { status: TaskStatus::Todo, old_position: 0, new_position: 2 },
        ),
    );

    let expected = match (&first, &second) {
        (Ok(()), Ok(())) => vec!["C", "D", "A", "B"],
        (Ok(()), Err(TaskError::Conflict(_))) => vec!["A", "C", "D", "B"],
        (Err(TaskError::Conflict(_)), Ok(())) => vec!["B", "C", "A", "D"],
        other => panic!("unexpected outcome: {:?}", other),
    };

    assert_eq!(titles(&service, owner, TaskStatus::Todo).await, expected);
    assert_eq!(positions_of(&service, owner, TaskStatus::Todo).await, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_concurrent_requests_keep_board_dense() {
    let db = TestDatabase::new().await;
    let service = service(&db);
    let owner = TestDataBuilder::from_test_name("concurrent").owner_id("alice");

    let mut tasks = Vec::new();
    for title in ["A", "B", "C", "D", "E", "F"] {
        tasks.push(create(&service, owner, title).await);
    }

    // Requests interleave at every await; whoever commits against a stale read gets Conflict
    let (r1, r2, r3, r4, r5) = tokio::join!(
        service.reorder_task(
            owner,
            tasks[0].id,
            ReorderTask { status: TaskStatus::Todo, old_position: 0, new_position: 5 },
        ),
        service.reorder_task(
            owner,
            tasks[5].id,
            ReorderTask { status: TaskStatus::Todo, old_position: 5, new_position: 0 },
        ),
        async {
            service
                .change_status(owner, tasks[2].id, TaskStatus::Done)
                .await
                .map(|_| ())
        },
        async { service.delete_task(owner, tasks[3].id).await.map(|_| ()) },
        async {
            service
                .create_task(owner, CreateTask { title: "G".to_string() })
                .await
                .map(|_| ())
        },
    );
    let results = [r1, r2, r3, r4, r5];

    for result in &results {
        assert!(
            // A reorder planned after the delete committed sees a shorter list
            matches!(
                result,
                Ok(()) | Err(TaskError::Conflict(_)) | Err(TaskError::Validation(_))
            ),
            "unexpected outcome: {:?}",
            result
        );
    }
    assert!(results.iter().any(|r| r.is_ok()));

    assert!(service.audit(owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_creates_get_distinct_positions() {
    let db = TestDatabase::new().await;
    let service = service(&db);
    let owner = TestDataBuilder::from_test_name("concurrent_create").owner_id("alice");

    let (a, b) = tokio::join!(
        service.create_task(owner, CreateTask { title: "one".to_string() }),
        service.create_task(owner, CreateTask { title: "two".to_string() }),
    );

    let created: Vec<Task> = [a, b].into_iter().filter_map(Result::ok).collect();
    assert!(!created.is_empty());

    let listed = positions_of(&service, owner, TaskStatus::Todo).await;
    assert_eq!(listed, (0..created.len() as i32).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_unique_constraint_is_enforced_at_commit() {
    let db = TestDatabase::new().await;
    let owner = TestDataBuilder::from_test_name("unique").owner_id("alice");

    db.execute(&format!(
        "INSERT INTO tasks (id, owner_id, title, status, position) VALUES ('{}', '{}', 'first', 'todo', 0)",
        Uuid::now_v7(),
        owner
    ))
    .await;

    let duplicate = sea_orm::ConnectionTrait::execute_unprepared(
        &db.connection,
        &format!(
            "INSERT INTO tasks (id, owner_id, title, status, position) VALUES ('{}', '{}', 'second', 'todo', 0)",
            Uuid::now_v7(),
            owner
        ),
    )
    .await;

    let err = TaskError::from(duplicate.unwrap_err());
    assert!(matches!(err, TaskError::Conflict(_)), "got {:?}", err);
}

// ============================================================================
// Maintenance
// ============================================================================

#[tokio::test]
async fn test_audit_and_repack_legacy_gaps() {
    let db = TestDatabase::new().await;
    let service = service(&db);
    let owner = TestDataBuilder::from_test_name("legacy").owner_id("alice");

    // A delete that never repacked left positions 0, 2, 5
    for (title, position) in [("first", 0), ("second", 2), ("third", 5)] {
        db.execute(&format!(
            "INSERT INTO tasks (id, owner_id, title, status, position) VALUES ('{}', '{}', '{}', 'todo', {})",
            Uuid::now_v7(),
            owner,
            title,
            position
        ))
        .await;
    }

    let violations = service.audit(owner).await.unwrap();
    assert_eq!(
        violations,
        vec![PartitionViolation::Gap { status: TaskStatus::Todo, position: 1 }]
    );

    assert_eq!(service.repack(owner, TaskStatus::Todo).await.unwrap(), 2);
    assert!(service.audit(owner).await.unwrap().is_empty());
    assert_eq!(
        titles(&service, owner, TaskStatus::Todo).await,
        vec!["first", "second", "third"]
    );
}

#[tokio::test]
async fn test_import_and_update() {
    let db = TestDatabase::new().await;
    let service = service(&db);
    let owner = TestDataBuilder::from_test_name("import").owner_id("alice");

    let created = service
        .import_tasks(
            owner,
            vec![
                NewTask::new("shipped", TaskStatus::Done),
                NewTask::new("next", TaskStatus::Todo),
                NewTask::new("later", TaskStatus::Todo),
            ],
        )
        .await
        .unwrap();
    assert_eq!(created.len(), 3);

    let later = &created[2];
    let updated = service
        .update_task(
            owner,
            later.id,
            UpdateTask { title: Some("sooner".to_string()), status: Some(TaskStatus::Done) },
        )
        .await
        .unwrap();

    assert_eq!(updated.title, "sooner");
    assert_eq!(titles(&service, owner, TaskStatus::Done).await, vec!["sooner", "shipped"]);
    assert_eq!(titles(&service, owner, TaskStatus::Todo).await, vec!["next"]);
}
