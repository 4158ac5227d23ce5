use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::repositories::task_repository::{TaskRepository, TaskRow};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::task::{TaskCreateInput, TaskRecord};

/// Plain CRUD over a room's tasks. Deleting a task cascades to its schedule
/// entries through the storage layer.
#[derive(Clone)]
pub struct TaskService {
    pool: DbPool,
}

impl TaskService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn create_task(&self, input: TaskCreateInput) -> AppResult<TaskRecord> {
        let content = input.content.trim();
        if content.is_empty() {
            return Err(AppError::validation("task content must not be empty"));
        }
        if input.room_id.trim().is_empty() {
            return Err(AppError::validation("room id must not be empty"));
        }

        let now = Utc::now().to_rfc3339();
        let record = TaskRecord {
            id: Uuid::new_v4().to_string(),
            room_id: input.room_id,
            content: content.to_string(),
            scheduled_time: input.scheduled_time,
            created_at: now.clone(),
            updated_at: now,
        };

        let row = TaskRow::from_record(&record);
        self.pool.with_connection(|conn| TaskRepository::insert(conn, &row))?;

        info!(target: "app::task", task_id = %record.id, room_id = %record.room_id, "task created");
        Ok(record)
    }

    pub fn get_task(&self, id: &str) -> AppResult<TaskRecord> {
        let row = self
            .pool
            .with_connection(|conn| TaskRepository::find_by_id(conn, id))?
            .ok_or_else(AppError::not_found)?;
        Ok(row.into_record())
    }

    pub fn list_tasks(&self, room_id: &str) -> AppResult<Vec<TaskRecord>> {
        let rows = self
            .pool
            .with_connection(|conn| TaskRepository::list_by_room(conn, room_id))?;
        debug!(target: "app::task", room_id, count = rows.len(), "tasks listed");
        Ok(rows.into_iter().map(TaskRow::into_record).collect())
    }

    pub fn set_scheduled_time(&self, id: &str, scheduled_time: Option<&str>) -> AppResult<TaskRecord> {
        let now = Utc::now().to_rfc3339();
        self.pool.with_connection(|conn| {
            TaskRepository::update_scheduled_time(conn, id, scheduled_time, &now)
        })?;
        self.get_task(id)
    }

    pub fn delete_task(&self, id: &str) -> AppResult<()> {
        self.pool.with_connection(|conn| TaskRepository::delete(conn, id))?;
        info!(target: "app::task", task_id = %id, "task deleted");
        Ok(())
    }
}
