use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::task::TaskRecord;

const BASE_SELECT: &str = r#"
    SELECT
        id,
        room_id,
        content,
        scheduled_time,
        created_at,
        updated_at
    FROM tasks
"#;

#[derive(Debug, Clone)]
pub struct TaskRow {
    pub id: String,
    pub room_id: String,
    pub content: String,
    pub scheduled_time: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskRow {
    pub fn from_record(record: &TaskRecord) -> Self {
        Self {
            id: record.id.clone(),
            room_id: record.room_id.clone(),
            content: record.content.clone(),
            scheduled_time: record.scheduled_time.clone(),
            created_at: record.created_at.clone(),
            updated_at: record.updated_at.clone(),
        }
    }

    pub fn into_record(self) -> TaskRecord {
        TaskRecord {
            id: self.id,
            room_id: self.room_id,
            content: self.content,
            scheduled_time: self.scheduled_time,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl TryFrom<&Row<'_>> for TaskRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(TaskRow {
            id: row.get("id")?,
            room_id: row.get("room_id")?,
            content: row.get("content")?,
            scheduled_time: row.get("scheduled_time")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct TaskRepository;

impl TaskRepository {
    pub fn insert(conn: &Connection, row: &TaskRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO tasks (
                    id,
                    room_id,
                    content,
                    scheduled_time,
                    created_at,
                    updated_at
                ) VALUES (
                    :id,
                    :room_id,
                    :content,
                    :scheduled_time,
                    :created_at,
                    :updated_at
                )
            "#,
            named_params! {
                ":id": &row.id,
                ":room_id": &row.room_id,
                ":content": &row.content,
                ":scheduled_time": &row.scheduled_time,
                ":created_at": &row.created_at,
                ":updated_at": &row.updated_at,
            },
        )?;

        Ok(())
    }

    pub fn update_scheduled_time(
        conn: &Connection,
        id: &str,
        scheduled_time: Option<&str>,
        updated_at: &str,
    ) -> AppResult<()> {
        let affected = conn.execute(
            "UPDATE tasks SET scheduled_time = :scheduled_time, updated_at = :updated_at WHERE id = :id",
            named_params! {
                ":id": id,
                ":scheduled_time": scheduled_time,
                ":updated_at": updated_at,
            },
        )?;

        if affected == 0 {
            return Err(AppError::not_found());
        }

        Ok(())
    }

    pub fn delete(conn: &Connection, id: &str) -> AppResult<()> {
        let affected = conn.execute("DELETE FROM tasks WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(AppError::not_found());
        }
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<TaskRow>> {
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", BASE_SELECT))?;
        let row = stmt
            .query_row([id], |row| TaskRow::try_from(row))
            .optional()?;
        Ok(row)
    }

    pub fn list_by_room(conn: &Connection, room_id: &str) -> AppResult<Vec<TaskRow>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE room_id = ?1 ORDER BY created_at ASC",
            BASE_SELECT
        ))?;
        let rows = stmt
            .query_map([room_id], |row| TaskRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
