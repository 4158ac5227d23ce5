use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::schedule::{Bucket, ScheduleEntry, ScheduleSource};

const BASE_SELECT: &str = r#"
    SELECT
        id,
        task_id,
        room_id,
        date,
        start_minute,
        end_minute,
        bucket,
        confidence,
        source,
        created_at,
        updated_at
    FROM schedule_entries
"#;

#[derive(Debug, Clone)]
pub struct ScheduleRow {
    pub id: String,
    pub task_id: String,
    pub room_id: String,
    pub date: String,
    pub start_minute: Option<i64>,
    pub end_minute: Option<i64>,
    pub bucket: String,
    pub confidence: f64,
    pub source: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ScheduleRow {
    pub fn from_entry(entry: &ScheduleEntry) -> Self {
        Self {
            id: entry.id.clone(),
            task_id: entry.task_id.clone(),
            room_id: entry.room_id.clone(),
            date: entry.date.clone(),
            start_minute: entry.start_minute.map(|minute| minute as i64),
            end_minute: entry.end_minute.map(|minute| minute as i64),
            bucket: entry.bucket.as_str().to_string(),
            confidence: entry.confidence,
            source: entry.source.as_str().to_string(),
            created_at: entry.created_at.clone(),
            updated_at: entry.updated_at.clone(),
        }
    }

    pub fn into_entry(self) -> AppResult<ScheduleEntry> {
        let bucket = Bucket::from_str_value(&self.bucket).ok_or_else(|| {
            AppError::database(format!("unknown bucket value in storage: {}", self.bucket))
        })?;
        let source = ScheduleSource::from_str_value(&self.source).ok_or_else(|| {
            AppError::database(format!("unknown source value in storage: {}", self.source))
        })?;

        Ok(ScheduleEntry {
            id: self.id,
            task_id: self.task_id,
            room_id: self.room_id,
            date: self.date,
            start_minute: self.start_minute.map(|minute| minute as u32),
            end_minute: self.end_minute.map(|minute| minute as u32),
            bucket,
            confidence: self.confidence,
            source,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl TryFrom<&Row<'_>> for ScheduleRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(ScheduleRow {
            id: row.get("id")?,
            task_id: row.get("task_id")?,
            room_id: row.get("room_id")?,
            date: row.get("date")?,
            start_minute: row.get("start_minute")?,
            end_minute: row.get("end_minute")?,
            bucket: row.get("bucket")?,
            confidence: row.get("confidence")?,
            source: row.get("source")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct ScheduleRepository;

impl ScheduleRepository {
    /// Insert or overwrite the single entry for (room, task, date). The
    /// unique index makes each upsert atomic; the entry id and created_at
    /// of an existing row are preserved.
    pub fn upsert(conn: &Connection, row: &ScheduleRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO schedule_entries (
                    id,
                    task_id,
                    room_id,
                    date,
                    start_minute,
                    end_minute,
                    bucket,
                    confidence,
                    source,
                    created_at,
                    updated_at
                ) VALUES (
                    :id,
                    :task_id,
                    :room_id,
                    :date,
                    :start_minute,
                    :end_minute,
                    :bucket,
                    :confidence,
                    :source,
                    :created_at,
                    :updated_at
                )
                ON CONFLICT(room_id, task_id, date) DO UPDATE SET
                    start_minute = excluded.start_minute,
                    end_minute = excluded.end_minute,
                    bucket = excluded.bucket,
                    confidence = excluded.confidence,
                    source = excluded.source,
                    updated_at = excluded.updated_at
            "#,
            named_params! {
                ":id": &row.id,
                ":task_id": &row.task_id,
                ":room_id": &row.room_id,
                ":date": &row.date,
                ":start_minute": &row.start_minute,
                ":end_minute": &row.end_minute,
                ":bucket": &row.bucket,
                ":confidence": &row.confidence,
                ":source": &row.source,
                ":created_at": &row.created_at,
                ":updated_at": &row.updated_at,
            },
        )?;

        Ok(())
    }

    pub fn update_placement(
        conn: &Connection,
        id: &str,
        start_minute: Option<i64>,
        end_minute: Option<i64>,
        bucket: &str,
        source: &str,
        updated_at: &str,
    ) -> AppResult<()> {
        let affected = conn.execute(
            r#"
                UPDATE schedule_entries SET
                    start_minute = :start_minute,
                    end_minute = :end_minute,
                    bucket = :bucket,
                    source = :source,
                    updated_at = :updated_at
                WHERE id = :id
            "#,
            named_params! {
                ":id": id,
                ":start_minute": start_minute,
                ":end_minute": end_minute,
                ":bucket": bucket,
                ":source": source,
                ":updated_at": updated_at,
            },
        )?;

        if affected == 0 {
            return Err(AppError::not_found());
        }

        Ok(())
    }

    pub fn delete_by_id(conn: &Connection, id: &str) -> AppResult<()> {
        let affected = conn.execute("DELETE FROM schedule_entries WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(AppError::not_found());
        }
        Ok(())
    }

    pub fn delete_by_room_date(conn: &Connection, room_id: &str, date: &str) -> AppResult<usize> {
        let affected = conn.execute(
            "DELETE FROM schedule_entries WHERE room_id = ?1 AND date = ?2",
            [room_id, date],
        )?;
        Ok(affected)
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<ScheduleRow>> {
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", BASE_SELECT))?;
        let row = stmt
            .query_row([id], |row| ScheduleRow::try_from(row))
            .optional()?;
        Ok(row)
    }

    pub fn find_by_room_task_date(
        conn: &Connection,
        room_id: &str,
        task_id: &str,
        date: &str,
    ) -> AppResult<Option<ScheduleRow>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE room_id = ?1 AND task_id = ?2 AND date = ?3",
            BASE_SELECT
        ))?;
        let row = stmt
            .query_row([room_id, task_id, date], |row| ScheduleRow::try_from(row))
            .optional()?;
        Ok(row)
    }

    /// All entries for a (room, date), scheduled ones first in start order,
    /// unscheduled ones after in insertion order.
    pub fn list_by_room_date(
        conn: &Connection,
        room_id: &str,
        date: &str,
    ) -> AppResult<Vec<ScheduleRow>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE room_id = ?1 AND date = ?2
             ORDER BY start_minute IS NULL, start_minute ASC, created_at ASC",
            BASE_SELECT
        ))?;
        let rows = stmt
            .query_map([room_id, date], |row| ScheduleRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
