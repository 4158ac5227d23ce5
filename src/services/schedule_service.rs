use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::repositories::schedule_repository::{ScheduleRepository, ScheduleRow};
use crate::db::repositories::task_repository::TaskRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::extraction::{ExtractionRequest, ExtractionTask, TimeSuggestion};
use crate::models::schedule::{
    Bucket, DaySchedule, ScheduleDayOutcome, ScheduleEntry, ScheduleSource, LAST_MINUTE_OF_DAY,
};
use crate::models::task::TaskRecord;
use crate::services::bucket;
use crate::services::conflict::{self, ProposedSlot};
use crate::services::extraction::TimeExtractor;
use crate::services::time_codec;

type DayKey = (String, String);

/// Top-level entry point of the day-scheduling engine: fetches a room's
/// tasks, asks the extraction service for time suggestions, normalizes and
/// conflict-resolves them, and reconciles the result with the persisted
/// schedule for that (room, date).
#[derive(Clone)]
pub struct ScheduleService {
    pool: DbPool,
    extractor: Arc<dyn TimeExtractor>,
    timezone: Tz,
    // Single-flight guard: two schedule_day calls for the same (room, date)
    // must not interleave their resolution passes.
    inflight: Arc<StdMutex<HashMap<DayKey, Arc<TokioMutex<()>>>>>,
}

impl ScheduleService {
    pub fn new(pool: DbPool, extractor: Arc<dyn TimeExtractor>, timezone: Tz) -> Self {
        Self {
            pool,
            extractor,
            timezone,
            inflight: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// Run one scheduling pass for a room's day. Idempotent for a fixed
    /// extraction response; entries pinned by a user (`source = USER`) are
    /// left untouched.
    pub async fn schedule_day(&self, room_id: &str, date: &str) -> AppResult<ScheduleDayOutcome> {
        validate_date(date)?;

        let guard = self.day_guard(room_id, date);
        let _serialized = guard.lock().await;

        let tasks = self
            .pool
            .with_connection(|conn| TaskRepository::list_by_room(conn, room_id))?
            .into_iter()
            .map(|row| row.into_record())
            .collect::<Vec<_>>();

        if tasks.is_empty() {
            debug!(target: "app::schedule", room_id, date, "no tasks; skipping extraction");
            return Ok(ScheduleDayOutcome::default());
        }

        let request = ExtractionRequest {
            date: date.to_string(),
            timezone: self.timezone.name().to_string(),
            tasks: tasks.iter().map(extraction_task).collect(),
        };

        // The only suspension point; a failure here leaves no writes behind.
        let response = self.extractor.extract(&request).await?;

        let suggestions = associate_suggestions(&tasks, response.schedules);
        let resolved = resolve_batch(&tasks, &suggestions);

        let now = Utc::now().to_rfc3339();
        for task in &tasks {
            let placement = resolved.get(task.id.as_str());
            let confidence = suggestions
                .get(task.id.as_str())
                .map(|suggestion| suggestion.confidence)
                .unwrap_or(0.0);
            self.upsert_ai_entry(room_id, date, &task.id, placement.cloned(), confidence, &now)?;
        }

        let outcome = self.count_day(room_id, date)?;
        info!(
            target: "app::schedule",
            room_id,
            date,
            scheduled = outcome.scheduled,
            unscheduled = outcome.unscheduled,
            "day scheduled"
        );
        Ok(outcome)
    }

    /// Direct user placement of a single entry. Authoritative: no conflict
    /// resolution runs, and the entry becomes pinned against AI re-runs.
    pub fn update_task_schedule(
        &self,
        entry_id: &str,
        start_minute: Option<u32>,
        end_minute: Option<u32>,
    ) -> AppResult<ScheduleEntry> {
        match (start_minute, end_minute) {
            (None, None) => {}
            (Some(start), Some(end)) => {
                if start > LAST_MINUTE_OF_DAY {
                    return Err(AppError::minutes_out_of_range(start as i64));
                }
                if end > LAST_MINUTE_OF_DAY {
                    return Err(AppError::minutes_out_of_range(end as i64));
                }
                if end <= start {
                    return Err(AppError::validation(
                        "end minute must be after start minute",
                    ));
                }
            }
            _ => {
                return Err(AppError::validation(
                    "start and end minute must be set together",
                ));
            }
        }

        let bucket = bucket::classify(start_minute);
        let now = Utc::now().to_rfc3339();

        self.pool.with_connection(|conn| {
            ScheduleRepository::update_placement(
                conn,
                entry_id,
                start_minute.map(|minute| minute as i64),
                end_minute.map(|minute| minute as i64),
                bucket.as_str(),
                ScheduleSource::User.as_str(),
                &now,
            )
        })?;

        info!(target: "app::schedule", entry_id, bucket = bucket.as_str(), "entry pinned by user");

        let row = self
            .pool
            .with_connection(|conn| ScheduleRepository::find_by_id(conn, entry_id))?
            .ok_or_else(AppError::not_found)?;
        row.into_entry()
    }

    /// Delete every entry of a (room, date), returning the day to its
    /// unscheduled state.
    pub fn clear_day_schedule(&self, room_id: &str, date: &str) -> AppResult<usize> {
        validate_date(date)?;
        let removed = self
            .pool
            .with_connection(|conn| ScheduleRepository::delete_by_room_date(conn, room_id, date))?;
        info!(target: "app::schedule", room_id, date, removed, "day schedule cleared");
        Ok(removed)
    }

    /// Read-only projection of a day grouped into the five buckets, each
    /// ascending by start minute.
    pub fn get_day_schedule(&self, room_id: &str, date: &str) -> AppResult<DaySchedule> {
        validate_date(date)?;
        let rows = self
            .pool
            .with_connection(|conn| ScheduleRepository::list_by_room_date(conn, room_id, date))?;

        let mut schedule = DaySchedule::default();
        for row in rows {
            schedule.push(row.into_entry()?);
        }
        Ok(schedule)
    }

    fn day_guard(&self, room_id: &str, date: &str) -> Arc<TokioMutex<()>> {
        let mut map = self.inflight.lock().expect("inflight lock poisoned");
        map.entry((room_id.to_string(), date.to_string()))
            .or_default()
            .clone()
    }

    fn upsert_ai_entry(
        &self,
        room_id: &str,
        date: &str,
        task_id: &str,
        placement: Option<ProposedSlot>,
        confidence: f64,
        now: &str,
    ) -> AppResult<()> {
        self.pool.with_connection(|conn| {
            let existing =
                ScheduleRepository::find_by_room_task_date(conn, room_id, task_id, date)?;

            if let Some(row) = &existing {
                if row.source == ScheduleSource::User.as_str() {
                    debug!(
                        target: "app::schedule",
                        task_id,
                        date,
                        "entry is user-pinned; keeping placement"
                    );
                    return Ok(());
                }
            }

            let (start_minute, end_minute) = match &placement {
                Some(slot) => (Some(slot.start_minute), Some(slot.end_minute)),
                None => (None, None),
            };
            let bucket = bucket::classify(start_minute);

            let (id, created_at) = match existing {
                Some(row) => (row.id, row.created_at),
                None => (Uuid::new_v4().to_string(), now.to_string()),
            };

            let entry = ScheduleEntry {
                id,
                task_id: task_id.to_string(),
                room_id: room_id.to_string(),
                date: date.to_string(),
                start_minute,
                end_minute,
                bucket,
                confidence,
                source: ScheduleSource::Ai,
                created_at,
                updated_at: now.to_string(),
            };

            ScheduleRepository::upsert(conn, &ScheduleRow::from_entry(&entry))
        })
    }

    fn count_day(&self, room_id: &str, date: &str) -> AppResult<ScheduleDayOutcome> {
        let rows = self
            .pool
            .with_connection(|conn| ScheduleRepository::list_by_room_date(conn, room_id, date))?;

        let unscheduled = rows
            .iter()
            .filter(|row| row.bucket == Bucket::Unscheduled.as_str())
            .count();
        Ok(ScheduleDayOutcome {
            scheduled: rows.len() - unscheduled,
            unscheduled,
        })
    }
}

fn validate_date(date: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|err| AppError::validation(format!("invalid date {date}: {err}")))
}

fn extraction_task(task: &TaskRecord) -> ExtractionTask {
    // Surface the legacy manual hint to the model alongside the free text.
    let text = match &task.scheduled_time {
        Some(hint) if !hint.trim().is_empty() => {
            format!("{} (time hint: {})", task.content, hint.trim())
        }
        _ => task.content.clone(),
    };
    ExtractionTask {
        task_id: task.id.clone(),
        text,
    }
}

/// Keep the first suggestion per known task id; unknown ids and duplicates
/// are dropped with a warning.
fn associate_suggestions(
    tasks: &[TaskRecord],
    schedules: Vec<TimeSuggestion>,
) -> HashMap<String, TimeSuggestion> {
    let known: std::collections::HashSet<&str> =
        tasks.iter().map(|task| task.id.as_str()).collect();

    let mut by_task: HashMap<String, TimeSuggestion> = HashMap::new();
    for suggestion in schedules {
        if !known.contains(suggestion.task_id.as_str()) {
            warn!(
                target: "app::schedule",
                task_id = %suggestion.task_id,
                "suggestion references unknown task; ignoring"
            );
            continue;
        }
        if by_task.contains_key(&suggestion.task_id) {
            warn!(
                target: "app::schedule",
                task_id = %suggestion.task_id,
                "duplicate suggestion for task; keeping first"
            );
            continue;
        }
        by_task.insert(suggestion.task_id.clone(), suggestion);
    }

    by_task
}

/// Quarter-hour rounding on both endpoints, then one conflict-resolution
/// pass over the whole day's non-null suggestions. Slots enter the resolver
/// in task order so start-minute ties break deterministically.
fn resolve_batch(
    tasks: &[TaskRecord],
    suggestions: &HashMap<String, TimeSuggestion>,
) -> HashMap<String, ProposedSlot> {
    let mut slots: Vec<ProposedSlot> = tasks
        .iter()
        .filter_map(|task| {
            let suggestion = suggestions.get(task.id.as_str())?;
            let start = suggestion.start_minute?;
            let end = suggestion.end_minute?;
            Some(ProposedSlot {
                id: task.id.clone(),
                start_minute: normalize_minute(start),
                end_minute: normalize_minute(end),
                confidence: suggestion.confidence,
            })
        })
        .collect();

    for slot in &mut slots {
        // Rounding can collapse a short span; keep a minimal quarter-hour
        // block so the stored interval stays well-formed.
        if slot.end_minute <= slot.start_minute {
            slot.end_minute = (slot.start_minute + 15).min(LAST_MINUTE_OF_DAY);
            if slot.end_minute <= slot.start_minute {
                slot.start_minute = slot.end_minute - 15;
            }
        }
    }

    conflict::resolve(slots)
        .into_iter()
        .map(|slot| (slot.id.clone(), slot))
        .collect()
}

fn normalize_minute(minute: u32) -> u32 {
    time_codec::round_to_quarter_hour(minute).min(LAST_MINUTE_OF_DAY)
}
