use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono_tz::Tz;
use dayroom::db::DbPool;
use dayroom::error::{AppError, AppResult, ExtractionErrorCode};
use dayroom::models::extraction::{ExtractionRequest, ExtractionResponse, TimeSuggestion};
use dayroom::models::schedule::{Bucket, ScheduleSource};
use dayroom::models::task::TaskCreateInput;
use dayroom::services::extraction::TimeExtractor;
use dayroom::services::schedule_service::ScheduleService;
use dayroom::services::task_service::TaskService;
use tempfile::tempdir;

const ROOM: &str = "room-keqing";
const DATE: &str = "2025-11-03";

fn timezone() -> Tz {
    "Asia/Shanghai".parse().expect("valid timezone")
}

/// Deterministic extractor returning a canned suggestion set on every call.
struct StubExtractor {
    schedules: Vec<TimeSuggestion>,
    calls: AtomicUsize,
}

impl StubExtractor {
    fn new(schedules: Vec<TimeSuggestion>) -> Arc<Self> {
        Arc::new(Self {
            schedules,
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TimeExtractor for StubExtractor {
    async fn extract(&self, _request: &ExtractionRequest) -> AppResult<ExtractionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ExtractionResponse {
            schedules: self.schedules.clone(),
        })
    }
}

/// Extractor that always fails, standing in for an unavailable service.
struct FailingExtractor;

#[async_trait]
impl TimeExtractor for FailingExtractor {
    async fn extract(&self, _request: &ExtractionRequest) -> AppResult<ExtractionResponse> {
        Err(AppError::extraction(
            ExtractionErrorCode::Unavailable,
            "extraction service unavailable",
        ))
    }
}

fn setup() -> (tempfile::TempDir, DbPool, TaskService) {
    let dir = tempdir().expect("temp dir");
    let db_path = dir.path().join("test.sqlite");
    let pool = DbPool::new(db_path).expect("db pool");
    let tasks = TaskService::new(pool.clone());
    (dir, pool, tasks)
}

fn create_task(tasks: &TaskService, content: &str) -> String {
    tasks
        .create_task(TaskCreateInput {
            room_id: ROOM.to_string(),
            content: content.to_string(),
            scheduled_time: None,
        })
        .expect("task created")
        .id
}

fn suggestion(task_id: &str, start: Option<u32>, end: Option<u32>, confidence: f64) -> TimeSuggestion {
    TimeSuggestion {
        task_id: task_id.to_string(),
        start_minute: start,
        end_minute: end,
        bucket: None,
        confidence,
    }
}

#[tokio::test]
async fn empty_room_short_circuits_without_extraction() {
    let (_dir, pool, _tasks) = setup();
    let service = ScheduleService::new(pool, Arc::new(FailingExtractor), timezone());

    let outcome = service.schedule_day(ROOM, DATE).await.expect("no-op succeeds");
    assert_eq!(outcome.scheduled, 0);
    assert_eq!(outcome.unscheduled, 0);

    let schedule = service.get_day_schedule(ROOM, DATE).expect("readable");
    assert_eq!(schedule.total(), 0);
}

#[tokio::test]
async fn rejects_malformed_dates() {
    let (_dir, pool, _tasks) = setup();
    let service = ScheduleService::new(pool, Arc::new(FailingExtractor), timezone());

    let error = service
        .schedule_day(ROOM, "03/11/2025")
        .await
        .expect_err("bad date");
    assert!(matches!(error, AppError::Validation { .. }));
}

#[tokio::test]
async fn overlapping_suggestions_shift_the_lower_confidence_task() {
    let (_dir, pool, tasks) = setup();
    let gym = create_task(&tasks, "Gym at 9am");
    let call = create_task(&tasks, "Call at 9:15am");

    let stub = StubExtractor::new(vec![
        suggestion(&gym, Some(540), Some(600), 0.9),
        suggestion(&call, Some(555), Some(615), 0.7),
    ]);
    let service = ScheduleService::new(pool, stub.clone(), timezone());

    let outcome = service.schedule_day(ROOM, DATE).await.expect("scheduled");
    assert_eq!(outcome.scheduled, 2);
    assert_eq!(outcome.unscheduled, 0);
    assert_eq!(stub.call_count(), 1);

    let schedule = service.get_day_schedule(ROOM, DATE).expect("readable");
    assert_eq!(schedule.morning.len(), 2);

    let gym_entry = schedule
        .morning
        .iter()
        .find(|entry| entry.task_id == gym)
        .expect("gym entry");
    let call_entry = schedule
        .morning
        .iter()
        .find(|entry| entry.task_id == call)
        .expect("call entry");

    assert_eq!(gym_entry.start_minute, Some(540));
    assert_eq!(gym_entry.end_minute, Some(600));
    // Lower confidence and later start: shifted past the gym slot.
    assert_eq!(call_entry.start_minute, Some(600));
    assert_eq!(call_entry.end_minute, Some(660));
    assert_eq!(call_entry.bucket, Bucket::Morning);
    assert_eq!(call_entry.source, ScheduleSource::Ai);
}

#[tokio::test]
async fn suggestions_are_rounded_to_quarter_hours() {
    let (_dir, pool, tasks) = setup();
    let task = create_task(&tasks, "Standup around 9:08");

    let stub = StubExtractor::new(vec![suggestion(&task, Some(548), Some(612), 0.8)]);
    let service = ScheduleService::new(pool, stub, timezone());

    service.schedule_day(ROOM, DATE).await.expect("scheduled");

    let schedule = service.get_day_schedule(ROOM, DATE).expect("readable");
    let entry = &schedule.morning[0];
    assert_eq!(entry.start_minute, Some(540));
    assert_eq!(entry.end_minute, Some(615));
}

#[tokio::test]
async fn scheduling_twice_is_idempotent() {
    let (_dir, pool, tasks) = setup();
    let a = create_task(&tasks, "Morning report");
    let b = create_task(&tasks, "Lunch errand");
    let c = create_task(&tasks, "Someday cleanup");

    let stub = StubExtractor::new(vec![
        suggestion(&a, Some(540), Some(600), 0.9),
        suggestion(&b, Some(555), Some(615), 0.7),
        suggestion(&c, None, None, 0.2),
    ]);
    let service = ScheduleService::new(pool, stub, timezone());

    let first = service.schedule_day(ROOM, DATE).await.expect("first run");
    let snapshot_one = placements(&service);

    let second = service.schedule_day(ROOM, DATE).await.expect("second run");
    let snapshot_two = placements(&service);

    assert_eq!(first, second);
    assert_eq!(first.scheduled, 2);
    assert_eq!(first.unscheduled, 1);
    assert_eq!(snapshot_one, snapshot_two);
}

fn placements(service: &ScheduleService) -> Vec<(String, String, Option<u32>, Option<u32>, Bucket)> {
    let schedule = service.get_day_schedule(ROOM, DATE).expect("readable");
    let mut rows: Vec<_> = [
        schedule.morning,
        schedule.afternoon,
        schedule.evening,
        schedule.night,
        schedule.unscheduled,
    ]
    .into_iter()
    .flatten()
    .map(|entry| {
        (
            entry.id,
            entry.task_id,
            entry.start_minute,
            entry.end_minute,
            entry.bucket,
        )
    })
    .collect();
    rows.sort();
    rows
}

#[tokio::test]
async fn missing_suggestion_persists_as_unscheduled() {
    let (_dir, pool, tasks) = setup();
    let covered = create_task(&tasks, "Review at 14:00");
    let _forgotten = create_task(&tasks, "Water the plants");

    let stub = StubExtractor::new(vec![suggestion(&covered, Some(840), Some(900), 0.85)]);
    let service = ScheduleService::new(pool, stub, timezone());

    let outcome = service.schedule_day(ROOM, DATE).await.expect("scheduled");
    assert_eq!(outcome.scheduled, 1);
    assert_eq!(outcome.unscheduled, 1);

    let schedule = service.get_day_schedule(ROOM, DATE).expect("readable");
    assert_eq!(schedule.afternoon.len(), 1);
    assert_eq!(schedule.unscheduled.len(), 1);
    let unscheduled = &schedule.unscheduled[0];
    assert_eq!(unscheduled.start_minute, None);
    assert_eq!(unscheduled.end_minute, None);
    assert_eq!(unscheduled.confidence, 0.0);
}

#[tokio::test]
async fn unknown_task_ids_in_response_are_ignored() {
    let (_dir, pool, tasks) = setup();
    let task = create_task(&tasks, "Evening walk");

    let stub = StubExtractor::new(vec![
        suggestion(&task, Some(1140), Some(1200), 0.8),
        suggestion("ghost-task", Some(540), Some(600), 0.9),
    ]);
    let service = ScheduleService::new(pool, stub, timezone());

    let outcome = service.schedule_day(ROOM, DATE).await.expect("scheduled");
    assert_eq!(outcome.scheduled, 1);
    assert_eq!(outcome.unscheduled, 0);

    let schedule = service.get_day_schedule(ROOM, DATE).expect("readable");
    assert_eq!(schedule.total(), 1);
    assert_eq!(schedule.evening.len(), 1);
}

#[tokio::test]
async fn extraction_failure_leaves_no_partial_writes() {
    let (_dir, pool, tasks) = setup();
    create_task(&tasks, "Doomed task");

    let service = ScheduleService::new(pool, Arc::new(FailingExtractor), timezone());

    let error = service.schedule_day(ROOM, DATE).await.expect_err("fails");
    assert_eq!(
        error.extraction_code(),
        Some(ExtractionErrorCode::Unavailable)
    );

    let schedule = service.get_day_schedule(ROOM, DATE).expect("readable");
    assert_eq!(schedule.total(), 0);
}

#[tokio::test]
async fn user_pin_updates_bucket_and_survives_rescheduling() {
    let (_dir, pool, tasks) = setup();
    let task = create_task(&tasks, "Flexible errand");

    let stub = StubExtractor::new(vec![suggestion(&task, Some(540), Some(600), 0.9)]);
    let service = ScheduleService::new(pool, stub, timezone());

    service.schedule_day(ROOM, DATE).await.expect("scheduled");
    let schedule = service.get_day_schedule(ROOM, DATE).expect("readable");
    let entry_id = schedule.morning[0].id.clone();

    // Pin the entry to the evening; no extraction involved.
    let pinned = service
        .update_task_schedule(&entry_id, Some(1140), Some(1200))
        .expect("pinned");
    assert_eq!(pinned.bucket, Bucket::Evening);
    assert_eq!(pinned.source, ScheduleSource::User);

    let schedule = service.get_day_schedule(ROOM, DATE).expect("readable");
    assert!(schedule.morning.is_empty());
    assert_eq!(schedule.evening.len(), 1);

    // Re-running the AI pass must not move a user-pinned entry.
    service.schedule_day(ROOM, DATE).await.expect("re-scheduled");
    let schedule = service.get_day_schedule(ROOM, DATE).expect("readable");
    assert_eq!(schedule.evening.len(), 1);
    assert_eq!(schedule.evening[0].start_minute, Some(1140));
    assert_eq!(schedule.evening[0].source, ScheduleSource::User);
}

#[tokio::test]
async fn user_pin_validates_inputs() {
    let (_dir, pool, tasks) = setup();
    let task = create_task(&tasks, "Strict task");

    let stub = StubExtractor::new(vec![suggestion(&task, Some(540), Some(600), 0.9)]);
    let service = ScheduleService::new(pool, stub, timezone());
    service.schedule_day(ROOM, DATE).await.expect("scheduled");
    let schedule = service.get_day_schedule(ROOM, DATE).expect("readable");
    let entry_id = schedule.morning[0].id.clone();

    let error = service
        .update_task_schedule(&entry_id, Some(1500), Some(1550))
        .expect_err("start out of range");
    assert!(matches!(error, AppError::MinutesOutOfRange { .. }));

    let error = service
        .update_task_schedule(&entry_id, Some(600), Some(600))
        .expect_err("empty span");
    assert!(matches!(error, AppError::Validation { .. }));

    let error = service
        .update_task_schedule(&entry_id, Some(600), None)
        .expect_err("half-open input");
    assert!(matches!(error, AppError::Validation { .. }));

    let error = service
        .update_task_schedule("missing-entry", Some(600), Some(660))
        .expect_err("unknown entry");
    assert!(matches!(error, AppError::NotFound));
}

#[tokio::test]
async fn clearing_a_pin_makes_the_entry_unscheduled() {
    let (_dir, pool, tasks) = setup();
    let task = create_task(&tasks, "Pin then unpin");

    let stub = StubExtractor::new(vec![suggestion(&task, Some(840), Some(900), 0.8)]);
    let service = ScheduleService::new(pool, stub, timezone());
    service.schedule_day(ROOM, DATE).await.expect("scheduled");
    let schedule = service.get_day_schedule(ROOM, DATE).expect("readable");
    let entry_id = schedule.afternoon[0].id.clone();

    let cleared = service
        .update_task_schedule(&entry_id, None, None)
        .expect("cleared");
    assert_eq!(cleared.bucket, Bucket::Unscheduled);
    assert_eq!(cleared.start_minute, None);
    assert_eq!(cleared.end_minute, None);
    assert_eq!(cleared.source, ScheduleSource::User);
}

#[tokio::test]
async fn clear_day_removes_all_entries_and_allows_rescheduling() {
    let (_dir, pool, tasks) = setup();
    let a = create_task(&tasks, "First");
    let b = create_task(&tasks, "Second");

    let stub = StubExtractor::new(vec![
        suggestion(&a, Some(540), Some(600), 0.9),
        suggestion(&b, None, None, 0.1),
    ]);
    let service = ScheduleService::new(pool, stub, timezone());

    service.schedule_day(ROOM, DATE).await.expect("scheduled");
    let removed = service.clear_day_schedule(ROOM, DATE).expect("cleared");
    assert_eq!(removed, 2);
    assert_eq!(service.get_day_schedule(ROOM, DATE).expect("readable").total(), 0);

    let outcome = service.schedule_day(ROOM, DATE).await.expect("re-scheduled");
    assert_eq!(outcome.scheduled, 1);
    assert_eq!(outcome.unscheduled, 1);
}

#[tokio::test]
async fn day_schedule_orders_entries_by_start_within_a_bucket() {
    let (_dir, pool, tasks) = setup();
    let late = create_task(&tasks, "Late morning");
    let early = create_task(&tasks, "Early morning");
    let mid = create_task(&tasks, "Mid morning");

    let stub = StubExtractor::new(vec![
        suggestion(&late, Some(660), Some(690), 0.9),
        suggestion(&early, Some(390), Some(420), 0.9),
        suggestion(&mid, Some(510), Some(525), 0.9),
    ]);
    let service = ScheduleService::new(pool, stub, timezone());
    service.schedule_day(ROOM, DATE).await.expect("scheduled");

    let schedule = service.get_day_schedule(ROOM, DATE).expect("readable");
    let starts: Vec<Option<u32>> = schedule
        .morning
        .iter()
        .map(|entry| entry.start_minute)
        .collect();
    assert_eq!(starts, vec![Some(390), Some(510), Some(660)]);
}

#[tokio::test]
async fn deleting_a_task_removes_its_schedule_entry() {
    let (_dir, pool, tasks) = setup();
    let keep = create_task(&tasks, "Keeper at 10:00");
    let gone = create_task(&tasks, "Goner at 11:00");

    let stub = StubExtractor::new(vec![
        suggestion(&keep, Some(600), Some(660), 0.9),
        suggestion(&gone, Some(660), Some(720), 0.9),
    ]);
    let service = ScheduleService::new(pool, stub, timezone());
    service.schedule_day(ROOM, DATE).await.expect("scheduled");

    tasks.delete_task(&gone).expect("deleted");

    let schedule = service.get_day_schedule(ROOM, DATE).expect("readable");
    assert_eq!(schedule.total(), 1);
    assert_eq!(schedule.morning[0].task_id, keep);
}

#[tokio::test]
async fn days_are_independent() {
    let (_dir, pool, tasks) = setup();
    let task = create_task(&tasks, "Daily thing");

    let stub = StubExtractor::new(vec![suggestion(&task, Some(540), Some(600), 0.9)]);
    let service = ScheduleService::new(pool, stub, timezone());

    service.schedule_day(ROOM, "2025-11-03").await.expect("day one");
    service.schedule_day(ROOM, "2025-11-04").await.expect("day two");

    assert_eq!(
        service.get_day_schedule(ROOM, "2025-11-03").expect("readable").total(),
        1
    );
    assert_eq!(
        service.get_day_schedule(ROOM, "2025-11-04").expect("readable").total(),
        1
    );

    service.clear_day_schedule(ROOM, "2025-11-03").expect("cleared");
    assert_eq!(
        service.get_day_schedule(ROOM, "2025-11-03").expect("readable").total(),
        0
    );
    assert_eq!(
        service.get_day_schedule(ROOM, "2025-11-04").expect("readable").total(),
        1
    );
}
