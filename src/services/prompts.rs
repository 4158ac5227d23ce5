use serde_json::{json, Value as JsonValue};

use crate::models::extraction::ExtractionRequest;

/// System prompt guiding the extraction model when mapping free-text tasks
/// to daily time slots.
pub fn time_extraction_system_prompt() -> &'static str {
    r#"You are a task time extractor for a shared daily planner. You receive a
calendar date, a timezone and a list of tasks written in free text (English or
Chinese). For every input task, decide whether it names or implies a time of
day and respond with valid UTF-8 JSON strictly matching this schema. Do not
wrap the response in markdown code blocks. The schema is:
{
  "schedules": [{
    "taskId": string,
    "startMinute": number|null,
    "endMinute": number|null,
    "bucket": "MORNING"|"AFTERNOON"|"EVENING"|"NIGHT"|"UNSCHEDULED",
    "confidence": number
  }]
}
Rules:
- Minutes count from midnight in the given timezone; both values must lie in
  [0, 1439] and endMinute must be after startMinute.
- Return exactly one schedules entry per input task, in any order.
- When a task only names a part of day, use its midpoint: morning -> 540,
  afternoon -> 840, evening -> 1140, night -> 1320, with a 60 minute span.
- When no time can be found or inferred, set startMinute and endMinute to
  null, bucket to "UNSCHEDULED", and confidence below 0.6.
- confidence is a number in [0, 1] reflecting how certain the time is.

Example response:
{
  "schedules": [
    {"taskId": "a", "startMinute": 540, "endMinute": 600, "bucket": "MORNING", "confidence": 0.9},
    {"taskId": "b", "startMinute": null, "endMinute": null, "bucket": "UNSCHEDULED", "confidence": 0.3}
  ]
}
"#
}

/// Build the user payload for a time-extraction call.
pub fn build_extraction_payload(request: &ExtractionRequest) -> JsonValue {
    let tasks: Vec<JsonValue> = request
        .tasks
        .iter()
        .map(|task| json!({ "taskId": task.task_id, "text": task.text }))
        .collect();

    json!({
        "operation": "extractTaskTimes",
        "date": request.date,
        "timezone": request.timezone,
        "tasks": tasks,
        "expectations": {
            "languages": ["zh-CN", "en"],
            "oneEntryPerTask": true,
            "minuteRange": [0, 1439],
            "unscheduledConfidenceBelow": 0.6
        }
    })
}
