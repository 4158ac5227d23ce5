use serde::{Deserialize, Serialize};

pub const MINUTES_PER_DAY: u32 = 1440;
pub const LAST_MINUTE_OF_DAY: u32 = 1439;

/// Coarse part of day a schedule entry belongs to. Derived from the start
/// minute by the classifier; denormalized onto entries for query convenience.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bucket {
    Morning,
    Afternoon,
    Evening,
    Night,
    Unscheduled,
}

impl Bucket {
    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::Morning => "MORNING",
            Bucket::Afternoon => "AFTERNOON",
            Bucket::Evening => "EVENING",
            Bucket::Night => "NIGHT",
            Bucket::Unscheduled => "UNSCHEDULED",
        }
    }

    pub fn from_str_value(raw: &str) -> Option<Self> {
        match raw {
            "MORNING" => Some(Bucket::Morning),
            "AFTERNOON" => Some(Bucket::Afternoon),
            "EVENING" => Some(Bucket::Evening),
            "NIGHT" => Some(Bucket::Night),
            "UNSCHEDULED" => Some(Bucket::Unscheduled),
            _ => None,
        }
    }

    /// Human label used by timeline views.
    pub fn label(self) -> &'static str {
        match self {
            Bucket::Morning => "Morning",
            Bucket::Afternoon => "Afternoon",
            Bucket::Evening => "Evening",
            Bucket::Night => "Night",
            Bucket::Unscheduled => "Unscheduled",
        }
    }

    /// Clock-range description shown next to the label.
    pub fn time_range_text(self) -> &'static str {
        match self {
            Bucket::Morning => "06:00-12:00",
            Bucket::Afternoon => "12:00-17:00",
            Bucket::Evening => "17:00-21:00",
            Bucket::Night => "21:00-06:00",
            Bucket::Unscheduled => "No time set",
        }
    }
}

/// Provenance of a schedule entry's placement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleSource {
    Ai,
    User,
}

impl ScheduleSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleSource::Ai => "AI",
            ScheduleSource::User => "USER",
        }
    }

    pub fn from_str_value(raw: &str) -> Option<Self> {
        match raw {
            "AI" => Some(ScheduleSource::Ai),
            "USER" => Some(ScheduleSource::User),
            _ => None,
        }
    }
}

/// One persisted placement of a task on a calendar day. Unique per
/// (room_id, task_id, date); re-scheduling a day upserts rather than
/// duplicates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub id: String,
    pub task_id: String,
    pub room_id: String,
    /// Plain "YYYY-MM-DD" date; the engine is timezone-naive at day
    /// granularity and assumes the configured zone for bucket semantics.
    pub date: String,
    pub start_minute: Option<u32>,
    pub end_minute: Option<u32>,
    pub bucket: Bucket,
    pub confidence: f64,
    pub source: ScheduleSource,
    pub created_at: String,
    pub updated_at: String,
}

/// Counts returned by a scheduling pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDayOutcome {
    pub scheduled: usize,
    pub unscheduled: usize,
}

/// Read-only projection of a day grouped into the five fixed buckets, each
/// ascending by start minute.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DaySchedule {
    pub morning: Vec<ScheduleEntry>,
    pub afternoon: Vec<ScheduleEntry>,
    pub evening: Vec<ScheduleEntry>,
    pub night: Vec<ScheduleEntry>,
    pub unscheduled: Vec<ScheduleEntry>,
}

impl DaySchedule {
    pub fn push(&mut self, entry: ScheduleEntry) {
        match entry.bucket {
            Bucket::Morning => self.morning.push(entry),
            Bucket::Afternoon => self.afternoon.push(entry),
            Bucket::Evening => self.evening.push(entry),
            Bucket::Night => self.night.push(entry),
            Bucket::Unscheduled => self.unscheduled.push(entry),
        }
    }

    pub fn total(&self) -> usize {
        self.morning.len()
            + self.afternoon.len()
            + self.evening.len()
            + self.night.len()
            + self.unscheduled.len()
    }
}
