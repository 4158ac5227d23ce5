use crate::models::schedule::Bucket;

const MORNING_START: u32 = 360;
const AFTERNOON_START: u32 = 720;
const EVENING_START: u32 = 1020;
const NIGHT_START: u32 = 1260;

/// Classify a start minute into its part of day. Half-open intervals; a
/// missing start always means unscheduled.
///
/// MORNING [360, 720), AFTERNOON [720, 1020), EVENING [1020, 1260),
/// NIGHT [1260, 1440) ∪ [0, 360).
pub fn classify(start_minute: Option<u32>) -> Bucket {
    let Some(minute) = start_minute else {
        return Bucket::Unscheduled;
    };

    if (MORNING_START..AFTERNOON_START).contains(&minute) {
        Bucket::Morning
    } else if (AFTERNOON_START..EVENING_START).contains(&minute) {
        Bucket::Afternoon
    } else if (EVENING_START..NIGHT_START).contains(&minute) {
        Bucket::Evening
    } else {
        Bucket::Night
    }
}

/// Midpoint minute the extraction prompt tells the model to use for bare
/// relative words ("morning", "晚上") with no clock time.
pub fn midpoint(bucket: Bucket) -> Option<u32> {
    match bucket {
        Bucket::Morning => Some(540),
        Bucket::Afternoon => Some(840),
        Bucket::Evening => Some(1140),
        Bucket::Night => Some(1320),
        Bucket::Unscheduled => None,
    }
}
