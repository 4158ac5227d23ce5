use crate::error::{AppError, AppResult};
use crate::models::schedule::MINUTES_PER_DAY;

/// Parse an "HH:MM" clock string into minutes from midnight.
pub fn to_minutes(clock: &str) -> AppResult<u32> {
    let (hours_raw, minutes_raw) = clock
        .split_once(':')
        .ok_or_else(|| AppError::invalid_time_format(clock))?;

    let hours: u32 = hours_raw
        .parse()
        .map_err(|_| AppError::invalid_time_format(clock))?;
    let minutes: u32 = minutes_raw
        .parse()
        .map_err(|_| AppError::invalid_time_format(clock))?;

    if hours >= 24 || minutes >= 60 {
        return Err(AppError::invalid_time_format(clock));
    }

    Ok(hours * 60 + minutes)
}

/// Format minutes from midnight as "HH:MM".
pub fn to_clock(minutes: u32) -> AppResult<String> {
    if minutes >= MINUTES_PER_DAY {
        return Err(AppError::minutes_out_of_range(minutes as i64));
    }
    Ok(format!("{:02}:{:02}", minutes / 60, minutes % 60))
}

/// Round to the nearest quarter hour, halves up. The result may be 1440 for
/// inputs near midnight; callers clamp to 1439 before storage.
pub fn round_to_quarter_hour(minutes: u32) -> u32 {
    ((minutes + 7) / 15) * 15
}

/// "09:00-10:00" style display text; empty when either endpoint is missing.
pub fn format_time_range(start_minute: Option<u32>, end_minute: Option<u32>) -> AppResult<String> {
    match (start_minute, end_minute) {
        (Some(start), Some(end)) => Ok(format!("{}-{}", to_clock(start)?, to_clock(end)?)),
        _ => Ok(String::new()),
    }
}
