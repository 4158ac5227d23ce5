use serde::{Deserialize, Serialize};

/// Payload sent to the time-extraction service: one call per (room, date)
/// with the full task set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRequest {
    pub date: String,
    pub timezone: String,
    pub tasks: Vec<ExtractionTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionTask {
    pub task_id: String,
    pub text: String,
}

/// Untrusted response from the extraction service. Deserialization is the
/// first validation gate; `TimeSuggestion::validate` enforces the numeric
/// rules the schema cannot express.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResponse {
    pub schedules: Vec<TimeSuggestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeSuggestion {
    pub task_id: String,
    pub start_minute: Option<u32>,
    pub end_minute: Option<u32>,
    /// Advisory only; the server recomputes the bucket from the final start
    /// minute and never trusts this value.
    #[serde(default)]
    pub bucket: Option<String>,
    pub confidence: f64,
}

impl TimeSuggestion {
    /// Numeric invariants the wire schema cannot encode: end present iff
    /// start present, both within [0, 1440), end strictly after start,
    /// confidence within [0, 1].
    pub fn validate(&self) -> Result<(), String> {
        match (self.start_minute, self.end_minute) {
            (None, None) => {}
            (Some(start), Some(end)) => {
                if start >= 1440 {
                    return Err(format!("startMinute {start} outside [0, 1440)"));
                }
                if end >= 1440 {
                    return Err(format!("endMinute {end} outside [0, 1440)"));
                }
                if end <= start {
                    return Err(format!("endMinute {end} not after startMinute {start}"));
                }
            }
            _ => {
                return Err("startMinute and endMinute must be both set or both null".to_string());
            }
        }

        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence {} outside [0, 1]", self.confidence));
        }

        Ok(())
    }
}
