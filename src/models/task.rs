use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub room_id: String,
    pub content: String,
    /// Raw scheduled-time hint as typed by a user ("9am", "晚上"), kept
    /// verbatim; the extraction service is the only consumer.
    pub scheduled_time: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreateInput {
    pub room_id: String,
    pub content: String,
    #[serde(default)]
    pub scheduled_time: Option<String>,
}
