use std::time::Duration;

use chrono_tz::Tz;
use tracing::warn;

use crate::error::{AppError, AppResult};

const DEFAULT_TIMEZONE: &str = "Asia/Shanghai";
const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
const DEFAULT_MODEL: &str = "deepseek-chat";

/// Configuration for the day-scheduling engine. The timezone is explicit
/// rather than ambient so bucket semantics stay testable without a wall
/// clock.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub timezone: Tz,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub model: String,
    pub http_timeout: Duration,
}

impl ScheduleConfig {
    pub fn from_env() -> AppResult<Self> {
        let timezone_raw = std::env::var("DAYROOM_TIMEZONE")
            .ok()
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone: Tz = timezone_raw.parse().map_err(|_| {
            AppError::validation(format!("unknown timezone: {timezone_raw}"))
        })?;

        Ok(Self {
            timezone,
            extraction: ExtractionConfig::from_env(),
        })
    }

    pub fn with_timezone(timezone: Tz) -> Self {
        Self {
            timezone,
            extraction: ExtractionConfig::from_env(),
        }
    }
}

impl ExtractionConfig {
    pub fn from_env() -> Self {
        let api_key = std::env::var("DAYROOM_EXTRACTION_API_KEY")
            .ok()
            .and_then(|value| {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    warn!(target: "app::extraction", "ignoring empty extraction API key");
                    None
                } else {
                    Some(trimmed.to_string())
                }
            });
        let api_base_url = std::env::var("DAYROOM_EXTRACTION_BASE_URL")
            .ok()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("DAYROOM_EXTRACTION_MODEL")
            .ok()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Self {
            api_key,
            api_base_url,
            model,
            http_timeout: Duration::from_secs(30),
        }
    }
}
