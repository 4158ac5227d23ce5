use std::time::{Duration as StdDuration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value as JsonValue};
use tokio::time::sleep;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ExtractionConfig;
use crate::error::{AppError, AppResult, ExtractionErrorCode};
use crate::models::extraction::{ExtractionRequest, ExtractionResponse};
use crate::services::prompts::{build_extraction_payload, time_extraction_system_prompt};

/// Seam to the external time-extraction service. The production
/// implementation talks to an LLM; tests substitute a deterministic stub.
#[async_trait]
pub trait TimeExtractor: Send + Sync {
    async fn extract(&self, request: &ExtractionRequest) -> AppResult<ExtractionResponse>;
}

/// Extraction client backed by an OpenAI-style chat-completions endpoint.
pub struct LlmExtractor {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

const BACKOFF_SCHEDULE: [StdDuration; 4] = [
    StdDuration::from_secs(0),
    StdDuration::from_secs(1),
    StdDuration::from_secs(2),
    StdDuration::from_secs(4),
];

impl LlmExtractor {
    pub fn from_config(config: &ExtractionConfig) -> AppResult<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            AppError::extraction(
                ExtractionErrorCode::MissingApiKey,
                "extraction API key is not configured",
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Some(StdDuration::from_secs(90)))
            .build()
            .map_err(|err| AppError::other(format!("failed to build extraction HTTP client: {err}")))?;

        let base_url = config.api_base_url.trim_end_matches('/').to_string();
        let endpoint = format!("{}/v1/chat/completions", base_url);

        Ok(Self {
            client,
            api_key,
            endpoint,
            model: config.model.clone(),
        })
    }

    fn build_request_body(&self, payload: &JsonValue) -> JsonValue {
        let user_content = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
        json!({
            "model": self.model,
            "temperature": 0.2,
            "top_p": 0.9,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": time_extraction_system_prompt() },
                { "role": "user", "content": user_content }
            ]
        })
    }

    async fn invoke_chat(&self, payload: JsonValue) -> AppResult<(JsonValue, String)> {
        let correlation_id = Uuid::new_v4().to_string();
        let request_body = self.build_request_body(&payload);
        let mut last_error: Option<AppError> = None;

        for (attempt, delay) in BACKOFF_SCHEDULE.iter().enumerate() {
            if *delay > StdDuration::from_secs(0) {
                sleep(*delay).await;
            }

            debug!(
                target: "app::extraction",
                attempt = attempt + 1,
                correlation_id = %correlation_id,
                "invoking extraction model"
            );

            let start = Instant::now();
            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&request_body)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let latency_ms = start.elapsed().as_millis();
                        debug!(
                            target: "app::extraction",
                            correlation_id = %correlation_id,
                            latency_ms,
                            "extraction model responded"
                        );

                        let body: JsonValue = resp.json().await.map_err(|err| {
                            AppError::extraction_with_details(
                                ExtractionErrorCode::FormatError,
                                "failed to read extraction response body",
                                Some(correlation_id.as_str()),
                                Some(json!({ "reason": err.to_string() })),
                            )
                        })?;

                        let content = body
                            .pointer("/choices/0/message/content")
                            .and_then(|value| value.as_str())
                            .ok_or_else(|| {
                                AppError::extraction_with_details(
                                    ExtractionErrorCode::FormatError,
                                    "extraction response is missing message.content",
                                    Some(correlation_id.as_str()),
                                    Some(json!({ "reason": "missing_message_content" })),
                                )
                            })?;

                        let content_value = parse_content(content, &correlation_id)?;
                        return Ok((content_value, correlation_id));
                    }

                    let (error, retryable) = map_http_error(status, correlation_id.as_str());
                    warn!(
                        target: "app::extraction",
                        correlation_id = %correlation_id,
                        status = status.as_u16(),
                        retryable,
                        "extraction model returned non-success status"
                    );

                    if !retryable || attempt == BACKOFF_SCHEDULE.len() - 1 {
                        return Err(error);
                    }

                    last_error = Some(error);
                    continue;
                }
                Err(err) => {
                    let (error, retryable) = error_from_reqwest(err, correlation_id.as_str());
                    warn!(
                        target: "app::extraction",
                        correlation_id = %correlation_id,
                        retryable,
                        "extraction request failed"
                    );

                    if !retryable || attempt == BACKOFF_SCHEDULE.len() - 1 {
                        return Err(error);
                    }

                    last_error = Some(error);
                    continue;
                }
            }
        }

        if let Some(error) = last_error {
            Err(error)
        } else {
            Err(AppError::extraction_with_details(
                ExtractionErrorCode::Unavailable,
                "extraction request failed",
                Some(correlation_id.as_str()),
                None,
            ))
        }
    }
}

#[async_trait]
impl TimeExtractor for LlmExtractor {
    async fn extract(&self, request: &ExtractionRequest) -> AppResult<ExtractionResponse> {
        let payload = build_extraction_payload(request);
        let (content, correlation_id) = self.invoke_chat(payload).await?;

        let response: ExtractionResponse =
            serde_json::from_value(content).map_err(|err| {
                AppError::extraction_with_details(
                    ExtractionErrorCode::FormatError,
                    format!("extraction response failed schema validation: {err}"),
                    Some(correlation_id.as_str()),
                    Some(json!({ "reason": "schema_mismatch" })),
                )
            })?;

        for suggestion in &response.schedules {
            if let Err(reason) = suggestion.validate() {
                return Err(AppError::extraction_with_details(
                    ExtractionErrorCode::FormatError,
                    format!("invalid time suggestion for task {}: {reason}", suggestion.task_id),
                    Some(correlation_id.as_str()),
                    Some(json!({ "taskId": suggestion.task_id, "reason": reason })),
                ));
            }
        }

        Ok(response)
    }
}

fn parse_content(content: &str, correlation_id: &str) -> AppResult<JsonValue> {
    let trimmed = content.trim();
    let cleaned = if trimmed.starts_with("```") {
        let without_prefix = trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```JSON")
            .trim_start_matches("```");
        let without_suffix = without_prefix.trim_end_matches("```").trim();
        without_suffix.to_string()
    } else {
        trimmed.to_string()
    };

    serde_json::from_str(&cleaned).map_err(|err| {
        AppError::extraction_with_details(
            ExtractionErrorCode::FormatError,
            format!("extraction response content is not JSON: {err}"),
            Some(correlation_id),
            Some(json!({ "reason": "invalid_json" })),
        )
    })
}

fn map_http_error(status: StatusCode, correlation_id: &str) -> (AppError, bool) {
    match status {
        StatusCode::UNAUTHORIZED => (
            AppError::extraction_with_details(
                ExtractionErrorCode::MissingApiKey,
                "extraction API key is invalid or unauthorized",
                Some(correlation_id),
                None,
            ),
            false,
        ),
        StatusCode::FORBIDDEN => (
            AppError::extraction_with_details(
                ExtractionErrorCode::Forbidden,
                "extraction API access forbidden",
                Some(correlation_id),
                None,
            ),
            false,
        ),
        StatusCode::TOO_MANY_REQUESTS => (
            AppError::extraction_with_details(
                ExtractionErrorCode::RateLimited,
                "extraction service rate limited the request",
                Some(correlation_id),
                None,
            ),
            true,
        ),
        status if status.is_server_error() => (
            AppError::extraction_with_details(
                ExtractionErrorCode::Unavailable,
                format!("extraction service unavailable (status {})", status.as_u16()),
                Some(correlation_id),
                None,
            ),
            true,
        ),
        StatusCode::BAD_REQUEST => (
            AppError::extraction_with_details(
                ExtractionErrorCode::InvalidRequest,
                "extraction request was rejected as malformed",
                Some(correlation_id),
                None,
            ),
            false,
        ),
        StatusCode::NOT_FOUND => (
            AppError::extraction_with_details(
                ExtractionErrorCode::InvalidRequest,
                "extraction endpoint not found",
                Some(correlation_id),
                None,
            ),
            false,
        ),
        status => (
            AppError::extraction_with_details(
                ExtractionErrorCode::Unknown,
                format!("extraction service returned status {}", status.as_u16()),
                Some(correlation_id),
                None,
            ),
            false,
        ),
    }
}

fn error_from_reqwest(err: reqwest::Error, correlation_id: &str) -> (AppError, bool) {
    if err.is_timeout() {
        (
            AppError::extraction_with_details(
                ExtractionErrorCode::HttpTimeout,
                "extraction request timed out",
                Some(correlation_id),
                None,
            ),
            true,
        )
    } else if err.is_connect() {
        (
            AppError::extraction_with_details(
                ExtractionErrorCode::Unavailable,
                "could not connect to extraction service",
                Some(correlation_id),
                None,
            ),
            true,
        )
    } else if let Some(status) = err.status() {
        map_http_error(status, correlation_id)
    } else {
        (
            AppError::extraction_with_details(
                ExtractionErrorCode::Unknown,
                format!("extraction request failed: {err}"),
                Some(correlation_id),
                None,
            ),
            false,
        )
    }
}

/// Hooks for integration tests that exercise the HTTP path directly.
pub mod testing {
    use std::time::Duration as StdDuration;

    use reqwest::StatusCode;

    use super::{LlmExtractor, TimeExtractor};
    use crate::config::ExtractionConfig;
    use crate::error::{AppError, AppResult};
    use crate::models::extraction::{ExtractionRequest, ExtractionResponse};

    pub fn map_http_error(status: StatusCode) -> (AppError, bool) {
        super::map_http_error(status, "test-correlation-id")
    }

    pub async fn extract_via_http(
        base_url: &str,
        timeout: StdDuration,
        request: ExtractionRequest,
    ) -> AppResult<ExtractionResponse> {
        let config = ExtractionConfig {
            api_key: Some("test-key".to_string()),
            api_base_url: base_url.to_string(),
            model: "test-model".to_string(),
            http_timeout: timeout,
        };
        let extractor = LlmExtractor::from_config(&config)?;
        extractor.extract(&request).await
    }
}
