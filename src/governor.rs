use crate::client::{CallError, DescribeRequest, DescriptionService};
use crate::config::OpenAiConfig;
use serde_json::Value as JsonValue;
use std::thread;
use std::time::Duration;
use tracing::{error, warn};

/// Upper bound on generated tokens for every request.
pub const MAX_OUTPUT_TOKENS: u32 = 220;
pub const DEFAULT_TEMPERATURE: f64 = 0.4;
/// Models whose name contains this (any case) reject a sampling temperature.
const NO_TEMPERATURE_KEYWORD: &str = "nano";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            retry_delay,
        }
    }
}

impl From<&OpenAiConfig> for RetryPolicy {
    fn from(config: &OpenAiConfig) -> Self {
        RetryPolicy::new(
            config.max_retries,
            Duration::from_secs(config.retry_delay_seconds),
        )
    }
}

/// Wraps a [`DescriptionService`] with bounded retries.
///
/// Transport failures, error statuses and empty responses are all retried after
/// `retry_delay`. Once `max_retries` attempts are used up the last error is
/// logged and `None` is returned; nothing is raised to the caller.
pub struct CallGovernor<S> {
    service: S,
    policy: RetryPolicy,
}

impl<S: DescriptionService> CallGovernor<S> {
    pub fn new(service: S, policy: RetryPolicy) -> Self {
        Self { service, policy }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn describe(&self, model: &str, prompt: &str, image_data_url: &str) -> Option<String> {
        let request = build_request(model, prompt, image_data_url);
        let max_retries = self.policy.max_retries;
        let mut last_error: Option<CallError> = None;

        for attempt in 1..=max_retries {
            match self.service.describe(&request) {
                Ok(response) => {
                    let text = extract_text(&response);
                    if !text.is_empty() {
                        return Some(text);
                    }
                    warn!(
                        "Empty response from model (attempt {}/{})",
                        attempt, max_retries
                    );
                    last_error = Some(CallError::EmptyResponse);
                }
                Err(err) => {
                    warn!(
                        "Description call failed (attempt {}/{}): {}",
                        attempt, max_retries, err
                    );
                    last_error = Some(err);
                }
            }
            if attempt < max_retries && !self.policy.retry_delay.is_zero() {
                thread::sleep(self.policy.retry_delay);
            }
        }

        if let Some(err) = last_error {
            error!("Giving up after {} attempts: {}", max_retries, err);
        }
        None
    }
}

pub fn build_request(model: &str, prompt: &str, image_data_url: &str) -> DescribeRequest {
    DescribeRequest {
        model: model.to_string(),
        prompt: prompt.to_string(),
        image_data_url: image_data_url.to_string(),
        max_output_tokens: MAX_OUTPUT_TOKENS,
        temperature: temperature_for(model),
    }
}

fn temperature_for(model: &str) -> Option<f64> {
    if model.to_lowercase().contains(NO_TEMPERATURE_KEYWORD) {
        None
    } else {
        Some(DEFAULT_TEMPERATURE)
    }
}

/// Pull the generated text out of a Responses API payload.
///
/// `output[*].content[*]` entries typed `output_text` are joined with a single
/// space; if there are none, the flat `output_text` field is used instead.
pub fn extract_text(response: &JsonValue) -> String {
    let mut chunks: Vec<&str> = Vec::new();

    if let Some(blocks) = response.get("output").and_then(JsonValue::as_array) {
        for block in blocks {
            let Some(contents) = block.get("content").and_then(JsonValue::as_array) else {
                continue;
            };
            for content in contents {
                if content.get("type").and_then(JsonValue::as_str) != Some("output_text") {
                    continue;
                }
                if let Some(text) = content.get("text").and_then(JsonValue::as_str) {
                    if !text.is_empty() {
                        chunks.push(text);
                    }
                }
            }
        }
    }

    if chunks.is_empty() {
        if let Some(text) = response.get("output_text").and_then(JsonValue::as_str) {
            chunks.push(text);
        }
    }

    chunks.join(" ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::{Cell, RefCell};

    /// Replays a fixed script of outcomes, then keeps failing.
    struct ScriptedService {
        script: RefCell<Vec<Result<JsonValue, CallError>>>,
        calls: Cell<u32>,
        last_request: RefCell<Option<DescribeRequest>>,
    }

    impl ScriptedService {
        fn new(mut script: Vec<Result<JsonValue, CallError>>) -> Self {
            script.reverse();
            Self {
                script: RefCell::new(script),
                calls: Cell::new(0),
                last_request: RefCell::new(None),
            }
        }
    }

    impl DescriptionService for ScriptedService {
        fn describe(&self, request: &DescribeRequest) -> Result<JsonValue, CallError> {
            self.calls.set(self.calls.get() + 1);
            *self.last_request.borrow_mut() = Some(request.clone());
            self.script
                .borrow_mut()
                .pop()
                .unwrap_or(Err(CallError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                }))
        }
    }

    fn governor(script: Vec<Result<JsonValue, CallError>>, max_retries: u32) -> CallGovernor<ScriptedService> {
        CallGovernor::new(
            ScriptedService::new(script),
            RetryPolicy::new(max_retries, Duration::ZERO),
        )
    }

    #[test]
    fn test_extract_text_from_blocks() {
        let response = json!({
            "output": [
                {"type": "reasoning", "content": []},
                {"type": "message", "content": [
                    {"type": "output_text", "text": "A gold ring"},
                    {"type": "refusal", "refusal": "no"},
                    {"type": "output_text", "text": "on white marble."}
                ]}
            ],
            "output_text": "ignored"
        });
        assert_eq!(extract_text(&response), "A gold ring on white marble.");
    }

    #[test]
    fn test_extract_text_falls_back_to_flat_field() {
        let response = json!({"output": [], "output_text": "  Flat text. "});
        assert_eq!(extract_text(&response), "Flat text.");
        assert_eq!(extract_text(&json!({})), "");
    }

    #[test]
    fn test_first_success_returns_immediately() {
        let gov = governor(vec![Ok(json!({"output_text": "ok"}))], 5);
        assert_eq!(gov.describe("gpt-4o-mini", "p", "img").as_deref(), Some("ok"));
        assert_eq!(gov.service().calls.get(), 1);
    }

    #[test]
    fn test_retries_errors_and_empty_responses() {
        let gov = governor(
            vec![
                Err(CallError::MissingApiKey),
                Ok(json!({"output_text": "   "})),
                Ok(json!({"output_text": "third time"})),
            ],
            5,
        );
        assert_eq!(gov.describe("m", "p", "img").as_deref(), Some("third time"));
        assert_eq!(gov.service().calls.get(), 3);
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let gov = governor(vec![], 3);
        assert!(gov.describe("m", "p", "img").is_none());
        assert_eq!(gov.service().calls.get(), 3);
    }

    #[test]
    fn test_zero_retries_still_makes_one_attempt() {
        let gov = governor(vec![], 0);
        assert!(gov.describe("m", "p", "img").is_none());
        assert_eq!(gov.service().calls.get(), 1);
    }

    #[test]
    fn test_temperature_omitted_for_nano_models() {
        let gov = governor(vec![Ok(json!({"output_text": "x"}))], 1);
        gov.describe("GPT-4.1-Nano", "p", "img");
        let req = gov.service().last_request.borrow().clone().unwrap();
        assert_eq!(req.temperature, None);
        assert_eq!(req.max_output_tokens, MAX_OUTPUT_TOKENS);

        let gov = governor(vec![Ok(json!({"output_text": "x"}))], 1);
        gov.describe("gpt-4o-mini", "p", "img");
        let req = gov.service().last_request.borrow().clone().unwrap();
        assert_eq!(req.temperature, Some(DEFAULT_TEMPERATURE));
    }
}
