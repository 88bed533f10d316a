use crate::config::OpenAiConfig;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::env;
use std::time::Duration;
use thiserror::Error;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Failure of a single call attempt. The governor retries on any of these.
#[derive(Error, Debug)]
pub enum CallError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("{} is not set", API_KEY_ENV)]
    MissingApiKey,

    #[error("response contained no text")]
    EmptyResponse,
}

/// Everything one describe call needs.
#[derive(Debug, Clone, PartialEq)]
pub struct DescribeRequest {
    pub model: String,
    pub prompt: String,
    pub image_data_url: String,
    pub max_output_tokens: u32,
    pub temperature: Option<f64>,
}

/// A vision-capable text service: given prompt and image, return the raw response.
pub trait DescriptionService {
    fn describe(&self, request: &DescribeRequest) -> Result<JsonValue, CallError>;
}

impl<T: DescriptionService + ?Sized> DescriptionService for &T {
    fn describe(&self, request: &DescribeRequest) -> Result<JsonValue, CallError> {
        (**self).describe(request)
    }
}

/// Blocking client for the OpenAI Responses API.
pub struct OpenAiClient {
    http: HttpClient,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    /// Build a client with the key from `OPENAI_API_KEY`.
    pub fn from_env(config: &OpenAiConfig) -> Result<Self, CallError> {
        let api_key = env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(CallError::MissingApiKey)?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &OpenAiConfig, api_key: impl Into<String>) -> Result<Self, CallError> {
        let http = HttpClient::builder()
            .user_agent(concat!("vision-descr/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn headers(&self) -> Result<HeaderMap, CallError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        Ok(headers)
    }
}

impl DescriptionService for OpenAiClient {
    fn describe(&self, request: &DescribeRequest) -> Result<JsonValue, CallError> {
        let url = format!("{}/responses", self.base_url);
        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&ResponsesBody::from(request))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CallError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<JsonValue>()?)
    }
}

#[derive(Debug, Serialize)]
struct ResponsesBody<'a> {
    model: &'a str,
    input: [InputMessage<'a>; 1],
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct InputMessage<'a> {
    role: &'static str,
    content: [InputContent<'a>; 2],
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputContent<'a> {
    InputText { text: &'a str },
    InputImage { image_url: &'a str },
}

impl<'a> From<&'a DescribeRequest> for ResponsesBody<'a> {
    fn from(request: &'a DescribeRequest) -> Self {
        ResponsesBody {
            model: &request.model,
            input: [InputMessage {
                role: "user",
                content: [
                    InputContent::InputText {
                        text: &request.prompt,
                    },
                    InputContent::InputImage {
                        image_url: &request.image_data_url,
                    },
                ],
            }],
            max_output_tokens: request.max_output_tokens,
            temperature: request.temperature,
        }
    }
}
