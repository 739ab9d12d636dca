use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use mend_core::context::LlmContext;
use mend_core::errors::GatewayError;
use mend_core::messages::{Message, UserContent};
use mend_core::provider::{Completion, CompletionOptions, LlmProvider};
use mend_core::security::ApiKey;

use crate::converter::{self, EncodedImages};
use crate::models;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub model: String,
    pub request_timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            model: models::default_model().name.into(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Chat-completions provider for OpenAI-compatible endpoints.
pub struct OpenAiProvider {
    client: Client,
    api_key: ApiKey,
    endpoint: String,
    model: String,
    vision: bool,
    request_timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(api_key: ApiKey, config: OpenAiConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::NetworkError(format!("failed to build HTTP client: {e}")))?;

        // Unknown model names are passed through; assume they accept images.
        let vision = models::find_model(&config.model).map_or(true, |m| m.supports_vision);

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model,
            vision,
            request_timeout: config.request_timeout,
        })
    }

    fn map_send_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.request_timeout)
        } else {
            GatewayError::NetworkError(err.to_string())
        }
    }
}

/// Read every staged image referenced by the context into a data URL.
async fn load_images(context: &LlmContext) -> Result<EncodedImages, GatewayError> {
    let mut images = EncodedImages::new();
    for message in &context.messages {
        let Message::User(user) = message else {
            continue;
        };
        for part in &user.content {
            if let UserContent::Image { mime_type, path } = part {
                if images.contains_key(path) {
                    continue;
                }
                let bytes = tokio::fs::read(path).await.map_err(|e| {
                    GatewayError::InvalidRequest(format!(
                        "failed to read image {}: {e}",
                        path.display()
                    ))
                })?;
                images.insert(path.clone(), converter::data_url(mime_type, &bytes));
            }
        }
    }
    Ok(images)
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn supports_vision(&self) -> bool {
        self.vision
    }

    #[instrument(skip(self, context, options), fields(model = %self.model))]
    async fn complete(
        &self,
        context: &LlmContext,
        options: &CompletionOptions,
    ) -> Result<Completion, GatewayError> {
        let images = load_images(context).await?;
        let body = converter::build_request_body(context, options, &self.model, &images)?;

        let started = Instant::now();
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .header("accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let retry = retry_after(resp.headers());
            let text = resp.text().await.unwrap_or_default();
            let err = match GatewayError::from_status(status.as_u16(), text) {
                GatewayError::RateLimited { .. } => GatewayError::RateLimited { retry_after: retry },
                other => other,
            };
            warn!(status = status.as_u16(), kind = err.error_kind(), "completion request rejected");
            return Err(err);
        }

        let value: Value = resp
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;
        let completion = converter::parse_response(&value)?;

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            images = images.len(),
            input_tokens = completion.usage.as_ref().map(|u| u.input_tokens),
            output_tokens = completion.usage.as_ref().map(|u| u.output_tokens),
            "completion received"
        );
        Ok(completion)
    }
}
