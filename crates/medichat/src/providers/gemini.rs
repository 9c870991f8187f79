use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};

use super::base::{GenerateRequest, Provider, ReplyStream, Usage};
use super::configs::GeminiProviderConfig;
use super::sse::SseReader;
use crate::errors::{ProviderError, ProviderResult};
use crate::models::message::Message;

pub const GEMINI_DEFAULT_HOST: &str = "https://generativelanguage.googleapis.com";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash";

const GENERATE_OP: &str = "generateContent";
const STREAM_OP: &str = "streamGenerateContent";

pub struct GeminiProvider {
    client: Client,
    config: GeminiProviderConfig,
}

impl GeminiProvider {
    pub fn new(config: GeminiProviderConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn request_body(request: &GenerateRequest) -> Value {
        let mut contents: Vec<Value> = request.history.iter().map(message_to_content).collect();
        contents.push(message_to_content(&request.prompt));

        json!({
            "system_instruction": {
                "parts": [{ "text": request.system }]
            },
            "contents": contents,
        })
    }

    /// Concatenated text of the first candidate, `None` when the chunk has no
    /// candidate text, e.g. the final usage-only stream event.
    fn reply_text(data: &Value) -> Option<String> {
        let parts = data
            .get("candidates")?
            .get(0)?
            .get("content")?
            .get("parts")?
            .as_array()?;

        let text: String = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect();
        Some(text)
    }

    fn get_usage(data: &Value) -> Option<Usage> {
        let usage = data.get("usageMetadata")?;

        let input_tokens = usage
            .get("promptTokenCount")
            .and_then(Value::as_i64)
            .map(|v| v as i32);

        let output_tokens = usage
            .get("candidatesTokenCount")
            .and_then(Value::as_i64)
            .map(|v| v as i32);

        let total_tokens = usage
            .get("totalTokenCount")
            .and_then(Value::as_i64)
            .map(|v| v as i32)
            .or_else(|| match (input_tokens, output_tokens) {
                (Some(input), Some(output)) => Some(input + output),
                _ => None,
            });

        Some(Usage::new(input_tokens, output_tokens, total_tokens))
    }

    async fn post(
        &self,
        operation: &str,
        query: &[(&str, &str)],
        payload: &Value,
    ) -> ProviderResult<reqwest::Response> {
        let url = format!(
            "{}/v1beta/models/{}:{}",
            self.config.host.trim_end_matches('/'),
            self.config.model,
            operation
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .query(query)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(response);
        }

        // The API wraps failures as { "error": { "message": ... } }. Surface
        // that message when present; otherwise fall back to the status line.
        let message = match response.json::<Value>().await {
            Ok(body) => body
                .get("error")
                .and_then(|error| error.get("message"))
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| body.to_string()),
            Err(_) => status
                .canonical_reason()
                .unwrap_or("unrecognized failure")
                .to_string(),
        };

        Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    async fn complete(&self, request: &GenerateRequest) -> ProviderResult<(String, Usage)> {
        let payload = Self::request_body(request);
        let response = self.post(GENERATE_OP, &[], &payload).await?;
        let data: Value = response.json().await?;

        let text = Self::reply_text(&data)
            .ok_or_else(|| ProviderError::malformed("response carries no candidate text"))?;
        let usage = Self::get_usage(&data).unwrap_or_default();

        Ok((text, usage))
    }

    async fn complete_stream(&self, request: &GenerateRequest) -> ProviderResult<ReplyStream> {
        let payload = Self::request_body(request);
        let response = self.post(STREAM_OP, &[("alt", "sse")], &payload).await?;

        let model = self.config.model.clone();
        let mut events = SseReader::from_response(response);

        Ok(Box::pin(async_stream::try_stream! {
            while let Some(event) = events.next_event().await? {
                let data: Value = serde_json::from_str(&event)
                    .map_err(|e| ProviderError::malformed(format!("stream event is not JSON: {e}")))?;

                if let Some(usage) = GeminiProvider::get_usage(&data) {
                    tracing::debug!(
                        "{} usage: input={:?} output={:?} total={:?}",
                        model,
                        usage.input_tokens,
                        usage.output_tokens,
                        usage.total_tokens
                    );
                }

                if let Some(text) = GeminiProvider::reply_text(&data) {
                    if !text.is_empty() {
                        yield text;
                    }
                }
            }
        }))
    }
}

fn message_to_content(message: &Message) -> Value {
    let mut parts = vec![json!({ "text": message.content })];
    if let Some(attachment) = &message.attachment {
        parts.push(json!({
            "inline_data": {
                "mime_type": attachment.mime_type,
                "data": attachment.data,
            }
        }));
    }
    json!({ "role": message.role, "parts": parts })
}
