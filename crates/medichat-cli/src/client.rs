use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use medichat::models::conversation::Conversation;
use medichat::models::message::Message;
use medichat::text::Utf8Chunks;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};

/// HTTP client for the relay's chat endpoint.
pub struct RelayClient {
    client: Client,
    base_url: String,
}

impl RelayClient {
    pub fn new<S: Into<String>>(base_url: S) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Post a transcript and open the reply stream. Anything other than 200
    /// surfaces the relay's own `error` message when there is one.
    pub async fn send(&self, conversation: &Conversation) -> Result<RelayReply> {
        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&payload(conversation))
            .send()
            .await
            .with_context(|| format!("Failed to reach the relay at {url}"))?;

        match response.status() {
            StatusCode::OK => Ok(RelayReply::new(response)),
            status => {
                let message = relay_error_message(response)
                    .await
                    .unwrap_or_else(|| format!("Relay answered {status}"));
                Err(anyhow!(message))
            }
        }
    }
}

fn payload(conversation: &Conversation) -> Value {
    let messages: Vec<Value> = conversation.messages().iter().map(wire_message).collect();
    json!({ "messages": messages })
}

fn wire_message(message: &Message) -> Value {
    let mut entry = json!({
        "role": message.role,
        "content": message.content,
    });
    if let Some(attachment) = &message.attachment {
        entry["image"] = Value::String(attachment.to_data_uri());
    }
    entry
}

async fn relay_error_message(response: Response) -> Option<String> {
    let body: Value = response.json().await.ok()?;
    body.get("error")?.as_str().map(str::to_string)
}

/// An open reply stream. The relay sends raw text fragments which may split
/// multi-byte characters, so bytes are decoded incrementally.
pub struct RelayReply {
    response: Response,
    decoder: Utf8Chunks,
}

impl RelayReply {
    fn new(response: Response) -> Self {
        Self {
            response,
            decoder: Utf8Chunks::new(),
        }
    }

    /// The next decoded piece of the reply, or `None` once the stream ends
    /// cleanly. A transport error here means the relay died mid-reply.
    pub async fn next_chunk(&mut self) -> Result<Option<String>> {
        while let Some(bytes) = self
            .response
            .chunk()
            .await
            .context("Reply stream broke off")?
        {
            let text = self.decoder.push(&bytes)?;
            if !text.is_empty() {
                return Ok(Some(text));
            }
        }
        self.decoder
            .finish()
            .context("Reply stream ended inside a character")?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medichat::models::attachment::Attachment;

    #[test]
    fn payload_carries_roles_text_and_data_uris() {
        let mut conversation = Conversation::new();
        conversation.push(
            Message::user()
                .with_text("사진 봐주세요")
                .with_attachment(Attachment::new("image/jpeg", "aGVsbG8=")),
        );
        conversation.push(Message::assistant().with_text("확인했습니다."));

        let body = payload(&conversation);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["image"], "data:image/jpeg;base64,aGVsbG8=");
        assert_eq!(messages[1]["role"], "model");
        assert!(messages[1].get("image").is_none());
    }
}
