use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{self, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use medichat::{
    errors::ProviderError,
    models::{attachment::Attachment, conversation::Conversation, message::Message, role::Role},
    persona,
    providers::base::{GenerateRequest, Provider, ReplyStream},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;

// User-visible error strings, in the product's language. Details that only
// matter to operators go to the logs instead.
const MSG_NO_MESSAGES: &str = "메시지가 없습니다.";
const MSG_BAD_MESSAGE: &str = "메시지 형식이 올바르지 않습니다.";
const MSG_EMPTY_LAST: &str = "마지막 메시지가 비어 있습니다.";
const MSG_UNREADABLE: &str = "요청 본문을 해석할 수 없습니다.";
const MSG_UPSTREAM: &str = "서버 에러 발생";

const CHANNEL_CAPACITY: usize = 100;
const CLIENT_POLL_INTERVAL: Duration = Duration::from_millis(500);

// One element of the incoming transcript. `image` stays untyped on purpose:
// a value that is not a well-formed data URI drops the attachment rather
// than failing the request.
#[derive(Debug, Deserialize)]
struct IncomingMessage {
    role: Role,
    #[serde(default)]
    content: String,
    #[serde(default)]
    image: Option<Value>,
}

impl IncomingMessage {
    fn into_message(self) -> Message {
        let attachment = self
            .image
            .as_ref()
            .and_then(Value::as_str)
            .and_then(Attachment::from_data_uri);

        let mut message = match self.role {
            Role::User => Message::user(),
            Role::Assistant => Message::assistant(),
        }
        .with_text(self.content);
        if let Some(attachment) = attachment {
            message = message.with_attachment(attachment);
        }
        message
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// A rejected relay request: bad input gets 400, an upstream refusal before
/// any fragment went out gets 500. Both answer with a JSON `error` body.
#[derive(Debug)]
enum RelayError {
    Invalid(&'static str),
    Upstream,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            RelayError::Invalid(message) => (StatusCode::BAD_REQUEST, message),
            RelayError::Upstream => (StatusCode::INTERNAL_SERVER_ERROR, MSG_UPSTREAM),
        };
        (
            status,
            Json(ErrorResponse {
                error: message.to_string(),
            }),
        )
            .into_response()
    }
}

// Custom response type streaming raw reply fragments with SSE-style headers
pub struct SseResponse {
    rx: ReceiverStream<Result<Bytes, ProviderError>>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<Result<Bytes, ProviderError>>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, ProviderError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx).poll_next(cx)
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> axum::response::Response {
        let body = axum::body::Body::from_stream(self);

        http::Response::builder()
            .header("Content-Type", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .header("Connection", "keep-alive")
            .body(body)
            .unwrap()
    }
}

/// Turn the request payload into a transcript, accepting both body shapes:
/// the multi-turn `{"messages": [...]}` and the single-turn `{"message":
/// "..."}` the first client release sent.
fn parse_conversation(payload: &Value) -> Result<Conversation, RelayError> {
    if let Some(messages) = payload.get("messages") {
        if !messages.is_array() {
            return Err(RelayError::Invalid(MSG_NO_MESSAGES));
        }
        let incoming: Vec<IncomingMessage> =
            serde_json::from_value(messages.clone()).map_err(|error| {
                tracing::debug!("Rejected chat payload: {error}");
                RelayError::Invalid(MSG_BAD_MESSAGE)
            })?;
        if incoming.is_empty() {
            return Err(RelayError::Invalid(MSG_NO_MESSAGES));
        }

        let mut conversation = Conversation::new();
        for message in incoming {
            conversation.push(message.into_message());
        }
        match conversation.last() {
            Some(current) if current.has_substance() => Ok(conversation),
            _ => Err(RelayError::Invalid(MSG_EMPTY_LAST)),
        }
    } else if let Some(message) = payload.get("message") {
        let text = message
            .as_str()
            .ok_or(RelayError::Invalid(MSG_BAD_MESSAGE))?;
        if text.trim().is_empty() {
            return Err(RelayError::Invalid(MSG_EMPTY_LAST));
        }
        let mut conversation = Conversation::new();
        conversation.push(Message::user().with_text(text));
        Ok(conversation)
    } else {
        Err(RelayError::Invalid(MSG_NO_MESSAGES))
    }
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<SseResponse, RelayError> {
    let Json(payload) = payload.map_err(|error| {
        tracing::debug!("Unreadable chat body: {error}");
        RelayError::Invalid(MSG_UNREADABLE)
    })?;

    // All validation happens before the provider is touched; a rejected
    // request never costs an upstream call.
    let conversation = parse_conversation(&payload)?;
    let request = GenerateRequest::from_conversation(persona::system_instruction(), &conversation)
        .ok_or(RelayError::Invalid(MSG_NO_MESSAGES))?;

    let stream = state
        .provider
        .complete_stream(&request)
        .await
        .map_err(|error| {
            tracing::error!("Starting reply stream failed: {error}");
            RelayError::Upstream
        })?;

    // Create channel for streaming
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::spawn(forward(stream, tx));

    Ok(SseResponse::new(ReceiverStream::new(rx)))
}

/// Pump reply fragments into the response channel until the reply ends, the
/// upstream fails, or the client goes away.
async fn forward(mut stream: ReplyStream, tx: mpsc::Sender<Result<Bytes, ProviderError>>) {
    loop {
        match timeout(CLIENT_POLL_INTERVAL, stream.next()).await {
            Ok(Some(Ok(fragment))) => {
                if tx.send(Ok(Bytes::from(fragment))).await.is_err() {
                    break;
                }
            }
            Ok(Some(Err(error))) => {
                tracing::error!("Reply stream failed mid-reply: {error}");
                // The 200 already went out, so the only honest signal left
                // is killing the body; the client sees the transport die
                // instead of a clean finish.
                let _ = tx.send(Err(error)).await;
                break;
            }
            Ok(None) => {
                break;
            }
            Err(_) => {
                // Heartbeat, used to detect disconnected clients and stop
                // reading from the provider.
                if tx.is_closed() {
                    break;
                }
            }
        }
    }
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .with_state(state)
}
