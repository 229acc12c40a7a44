//! HTTP handlers

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use parley_core::conversation::validate_message;
use parley_core::error::Result;
use parley_core::llm::LLMRequest;
use parley_core::relay::{ChannelSink, RelayOutcome, WireFormat};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::AppState;
use crate::error::ApiError;
use crate::session::Session;

/// Chat request body; `prompt` is accepted as an alias of `message`.
#[derive(Debug, Default, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
}

impl MessageRequest {
    /// Parse leniently; a missing or malformed body reads as an empty message.
    pub fn parse(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    pub fn text(&self) -> &str {
        self.message
            .as_deref()
            .or(self.prompt.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
    format: Option<String>,
}

/// Non-streaming chat: one upstream call, one JSON reply.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session = Session::from_headers(&headers, &state.config.session);
    let result = reply_once(&state, &session, MessageRequest::parse(&body)).await;
    session.attach(&state.config.session, result.into_response())
}

async fn reply_once(
    state: &AppState,
    session: &Session,
    request: MessageRequest,
) -> std::result::Result<Json<Value>, ApiError> {
    let message = validate_message(request.text())?;

    let mut history = state.store.load(&session.id).await?;
    let (message, prompt) = state.builder.build(history.turns(), message)?;
    history.push_user(message);
    state.store.save(&session.id, &history).await?;

    let response = state
        .relay
        .provider()
        .generate(&LLMRequest::from_prompt(prompt))
        .await?;

    history.push_assistant(response.content.clone());
    state.store.save(&session.id, &history).await?;

    tracing::info!(
        session = %session.id,
        turns = history.len(),
        reply_len = response.content.len(),
        "reply sent"
    );

    Ok(Json(json!({ "reply": response.content })))
}

/// Streaming chat: fragments are written to the body as they arrive.
pub async fn stream_message(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StreamParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session = Session::from_headers(&headers, &state.config.session);
    let response = match open_stream(state.clone(), &session, &params, &headers, &body).await {
        Ok(response) => response,
        Err(error) => error.into_response(),
    };
    session.attach(&state.config.session, response)
}

fn negotiate_format(
    params: &StreamParams,
    headers: &HeaderMap,
    default: WireFormat,
) -> Result<WireFormat> {
    if let Some(format) = &params.format {
        return format.parse();
    }

    Ok(headers
        .get(axum::http::header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .and_then(WireFormat::from_accept)
        .unwrap_or(default))
}

async fn open_stream(
    state: Arc<AppState>,
    session: &Session,
    params: &StreamParams,
    headers: &HeaderMap,
    body: &[u8],
) -> std::result::Result<Response, ApiError> {
    let format = negotiate_format(params, headers, state.config.stream.default_format)?;
    let request = MessageRequest::parse(body);
    let message = validate_message(request.text())?;

    let mut history = state.store.load(&session.id).await?;
    let (message, prompt) = state.builder.build(history.turns(), message)?;
    history.push_user(message);
    state.store.save(&session.id, &history).await?;

    let (mut sink, rx) = ChannelSink::channel(format, state.config.stream.channel_capacity);
    let id = session.id.clone();

    tokio::spawn(async move {
        let store = state.store.clone();
        let commit_id = id.clone();
        let outcome = state
            .relay
            .run(prompt, &mut sink, move |reply| async move {
                history.push_assistant(reply);
                store.save(&commit_id, &history).await
            })
            .await;

        match outcome {
            RelayOutcome::Completed { text } => {
                tracing::info!(session = %id, reply_len = text.len(), %format, "stream completed");
            }
            RelayOutcome::Failed { error } => {
                tracing::error!(session = %id, %error, "stream failed");
            }
            RelayOutcome::Disconnected => {
                tracing::info!(session = %id, "client disconnected mid-stream");
            }
        }
    });

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));
    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, HeaderValue::from_static(format.content_type())),
            (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (CONNECTION, HeaderValue::from_static("keep-alive")),
            (
                HeaderName::from_static("x-accel-buffering"),
                HeaderValue::from_static("no"),
            ),
        ],
        body,
    )
        .into_response())
}

/// Forget the session's history.
pub async fn reset(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let session = Session::from_headers(&headers, &state.config.session);
    let result = match state.store.reset(&session.id).await {
        Ok(()) => Json(json!({ "ok": true })).into_response(),
        Err(error) => ApiError(error).into_response(),
    };
    session.attach(&state.config.session, result)
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "model": state.relay.model_info().model_name,
    }))
}
