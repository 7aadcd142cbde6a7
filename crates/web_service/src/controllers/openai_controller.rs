use crate::{error::AppError, server::AppState};
use actix_web::{get, post, web, HttpResponse};
use bytes::Bytes;
use copilot_client::api::models::{ChatCompletionRequest, StreamEvent};
use copilot_client::{get_token_count, ChatCompletionOutcome, CopilotError};
use futures_util::{Stream, StreamExt};
use log::{debug, error, info};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub const DONE_FRAME: &str = "data: [DONE]\n\n";

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| AppError::Validation(format!("Invalid request body: {e}")))
}

#[post("/chat/completions")]
pub async fn chat_completions(
    app_state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    app_state.rate_limiter.check().await?;

    let mut request: ChatCompletionRequest = parse_body(&body)?;
    let token_count = get_token_count(&request.messages);
    info!(
        "Current token count: input={} output={}",
        token_count.input, token_count.output
    );

    app_state.await_approval().await?;

    app_state
        .copilot_client
        .inject_default_max_tokens(&mut request)
        .await;
    debug!("Set max_tokens to: {:?}", request.max_tokens);

    match app_state
        .copilot_client
        .create_chat_completions(request)
        .await?
    {
        ChatCompletionOutcome::Complete(response) => Ok(HttpResponse::Ok().json(response)),
        ChatCompletionOutcome::Stream(events) => {
            let (tx, rx) = mpsc::channel(10);
            tokio::spawn(pump_openai_stream(events, tx));

            let stream = ReceiverStream::new(rx).map(|frame| Ok::<_, AppError>(Bytes::from(frame)));
            Ok(HttpResponse::Ok()
                .content_type("text/event-stream")
                .streaming(stream))
        }
    }
}

/// Re-frames upstream chunks as `data: <json>` events, ending with `[DONE]`.
/// Returns early when the receiving side has gone away.
pub async fn pump_openai_stream<S>(mut events: S, tx: mpsc::Sender<String>)
where
    S: Stream<Item = Result<StreamEvent, CopilotError>> + Unpin,
{
    while let Some(item) = events.next().await {
        let frame = match item {
            Ok(StreamEvent::Chunk(chunk)) => match serde_json::to_string(&chunk) {
                Ok(data) => format!("data: {data}\n\n"),
                Err(e) => {
                    error!("Failed to encode stream chunk: {e}");
                    continue;
                }
            },
            Ok(StreamEvent::Done) => break,
            Err(e) => {
                error!("Upstream stream failed: {e}");
                let payload = json!({ "error": { "message": e.to_string(), "type": "error" } });
                let _ = tx.send(format!("data: {payload}\n\n")).await;
                return;
            }
        };
        if tx.send(frame).await.is_err() {
            debug!("Client disconnected from chat completion stream");
            return;
        }
    }
    let _ = tx.send(DONE_FRAME.to_string()).await;
}

#[get("/models")]
pub async fn get_models(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let models = app_state.copilot_client.get_models().await?;
    Ok(HttpResponse::Ok().json(models))
}

#[post("/embeddings")]
pub async fn embeddings(
    app_state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let payload: Value = parse_body(&body)?;
    let response = app_state.copilot_client.create_embeddings(payload).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(chat_completions)
        .service(get_models)
        .service(embeddings);
}
