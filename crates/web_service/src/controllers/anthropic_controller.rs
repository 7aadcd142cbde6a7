use crate::{
    error::{AnthropicApiError, AppError},
    server::AppState,
};
use actix_web::{post, web, HttpResponse};
use anthropic_adapter::{
    build_upstream_request, convert_messages, convert_messages_response, pump_anthropic_stream,
    select_copilot_model, AnthropicCountTokensRequest, AnthropicCountTokensResponse,
    AnthropicError, AnthropicMessagesRequest, AnthropicStreamTranslator,
};
use bytes::Bytes;
use copilot_client::{get_token_count, ChatCompletionOutcome};
use futures_util::StreamExt;
use log::{debug, error, info};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

#[post("/messages")]
pub async fn messages(
    app_state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, AnthropicApiError> {
    app_state.rate_limiter.check().await?;

    let request_id = Uuid::new_v4().to_string();
    let request: AnthropicMessagesRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Invalid request body: {e}")))?;
    info!(
        "Received Anthropic messages request, requestModel: {}",
        request.model
    );

    if !request.messages.is_empty() {
        let estimate = get_token_count(&convert_messages(
            &request.messages,
            request.system.as_ref(),
        ));
        info!(
            "Estimated token count: input={} output={}",
            estimate.input, estimate.output
        );
    }

    app_state.await_approval().await?;

    let copilot_model = app_state
        .copilot_client
        .select_cached_model(&|registry| select_copilot_model(&request.model, registry))
        .await;
    let mut upstream = build_upstream_request(&request, &copilot_model);
    app_state
        .copilot_client
        .inject_default_max_tokens(&mut upstream)
        .await;
    debug!(
        "Converted to OpenAI payload model={} messageCount={} hasTools={} requestId={}",
        upstream.model,
        upstream.messages.len(),
        upstream.has_tools(),
        request_id
    );

    let input_tokens = get_token_count(&upstream.messages).input;

    match app_state
        .copilot_client
        .create_chat_completions(upstream)
        .await?
    {
        ChatCompletionOutcome::Stream(events) => {
            let translator =
                AnthropicStreamTranslator::new(request_id, request.model.clone(), input_tokens);
            let (tx, rx) = mpsc::channel(10);
            tokio::spawn(pump_anthropic_stream(events, translator, tx));

            let stream = ReceiverStream::new(rx).map(|frame| Ok::<_, AppError>(Bytes::from(frame)));
            Ok(HttpResponse::Ok()
                .content_type("text/event-stream")
                .streaming(stream))
        }
        ChatCompletionOutcome::Complete(response) => {
            let anthropic_response =
                convert_messages_response(&response, &request.model, &request_id);
            info!(
                "Anthropic messages request completed model={} stopReason={} inputTokens={} outputTokens={} requestId={}",
                anthropic_response.model,
                anthropic_response.stop_reason,
                anthropic_response.usage.input_tokens,
                anthropic_response.usage.output_tokens,
                request_id
            );
            Ok(HttpResponse::Ok().json(anthropic_response))
        }
    }
}

#[post("/messages/count_tokens")]
pub async fn count_tokens(body: web::Bytes) -> HttpResponse {
    let request: AnthropicCountTokensRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            error!("Error counting tokens: {e}");
            return HttpResponse::BadRequest()
                .json(AnthropicError::new(400, "invalid_request_error", e.to_string()).envelope());
        }
    };
    info!(
        "Received Anthropic token count request model={} messageCount={}",
        request.model.as_deref().unwrap_or_default(),
        request.messages.len()
    );

    let count = get_token_count(&convert_messages(&request.messages, request.system.as_ref()));
    info!("Token count completed tokens={}", count.input);

    HttpResponse::Ok().json(AnthropicCountTokensResponse {
        input_tokens: count.input,
    })
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(count_tokens).service(messages);
}
