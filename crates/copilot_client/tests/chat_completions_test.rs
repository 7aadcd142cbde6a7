//! Integration tests for the chat completion dispatcher against a mocked Copilot API

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use copilot_client::api::models::{
    ChatCompletionRequest, ChatMessage, ContentPart, FunctionDefinition, ImageUrl, ModelsResponse,
    Role, StreamEvent, Tool,
};
use copilot_client::{
    ChatCompletionOutcome, Config, CopilotClient, CopilotClientTrait, CopilotContext, CopilotError,
};
use futures_util::StreamExt;
use serde_json::json;
use common::{client_for, sse_body};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion_body() -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1234567890,
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "Hello!"},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
    })
}

fn user_request(text: &str) -> ChatCompletionRequest {
    ChatCompletionRequest::new("gpt-4o", vec![ChatMessage::text(Role::User, text)])
}

#[tokio::test]
async fn non_streaming_completion_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-copilot-token"))
        .and(header("copilot-integration-id", "vscode-chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 0).await;
    let outcome = client
        .create_chat_completions(user_request("hi"))
        .await
        .expect("completion");

    match outcome {
        ChatCompletionOutcome::Complete(response) => {
            assert_eq!(response.id.as_deref(), Some("chatcmpl-test"));
            assert_eq!(response.choices[0].message.content.as_deref(), Some("Hello!"));
            assert_eq!(response.usage.as_ref().unwrap()["total_tokens"], 5);
        }
        other => panic!("expected complete response, got {other:?}"),
    }
}

#[tokio::test]
async fn streaming_completion_yields_chunks_then_done() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"Hel"}}]}"#,
        "this is not json",
        r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"lo"},"finish_reason":"stop"}]}"#,
        "[DONE]",
        r#"{"id":"late","choices":[]}"#,
    ]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = client_for(&server, 0).await;
    let mut request = user_request("hi");
    request.stream = Some(true);

    let outcome = client.create_chat_completions(request).await.expect("stream");
    let ChatCompletionOutcome::Stream(stream) = outcome else {
        panic!("expected a stream");
    };
    let events: Vec<StreamEvent> = stream
        .map(|event| event.expect("event"))
        .collect()
        .await;

    assert_eq!(events.len(), 3);
    match (&events[0], &events[1]) {
        (StreamEvent::Chunk(first), StreamEvent::Chunk(second)) => {
            assert_eq!(first.choices[0].delta.content.as_deref(), Some("Hel"));
            assert_eq!(second.choices[0].finish_reason.as_deref(), Some("stop"));
        }
        other => panic!("unexpected events {other:?}"),
    }
    assert_eq!(events[2], StreamEvent::Done);
}

#[tokio::test]
async fn bad_request_with_tools_reports_tool_support() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"tools not allowed"}"#))
        .mount(&server)
        .await;

    let client = client_for(&server, 0).await;
    let mut request = user_request("use a tool");
    request.tools = Some(vec![Tool {
        tool_type: "function".to_string(),
        function: FunctionDefinition {
            name: "lookup".to_string(),
            description: String::new(),
            parameters: json!({"type": "object"}),
        },
    }]);

    match client.create_chat_completions(request).await {
        Err(CopilotError::Upstream(error)) => {
            assert_eq!(error.status, 400);
            assert!(error.message.contains("may not support tool calls"));
            assert_eq!(error.body, r#"{"error":"tools not allowed"}"#);
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn stream_open_failure_is_typed_before_any_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let client = client_for(&server, 0).await;
    let mut request = user_request("hi");
    request.stream = Some(true);

    match client.create_chat_completions(request).await {
        Err(CopilotError::Upstream(error)) => {
            assert_eq!(error.status, 403);
            assert_eq!(error.message, "Failed to create chat completions");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn input_images_are_rewritten_and_flag_vision() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("copilot-vision-request", "true"))
        .and(body_partial_json(json!({
            "messages": [{"role": "user", "content": [{"type": "image_url"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 0).await;
    let request = ChatCompletionRequest::new(
        "gpt-4o",
        vec![ChatMessage::parts(
            Role::User,
            vec![ContentPart::InputImage {
                image_url: ImageUrl::from_url("data:image/png;base64,AAAA"),
                extra: Default::default(),
            }],
        )],
    );

    client.create_chat_completions(request).await.expect("completion");
}

#[tokio::test]
async fn missing_token_fails_without_calling_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body()))
        .expect(0)
        .mount(&server)
        .await;

    let config = Config {
        api_base: Some(server.uri()),
        max_retries: 0,
        ..Default::default()
    };
    let context = CopilotContext::new(config, std::env::temp_dir()).expect("context");
    let client = CopilotClient::new(Arc::new(context));

    let result = client.create_chat_completions(user_request("hi")).await;
    assert!(matches!(result, Err(CopilotError::MissingToken)));
}

#[tokio::test]
async fn max_tokens_is_injected_from_cached_registry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{"id": "gpt-4o", "capabilities": {"limits": {"max_output_tokens": 4096}}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 0).await;
    let cached: ModelsResponse = client.cache_models().await.expect("models");
    assert_eq!(cached.data.len(), 1);

    let mut known = user_request("hi");
    client.inject_default_max_tokens(&mut known).await;
    assert_eq!(known.max_tokens, Some(4096));

    let mut explicit = user_request("hi");
    explicit.max_tokens = Some(10);
    client.inject_default_max_tokens(&mut explicit).await;
    assert_eq!(explicit.max_tokens, Some(10));

    let mut unknown = ChatCompletionRequest::new("mystery", vec![]);
    client.inject_default_max_tokens(&mut unknown).await;
    assert_eq!(unknown.max_tokens, None);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let server = MockServer::start().await;
    let request_count = Arc::new(AtomicUsize::new(0));
    let counter = request_count.clone();

    // Fails twice then succeeds
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(move |_req: &wiremock::Request| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                ResponseTemplate::new(503).set_body_string("Service Unavailable")
            } else {
                ResponseTemplate::new(200).set_body_json(completion_body())
            }
        })
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server, 3).await;
    let outcome = client.create_chat_completions(user_request("hi")).await;

    assert!(matches!(outcome, Ok(ChatCompletionOutcome::Complete(_))));
    assert_eq!(request_count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn embeddings_and_models_pass_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(body_partial_json(json!({"input": ["hello"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{"object": "embedding", "index": 0, "embedding": [0.1, 0.2]}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(500).set_body_string("registry down"))
        .mount(&server)
        .await;

    let client = client_for(&server, 0).await;
    let embeddings = client
        .create_embeddings(json!({"model": "text-embedding-3-small", "input": ["hello"]}))
        .await
        .expect("embeddings");
    assert_eq!(embeddings["data"][0]["embedding"][1], 0.2);

    match client.get_models().await {
        Err(CopilotError::Upstream(error)) => {
            assert_eq!(error.status, 500);
            assert_eq!(error.message, "Failed to get models");
            assert_eq!(error.body, "registry down");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}
