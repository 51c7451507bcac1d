// Upstream client retry and fallback behaviour
// Author: kelexine (https://github.com/kelexine)

mod common;

use common::{ScriptedBackend, Step};
use provit::config::UpstreamConfig;
use provit::models::{ChatMessage, CompletionRequest, Outcome};
use provit::upstream::{CompletionBackend, OpenAiBackend, UpstreamClient, DEGRADED_MESSAGE};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn client(backend: Arc<ScriptedBackend>) -> UpstreamClient {
    UpstreamClient::new(backend, &UpstreamConfig::default())
}

fn conversation() -> Vec<ChatMessage> {
    vec![ChatMessage::system("be roxx"), ChatMessage::user("are you a bot?")]
}

#[tokio::test(start_paused = true)]
async fn test_raising_every_attempt_fails_after_budget() {
    let backend = ScriptedBackend::always(Step::fail("connection reset"));
    let start = Instant::now();

    let outcome = client(backend.clone()).complete(conversation()).await;

    assert!(matches!(outcome, Outcome::Failure(ref reason) if reason.contains("connection reset")));
    assert_eq!(backend.calls(), 2);
    // One retry delay between the two attempts
    assert_eq!(start.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_empty_every_attempt_is_soft_degraded_success() {
    let backend = ScriptedBackend::always(Step::empty());

    let outcome = client(backend.clone()).complete(conversation()).await;

    assert_eq!(outcome, Outcome::Success(DEGRADED_MESSAGE.to_string()));
    assert_eq!(backend.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_last_attempt_decides_between_degraded_and_failure() {
    let backend = ScriptedBackend::new(vec![Step::fail("timeout")], Step::empty());
    assert!(client(backend).complete(conversation()).await.is_success());

    let backend = ScriptedBackend::new(vec![Step::empty()], Step::fail("timeout"));
    assert!(!client(backend).complete(conversation()).await.is_success());
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers_on_second_attempt() {
    let backend = ScriptedBackend::new(vec![Step::fail("502")], Step::reply("yo bruh"));

    let outcome = client(backend.clone()).complete(conversation()).await;

    assert_eq!(outcome, Outcome::Success("yo bruh".to_string()));
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_first_success_makes_one_call_with_fixed_parameters() {
    let backend = ScriptedBackend::always(Step::reply("partial answer --- trailing junk"));

    let outcome = client(backend.clone()).complete(conversation()).await;

    assert_eq!(outcome, Outcome::Success("partial answer".to_string()));
    assert_eq!(backend.calls(), 1);

    let sent = &backend.requests()[0];
    assert_eq!(sent.model, "deepseek-r1-distill-qwen-32b");
    assert_eq!(sent.max_tokens, 100);
    assert!((sent.temperature - 0.9).abs() < f32::EPSILON);
    assert_eq!(sent.messages.len(), 2);
}

#[tokio::test]
async fn test_http_backend_parses_completion_and_sends_key() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"c1","choices":[{"index":0,"message":{"role":"assistant","content":"nah wait PLS"}}]}"#)
        .create_async()
        .await;

    let config = UpstreamConfig {
        api_base_url: format!("{}/v1", server.url()),
        api_key: Some("sk-test".to_string()),
        ..UpstreamConfig::default()
    };
    let backend = OpenAiBackend::new(&config).unwrap();
    let request = CompletionRequest {
        model: config.model.clone(),
        messages: conversation(),
        max_tokens: 100,
        temperature: 0.9,
    };

    let response = backend.create_completion(&request).await.unwrap();
    assert_eq!(response.first_content(), Some("nah wait PLS"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_http_backend_error_status_is_an_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(500)
        .with_body(r#"{"error":{"message":"provider exploded"}}"#)
        .create_async()
        .await;

    let config = UpstreamConfig {
        api_base_url: format!("{}/v1", server.url()),
        retry_delay_secs: 0,
        ..UpstreamConfig::default()
    };
    let backend: Arc<dyn CompletionBackend> = Arc::new(OpenAiBackend::new(&config).unwrap());

    let outcome = UpstreamClient::new(backend, &config).complete(conversation()).await;

    match outcome {
        Outcome::Failure(reason) => assert!(reason.contains("provider exploded")),
        other => panic!("expected failure, got {:?}", other),
    }
}
