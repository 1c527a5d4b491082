// HTTP behaviour of the completion backends against a local mock server
use doc_translate::config::Config;
use doc_translate::llm::client::LlmClient;
use doc_translate::llm::client_impl::{OpenAIClient, ZhipuaiClient};
use doc_translate::llm::error::TranslationFailure;
use doc_translate::llm::factory;
use doc_translate::llm::retry::RetryingClient;
use mockito::Matcher;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const CHAT_OK: &str = r#"{
    "id": "chatcmpl-1",
    "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hola"}}]
}"#;

fn zhipuai(url: &str) -> ZhipuaiClient {
    ZhipuaiClient::with_base_url(
        "zp-key".to_string(),
        "glm-4-flash".to_string(),
        url.to_string(),
        5,
    )
    .unwrap()
    .with_polling(Duration::from_millis(10), Duration::from_millis(200))
}

#[tokio::test]
async fn test_openai_sends_bearer_and_pinned_model() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "Hello"}]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(CHAT_OK)
        .create_async()
        .await;

    let client =
        OpenAIClient::with_base_url("sk-test".to_string(), "gpt-4o".to_string(), server.url(), 5)
            .unwrap();
    assert_eq!(client.complete("Hello").await.unwrap(), "Hola");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_credential_free_endpoint_sends_no_authorization() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(CHAT_OK)
        .create_async()
        .await;

    let client = OpenAIClient::with_base_url(
        String::new(),
        "gpt-4o".to_string(),
        format!("{}/v1/", server.url()),
        5,
    )
    .unwrap();
    assert_eq!(client.complete("Hello").await.unwrap(), "Hola");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_openai_http_error_is_reported() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_body("rate limited")
        .create_async()
        .await;

    let client =
        OpenAIClient::with_base_url("sk".to_string(), "gpt-4o".to_string(), server.url(), 5)
            .unwrap();
    let err = client.complete("Hello").await.unwrap_err();
    assert!(err.to_string().contains("429"));
    assert!(err.to_string().contains("rate limited"));
}

#[tokio::test]
async fn test_openai_null_content_is_empty_text() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#)
        .create_async()
        .await;

    let client =
        OpenAIClient::with_base_url("sk".to_string(), "gpt-4o".to_string(), server.url(), 5)
            .unwrap();
    assert_eq!(client.complete("Hello").await.unwrap(), "");
}

#[tokio::test]
async fn test_zhipuai_submits_then_polls_result() {
    let mut server = mockito::Server::new_async().await;
    let submit = server
        .mock("POST", "/async/chat/completions")
        .match_header("authorization", "Bearer zp-key")
        .match_body(Matcher::PartialJson(serde_json::json!({"model": "glm-4-flash"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "job-1", "request_id": "r-1", "task_status": "PROCESSING"}"#)
        .create_async()
        .await;
    let result = server
        .mock("GET", "/async-result/job-1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"id": "job-1", "task_status": "SUCCESS",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hola"}}]}"#,
        )
        .create_async()
        .await;

    let reply = zhipuai(&server.url()).complete("Hello").await.unwrap();
    assert_eq!(reply, "Hola");
    submit.assert_async().await;
    result.assert_async().await;
}

#[tokio::test]
async fn test_zhipuai_failed_job() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/async/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "job-2", "task_status": "PROCESSING"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/async-result/job-2")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "job-2", "task_status": "FAIL", "choices": []}"#)
        .create_async()
        .await;

    let err = zhipuai(&server.url()).complete("Hello").await.unwrap_err();
    match err.downcast_ref::<TranslationFailure>() {
        Some(TranslationFailure::JobFailed { job_id, status }) => {
            assert_eq!(job_id, "job-2");
            assert_eq!(status, "FAIL");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_zhipuai_pending_job_times_out() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/async/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "job-3", "task_status": "PROCESSING"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/async-result/job-3")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "job-3", "task_status": "PROCESSING"}"#)
        .create_async()
        .await;

    let err = zhipuai(&server.url()).complete("Hello").await.unwrap_err();
    match err.downcast_ref::<TranslationFailure>() {
        Some(TranslationFailure::PollTimeout { job_id, waited }) => {
            assert_eq!(job_id, "job-3");
            assert!(*waited >= Duration::from_millis(200));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_zhipuai_cancelled_before_polling() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/async/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "job-4", "task_status": "PROCESSING"}"#)
        .create_async()
        .await;
    let poll = server
        .mock("GET", "/async-result/job-4")
        .expect(0)
        .create_async()
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let client = zhipuai(&server.url()).with_cancellation(cancel);

    let err = client.complete("Hello").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TranslationFailure>(),
        Some(TranslationFailure::Cancelled { .. })
    ));
    poll.assert_async().await;
}

#[tokio::test]
async fn test_retry_policy_over_blank_backend() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": ""}}]}"#)
        .expect(5)
        .create_async()
        .await;

    let backend =
        OpenAIClient::with_base_url("sk".to_string(), "gpt-4o".to_string(), server.url(), 5)
            .unwrap();
    let client = RetryingClient::new(Box::new(backend), 5);

    let err = client.complete("Hello").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TranslationFailure>(),
        Some(TranslationFailure::Exhausted { attempts: 5, .. })
    ));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_cancelled_zhipuai_job_is_not_resubmitted() {
    let mut server = mockito::Server::new_async().await;
    let submit = server
        .mock("POST", "/async/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "job-5", "task_status": "PROCESSING"}"#)
        .expect(1)
        .create_async()
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let client = RetryingClient::new(
        Box::new(zhipuai(&server.url()).with_cancellation(cancel)),
        5,
    );

    let err = client.complete("hi").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TranslationFailure>(),
        Some(TranslationFailure::Cancelled { .. })
    ));
    submit.assert_async().await;
}

#[tokio::test]
async fn test_cancelled_run_submits_no_jobs() {
    let mut server = mockito::Server::new_async().await;
    let submit = server
        .mock("POST", "/async/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let backend = zhipuai(&server.url()).with_cancellation(cancel.clone());
    let client = RetryingClient::new(Box::new(backend), 5).with_cancellation(cancel);

    let err = client.complete("hi").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TranslationFailure>(),
        Some(TranslationFailure::Interrupted)
    ));
    submit.assert_async().await;
}

#[tokio::test]
async fn test_cancellation_interrupts_openai_compatible_request() {
    // Accepts the connection and never answers
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(3600)).await;
    });

    let mut config = Config::default();
    config.llm.fallback.base_url = format!("http://{}/v1", addr);
    let cancel = CancellationToken::new();
    let client = factory::create_client(&config, false, cancel.clone()).unwrap();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(Duration::from_secs(5), client.complete("hi"))
        .await
        .expect("cancellation should end the request")
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TranslationFailure>(),
        Some(TranslationFailure::Interrupted)
    ));
}
