use super::*;
use serde_json::json;
use serial_test::serial;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

fn test_config(server: &MockServer) -> LlmConfig {
    LlmConfig {
        base_url: format!("{}/v1", server.uri()),
        embedding_model: "test-embed".to_string(),
        embedding_batch_size: 2,
        ..LlmConfig::default()
    }
}

fn test_client(server: &MockServer) -> OpenAiClient {
    OpenAiClient::with_api_key(&test_config(server), "sk-test").expect("client should build")
}

fn completion_request() -> CompletionRequest {
    CompletionRequest {
        model: "gpt-4-turbo".to_string(),
        system: Some("You are an experienced pharmacist.".to_string()),
        prompt: "Recommend something for a cold.".to_string(),
        temperature: 0.5,
    }
}

#[test]
fn client_configuration() {
    let config = LlmConfig {
        base_url: "http://test-host:1234/v1".to_string(),
        embedding_model: "test-model".to_string(),
        embedding_batch_size: 128,
        ..LlmConfig::default()
    };
    let client = OpenAiClient::with_api_key(&config, "sk-secret").expect("Failed to create client");

    assert_eq!(client.embedding_model, "test-model");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.base_url.path(), "/v1/");
    assert_eq!(Embedder::model_name(&client), "test-model");
}

#[test]
fn debug_output_redacts_api_key() {
    let client = OpenAiClient::with_api_key(&LlmConfig::default(), "sk-secret")
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60));

    let debug = format!("{:?}", client);
    assert!(!debug.contains("sk-secret"));
    assert!(debug.contains("<redacted>"));
}

#[test]
#[serial]
fn new_requires_api_key_in_environment() {
    let config = LlmConfig {
        api_key_env: "CLINIX_OPENAI_TEST_KEY".to_string(),
        ..LlmConfig::default()
    };

    // SAFETY: serialized with every other test touching the process environment
    unsafe {
        std::env::remove_var("CLINIX_OPENAI_TEST_KEY");
    }
    let result = OpenAiClient::new(&config);
    assert_eq!(
        result.err(),
        Some(LlmError::MissingApiKey("CLINIX_OPENAI_TEST_KEY".to_string()))
    );
}

#[test]
fn status_error_classification() {
    let not_found = status_error(
        Some(CallConvention::ChatCompletions),
        404,
        r#"{"error":{"message":"Unknown endpoint","type":"invalid_request_error","code":null}}"#,
    );
    assert!(not_found.is_shape_mismatch());

    let missing_model = status_error(
        Some(CallConvention::ChatCompletions),
        404,
        r#"{"error":{"message":"The model does not exist","code":"model_not_found"}}"#,
    );
    assert_eq!(
        missing_model,
        LlmError::Api {
            status: 404,
            message: "The model does not exist".to_string()
        }
    );

    let embeddings_404 = status_error(None, 404, "");
    assert_eq!(
        embeddings_404,
        LlmError::Api {
            status: 404,
            message: "no error details".to_string()
        }
    );

    let server_error = status_error(Some(CallConvention::LegacyCompletions), 500, "boom");
    assert_eq!(
        server_error,
        LlmError::Api {
            status: 500,
            message: "boom".to_string()
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn embeddings_follow_response_indices() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "test-embed"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [0.0, 1.0]},
                {"object": "embedding", "index": 0, "embedding": [1.0, 0.0]}
            ],
            "model": "test-embed"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let vectors = client
        .embed_documents(&["first".to_string(), "second".to_string()])
        .expect("embeddings should succeed");

    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn embeddings_are_sent_in_batches() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(body_partial_json(json!({"input": ["a", "b"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"index": 0, "embedding": [1.0]},
                {"index": 1, "embedding": [2.0]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(body_partial_json(json!({"input": ["c"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": [3.0]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let vectors = client
        .embed_documents(&texts)
        .expect("batched embeddings should succeed");

    assert_eq!(vectors, vec![vec![1.0], vec![2.0], vec![3.0]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn embedding_count_mismatch_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": [1.0]}]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let result = client.embed_batch(&["a".to_string(), "b".to_string()]);

    assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_completion_returns_message_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4-turbo",
            "temperature": 0.5,
            "messages": [
                {"role": "system", "content": "You are an experienced pharmacist."},
                {"role": "user", "content": "Recommend something for a cold."}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "1. Recommended Medication Names: ..."},
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let answer = client
        .complete(CallConvention::ChatCompletions, &completion_request())
        .expect("chat completion should succeed");

    assert_eq!(answer, "1. Recommended Medication Names: ...");
}

#[tokio::test(flavor = "multi_thread")]
async fn legacy_completion_flattens_system_prompt() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .and(body_partial_json(json!({
            "prompt": "You are an experienced pharmacist.\n\nRecommend something for a cold."
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "text": "Take rest and fluids."}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let answer = client
        .complete(CallConvention::LegacyCompletions, &completion_request())
        .expect("legacy completion should succeed");

    assert_eq!(answer, "Take rest and fluids.");
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_endpoint_is_a_shape_mismatch() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let error = client
        .chat_completion(&completion_request())
        .expect_err("404 should fail");

    assert!(error.is_shape_mismatch(), "unexpected error: {:?}", error);
}

#[tokio::test(flavor = "multi_thread")]
async fn unexpected_body_is_a_shape_mismatch() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": [{"content": "something else entirely"}]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let error = client
        .chat_completion(&completion_request())
        .expect_err("unknown shape should fail");

    assert!(error.is_shape_mismatch(), "unexpected error: {:?}", error);
}

#[tokio::test(flavor = "multi_thread")]
async fn unauthorized_is_an_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let error = client
        .chat_completion(&completion_request())
        .expect_err("401 should fail");

    assert_eq!(
        error,
        LlmError::Api {
            status: 401,
            message: "Incorrect API key provided".to_string()
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn blank_completion_is_empty_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": null}}]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let error = client
        .chat_completion(&completion_request())
        .expect_err("null content should fail");

    assert_eq!(error, LlmError::EmptyResponse);
}

#[test]
fn unreachable_server_is_a_transport_error() {
    let config = LlmConfig {
        base_url: "http://127.0.0.1:9/v1".to_string(),
        ..LlmConfig::default()
    };
    let client = OpenAiClient::with_api_key(&config, "sk-test")
        .expect("client should build")
        .with_timeout(Duration::from_secs(5));

    let error = client
        .chat_completion(&completion_request())
        .expect_err("nothing listens on the discard port");

    assert!(matches!(error, LlmError::Transport(_)), "got {:?}", error);
}
