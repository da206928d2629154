//! Wire formats of the remote services, checked against a local mock server.

use serde_json::{json, Value};
use tempfile::TempDir;
use vidyasetu::config::{EmbeddingConfig, LlmConfig, PartitionerConfig};
use vidyasetu::embedding::{EmbeddingProvider, OpenAIProvider};
use vidyasetu::llm::{ChatBackend, ChatMessage, ChatMode, ChatRequest, OpenAIChat};
use vidyasetu::partition::{Partitioner, UnstructuredPartitioner};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn embedding_config(server: &MockServer, dims: usize) -> EmbeddingConfig {
    EmbeddingConfig {
        base_url: server.uri(),
        dims,
        ..Default::default()
    }
}

fn llm_config(server: &MockServer) -> LlmConfig {
    LlmConfig {
        base_url: server.uri(),
        ..Default::default()
    }
}

fn request(mode: ChatMode) -> ChatRequest {
    ChatRequest {
        messages: vec![ChatMessage::system("SYS"), ChatMessage::user("Who built Uruk?")],
        temperature: 0.2,
        mode,
    }
}

#[tokio::test]
async fn test_embeddings_request_and_index_ordering() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "text-embedding-3-small",
            "input": ["first", "second"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0, 0.0] },
                { "index": 0, "embedding": [1.0, 0.0, 0.0] }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAIProvider::new(&embedding_config(&server, 3), "sk-test").unwrap();
    let vectors = provider
        .embed(&["first".to_string(), "second".to_string()])
        .await
        .unwrap();
    assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
}

#[tokio::test]
async fn test_embeddings_dimension_mismatch_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "index": 0, "embedding": [1.0, 0.0] }]
        })))
        .mount(&server)
        .await;

    let provider = OpenAIProvider::new(&embedding_config(&server, 3), "sk-test").unwrap();
    let err = provider.embed(&["text".to_string()]).await.unwrap_err();
    assert!(err.to_string().contains("expected 3"));
}

#[tokio::test]
async fn test_embeddings_http_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAIProvider::new(&embedding_config(&server, 3), "sk-test").unwrap();
    let err = provider.embed(&["text".to_string()]).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("500"));
    assert!(msg.contains("overloaded"));
}

#[tokio::test]
async fn test_stateless_chat_uses_chat_completions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4.1-mini",
            "messages": [
                { "role": "system", "content": "SYS" },
                { "role": "user", "content": "Who built Uruk?" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-9",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": "The Sumerians." } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let chat = OpenAIChat::new(&llm_config(&server), "sk-test").unwrap();
    let response = chat.complete(request(ChatMode::Stateless)).await.unwrap();
    assert_eq!(response.text, "The Sumerians.");
    assert_eq!(response.response_id, None);
}

#[tokio::test]
async fn test_threaded_chat_sends_previous_response_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .and(body_partial_json(json!({ "previous_response_id": "resp_1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_2",
            "output": [{
                "type": "message",
                "role": "assistant",
                "content": [{ "type": "output_text", "text": "Gilgamesh's city." }]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let chat = OpenAIChat::new(&llm_config(&server), "sk-test").unwrap();
    let response = chat
        .complete(request(ChatMode::Threaded {
            previous: Some("resp_1".to_string()),
        }))
        .await
        .unwrap();
    assert_eq!(response.text, "Gilgamesh's city.");
    assert_eq!(response.response_id.as_deref(), Some("resp_2"));
}

#[tokio::test]
async fn test_first_threaded_call_omits_previous_response_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_1",
            "output": [{
                "type": "message",
                "content": [{ "type": "output_text", "text": "Hello." }]
            }]
        })))
        .mount(&server)
        .await;

    let chat = OpenAIChat::new(&llm_config(&server), "sk-test").unwrap();
    chat.complete(request(ChatMode::Threaded { previous: None }))
        .await
        .unwrap();

    let received = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert!(body.get("previous_response_id").is_none());
    assert_eq!(body["input"][1]["content"], "Who built Uruk?");
}

#[tokio::test]
async fn test_unstructured_partition_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/general/v0/general"))
        .and(header("unstructured-api-key", "un-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "type": "Title", "text": "Chapter 1", "metadata": { "page_number": 1 } },
            { "type": "Table", "text": "", "metadata": { "page_number": 2 } },
            { "type": "CompositeElement", "text": "Uruk was a city.", "metadata": {} }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let pdf = tmp.path().join("chapter1.pdf");
    std::fs::write(&pdf, b"%PDF-1.4 test").unwrap();

    let config = PartitionerConfig {
        url: format!("{}/general/v0/general", server.uri()),
        ..Default::default()
    };
    let partitioner = UnstructuredPartitioner::new(&config, Some("un-test".to_string())).unwrap();
    let elements = partitioner.partition(&pdf).await.unwrap();

    assert_eq!(elements.len(), 3);
    assert_eq!(elements[0].page_number, Some(1));
    assert_eq!(elements[1].kind.as_deref(), Some("Table"));
    assert_eq!(elements[2].page_number, None);

    let received = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&received[0].body);
    assert!(body.contains("name=\"files\"; filename=\"chapter1.pdf\""));
    assert!(body.contains("hi_res"));
    assert!(body.contains("by_title"));
    assert!(body.contains("name=\"pdf_infer_table_structure\""));
}
