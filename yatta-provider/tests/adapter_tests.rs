// ABOUTME: Adapter tests against a throwaway local HTTP server standing in for Ollama/Gemini.
// ABOUTME: Verifies request/response shapes without real network backends.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use yatta_provider::gemini::GeminiProvider;
use yatta_provider::ollama::{available_models, OllamaProvider};
use yatta_provider::{Provider, ProviderError};

/// Serve a fixed JSON body for every request, then close each connection.
async fn spawn_json_server(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let mut seen = Vec::new();
                while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
                    match sock.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => seen.extend_from_slice(&buf[..n]),
                    }
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = sock.write_all(response.as_bytes()).await;
            });
        }
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn ollama_generate_extracts_response_field() {
    let base = spawn_json_server(r#"{"response":"pong","done":true}"#).await;
    let provider = OllamaProvider::new(&base, "mistral:latest");

    let reply = provider.generate("ping").await.unwrap();
    assert_eq!(reply, "pong");
}

#[tokio::test]
async fn ollama_malformed_reply_is_api_error() {
    let base = spawn_json_server(r#"{"done":true}"#).await;
    let provider = OllamaProvider::new(&base, "mistral:latest");

    let err = provider.generate("ping").await.unwrap_err();
    assert!(matches!(err, ProviderError::Api(_)));
}

#[tokio::test]
async fn ollama_vision_is_unsupported() {
    let provider = OllamaProvider::new("http://127.0.0.1:1", "mistral:latest");

    let err = provider
        .generate_from_image("describe", b"bytes")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Unsupported("vision")));
}

#[tokio::test]
async fn available_models_lists_server_tags() {
    let base =
        spawn_json_server(r#"{"models":[{"name":"mistral:latest"},{"name":"llama3.2:3b"}]}"#).await;

    let models = available_models(&base).await.unwrap();
    assert_eq!(models, vec!["mistral:latest", "llama3.2:3b"]);
}

#[tokio::test]
async fn available_models_fails_fast_when_server_is_down() {
    let started = std::time::Instant::now();
    let err = available_models("http://127.0.0.1:1").await.unwrap_err();

    assert!(matches!(
        err,
        ProviderError::Api(_) | ProviderError::Timeout(_)
    ));
    // Health checks carry the short budget, not the generation one
    assert!(started.elapsed() < Duration::from_secs(6));
}

/// Like `spawn_json_server`, but also hands back the raw request it received.
async fn spawn_capture_server(
    body: &'static str,
) -> (String, tokio::sync::oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (captured_tx, captured_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let Ok((mut sock, _)) = listener.accept().await else {
            return;
        };
        let mut buf = [0u8; 4096];
        let mut seen = Vec::new();
        while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
            match sock.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => seen.extend_from_slice(&buf[..n]),
            }
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = sock.write_all(response.as_bytes()).await;
        let _ = captured_tx.send(String::from_utf8_lossy(&seen).into_owned());
    });
    (format!("http://{}", addr), captured_rx)
}

#[tokio::test]
async fn gemini_generate_parses_candidate_text() {
    let base = spawn_json_server(
        r#"{"candidates":[{"content":{"parts":[{"text":"Halo juga!"}]}}]}"#,
    )
    .await;
    let provider = GeminiProvider::with_base_url(&base, "test-key", "gemini-2.5-flash");

    let reply = provider.generate("halo").await.unwrap();
    assert_eq!(reply, "Halo juga!");
}

#[tokio::test]
async fn gemini_vision_accepts_image_bytes() {
    let base = spawn_json_server(
        r#"{"candidates":[{"content":{"parts":[{"text":"A small cat."}]}}]}"#,
    )
    .await;
    let provider = GeminiProvider::with_base_url(&base, "test-key", "gemini-2.5-flash");

    let reply = provider
        .generate_from_image("describe this image", &[0xFF, 0xD8, 0xFF, 0xE0])
        .await
        .unwrap();
    assert_eq!(reply, "A small cat.");
}

#[tokio::test]
async fn gemini_sends_key_as_header_not_in_url() {
    let (base, captured) = spawn_capture_server(
        r#"{"candidates":[{"content":{"parts":[{"text":"ok"}]}}]}"#,
    )
    .await;
    let provider = GeminiProvider::with_base_url(&base, "sekrit-key-123", "gemini-2.5-flash");

    provider.generate("halo").await.unwrap();

    let request = captured.await.unwrap();
    let request_line = request.lines().next().unwrap_or_default();
    assert!(!request_line.contains("sekrit-key-123"), "{request_line}");
    assert!(request.contains("x-goog-api-key: sekrit-key-123"));
}

#[tokio::test]
async fn gemini_transport_errors_never_echo_the_key() {
    // Connection refused: the error text carries the URL, which must not
    // carry the credential.
    let provider = GeminiProvider::with_base_url("http://127.0.0.1:1", "sekrit-key-123", "gemini-2.5-flash");

    let err = provider.generate("halo").await.unwrap_err();
    assert!(!err.to_string().contains("sekrit-key-123"), "{err}");
}
