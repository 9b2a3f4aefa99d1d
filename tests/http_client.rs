use std::time::Duration;

use captcha_solver_lib::{
    error::{ErrorKind, SolveError},
    models::{ImageInput, SolveMode, SolveRequest},
    solve::{HttpRecognitionClient, RecognitionClient},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    task::JoinHandle,
};

/// Serves exactly one canned HTTP response and hands back the raw request.
async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });

    (base, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let read = socket.read(&mut chunk).await.unwrap();
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);

        let text = String::from_utf8_lossy(&buffer);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buffer.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&buffer).into_owned()
}

fn request(mode: SolveMode) -> SolveRequest {
    SolveRequest {
        attempt_id: "test-attempt".into(),
        image: ImageInput::new(b"GIF89a".to_vec(), "image/gif", "c.gif").unwrap(),
        mode,
    }
}

fn client(base: String) -> HttpRecognitionClient {
    HttpRecognitionClient::new(base, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn posts_multipart_and_parses_outcome() {
    let (base, server) = serve_once(
        "200 OK",
        r#"{"success":true,"prediction":"x7k2p","confidence":91.5,"processing_time_ms":38,"architecture":"CNN + ViT + BiLSTM"}"#,
    )
    .await;

    let outcome = client(base).solve(&request(SolveMode::Text)).await.unwrap();
    assert_eq!(outcome.predicted_text, "x7k2p");
    assert_eq!(outcome.processing_time_ms, Some(38.0));

    let raw = server.await.unwrap();
    assert!(raw.starts_with("POST /api/solve HTTP/1.1"));
    assert!(raw.contains("multipart/form-data"));
    assert!(raw.contains("name=\"file\"; filename=\"c.gif\""));
    assert!(raw.contains("name=\"type\"\r\n\r\ntext"));
}

#[tokio::test]
async fn non_success_status_is_a_transport_error() {
    let (base, _server) = serve_once(
        "500 Internal Server Error",
        r#"{"detail":"Math model not loaded"}"#,
    )
    .await;

    let err = client(base).solve(&request(SolveMode::Math)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(matches!(err, SolveError::Status { status: 500, .. }));
}

#[tokio::test]
async fn unexpected_body_is_malformed() {
    let (base, _server) = serve_once("200 OK", r#"{"ok":true}"#).await;

    let err = client(base).solve(&request(SolveMode::Text)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = client(base).solve(&request(SolveMode::Text)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn health_reports_loaded_models() {
    let (base, server) = serve_once("200 OK", r#"{"text":true,"math":false}"#).await;

    let health = client(base).health().await.unwrap();
    assert!(health.text);
    assert!(!health.math);
    assert!(server.await.unwrap().starts_with("GET /api/health HTTP/1.1"));
}
