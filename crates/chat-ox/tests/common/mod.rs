#![allow(dead_code)]

use serde_json::json;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::oneshot,
    task::JoinHandle,
};

/// One `data:` event carrying a delta frame
pub fn frame(id: &str, content: Option<&str>, finish_reason: Option<&str>) -> String {
    let delta = match content {
        Some(content) => json!({ "role": "assistant", "content": content }),
        None => json!({ "role": "assistant" }),
    };
    let payload = json!({
        "id": id,
        "object": "chat.completion.chunk",
        "created": 1_700_000_000,
        "model": "gpt-3.5-turbo",
        "choices": [{ "delta": delta, "index": 0, "finish_reason": finish_reason }]
    });
    format!("data: {payload}\n\n")
}

pub fn done() -> String {
    "data: [DONE]\n\n".to_string()
}

/// Piece of a scripted event-stream response
pub enum Part {
    /// Write this text as one HTTP chunk
    Chunk(String),
    /// Hold the response until the sender fires (or is dropped)
    Wait(oneshot::Receiver<()>),
    /// Never finish the response
    Hang,
}

/// Serve a single scripted SSE response on a random local port.
///
/// Returns the base URL and the server task.
pub async fn scripted_server(parts: Vec<Part>) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;

        let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n";
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();

        for part in parts {
            match part {
                Part::Chunk(data) => {
                    let chunk = format!("{:x}\r\n{}\r\n", data.len(), data);
                    socket.write_all(chunk.as_bytes()).await.unwrap();
                    socket.flush().await.unwrap();
                }
                Part::Wait(rx) => {
                    let _ = rx.await;
                }
                Part::Hang => std::future::pending::<()>().await,
            }
        }

        let _ = socket.write_all(b"0\r\n\r\n").await;
    });

    (format!("http://{addr}/v1"), server)
}

/// Accept one connection and never answer it
pub async fn silent_server() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;
        std::future::pending::<()>().await;
    });

    (format!("http://{addr}/v1"), server)
}

async fn read_request(socket: &mut TcpStream) {
    let mut buffer = Vec::new();
    loop {
        let mut chunk = [0u8; 1024];
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        buffer.extend_from_slice(&chunk[..n]);

        if let Some(pos) = buffer.windows(4).position(|window| window == b"\r\n\r\n") {
            let header_end = pos + 4;
            let headers = String::from_utf8_lossy(&buffer[..header_end]).to_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length: "))
                .and_then(|len| len.trim().parse::<usize>().ok())
                .unwrap_or(0);

            let mut body_len = buffer.len() - header_end;
            while body_len < content_length {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                body_len += n;
            }
            return;
        }
    }
}
