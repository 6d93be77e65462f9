mod common;

use std::sync::Arc;
use std::time::Duration;

use chat_ox::{ChatClient, ChatError, ChatOptions, ChatRequest, ClientState, Message, SendGate};
use common::{Part, frame, scripted_server, silent_server};
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};

fn request() -> ChatRequest {
    ChatRequest::new(
        vec![Message::system("You are helpful"), Message::user("Hi")],
        ChatOptions::default(),
    )
}

fn client_at(base_url: &str) -> ChatClient {
    ChatClient::builder()
        .credential("sk-test")
        .base_url(base_url)
        .gate(Arc::new(SendGate::new()))
        .build()
}

async fn wait_until_sending(client: &ChatClient) {
    timeout(Duration::from_secs(5), async {
        while client.state() != ClientState::Sending {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("request never started");
}

#[tokio::test]
async fn test_overlapping_request_is_rejected_without_disturbing_first() {
    let (release_tx, release_rx) = oneshot::channel();
    let (base_url, server) = scripted_server(vec![
        Part::Chunk(frame("s1", Some("Hel"), None)),
        Part::Wait(release_rx),
        Part::Chunk(frame("s1", Some("lo!"), None)),
        Part::Chunk(frame("s1", None, Some("stop"))),
    ])
    .await;

    let client = client_at(&base_url);
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

    let first = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .request_completion(request(), move |text, _| {
                    let _ = seen_tx.send(text.to_string());
                })
                .await
        }
    });

    assert_eq!(seen_rx.recv().await.as_deref(), Some("Hel"));

    let err = client
        .request_completion(request(), |_, _| panic!("second request must not stream"))
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::RequestInProgress));
    assert_eq!(client.state(), ClientState::Sending);

    release_tx.send(()).unwrap();

    let text = first.await.unwrap().unwrap();
    assert_eq!(text, "Hello!");
    assert_eq!(seen_rx.recv().await.as_deref(), Some("Hello!"));
    assert_eq!(seen_rx.recv().await, None);
    assert_eq!(client.state(), ClientState::Idle);

    server.await.unwrap();
}

#[tokio::test]
async fn test_cancel_mid_stream_discards_text_and_frees_gate() {
    let (base_url, server) = scripted_server(vec![
        Part::Chunk(frame("s2", Some("partial"), None)),
        Part::Hang,
    ])
    .await;

    let client = client_at(&base_url);
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .request_completion(request(), move |text, _| {
                    let _ = seen_tx.send(text.to_string());
                })
                .await
        }
    });

    assert_eq!(seen_rx.recv().await.as_deref(), Some("partial"));

    client.cancel().unwrap();
    // Second cancel while the request unwinds is a no-op or finds nothing in flight
    let _ = client.cancel();

    let result = timeout(Duration::from_secs(5), handle)
        .await
        .expect("cancel did not unwind the request")
        .unwrap();
    assert!(matches!(result, Err(ChatError::Cancelled)));
    assert_eq!(client.state(), ClientState::Idle);
    assert!(matches!(client.cancel(), Err(ChatError::NoRequestInProgress)));

    server.abort();
}

#[tokio::test]
async fn test_cancel_while_connecting() {
    let (base_url, server) = silent_server().await;
    let client = client_at(&base_url);

    let handle = tokio::spawn({
        let client = client.clone();
        async move { client.request_completion(request(), |_, _| {}).await }
    });

    wait_until_sending(&client).await;
    client.cancel().unwrap();

    let result = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert!(matches!(result, Err(ChatError::Cancelled)));
    assert!(client.gate().is_idle());

    server.abort();
}

#[tokio::test]
async fn test_request_accepted_after_cancellation() {
    let (base_url, server) = silent_server().await;
    let client = client_at(&base_url);

    let handle = tokio::spawn({
        let client = client.clone();
        async move { client.request_completion(request(), |_, _| {}).await }
    });
    wait_until_sending(&client).await;
    client.cancel().unwrap();
    assert!(matches!(handle.await.unwrap(), Err(ChatError::Cancelled)));
    server.abort();

    let (base_url, server) = scripted_server(vec![
        Part::Chunk(frame("s3", Some("again"), None)),
        Part::Chunk(frame("s3", None, Some("stop"))),
    ])
    .await;
    let client = ChatClient::builder()
        .credential("sk-test")
        .base_url(base_url)
        .gate(Arc::clone(client.gate()))
        .build();

    let text = client.request_completion(request(), |_, _| {}).await.unwrap();
    assert_eq!(text, "again");
    server.await.unwrap();
}

#[tokio::test]
async fn test_cancel_without_request_fails() {
    let client = ChatClient::new("sk-test");
    assert!(matches!(client.cancel(), Err(ChatError::NoRequestInProgress)));
}

#[tokio::test]
async fn test_shared_gate_blocks_other_clients() {
    let (release_tx, release_rx) = oneshot::channel();
    let (base_url, server) = scripted_server(vec![
        Part::Wait(release_rx),
        Part::Chunk(frame("s4", Some("done"), None)),
    ])
    .await;

    let gate = Arc::new(SendGate::new());
    let owner = ChatClient::builder()
        .credential("sk-test")
        .base_url(base_url.as_str())
        .gate(Arc::clone(&gate))
        .build();
    let other = ChatClient::builder()
        .credential("sk-test")
        .base_url(base_url.as_str())
        .gate(Arc::clone(&gate))
        .build();

    let handle = tokio::spawn({
        let owner = owner.clone();
        async move { owner.request_completion(request(), |_, _| {}).await }
    });
    wait_until_sending(&owner).await;

    assert_eq!(other.state(), ClientState::Idle);
    assert!(matches!(
        other.request_completion(request(), |_, _| {}).await,
        Err(ChatError::RequestInProgress)
    ));
    assert!(matches!(other.cancel(), Err(ChatError::NoRequestInProgress)));
    assert_eq!(gate.current(), Some(owner.sender_id()));

    release_tx.send(()).unwrap();
    assert_eq!(handle.await.unwrap().unwrap(), "done");
    assert!(gate.is_idle());

    server.await.unwrap();
}

#[tokio::test]
async fn test_default_clients_share_one_request_slot() {
    let first = ChatClient::new("sk-test");
    let second = ChatClient::new("sk-test");

    // Streams are lazy, nothing is sent while they sit unpolled
    let stream = first.stream_completion(request()).unwrap();
    assert!(matches!(
        second.stream_completion(request()),
        Err(ChatError::RequestInProgress)
    ));
    assert!(matches!(second.cancel(), Err(ChatError::NoRequestInProgress)));
    assert_eq!(first.state(), ClientState::Sending);
    assert_eq!(second.state(), ClientState::Idle);

    drop(stream);
    let stream = second.stream_completion(request()).unwrap();
    assert!(matches!(
        first.stream_completion(request()),
        Err(ChatError::RequestInProgress)
    ));
    drop(stream);
    assert!(SendGate::shared().is_idle());
}

#[tokio::test]
async fn test_separate_gates_do_not_interfere() {
    let (release_tx, release_rx) = oneshot::channel();
    let (base_url, server) = scripted_server(vec![
        Part::Wait(release_rx),
        Part::Chunk(frame("s5", Some("x"), None)),
    ])
    .await;

    let first = client_at(&base_url);
    let second = client_at("http://127.0.0.1:9/v1");

    let handle = tokio::spawn({
        let first = first.clone();
        async move { first.request_completion(request(), |_, _| {}).await }
    });
    wait_until_sending(&first).await;

    let stream = second.stream_completion(request());
    assert!(stream.is_ok());
    drop(stream);

    release_tx.send(()).unwrap();
    assert_eq!(handle.await.unwrap().unwrap(), "x");
    server.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_racing_a_new_request_is_never_lost() {
    // Bound but never accepted, a request that got past cancellation would hang here
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}/v1", listener.local_addr().unwrap());
    let client = client_at(&base_url);

    for _ in 0..50 {
        let canceller = std::thread::spawn({
            let client = client.clone();
            move || {
                while client.cancel().is_err() {
                    std::hint::spin_loop();
                }
            }
        });

        let mut stream = client.stream_completion(request()).unwrap();
        canceller.join().unwrap();

        let next = timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("cancel reached a stale token");
        assert!(matches!(next, Some(Err(ChatError::Cancelled))));
        drop(stream);
        assert!(client.gate().is_idle());
    }

    drop(listener);
}
