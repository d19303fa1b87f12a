use std::sync::Arc;

use hearth::dispatch::Echo;
use hearth::http::connection::Settings;
use hearth::server::listener;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn start_server() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(listener::serve(listener, Arc::new(Echo), Settings::default()));
    addr
}

#[tokio::test]
async fn test_server_keep_alive_round_trip() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    for target in ["/one", "/two"] {
        let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", target);
        stream.write_all(request.as_bytes()).await.unwrap();

        let body = format!("GET {}", target);
        let expected = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let mut buf = vec![0; expected.len()];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), expected);
    }
}

#[tokio::test]
async fn test_server_closes_after_connection_close() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"POST /submit HTTP/1.1\r\nConnection: close\r\nContent-Length: 4\r\n\r\ndata")
        .await
        .unwrap();

    let mut out = String::new();
    stream.read_to_string(&mut out).await.unwrap();
    assert_eq!(
        out,
        "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: 12\r\nconnection: close\r\n\r\nPOST /submit"
    );
}

#[tokio::test]
async fn test_server_serves_connections_independently() {
    let addr = start_server().await;
    let mut stalled = TcpStream::connect(addr).await.unwrap();
    stalled.write_all(b"GET /half").await.unwrap();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /other HTTP/1.1\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut out = String::new();
    stream.read_to_string(&mut out).await.unwrap();
    assert!(out.ends_with("GET /other"));
}
