//! HTTP/1.1 connection core.
//!
//! One [`Connection`](connection::Connection) serves one client socket with
//! keep-alive and pipelining, restricted to `Content-Length` framing.
//!
//! # Architecture
//!
//! - **`event`**: the events the state machine produces
//! - **`parser`**: parses a request line and header block from a byte buffer
//! - **`machine`**: sans-I/O state machine turning bytes into events and
//!   responses into bytes
//! - **`writer`**: serializes response heads and flushes them to the stream
//! - **`idle`**: the per-connection idle close timer
//! - **`connection`**: binds the machine to a transport and a dispatcher
//! - **`request`** / **`response`**: the messages handed to and returned by
//!   the dispatcher
//!
//! # Request lifecycle
//!
//! ```text
//!   bytes ──▶ machine ──RequestHeader, BodyChunk*, MessageEnd──▶ dispatcher
//!                                                                   │
//!   stream ◀── writer ◀── machine (content-length checked) ◀── response
//!      │
//!      └─ keep-alive → arm idle timer, read next request
//!      └─ must close → shut down
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hearth::dispatch::Echo;
//! use hearth::http::connection::{Connection, Settings};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     let dispatcher = Arc::new(Echo);
//!
//!     loop {
//!         let (socket, _addr) = listener.accept().await?;
//!         let mut conn = Connection::new(socket, dispatcher.clone(), Settings::default());
//!         tokio::spawn(async move {
//!             if let Err(e) = conn.run().await {
//!                 eprintln!("Connection error: {}", e);
//!             }
//!         });
//!     }
//! }
//! ```

pub mod connection;
pub mod event;
pub mod idle;
pub mod machine;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
