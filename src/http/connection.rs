use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{FuturesOrdered, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::dispatch::Dispatcher;
use crate::error::{ConnectionError, DispatchError, ParseError};
use crate::http::event::{RequestHead, WireEvent};
use crate::http::idle::IdleCloser;
use crate::http::machine::ConnectionMachine;
use crate::http::parser::Limits;
use crate::http::request::{Request, has_token};
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;

type Dispatched = BoxFuture<'static, Result<Result<Response, DispatchError>, Box<dyn Any + Send>>>;

/// Per-connection tunables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// How long an idle keep-alive connection is kept open.
    pub idle_timeout: Duration,
    pub limits: Limits,
    /// Requests dispatched but not yet answered before reading pauses.
    pub max_pipelined: usize,
    pub read_buffer_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(5),
            limits: Limits::default(),
            max_pipelined: 16,
            read_buffer_size: 8192,
        }
    }
}

/// Why a connection ended without a local fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The last response went out on a connection that could not be reused.
    Completed,
    PeerClosed,
    IdleTimeout,
    /// The peer sent a request that could not be framed.
    BadRequest(ParseError),
    /// The dispatcher failed and supplied its own response.
    DispatcherError,
}

/// A request whose head has arrived and whose body is still being read.
struct PartialRequest {
    head: RequestHead,
    body: BytesMut,
}

impl PartialRequest {
    fn into_request(self) -> Request {
        Request {
            method: self.head.method,
            target: self.head.target,
            version: self.head.version,
            headers: self.head.headers,
            body: self.body.freeze(),
        }
    }
}

/// Binds a [`ConnectionMachine`] to a byte stream and a dispatcher.
///
/// All I/O for the connection happens here, on the task calling
/// [`run`](Connection::run). Requests are dispatched as soon as they are
/// fully received; responses are written strictly in request order.
pub struct Connection<T, D> {
    stream: T,
    dispatcher: Arc<D>,
    settings: Settings,
    machine: ConnectionMachine,
    idle: IdleCloser,
    read_buf: BytesMut,
    partial: Option<PartialRequest>,
    inflight: FuturesOrdered<Dispatched>,
    pending_error: Option<ParseError>,
    peer_closed: bool,
}

impl<T, D> Connection<T, D>
where
    T: AsyncRead + AsyncWrite + Unpin,
    D: Dispatcher,
{
    pub fn new(stream: T, dispatcher: Arc<D>, settings: Settings) -> Self {
        Self {
            stream,
            dispatcher,
            machine: ConnectionMachine::new(settings.limits),
            idle: IdleCloser::new(),
            read_buf: BytesMut::with_capacity(settings.read_buffer_size),
            partial: None,
            inflight: FuturesOrdered::new(),
            pending_error: None,
            peer_closed: false,
            settings,
        }
    }

    /// Serves the connection until it closes.
    ///
    /// The stream is shut down before returning, whatever the outcome.
    pub async fn run(&mut self) -> Result<CloseReason, ConnectionError> {
        let result = self.serve().await;
        self.on_transport_closed();
        if let Err(e) = self.stream.shutdown().await {
            tracing::trace!(error = %e, "Shutdown after close failed");
        }
        result
    }

    async fn serve(&mut self) -> Result<CloseReason, ConnectionError> {
        self.idle.arm(self.settings.idle_timeout);

        loop {
            if self.inflight.is_empty() {
                if let Some(error) = self.pending_error.take() {
                    self.send_error_response(&error).await;
                    return Ok(CloseReason::BadRequest(error));
                }
                if !self.machine.wants_read() {
                    return Ok(if self.peer_closed {
                        CloseReason::PeerClosed
                    } else {
                        CloseReason::Completed
                    });
                }
            }

            let can_read =
                self.machine.wants_read() && self.inflight.len() < self.settings.max_pipelined;
            if can_read {
                self.read_buf.reserve(self.settings.read_buffer_size);
            }

            tokio::select! {
                Some(outcome) = self.inflight.next(), if !self.inflight.is_empty() => {
                    if let Some(reason) = self.on_dispatched(outcome).await? {
                        return Ok(reason);
                    }
                }

                read = self.stream.read_buf(&mut self.read_buf), if can_read => {
                    match read? {
                        0 => self.on_peer_half_closed()?,
                        _ => self.on_bytes_received(),
                    }
                }

                token = self.idle.fired() => {
                    if self.machine.is_idle() && self.inflight.is_empty() {
                        tracing::debug!(timeout = ?self.settings.idle_timeout, "Closing idle connection");
                        return Ok(CloseReason::IdleTimeout);
                    }
                    tracing::trace!(?token, "Ignoring stale idle timer");
                }
            }
        }
    }

    fn on_bytes_received(&mut self) {
        // any new activity invalidates the idle timer
        self.idle.cancel();
        self.machine.receive_data(&self.read_buf);
        self.read_buf.clear();
        self.drain_events();
        // bytes that start no request, such as stray blank lines, leave the connection idle
        if self.machine.is_idle() && self.inflight.is_empty() {
            self.idle.arm(self.settings.idle_timeout);
        }
    }

    fn on_peer_half_closed(&mut self) -> Result<(), ConnectionError> {
        if self.machine.has_partial_message() {
            tracing::warn!("Peer closed in the middle of a request");
            return Err(ConnectionError::Truncated);
        }
        self.machine.receive_eof();
        self.drain_events();
        Ok(())
    }

    fn on_transport_closed(&mut self) {
        self.idle.cancel();
        // outstanding dispatches are dropped, never polled again
        self.inflight = FuturesOrdered::new();
        self.partial = None;
    }

    /// Pulls events until the machine needs more bytes.
    fn drain_events(&mut self) {
        loop {
            match self.machine.next_event() {
                WireEvent::NeedMoreData => return,

                WireEvent::RequestHeader(head) => {
                    tracing::debug!(
                        method = %head.method,
                        target = %head.target,
                        version = %head.version,
                        "Request head received"
                    );
                    let capacity = head.content_length.min(64 * 1024) as usize;
                    self.partial = Some(PartialRequest {
                        head,
                        body: BytesMut::with_capacity(capacity),
                    });
                }

                WireEvent::BodyChunk(chunk) => {
                    if let Some(partial) = self.partial.as_mut() {
                        partial.body.extend_from_slice(&chunk);
                    }
                }

                WireEvent::MessageEnd => {
                    if let Some(partial) = self.partial.take() {
                        self.dispatch(partial.into_request());
                    }
                }

                WireEvent::PeerClosed => {
                    tracing::trace!("Peer closed its side");
                    self.peer_closed = true;
                }

                WireEvent::ParseError(error) => {
                    tracing::warn!(error = %error, "Malformed request");
                    self.partial = None;
                    self.pending_error = Some(error);
                }
            }
        }
    }

    fn dispatch(&mut self, request: Request) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let fut = async move { AssertUnwindSafe(dispatcher.dispatch(request)).catch_unwind().await };
        self.inflight.push_back(fut.boxed());
    }

    async fn on_dispatched(
        &mut self,
        outcome: Result<Result<Response, DispatchError>, Box<dyn Any + Send>>,
    ) -> Result<Option<CloseReason>, ConnectionError> {
        let response = match outcome {
            Ok(Ok(response)) => response,

            Ok(Err(DispatchError::Respond(response))) => {
                tracing::warn!(status = response.status.as_u16(), "Dispatcher returned an error response");
                self.write_response(&with_close(response)).await?;
                return Ok(Some(CloseReason::DispatcherError));
            }

            Ok(Err(DispatchError::Fault(e))) => {
                let cause = format!("{e:#}");
                tracing::error!(error = %cause, "Dispatcher failed");
                self.write_response(&with_close(Response::internal_error())).await?;
                return Err(ConnectionError::Dispatcher(cause));
            }

            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(panic = %message, "Dispatcher panicked");
                self.write_response(&with_close(Response::internal_error())).await?;
                return Err(ConnectionError::Dispatcher(message));
            }
        };

        self.write_response(&response).await?;
        tracing::debug!(status = response.status.as_u16(), "Response sent");

        if self.machine.is_write_closed() {
            return Ok(Some(if self.peer_closed {
                CloseReason::PeerClosed
            } else {
                CloseReason::Completed
            }));
        }
        if self.inflight.is_empty() && self.machine.is_idle() {
            self.idle.arm(self.settings.idle_timeout);
        }
        Ok(None)
    }

    async fn write_response(&mut self, response: &Response) -> Result<(), ConnectionError> {
        let bytes = self.machine.send_response(response).map_err(|violation| {
            tracing::error!(
                violation = %violation,
                status = response.status.as_u16(),
                "Refusing to send a response that breaks framing"
            );
            violation
        })?;

        let mut writer = ResponseWriter::new(bytes);
        writer.write_to_stream(&mut self.stream).await?;
        Ok(())
    }

    /// Best effort: the connection closes whether or not this succeeds.
    async fn send_error_response(&mut self, error: &ParseError) {
        let response = Response::for_status(error.status());
        if let Err(e) = self.write_response(&response).await {
            tracing::debug!(error = %e, "Could not send error response");
        }
    }
}

fn with_close(mut response: Response) -> Response {
    if !has_token(&response.headers, "Connection", "close") {
        response.headers.push(("connection".to_string(), "close".to_string()));
    }
    response
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
