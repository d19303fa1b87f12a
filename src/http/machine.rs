//! Sans-I/O HTTP/1.1 state machine for one server connection.
//!
//! Inbound bytes go in through [`ConnectionMachine::receive_data`] and come
//! out of [`ConnectionMachine::next_event`] as [`WireEvent`]s. Responses go in
//! through the outbound methods and come out as bytes ready for the
//! transport. Nothing here performs I/O.
//!
//! ```text
//!   Idle ──bytes──▶ ReadingHeaders ──head──▶ ReadingBody ──len reached──┐
//!                        │                       (only if length > 0)   │
//!                        │ malformed             ▼                      ▼
//!                        └──────────▶ Closing ◀── must close ── MessageComplete
//!                                                                       │
//!   Idle ◀────────────────────────── keep-alive ────────────────────────┘
//! ```

use std::collections::VecDeque;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FramingViolation, ParseError};
use crate::http::event::WireEvent;
use crate::http::parser::{Limits, find_headers_end, parse_request_head};
use crate::http::request::{Method, Version, has_token, is_token};
use crate::http::response::{Response, StatusCode};
use crate::http::writer::serialize_head;

/// Inbound parse state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// No message in progress.
    Idle,
    ReadingHeaders,
    ReadingBody { remaining: u64 },
    /// The body is complete; `MessageEnd` is emitted on the first poll.
    MessageComplete { end_emitted: bool },
    /// Terminal. Inbound bytes are discarded.
    Closing,
}

/// A request that has been fully received and is owed a response.
#[derive(Debug, Clone, Copy)]
struct Exchange {
    head_only: bool,
    keep_alive: bool,
    /// HTTP/1.0 peers close unless keep-alive is echoed back.
    http10: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outbound {
    Idle,
    SendingBody {
        declared: u64,
        written: u64,
        suppress: bool,
        close_after: bool,
    },
    Closed,
}

#[derive(Debug)]
pub struct ConnectionMachine {
    limits: Limits,
    buffer: BytesMut,
    state: ParseState,
    must_close: bool,
    eof: bool,
    /// How far the header delimiter search has already looked.
    scanned: usize,
    current: Option<Exchange>,
    owed: VecDeque<Exchange>,
    outbound: Outbound,
}

impl ConnectionMachine {
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            buffer: BytesMut::with_capacity(4096),
            state: ParseState::Idle,
            must_close: false,
            eof: false,
            scanned: 0,
            current: None,
            owed: VecDeque::new(),
            outbound: Outbound::Idle,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Set once the connection can no longer be reused.
    pub fn must_close(&self) -> bool {
        self.must_close
    }

    /// Whether reading more bytes can still produce events.
    pub fn wants_read(&self) -> bool {
        self.state != ParseState::Closing && !self.eof
    }

    /// Responses owed for requests already received, in request order.
    pub fn owed_responses(&self) -> usize {
        self.owed.len()
    }

    /// True once the final response has gone out; nothing more may be written.
    pub fn is_write_closed(&self) -> bool {
        self.outbound == Outbound::Closed
    }

    /// Bytes received that belong to a message not yet fully framed.
    pub fn has_partial_message(&self) -> bool {
        match self.state {
            ParseState::ReadingHeaders | ParseState::ReadingBody { .. } => true,
            ParseState::Idle => self.buffer.iter().any(|b| *b != b'\r' && *b != b'\n'),
            ParseState::MessageComplete { .. } | ParseState::Closing => false,
        }
    }

    /// No message in progress in either direction and nothing owed.
    pub fn is_idle(&self) -> bool {
        self.state == ParseState::Idle
            && !self.has_partial_message()
            && self.owed.is_empty()
            && self.outbound == Outbound::Idle
    }

    /// Buffers bytes read from the transport.
    pub fn receive_data(&mut self, data: &[u8]) {
        if self.state == ParseState::Closing {
            tracing::trace!(discarded = data.len(), "Dropping bytes received while closing");
            return;
        }
        self.buffer.extend_from_slice(data);
    }

    /// Records that the peer closed its writing side.
    pub fn receive_eof(&mut self) {
        self.eof = true;
    }

    /// Produces the next event from buffered bytes.
    ///
    /// Returns [`WireEvent::NeedMoreData`] when no progress is possible; all
    /// unconsumed bytes are kept for the next call.
    pub fn next_event(&mut self) -> WireEvent {
        loop {
            match self.state {
                ParseState::Closing => return WireEvent::NeedMoreData,

                ParseState::Idle => {
                    while self.buffer.starts_with(b"\r\n") {
                        self.buffer.advance(2);
                    }
                    if self.buffer.is_empty() || self.buffer[..] == b"\r"[..] {
                        if self.eof {
                            return self.peer_closed();
                        }
                        return WireEvent::NeedMoreData;
                    }
                    self.state = ParseState::ReadingHeaders;
                    self.scanned = 0;
                }

                ParseState::ReadingHeaders => {
                    let from = self.scanned.saturating_sub(3);
                    if find_headers_end(&self.buffer, from).is_none()
                        && self.buffer.len() <= self.limits.max_header_bytes
                    {
                        self.scanned = self.buffer.len();
                        if self.eof {
                            return self.peer_closed();
                        }
                        return WireEvent::NeedMoreData;
                    }

                    return match parse_request_head(&self.buffer, &self.limits) {
                        Ok((head, consumed)) => {
                            self.buffer.advance(consumed);
                            let keep_alive = head.keep_alive();
                            if !keep_alive {
                                self.must_close = true;
                            }
                            self.current = Some(Exchange {
                                head_only: head.method == Method::HEAD,
                                keep_alive,
                                http10: head.version == Version::Http10,
                            });
                            self.state = match head.content_length {
                                0 => ParseState::MessageComplete { end_emitted: false },
                                remaining => ParseState::ReadingBody { remaining },
                            };
                            WireEvent::RequestHeader(head)
                        }
                        Err(ParseError::Incomplete) => WireEvent::NeedMoreData,
                        Err(e) => {
                            tracing::debug!(error = %e, "Rejecting malformed request");
                            self.enter_closing();
                            // the peer is still owed an error response
                            self.owed.push_back(Exchange {
                                head_only: false,
                                keep_alive: false,
                                http10: false,
                            });
                            WireEvent::ParseError(e)
                        }
                    };
                }

                ParseState::ReadingBody { remaining } => {
                    if self.buffer.is_empty() {
                        if self.eof {
                            return self.peer_closed();
                        }
                        return WireEvent::NeedMoreData;
                    }
                    let n = remaining.min(self.buffer.len() as u64) as usize;
                    let chunk = self.buffer.split_to(n).freeze();
                    self.state = match remaining - n as u64 {
                        0 => ParseState::MessageComplete { end_emitted: false },
                        remaining => ParseState::ReadingBody { remaining },
                    };
                    return WireEvent::BodyChunk(chunk);
                }

                ParseState::MessageComplete { end_emitted: false } => {
                    self.state = ParseState::MessageComplete { end_emitted: true };
                    if let Some(exchange) = self.current.take() {
                        self.owed.push_back(exchange);
                    }
                    return WireEvent::MessageEnd;
                }

                ParseState::MessageComplete { end_emitted: true } => {
                    if self.must_close {
                        self.enter_closing();
                    } else {
                        self.state = ParseState::Idle;
                    }
                }
            }
        }
    }

    fn peer_closed(&mut self) -> WireEvent {
        self.current = None;
        self.enter_closing();
        WireEvent::PeerClosed
    }

    fn enter_closing(&mut self) {
        self.state = ParseState::Closing;
        self.must_close = true;
        if !self.buffer.is_empty() {
            tracing::trace!(discarded = self.buffer.len(), "Discarding unparsed bytes");
        }
        self.buffer.clear();
    }

    /// Starts the response owed to the oldest unanswered request.
    ///
    /// `content_length` is the exact number of body bytes that will follow
    /// through [`send_body`](Self::send_body). If `headers` already declare a
    /// `content-length` it must agree; otherwise one is appended. Returns the
    /// serialized status line and header block.
    pub fn start_response(
        &mut self,
        status: StatusCode,
        headers: &[(String, String)],
        content_length: u64,
    ) -> Result<BytesMut, FramingViolation> {
        match self.outbound {
            Outbound::Closed => return Err(FramingViolation::Closed),
            Outbound::SendingBody { .. } => return Err(FramingViolation::ResponseInProgress),
            Outbound::Idle => {}
        }
        let Some(exchange) = self.owed.front().copied() else {
            return Err(FramingViolation::NoPendingRequest);
        };

        let declared = match self.check_response_head(status, headers, content_length) {
            Ok(declared) => declared,
            Err(e) => {
                self.fail_outbound();
                return Err(e);
            }
        };

        // nothing can follow the last owed response once inbound is closing
        let last = self.state == ParseState::Closing && self.owed.len() == 1;
        self.owed.pop_front();
        let close_after = last || !exchange.keep_alive || has_token(headers, "Connection", "close");

        let mut out_headers = headers.to_vec();
        if declared.is_none() && status.allows_body() {
            out_headers.push(("content-length".to_string(), content_length.to_string()));
        }
        if close_after && !has_token(headers, "Connection", "close") {
            out_headers.push(("connection".to_string(), "close".to_string()));
        } else if !close_after
            && exchange.http10
            && !has_token(headers, "Connection", "keep-alive")
        {
            out_headers.push(("connection".to_string(), "keep-alive".to_string()));
        }

        let mut buf = BytesMut::with_capacity(128);
        serialize_head(status, &out_headers, &mut buf);

        self.outbound = Outbound::SendingBody {
            declared: content_length,
            written: 0,
            suppress: exchange.head_only,
            close_after,
        };
        if close_after {
            self.must_close = true;
        }
        Ok(buf)
    }

    /// Accounts for one body chunk of the response in progress.
    ///
    /// Returns the bytes to put on the wire, which are empty for a response
    /// to `HEAD`.
    pub fn send_body(&mut self, chunk: Bytes) -> Result<Bytes, FramingViolation> {
        let Outbound::SendingBody {
            declared,
            written,
            suppress,
            close_after,
        } = self.outbound
        else {
            return Err(FramingViolation::NoResponseInProgress);
        };

        let attempted = written + chunk.len() as u64;
        if attempted > declared {
            self.fail_outbound();
            return Err(FramingViolation::BodyOverrun { declared, attempted });
        }

        self.outbound = Outbound::SendingBody {
            declared,
            written: attempted,
            suppress,
            close_after,
        };
        Ok(if suppress { Bytes::new() } else { chunk })
    }

    /// Completes the response in progress.
    pub fn finish_response(&mut self) -> Result<(), FramingViolation> {
        let Outbound::SendingBody {
            declared,
            written,
            close_after,
            ..
        } = self.outbound
        else {
            return Err(FramingViolation::NoResponseInProgress);
        };

        if written != declared {
            self.fail_outbound();
            return Err(FramingViolation::LengthMismatch {
                declared,
                actual: written,
            });
        }

        self.outbound = if close_after { Outbound::Closed } else { Outbound::Idle };
        if close_after {
            self.enter_closing();
        }
        Ok(())
    }

    /// Serializes a complete response in one step.
    pub fn send_response(&mut self, response: &Response) -> Result<Bytes, FramingViolation> {
        let mut out = self.start_response(
            response.status,
            &response.headers,
            response.body.len() as u64,
        )?;
        let body = self.send_body(response.body.clone())?;
        self.finish_response()?;
        out.put_slice(&body);
        Ok(out.freeze())
    }

    /// Validates a response head and returns its declared content-length.
    fn check_response_head(
        &self,
        status: StatusCode,
        headers: &[(String, String)],
        content_length: u64,
    ) -> Result<Option<u64>, FramingViolation> {
        if status.as_u16() < 200 {
            return Err(FramingViolation::UnsupportedStatus(status.as_u16()));
        }

        let mut declared = None;
        for (name, value) in headers {
            if !is_token(name) || value.bytes().any(|b| matches!(b, b'\r' | b'\n' | 0)) {
                return Err(FramingViolation::InvalidHeader(name.clone()));
            }
            if name.eq_ignore_ascii_case("Transfer-Encoding") {
                return Err(FramingViolation::UnsupportedTransferEncoding(value.clone()));
            }
            if name.eq_ignore_ascii_case("Content-Length") {
                let length: u64 = value
                    .trim()
                    .parse()
                    .map_err(|_| FramingViolation::InvalidContentLength(value.clone()))?;
                if length != content_length {
                    return Err(FramingViolation::LengthMismatch {
                        declared: length,
                        actual: content_length,
                    });
                }
                declared = Some(length);
            }
        }

        if !status.allows_body() && content_length > 0 {
            return Err(FramingViolation::BodyNotAllowed(status.as_u16()));
        }
        Ok(declared)
    }

    fn fail_outbound(&mut self) {
        self.outbound = Outbound::Closed;
        self.enter_closing();
    }
}
